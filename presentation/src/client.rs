//! Protocol client
//!
//! Sends one framed request per connection and reads the response until the
//! server closes the connection.

use crate::server::protocol::{ProtocolError, Request, Response, parse_response};
use std::io;
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] ProtocolError),
}

/// Client for a ScoreHive coordinator
#[derive(Debug, Clone)]
pub struct ProtocolClient {
    address: String,
}

impl ProtocolClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let raw = self.send_raw(&request.encode()).await?;
        Ok(parse_response(&raw)?)
    }

    /// Send `message` as-is and return the raw response text.
    pub async fn send_raw(&self, message: &str) -> Result<String, ClientError> {
        let mut stream =
            TcpStream::connect(&self.address)
                .await
                .map_err(|source| ClientError::Connect {
                    address: self.address.clone(),
                    source,
                })?;
        debug!("Connected to {}", self.address);

        stream.write_all(message.as_bytes()).await?;
        stream.flush().await?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        Ok(String::from_utf8_lossy(&response).into_owned())
    }
}

/// Resolve a command-line data argument; `@path` reads the file at `path`.
pub fn load_data(arg: &str) -> io::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path)),
        None => Ok(arg.to_string()),
    }
}
