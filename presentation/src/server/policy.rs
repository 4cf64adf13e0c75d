//! Connection acceptance policy

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

/// Decides how client connections are taken off the listener.
///
/// The server serves whatever the policy hands it to completion before
/// asking for the next connection.
#[async_trait]
pub trait ConnectionPolicy: Send {
    /// Wait for the next connection to serve
    async fn next_connection(
        &mut self,
        listener: &TcpListener,
    ) -> io::Result<(TcpStream, SocketAddr)>;

    fn name(&self) -> &'static str;
}

/// One client at a time; others wait in the listen backlog.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleConnection;

#[async_trait]
impl ConnectionPolicy for SingleConnection {
    async fn next_connection(
        &mut self,
        listener: &TcpListener,
    ) -> io::Result<(TcpStream, SocketAddr)> {
        listener.accept().await
    }

    fn name(&self) -> &'static str {
        "single-connection"
    }
}
