//! Presentation layer for scorehive
//!
//! This crate contains the client protocol server run by the coordinator,
//! a matching protocol client, and the CLI definitions.

pub mod cli;
pub mod client;
pub mod server;

// Re-export commonly used types
pub use cli::commands::{Cli, Command, RequestKind};
pub use client::{ClientError, ProtocolClient, load_data};
pub use server::{
    ConnectionPolicy, ProtocolServer, Request, RequestHandler, Response, ResponseCode,
    ServeSummary, ServerError, ServerOptions, SingleConnection, bind_listener,
};
