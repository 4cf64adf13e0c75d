//! Client protocol server (rank 0)

pub mod handlers;
pub mod policy;
pub mod protocol;
#[allow(clippy::module_inception)]
pub mod server;

pub use handlers::{Outcome, RequestHandler, SHUTDOWN_ACK};
pub use policy::{ConnectionPolicy, SingleConnection};
pub use protocol::{
    Command, ProtocolError, Request, Response, ResponseCode, parse_request, parse_response,
};
pub use server::{
    ProtocolServer, ServeSummary, ServerError, ServerOptions, bind_listener, read_message,
};
