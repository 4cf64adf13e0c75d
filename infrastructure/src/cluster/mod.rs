//! Cluster transport adapters
//!
//! Implementations of the [`ClusterTransport`](scorehive_application::ClusterTransport)
//! port: worker processes over loopback TCP, and in-process endpoints.

pub mod error;
pub mod frame;
pub mod local;
mod mailbox;
pub mod transport;

pub use error::ClusterError;
pub use frame::{DEFAULT_MAX_FRAME_SIZE, Frame, FrameCodec, FrameError};
pub use local::{LocalCluster, LocalEndpoint};
pub use transport::{TcpClusterTransport, WorkerLaunch, announcement, parse_announcement};
