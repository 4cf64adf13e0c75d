//! Cluster transport port
//!
//! Defines how the coordinator and its workers exchange raw channel payloads.
//! Adapters (in-process channels, loopback TCP to worker processes) live in
//! the infrastructure layer.

use async_trait::async_trait;
use bytes::Bytes;
use scorehive_domain::{PoolSize, Rank};
use thiserror::Error;

/// Errors raised by a transport.
///
/// Every variant is fatal for the operation that hit it: there is no retry
/// and no reconnection.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Rank {0} is not part of the pool")]
    UnknownPeer(Rank),

    #[error("Connection to rank {0} closed")]
    Closed(Rank),

    #[error("I/O error on connection to rank {peer}: {message}")]
    Io { peer: Rank, message: String },

    #[error("Invalid frame from rank {peer}: {message}")]
    InvalidFrame { peer: Rank, message: String },
}

/// Ranked, tag-multiplexed message passing between pool members.
///
/// Guarantees strict FIFO order per (peer, tag): payloads sent to one peer on
/// one tag are received in send order. Payloads on different tags never mix.
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    /// Rank of the local endpoint
    fn rank(&self) -> Rank;

    /// Number of pool members, fixed for the transport's lifetime
    fn pool_size(&self) -> PoolSize;

    /// Largest payload a single `send` accepts, `None` when unbounded.
    ///
    /// A larger payload fails inside `send` with a fatal error, so callers
    /// that must keep channels in step check it before sending anything.
    fn max_payload(&self) -> Option<usize> {
        None
    }

    /// Send one payload to `peer` on channel `tag`.
    async fn send(&self, peer: Rank, tag: u8, payload: Bytes) -> Result<(), TransportError>;

    /// Block until the next payload from `peer` on channel `tag` arrives.
    async fn recv(&self, peer: Rank, tag: u8) -> Result<Bytes, TransportError>;
}
