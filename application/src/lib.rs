//! Application layer for scorehive
//!
//! This crate contains the coordinator and worker use cases plus the port
//! definitions they are written against. It depends only on the domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::{
    cluster_transport::{ClusterTransport, TransportError},
    review_logger::{NoReviewLogger, ReviewEvent, ReviewLogger},
};
pub use use_cases::coordinate_review::WorkCoordinator;
pub use use_cases::messenger::{ChannelMessenger, DistributionError};
pub use use_cases::run_worker::{RunWorkerUseCase, WorkerLink, WorkerRequest, WorkerSummary};
