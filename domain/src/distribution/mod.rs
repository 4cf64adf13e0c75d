//! Work distribution between the coordinator and its workers.
//!
//! - [`rank::Rank`] / [`rank::PoolSize`] — process identities in the pool
//! - [`command::WorkerCommand`] — control signals sent to workers
//! - [`channel::Channel`] / [`channel::ChannelTags`] — the four logical channels
//! - [`slicing::slice_exams`] — contiguous per-worker partitioning
//! - [`codec`] — portable binary encoding of channel payloads

pub mod channel;
pub mod codec;
pub mod command;
pub mod rank;
pub mod slicing;
