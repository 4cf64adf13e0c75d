//! Typed channel primitives shared by the coordinator and the workers.
//!
//! [`ChannelMessenger`] turns domain values into channel payloads (via the
//! domain [`codec`](scorehive_domain::distribution::codec)) and hands them to
//! a [`ClusterTransport`] under the configured [`ChannelTags`].

use crate::ports::cluster_transport::{ClusterTransport, TransportError};
use bytes::Bytes;
use scorehive_domain::distribution::codec;
use scorehive_domain::{
    Channel, ChannelTags, CodecError, DomainError, PoolSize, Rank, ScoreResult, StudentExam,
    WorkerCommand,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Errors raised while distributing work.
#[derive(Error, Debug)]
pub enum DistributionError {
    #[error("No workers available (pool size {0})")]
    NoWorkers(PoolSize),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed {channel} payload from rank {peer}: {source}")]
    Codec {
        channel: Channel,
        peer: Rank,
        #[source]
        source: CodecError,
    },

    #[error("Answer key payload error: {0}")]
    Payload(#[from] DomainError),

    #[error("Protocol violation by rank {peer}: {message}")]
    ProtocolViolation { peer: Rank, message: String },

    #[error("{channel} payload for rank {peer} is {len} bytes, the frame limit is {max}")]
    PayloadTooLarge {
        channel: Channel,
        peer: Rank,
        len: usize,
        max: usize,
    },
}

impl DistributionError {
    /// Whether the channels can no longer be trusted.
    ///
    /// Fatal errors leave coordinator and workers out of step; the process
    /// that sees one must stop. Non-fatal errors are raised before anything
    /// was sent and only fail the current request.
    pub fn is_fatal(&self) -> bool {
        match self {
            DistributionError::NoWorkers(_)
            | DistributionError::Payload(_)
            | DistributionError::PayloadTooLarge { .. } => false,
            DistributionError::Transport(_)
            | DistributionError::Codec { .. }
            | DistributionError::ProtocolViolation { .. } => true,
        }
    }
}

/// Send/receive primitives for the four logical channels.
#[derive(Clone)]
pub struct ChannelMessenger {
    transport: Arc<dyn ClusterTransport>,
    tags: ChannelTags,
}

impl ChannelMessenger {
    pub fn new(transport: Arc<dyn ClusterTransport>, tags: ChannelTags) -> Self {
        Self { transport, tags }
    }

    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    pub fn pool_size(&self) -> PoolSize {
        self.transport.pool_size()
    }

    pub async fn send_command(
        &self,
        command: WorkerCommand,
        peer: Rank,
    ) -> Result<(), DistributionError> {
        trace!("-> rank {}: command {}", peer, command);
        self.send(Channel::Command, peer, codec::encode_command(command))
            .await
    }

    pub async fn receive_command(&self, peer: Rank) -> Result<WorkerCommand, DistributionError> {
        let payload = self.recv(Channel::Command, peer).await?;
        codec::decode_command(&payload).map_err(|e| DistributionError::ProtocolViolation {
            peer,
            message: e.to_string(),
        })
    }

    pub async fn send_answer_keys(&self, payload: &str, peer: Rank) -> Result<(), DistributionError> {
        trace!("-> rank {}: {} bytes of answer keys", peer, payload.len());
        self.send(
            Channel::AnswerKeys,
            peer,
            Bytes::copy_from_slice(payload.as_bytes()),
        )
        .await
    }

    pub async fn receive_answer_keys(&self, peer: Rank) -> Result<String, DistributionError> {
        let payload = self.recv(Channel::AnswerKeys, peer).await?;
        String::from_utf8(payload.to_vec()).map_err(|e| DistributionError::ProtocolViolation {
            peer,
            message: format!("answer keys are not valid UTF-8: {}", e),
        })
    }

    pub async fn send_exam_batch(
        &self,
        exams: &[StudentExam],
        peer: Rank,
    ) -> Result<(), DistributionError> {
        trace!("-> rank {}: {} exams", peer, exams.len());
        self.send(Channel::Exams, peer, codec::encode_exam_batch(exams))
            .await
    }

    pub async fn receive_exam_batch(&self, peer: Rank) -> Result<Vec<StudentExam>, DistributionError> {
        let payload = self.recv(Channel::Exams, peer).await?;
        codec::decode_exam_batch(&payload).map_err(|source| DistributionError::Codec {
            channel: Channel::Exams,
            peer,
            source,
        })
    }

    pub async fn send_results(
        &self,
        results: &[ScoreResult],
        peer: Rank,
    ) -> Result<(), DistributionError> {
        trace!("-> rank {}: {} results", peer, results.len());
        self.send(Channel::Results, peer, codec::encode_result_batch(results))
            .await
    }

    pub async fn receive_results(&self, peer: Rank) -> Result<Vec<ScoreResult>, DistributionError> {
        let payload = self.recv(Channel::Results, peer).await?;
        codec::decode_result_batch(&payload).map_err(|source| DistributionError::Codec {
            channel: Channel::Results,
            peer,
            source,
        })
    }

    /// Check an encoded payload against the transport's frame limit.
    pub fn prepare(
        &self,
        channel: Channel,
        peer: Rank,
        payload: Bytes,
    ) -> Result<Bytes, DistributionError> {
        match self.transport.max_payload() {
            Some(max) if payload.len() > max => Err(DistributionError::PayloadTooLarge {
                channel,
                peer,
                len: payload.len(),
                max,
            }),
            _ => Ok(payload),
        }
    }

    /// Send a payload returned by [`prepare`](Self::prepare).
    pub async fn send_prepared(
        &self,
        channel: Channel,
        peer: Rank,
        payload: Bytes,
    ) -> Result<(), DistributionError> {
        self.transport
            .send(peer, self.tags.tag(channel), payload)
            .await
            .map_err(DistributionError::from)
    }

    async fn send(
        &self,
        channel: Channel,
        peer: Rank,
        payload: Bytes,
    ) -> Result<(), DistributionError> {
        let payload = self.prepare(channel, peer, payload)?;
        self.send_prepared(channel, peer, payload).await
    }

    async fn recv(&self, channel: Channel, peer: Rank) -> Result<Bytes, DistributionError> {
        let payload = self.transport.recv(peer, self.tags.tag(channel)).await?;
        trace!("<- rank {}: {} bytes on {}", peer, payload.len(), channel);
        Ok(payload)
    }
}
