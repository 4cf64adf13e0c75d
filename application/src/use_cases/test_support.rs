//! Test doubles shared by the use case tests.

use crate::ports::cluster_transport::{ClusterTransport, TransportError};
use crate::ports::review_logger::{ReviewEvent, ReviewLogger};
use async_trait::async_trait;
use bytes::Bytes;
use scorehive_domain::{PoolSize, Rank};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Transport that records sends and replays pre-loaded inbound payloads.
///
/// `recv` never blocks: an empty queue behaves like a closed connection.
pub(crate) struct ScriptedTransport {
    rank: Rank,
    pool: PoolSize,
    sent: Mutex<Vec<(Rank, u8, Bytes)>>,
    inbox: Mutex<HashMap<(Rank, u8), VecDeque<Bytes>>>,
    failing_peer: Option<Rank>,
    max_payload: Option<usize>,
}

impl ScriptedTransport {
    pub(crate) fn coordinator(pool: u32) -> Self {
        Self::worker(0, pool)
    }

    pub(crate) fn worker(rank: u32, pool: u32) -> Self {
        Self {
            rank: Rank::new(rank),
            pool: PoolSize::new(pool),
            sent: Mutex::new(Vec::new()),
            inbox: Mutex::new(HashMap::new()),
            failing_peer: None,
            max_payload: None,
        }
    }

    /// Make every send to `peer` fail as if the connection dropped
    pub(crate) fn failing_sends_to(mut self, peer: u32) -> Self {
        self.failing_peer = Some(Rank::new(peer));
        self
    }

    /// Advertise a frame limit like a TCP transport would
    pub(crate) fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = Some(max);
        self
    }

    pub(crate) fn push_inbound(&self, from: Rank, tag: u8, payload: Bytes) {
        self.inbox
            .lock()
            .unwrap()
            .entry((from, tag))
            .or_default()
            .push_back(payload);
    }

    pub(crate) fn sent(&self) -> Vec<(Rank, u8, Bytes)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_on(&self, tag: u8) -> Vec<(Rank, Bytes)> {
        self.sent()
            .into_iter()
            .filter(|(_, t, _)| *t == tag)
            .map(|(peer, _, payload)| (peer, payload))
            .collect()
    }
}

#[async_trait]
impl ClusterTransport for ScriptedTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn pool_size(&self) -> PoolSize {
        self.pool
    }

    fn max_payload(&self) -> Option<usize> {
        self.max_payload
    }

    async fn send(&self, peer: Rank, tag: u8, payload: Bytes) -> Result<(), TransportError> {
        if !self.pool.contains(peer) {
            return Err(TransportError::UnknownPeer(peer));
        }
        if self.failing_peer == Some(peer) {
            return Err(TransportError::Closed(peer));
        }
        if let Some(max) = self.max_payload.filter(|max| payload.len() > *max) {
            return Err(TransportError::InvalidFrame {
                peer,
                message: format!("payload of {} bytes exceeds {}", payload.len(), max),
            });
        }
        self.sent.lock().unwrap().push((peer, tag, payload));
        Ok(())
    }

    async fn recv(&self, peer: Rank, tag: u8) -> Result<Bytes, TransportError> {
        self.inbox
            .lock()
            .unwrap()
            .get_mut(&(peer, tag))
            .and_then(|queue| queue.pop_front())
            .ok_or(TransportError::Closed(peer))
    }
}

/// Review logger that keeps event types in memory
#[derive(Default)]
pub(crate) struct RecordingLogger {
    events: Mutex<Vec<(&'static str, serde_json::Value)>>,
}

impl RecordingLogger {
    pub(crate) fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub(crate) fn payload(&self, event_type: &str) -> Option<serde_json::Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| *t == event_type)
            .map(|(_, p)| p.clone())
    }
}

impl ReviewLogger for RecordingLogger {
    fn log(&self, event: ReviewEvent) {
        self.events
            .lock()
            .unwrap()
            .push((event.event_type, event.payload));
    }
}
