//! Per-tag inbound queues for one peer.
//!
//! A [`Mailbox`] holds one unbounded FIFO per tag, created lazily by
//! whichever side touches the tag first. Once closed, queued payloads are
//! still delivered; after that every receive reports the close reason.

use bytes::Bytes;
use scorehive_application::TransportError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct Queue {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>>,
}

impl Queue {
    fn new(open: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: open.then_some(tx),
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }
}

#[derive(Default)]
struct State {
    queues: HashMap<u8, Queue>,
    closed: bool,
    failure: Option<TransportError>,
}

/// Inbound payloads from one peer, demultiplexed by tag.
#[derive(Default)]
pub(crate) struct Mailbox {
    state: Mutex<State>,
}

/// Why a receive could not produce a payload
#[derive(Debug)]
pub(crate) enum MailboxClosed {
    /// The peer went away cleanly
    Disconnected,
    /// The connection failed; every later receive sees the same error
    Failed(TransportError),
}

impl Mailbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a payload. Returns `false` if the mailbox is already closed.
    pub(crate) fn deliver(&self, tag: u8, payload: Bytes) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let closed = state.closed;
        let queue = state
            .queues
            .entry(tag)
            .or_insert_with(|| Queue::new(!closed));
        match &queue.tx {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Wait for the next payload on `tag`.
    pub(crate) async fn take(&self, tag: u8) -> Result<Bytes, MailboxClosed> {
        let rx = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let closed = state.closed;
            let queue = state
                .queues
                .entry(tag)
                .or_insert_with(|| Queue::new(!closed));
            Arc::clone(&queue.rx)
        };

        if let Some(payload) = rx.lock().await.recv().await {
            return Ok(payload);
        }

        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Err(match &state.failure {
            Some(error) => MailboxClosed::Failed(error.clone()),
            None => MailboxClosed::Disconnected,
        })
    }

    /// Stop accepting payloads. Waiting receivers wake once their queue
    /// drains.
    pub(crate) fn close(&self, failure: Option<TransportError>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return;
        }
        state.closed = true;
        state.failure = failure;
        for queue in state.queues.values_mut() {
            queue.tx = None;
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }
}
