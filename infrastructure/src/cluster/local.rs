//! In-process cluster.
//!
//! [`LocalCluster::endpoints`] builds one [`LocalEndpoint`] per rank, wired
//! in a star around the coordinator exactly like the process cluster. Used
//! by tests and by `cluster.launch = "inline"`, where workers run as tasks
//! inside the coordinator process.

use super::mailbox::{Mailbox, MailboxClosed};
use async_trait::async_trait;
use bytes::Bytes;
use scorehive_application::{ClusterTransport, TransportError};
use scorehive_domain::{PoolSize, Rank};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory for in-process endpoints
pub struct LocalCluster;

impl LocalCluster {
    /// Create the endpoints of a pool; the endpoint at index `r` has rank `r`.
    pub fn endpoints(pool: PoolSize) -> Vec<LocalEndpoint> {
        let mut endpoints: Vec<LocalEndpoint> = (0..pool.get())
            .map(|rank| LocalEndpoint {
                rank: Rank::new(rank),
                pool,
                outbound: HashMap::new(),
                inbound: HashMap::new(),
            })
            .collect();

        for worker in pool.worker_ranks() {
            let down = Arc::new(Mailbox::new());
            let up = Arc::new(Mailbox::new());
            let w = worker.get() as usize;

            endpoints[0].outbound.insert(worker, Arc::clone(&down));
            endpoints[w].inbound.insert(Rank::COORDINATOR, down);
            endpoints[w].outbound.insert(Rank::COORDINATOR, Arc::clone(&up));
            endpoints[0].inbound.insert(worker, up);
        }

        endpoints
    }
}

/// One rank's view of an in-process pool.
///
/// Dropping an endpoint disconnects it: peers blocked on it get
/// [`TransportError::Closed`].
pub struct LocalEndpoint {
    rank: Rank,
    pool: PoolSize,
    outbound: HashMap<Rank, Arc<Mailbox>>,
    inbound: HashMap<Rank, Arc<Mailbox>>,
}

#[async_trait]
impl ClusterTransport for LocalEndpoint {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn pool_size(&self) -> PoolSize {
        self.pool
    }

    async fn send(&self, peer: Rank, tag: u8, payload: Bytes) -> Result<(), TransportError> {
        let mailbox = self
            .outbound
            .get(&peer)
            .ok_or(TransportError::UnknownPeer(peer))?;
        if mailbox.deliver(tag, payload) {
            Ok(())
        } else {
            Err(TransportError::Closed(peer))
        }
    }

    async fn recv(&self, peer: Rank, tag: u8) -> Result<Bytes, TransportError> {
        let mailbox = self
            .inbound
            .get(&peer)
            .ok_or(TransportError::UnknownPeer(peer))?;
        mailbox.take(tag).await.map_err(|closed| match closed {
            MailboxClosed::Disconnected => TransportError::Closed(peer),
            MailboxClosed::Failed(error) => error,
        })
    }
}

impl Drop for LocalEndpoint {
    fn drop(&mut self) {
        for mailbox in self.outbound.values() {
            mailbox.close(None);
        }
        // Nothing will read what is still addressed to us
        for mailbox in self.inbound.values() {
            mailbox.close(None);
        }
    }
}
