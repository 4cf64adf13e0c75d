//! Process cluster over loopback TCP.
//!
//! The coordinator spawns one `scorehive worker` process per worker rank.
//! Each worker binds an ephemeral loopback port, announces it on stdout
//! and accepts exactly one connection: the coordinator's. The pool is a
//! star; workers only ever talk to rank 0.
//!
//! Every connection has a single background reader task that owns the read
//! half, decodes [`Frame`]s and routes each payload into a per-tag queue by
//! its tag. Writes go through a mutex-guarded framed writer, so concurrent
//! senders never interleave frames.

use super::error::{ClusterError, Result};
use super::frame::{Frame, FrameCodec, FrameError};
use super::mailbox::{Mailbox, MailboxClosed};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use scorehive_application::{ClusterTransport, TransportError};
use scorehive_domain::{PoolSize, Rank};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, trace, warn};

const ANNOUNCEMENT_PREFIX: &str = "scorehive worker ";
const ANNOUNCEMENT_INFIX: &str = " listening on port ";

/// Line a worker prints on stdout once it is ready for the coordinator.
pub fn announcement(rank: Rank, port: u16) -> String {
    format!("{ANNOUNCEMENT_PREFIX}{rank}{ANNOUNCEMENT_INFIX}{port}")
}

/// Extract the port from a worker's announcement line, if it is one and it
/// comes from `rank`.
pub fn parse_announcement(line: &str, rank: Rank) -> Option<u16> {
    let rest = line.trim().strip_prefix(ANNOUNCEMENT_PREFIX)?;
    let (announced, port) = rest.split_once(ANNOUNCEMENT_INFIX)?;
    if announced.parse::<u32>().ok()? != rank.get() {
        return None;
    }
    port.trim().parse().ok()
}

/// How to start worker processes.
#[derive(Debug, Clone)]
pub struct WorkerLaunch {
    /// Executable that understands the `worker` subcommand
    pub program: PathBuf,
    /// Number of workers; the pool size is one more
    pub workers: u32,
    /// Extra arguments appended to every worker's command line
    pub args: Vec<OsString>,
    pub max_frame_size: usize,
}

impl WorkerLaunch {
    /// Launch workers from the currently running executable
    pub fn current_exe(workers: u32, max_frame_size: usize) -> Result<Self> {
        let program =
            std::env::current_exe().map_err(|e| ClusterError::Executable(e.to_string()))?;
        Ok(Self {
            program,
            workers,
            args: Vec::new(),
            max_frame_size,
        })
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// One framed connection to a peer.
struct PeerLink {
    peer: Rank,
    writer: Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
    inbound: Arc<Mailbox>,
    reader: JoinHandle<()>,
}

impl PeerLink {
    fn new(peer: Rank, stream: TcpStream, max_frame_size: usize) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for rank {}: {}", peer, e);
        }
        let (read_half, write_half) = stream.into_split();
        let codec = FrameCodec::new(max_frame_size);
        let inbound = Arc::new(Mailbox::new());

        let inbound_bg = Arc::clone(&inbound);
        let frames = FramedRead::new(read_half, codec);
        let reader = tokio::spawn(async move {
            Self::reader_loop(peer, frames, inbound_bg).await;
        });

        Self {
            peer,
            writer: Mutex::new(FramedWrite::new(write_half, codec)),
            inbound,
            reader,
        }
    }

    /// Background reader loop — single owner of the read half.
    ///
    /// Runs until the peer closes the connection or a frame fails to decode.
    /// Either way the mailbox is closed, so blocked receivers wake up.
    async fn reader_loop(
        peer: Rank,
        mut frames: FramedRead<OwnedReadHalf, FrameCodec>,
        inbound: Arc<Mailbox>,
    ) {
        while let Some(next) = frames.next().await {
            match next {
                Ok(frame) => {
                    trace!(
                        "Reader loop: {} bytes on tag {} from rank {}",
                        frame.payload.len(),
                        frame.tag,
                        peer
                    );
                    if !inbound.deliver(frame.tag, frame.payload) {
                        return;
                    }
                }
                Err(e) => {
                    warn!("Reader loop: connection to rank {} failed: {}", peer, e);
                    inbound.close(Some(frame_error(peer, e)));
                    return;
                }
            }
        }
        debug!("Reader loop: rank {} closed the connection", peer);
        inbound.close(None);
    }

    async fn send(&self, tag: u8, payload: Bytes) -> std::result::Result<(), TransportError> {
        if self.inbound.is_closed() {
            return Err(TransportError::Closed(self.peer));
        }
        let mut writer = self.writer.lock().await;
        writer
            .send(Frame::new(tag, payload))
            .await
            .map_err(|e| frame_error(self.peer, e))
    }

    async fn recv(&self, tag: u8) -> std::result::Result<Bytes, TransportError> {
        self.inbound.take(tag).await.map_err(|closed| match closed {
            MailboxClosed::Disconnected => TransportError::Closed(self.peer),
            MailboxClosed::Failed(error) => error,
        })
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn frame_error(peer: Rank, error: FrameError) -> TransportError {
    match error {
        FrameError::Io(e) => TransportError::Io {
            peer,
            message: e.to_string(),
        },
        other => TransportError::InvalidFrame {
            peer,
            message: other.to_string(),
        },
    }
}

struct WorkerProcess {
    rank: Rank,
    child: Child,
}

/// Cluster transport over loopback TCP connections.
pub struct TcpClusterTransport {
    rank: Rank,
    pool: PoolSize,
    peers: HashMap<Rank, PeerLink>,
    max_frame_size: usize,
    /// Worker child processes (coordinator only; killed on drop).
    processes: Mutex<Vec<WorkerProcess>>,
}

impl TcpClusterTransport {
    /// Spawn every worker process and connect to it (coordinator side).
    ///
    /// Workers are started and connected one at a time in rank order. If any
    /// worker fails to come up, the ones already started are killed.
    pub async fn launch(launch: &WorkerLaunch) -> Result<Self> {
        let pool = PoolSize::with_workers(launch.workers);
        let mut peers = HashMap::new();
        let mut processes = Vec::new();

        for rank in pool.worker_ranks() {
            let (child, port) = Self::spawn_worker(launch, rank, pool).await?;
            info!("Worker {} listening on port {}, connecting...", rank, port);

            let stream = TcpStream::connect(("127.0.0.1", port))
                .await
                .map_err(|source| ClusterError::Connect { rank, source })?;
            peers.insert(rank, PeerLink::new(rank, stream, launch.max_frame_size));
            processes.push(WorkerProcess { rank, child });
        }

        Ok(Self {
            rank: Rank::COORDINATOR,
            pool,
            peers,
            max_frame_size: launch.max_frame_size,
            processes: Mutex::new(processes),
        })
    }

    async fn spawn_worker(launch: &WorkerLaunch, rank: Rank, pool: PoolSize) -> Result<(Child, u16)> {
        debug!(
            "Spawning worker {}: {} worker --rank {}",
            rank,
            launch.program.display(),
            rank
        );

        let mut cmd = Command::new(&launch.program);
        cmd.arg("worker")
            .arg("--rank")
            .arg(rank.to_string())
            .arg("--pool-size")
            .arg(pool.get().to_string())
            .args(&launch.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        // Linux: request kernel to send SIGTERM to the worker when we die.
        // This catches cases where Drop doesn't run (SIGKILL, OOM kill).
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd
            .spawn()
            .map_err(|source| ClusterError::Spawn { rank, source })?;

        let stdout = child.stdout.take().ok_or_else(|| ClusterError::Announcement {
            rank,
            message: "stdout was not captured".into(),
        })?;

        let mut stdout_reader = BufReader::new(stdout);
        let mut line = String::new();
        let port = loop {
            line.clear();
            if stdout_reader.read_line(&mut line).await? == 0 {
                return Err(ClusterError::Announcement {
                    rank,
                    message: "worker exited without announcing its port".into(),
                });
            }
            let trimmed = line.trim();
            debug!("Worker {} output: {}", rank, trimmed);
            if let Some(port) = parse_announcement(trimmed, rank) {
                break port;
            }
        };

        Ok((child, port))
    }

    /// Bind an ephemeral loopback port, announce it on stdout and wait for
    /// the coordinator to connect (worker side).
    pub async fn listen(rank: Rank, pool: PoolSize, max_frame_size: usize) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{}\n", announcement(rank, port)).as_bytes())
            .await?;
        stdout.flush().await?;

        Self::accept_coordinator(listener, rank, pool, max_frame_size).await
    }

    /// Accept the coordinator's connection on an already bound listener.
    pub async fn accept_coordinator(
        listener: TcpListener,
        rank: Rank,
        pool: PoolSize,
        max_frame_size: usize,
    ) -> Result<Self> {
        let (stream, addr) = listener.accept().await?;
        debug!("Worker {} accepted coordinator from {}", rank, addr);

        let mut peers = HashMap::new();
        peers.insert(
            Rank::COORDINATOR,
            PeerLink::new(Rank::COORDINATOR, stream, max_frame_size),
        );
        Ok(Self {
            rank,
            pool,
            peers,
            max_frame_size,
            processes: Mutex::new(Vec::new()),
        })
    }

    /// Build the coordinator side from already connected worker streams.
    pub fn from_worker_streams(
        pool: PoolSize,
        streams: impl IntoIterator<Item = (Rank, TcpStream)>,
        max_frame_size: usize,
    ) -> Self {
        let peers = streams
            .into_iter()
            .map(|(rank, stream)| (rank, PeerLink::new(rank, stream, max_frame_size)))
            .collect();
        Self {
            rank: Rank::COORDINATOR,
            pool,
            peers,
            max_frame_size,
            processes: Mutex::new(Vec::new()),
        }
    }

    /// Wait for every spawned worker to exit, killing those that take longer
    /// than `grace`.
    pub async fn wait_for_workers(&self, grace: Duration) {
        let mut processes = self.processes.lock().await;
        for process in processes.iter_mut() {
            match tokio::time::timeout(grace, process.child.wait()).await {
                Ok(Ok(status)) if status.success() => {
                    debug!("Worker {} exited", process.rank);
                }
                Ok(Ok(status)) => warn!("Worker {} exited with {}", process.rank, status),
                Ok(Err(e)) => warn!("Could not wait for worker {}: {}", process.rank, e),
                Err(_) => {
                    warn!(
                        "Worker {} still running after {:?}, killing",
                        process.rank, grace
                    );
                    let _ = process.child.start_kill();
                }
            }
        }
        processes.clear();
    }

    fn link(&self, peer: Rank) -> std::result::Result<&PeerLink, TransportError> {
        if !self.pool.contains(peer) {
            return Err(TransportError::UnknownPeer(peer));
        }
        self.peers.get(&peer).ok_or(TransportError::UnknownPeer(peer))
    }
}

#[async_trait]
impl ClusterTransport for TcpClusterTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn pool_size(&self) -> PoolSize {
        self.pool
    }

    fn max_payload(&self) -> Option<usize> {
        Some(self.max_frame_size)
    }

    async fn send(&self, peer: Rank, tag: u8, payload: Bytes) -> std::result::Result<(), TransportError> {
        self.link(peer)?.send(tag, payload).await
    }

    async fn recv(&self, peer: Rank, tag: u8) -> std::result::Result<Bytes, TransportError> {
        self.link(peer)?.recv(tag).await
    }
}
