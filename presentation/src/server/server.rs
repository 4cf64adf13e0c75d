//! Client protocol server
//!
//! Accepts one connection at a time, reads one request, answers it and
//! closes the connection. The loop ends when the stop token is cancelled
//! (SHUTDOWN or Ctrl-C) or the worker pool fails; workers are sent SHUTDOWN
//! exactly once on the way out.

use super::handlers::{Outcome, RequestHandler};
use super::policy::{ConnectionPolicy, SingleConnection};
use super::protocol::{DELIMITER, ProtocolError, Response, parse_request};
use scorehive_application::DistributionError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, lookup_host};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Bytes requested from the socket per read
const READ_CHUNK: usize = 1024;

/// Errors that end the server loop
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Worker pool failed: {0}")]
    Distribution(#[from] DistributionError),
}

/// Tunables of the server loop
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Largest accepted request, in bytes
    pub max_message_size: usize,
    /// Pause after each connection
    pub pause: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_message_size: 1024 * 1024,
            pause: Duration::from_millis(100),
        }
    }
}

/// Totals reported when the server stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub connections: u64,
}

/// Bind the client listener with an explicit backlog.
pub async fn bind_listener(host: &str, port: u16, backlog: u32) -> Result<TcpListener, ServerError> {
    let address = format!("{host}:{port}");
    let bind_error = |source: io::Error| ServerError::Bind {
        address: address.clone(),
        source,
    };

    let addr = lookup_host(&address)
        .await
        .map_err(bind_error)?
        .next()
        .ok_or_else(|| {
            bind_error(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "address did not resolve",
            ))
        })?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_error)?;
    socket.set_reuseaddr(true).map_err(bind_error)?;
    socket.bind(addr).map_err(bind_error)?;
    socket.listen(backlog).map_err(bind_error)
}

/// Read bytes until the first `$`.
///
/// Returns the text up to and including the delimiter; anything the client
/// sent after it is discarded.
pub async fn read_message<R>(reader: &mut R, max_message_size: usize) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut message = Vec::new();
    let mut buffer = [0u8; READ_CHUNK];

    loop {
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(|e| ProtocolError::Io(e.to_string()))?;
        if read == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }

        let start = message.len();
        message.extend_from_slice(&buffer[..read]);
        if message.len() > max_message_size {
            return Err(ProtocolError::MessageTooLarge);
        }

        if let Some(offset) = message[start..]
            .iter()
            .position(|&byte| byte == DELIMITER as u8)
        {
            message.truncate(start + offset + 1);
            return String::from_utf8(message).map_err(|_| ProtocolError::InvalidEncoding);
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &Response) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(response.encode().as_bytes()).await?;
    writer.flush().await?;
    writer.shutdown().await
}

/// The coordinator's client-facing server
pub struct ProtocolServer<P = SingleConnection> {
    listener: TcpListener,
    handler: RequestHandler,
    policy: P,
    options: ServerOptions,
    stop: CancellationToken,
}

impl ProtocolServer<SingleConnection> {
    /// `stop` must be the token the handler was built with.
    pub fn new(
        listener: TcpListener,
        handler: RequestHandler,
        stop: CancellationToken,
        options: ServerOptions,
    ) -> Self {
        Self {
            listener,
            handler,
            policy: SingleConnection,
            options,
            stop,
        }
    }
}

impl<P: ConnectionPolicy> ProtocolServer<P> {
    pub fn with_policy<Q: ConnectionPolicy>(self, policy: Q) -> ProtocolServer<Q> {
        ProtocolServer {
            listener: self.listener,
            handler: self.handler,
            policy,
            options: self.options,
            stop: self.stop,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until stopped, then broadcast SHUTDOWN to the workers.
    ///
    /// A fatal worker-pool error stops the loop after the client that
    /// triggered it has been answered, and is returned.
    pub async fn run(mut self) -> Result<ServeSummary, ServerError> {
        let mut summary = ServeSummary::default();
        info!(
            "Server listening on {:?} ({})",
            self.listener.local_addr().ok(),
            self.policy.name()
        );

        let fatal = loop {
            let accepted = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break None,
                accepted = self.policy.next_connection(&self.listener) => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    summary.connections += 1;
                    if let Some(e) = self.serve_connection(stream, peer).await {
                        break Some(e);
                    }
                }
                Err(e) => warn!("Failed to accept connection: {}", e),
            }

            self.pause().await;
        };

        self.stop.cancel();
        let coordinator = self.handler.coordinator();
        match fatal {
            Some(e) => {
                if let Err(broadcast) = coordinator.broadcast_shutdown().await {
                    warn!("Shutdown broadcast after failure did not complete: {}", broadcast);
                }
                Err(ServerError::Distribution(e))
            }
            None => {
                coordinator.broadcast_shutdown().await?;
                info!("Server stopped after {} connections", summary.connections);
                Ok(summary)
            }
        }
    }

    async fn serve_connection(
        &mut self,
        mut stream: tokio::net::TcpStream,
        peer: SocketAddr,
    ) -> Option<DistributionError> {
        debug!("Accepted connection from {}", peer);
        let max = self.options.max_message_size;

        let request = match read_message(&mut stream, max).await {
            Ok(message) => parse_request(&message, max),
            Err(e) => Err(e),
        };

        let outcome = match request {
            Ok(request) => self.handler.handle(request).await,
            Err(e) => {
                warn!("Bad request from {}: {}", peer, e);
                Outcome::respond(Response::from(e))
            }
        };

        if let Err(e) = write_response(&mut stream, &outcome.response).await {
            warn!("Failed to send response to {}: {}", peer, e);
        }
        if let Some(e) = &outcome.fatal {
            error!("Stopping server: {}", e);
        }
        outcome.fatal
    }

    async fn pause(&self) {
        if self.options.pause.is_zero() || self.stop.is_cancelled() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.options.pause) => {}
            _ = self.stop.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProtocolClient;
    use crate::server::handlers::SHUTDOWN_ACK;
    use crate::server::protocol::{Request, ResponseCode};
    use scorehive_application::{RunWorkerUseCase, WorkCoordinator, WorkerLink, WorkerSummary};
    use scorehive_domain::{ChannelTags, EvaluationEngine, PoolSize};
    use scorehive_infrastructure::{LocalCluster, LocalEndpoint};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::task::JoinHandle;

    const MAX_MESSAGE: usize = 4096;

    struct Harness {
        client: ProtocolClient,
        stop: CancellationToken,
        coordinator: Arc<WorkCoordinator>,
        server: JoinHandle<Result<ServeSummary, ServerError>>,
        workers: Vec<JoinHandle<Result<WorkerSummary, DistributionError>>>,
        idle: Vec<LocalEndpoint>,
    }

    /// Serve over an inline pool; `run_workers` false leaves the worker
    /// endpoints connected but unserviced.
    async fn start(workers: u32, run_workers: bool) -> Harness {
        start_with(workers, run_workers, SingleConnection).await
    }

    async fn start_with<P: ConnectionPolicy + Sync + 'static>(
        workers: u32,
        run_workers: bool,
        policy: P,
    ) -> Harness {
        let tags = ChannelTags::default();
        let mut endpoints = LocalCluster::endpoints(PoolSize::with_workers(workers));
        let coordinator_endpoint = endpoints.remove(0);

        let (worker_tasks, idle) = if run_workers {
            let tasks = endpoints
                .into_iter()
                .map(|endpoint| {
                    let link = WorkerLink::new(Arc::new(endpoint), tags);
                    tokio::spawn(RunWorkerUseCase::new(link, EvaluationEngine::default()).run())
                })
                .collect();
            (tasks, Vec::new())
        } else {
            (Vec::new(), endpoints)
        };

        let coordinator = Arc::new(WorkCoordinator::new(Arc::new(coordinator_endpoint), tags));
        let stop = CancellationToken::new();
        let handler = RequestHandler::new(Arc::clone(&coordinator), stop.clone());
        let listener = bind_listener("127.0.0.1", 0, 4).await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = ProtocolServer::new(
            listener,
            handler,
            stop.clone(),
            ServerOptions {
                max_message_size: MAX_MESSAGE,
                pause: Duration::ZERO,
            },
        )
        .with_policy(policy);

        Harness {
            client: ProtocolClient::new(address.to_string()),
            stop,
            coordinator,
            server: tokio::spawn(server.run()),
            workers: worker_tasks,
            idle,
        }
    }

    /// Accepts like [`SingleConnection`] and counts what it hands out
    struct CountingPolicy {
        accepted: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ConnectionPolicy for CountingPolicy {
        async fn next_connection(
            &mut self,
            listener: &TcpListener,
        ) -> io::Result<(tokio::net::TcpStream, SocketAddr)> {
            let accepted = listener.accept().await?;
            self.accepted.fetch_add(1, Ordering::SeqCst);
            Ok(accepted)
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_custom_policy_supplies_connections() {
        let accepted = Arc::new(AtomicUsize::new(0));
        let harness = start_with(
            1,
            true,
            CountingPolicy {
                accepted: Arc::clone(&accepted),
            },
        )
        .await;

        for word in ["one", "two"] {
            let response = harness
                .client
                .send(&Request::Echo(word.to_string()))
                .await
                .unwrap();
            assert_eq!(response, Response::ok(format!("Echo {word}")));
        }

        let response = harness.client.send(&Request::Shutdown).await.unwrap();
        assert_eq!(response, Response::ok(SHUTDOWN_ACK));

        let summary = harness.server.await.unwrap().unwrap();
        assert_eq!(summary.connections, 3);
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_echo_over_tcp() {
        let harness = start(1, true).await;
        let response = harness
            .client
            .send(&Request::Echo("ping".to_string()))
            .await
            .unwrap();
        assert_eq!(response, Response::ok("Echo ping"));

        harness.stop.cancel();
        harness.server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_answers_round_trip_over_tcp() {
        let harness = start(1, true).await;

        let response = harness.client.send(&Request::GetAnswers).await.unwrap();
        assert_eq!(response, Response::ok("[]"));

        let response = harness
            .client
            .send(&Request::SetAnswers("[]".to_string()))
            .await
            .unwrap();
        assert_eq!(response, Response::ok("Set Answers OK"));

        let response = harness.client.send(&Request::GetAnswers).await.unwrap();
        assert_eq!(response, Response::ok("[]"));

        harness.stop.cancel();
        harness.server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_review_then_shutdown() {
        let harness = start(2, true).await;

        let keys = json!([{ "stage": 1, "answers": [
            { "qst_idx": 1, "rans_idx": 2 },
            { "qst_idx": 2, "rans_idx": 1 },
        ]}]);
        let response = harness
            .client
            .send(&Request::SetAnswers(keys.to_string()))
            .await
            .unwrap();
        assert!(response.is_ok());

        let exams = json!([
            { "stage": 1, "id_exam": 100, "answers": [
                { "qst_idx": 1, "ans_idx": 2 },
                { "qst_idx": 2, "ans_idx": 3 },
                { "qst_idx": 3, "ans_idx": 9 },
            ]},
            { "stage": 5, "id_exam": 200, "answers": [
                { "qst_idx": 1, "ans_idx": 1 },
                { "qst_idx": 2, "ans_idx": 1 },
            ]},
        ]);
        let response = harness
            .client
            .send(&Request::Review(exams.to_string()))
            .await
            .unwrap();
        assert!(response.is_ok(), "{}", response.data);
        let results: Value = serde_json::from_str(&response.data).unwrap();
        assert_eq!(
            results,
            json!([
                { "stage": 1, "id_exam": 100, "correct_answers": 1, "wrong_answers": 1,
                  "unscored_answers": 1, "score": 1.0 },
                { "stage": 5, "id_exam": 200, "correct_answers": 0, "wrong_answers": 0,
                  "unscored_answers": 2, "score": 0.0 },
            ])
        );

        let response = harness.client.send(&Request::Shutdown).await.unwrap();
        assert_eq!(response, Response::ok(SHUTDOWN_ACK));

        let summary = harness.server.await.unwrap().unwrap();
        assert_eq!(summary.connections, 3);
        assert!(harness.coordinator.is_shutdown_sent());

        let mut reviewed = Vec::new();
        for worker in harness.workers {
            reviewed.push(worker.await.unwrap().unwrap());
        }
        assert_eq!(
            reviewed,
            vec![
                WorkerSummary { reviews: 1, exams: 1 },
                WorkerSummary { reviews: 1, exams: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error() {
        let harness = start(1, true).await;
        let raw = harness.client.send_raw("XX 0$").await.unwrap();
        assert_eq!(raw, "SH 1 20 Invalid magic string$\r\n");

        let raw = harness.client.send_raw("SH 3 5 ping$").await.unwrap();
        assert_eq!(raw, "SH 1 20 Data length mismatch$\r\n");

        harness.stop.cancel();
        harness.server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dropped_connection_gets_error() {
        let harness = start(1, true).await;
        let mut stream = tokio::net::TcpStream::connect(harness.client.address())
            .await
            .unwrap();
        stream.write_all(b"SH 3 4 pi").await.unwrap();
        stream.shutdown().await.unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert_eq!(raw, Response::from(ProtocolError::ConnectionClosed).encode());

        harness.stop.cancel();
        harness.server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected() {
        let harness = start(1, true).await;
        // One byte over the limit and no delimiter
        let message = "x".repeat(MAX_MESSAGE + 1);
        let raw = harness.client.send_raw(&message).await.unwrap();
        assert_eq!(raw, Response::from(ProtocolError::MessageTooLarge).encode());

        harness.stop.cancel();
        harness.server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stop_token_broadcasts_shutdown_once() {
        let harness = start(2, true).await;
        harness.stop.cancel();

        let summary = harness.server.await.unwrap().unwrap();
        assert_eq!(summary.connections, 0);
        for worker in harness.workers {
            assert_eq!(worker.await.unwrap().unwrap(), WorkerSummary::default());
        }
        assert!(!harness.coordinator.broadcast_shutdown().await.unwrap());
    }

    #[tokio::test]
    async fn test_worker_failure_stops_server() {
        let mut harness = start(1, false).await;
        harness.idle.clear();

        let response = harness
            .client
            .send(&Request::Review("[]".to_string()))
            .await
            .unwrap();
        assert_eq!(response.code, ResponseCode::Error);
        assert!(response.data.starts_with("Review Error: "));

        let result = harness.server.await.unwrap();
        assert!(matches!(result, Err(ServerError::Distribution(e)) if e.is_fatal()));
    }
}
