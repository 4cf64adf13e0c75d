//! Run Worker use case
//!
//! Rank ≥ 1 side of the distribution protocol. A worker never initiates
//! communication: it blocks for a command, and for REVIEW it receives its
//! answer keys and exam slice, scores them and sends the results back.

use crate::ports::cluster_transport::ClusterTransport;
use crate::use_cases::messenger::{ChannelMessenger, DistributionError};
use scorehive_domain::{
    AnswerStore, ChannelTags, EvaluationEngine, Rank, ScoreResult, StudentExam, WorkerCommand,
};
use std::sync::Arc;
use tracing::{debug, info};

/// What the coordinator asked a worker to do
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerRequest {
    /// Score these exams; their answer keys are already loaded
    Review(Vec<StudentExam>),
    Shutdown,
}

/// Worker endpoint of the channel to the coordinator
pub struct WorkerLink {
    messenger: ChannelMessenger,
    coordinator: Rank,
}

impl WorkerLink {
    pub fn new(transport: Arc<dyn ClusterTransport>, tags: ChannelTags) -> Self {
        Self {
            messenger: ChannelMessenger::new(transport, tags),
            coordinator: Rank::COORDINATOR,
        }
    }

    pub fn rank(&self) -> Rank {
        self.messenger.rank()
    }

    /// Block for the next command from the coordinator.
    ///
    /// For REVIEW the answer-key payload is loaded into `store` before the
    /// exam batch is received. A payload that does not parse means the
    /// coordinator and worker disagree on the wire format, so it is a
    /// protocol violation rather than a request error.
    pub async fn receive_from_coordinator(
        &self,
        store: &mut AnswerStore,
    ) -> Result<WorkerRequest, DistributionError> {
        let peer = self.coordinator;
        match self.messenger.receive_command(peer).await? {
            WorkerCommand::Shutdown => Ok(WorkerRequest::Shutdown),
            WorkerCommand::Review => {
                let answer_keys = self.messenger.receive_answer_keys(peer).await?;
                let loaded = store.load_payload(&answer_keys).map_err(|e| {
                    DistributionError::ProtocolViolation {
                        peer,
                        message: e.to_string(),
                    }
                })?;
                debug!("Rank {} loaded {} answer sets", self.rank(), loaded);

                let exams = self.messenger.receive_exam_batch(peer).await?;
                Ok(WorkerRequest::Review(exams))
            }
        }
    }

    pub async fn send_to_coordinator(&self, results: &[ScoreResult]) -> Result<(), DistributionError> {
        self.messenger.send_results(results, self.coordinator).await
    }
}

/// Totals reported when a worker loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub reviews: usize,
    pub exams: usize,
}

/// Use case for running the worker loop until SHUTDOWN
pub struct RunWorkerUseCase {
    link: WorkerLink,
    engine: EvaluationEngine,
    store: AnswerStore,
}

impl RunWorkerUseCase {
    pub fn new(link: WorkerLink, engine: EvaluationEngine) -> Self {
        Self {
            link,
            engine,
            store: AnswerStore::new(),
        }
    }

    /// Serve commands until SHUTDOWN.
    ///
    /// Any channel error ends the loop; the caller should exit non-zero.
    pub async fn run(mut self) -> Result<WorkerSummary, DistributionError> {
        let rank = self.link.rank();
        let mut summary = WorkerSummary::default();

        loop {
            match self.link.receive_from_coordinator(&mut self.store).await? {
                WorkerRequest::Shutdown => {
                    info!(
                        "Worker {} shutting down after {} reviews",
                        rank, summary.reviews
                    );
                    return Ok(summary);
                }
                WorkerRequest::Review(exams) => {
                    info!("Worker {} received exams count: {}", rank, exams.len());
                    let results = self.engine.evaluate_batch(&mut self.store, &exams);
                    self.link.send_to_coordinator(&results).await?;

                    summary.reviews += 1;
                    summary.exams += exams.len();
                }
            }
        }
    }
}
