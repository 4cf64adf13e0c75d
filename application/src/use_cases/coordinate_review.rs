//! Coordinate Review use case
//!
//! Rank 0 side of the distribution protocol: slices a review batch across
//! the workers, fans out the per-worker answer keys and exams, fans the
//! results back in and broadcasts shutdown.

use crate::ports::cluster_transport::ClusterTransport;
use crate::ports::review_logger::{NoReviewLogger, ReviewEvent, ReviewLogger};
use crate::use_cases::messenger::{ChannelMessenger, DistributionError};
use bytes::Bytes;
use scorehive_domain::distribution::codec;
use scorehive_domain::{
    AnswerStore, Channel, ChannelTags, PoolSize, Rank, ScoreResult, StageId, StudentExam,
    WorkerCommand, slice_exams,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Everything one worker is sent for a review, encoded before any send.
struct Dispatch {
    rank: Rank,
    exams: usize,
    command: Bytes,
    answer_keys: Bytes,
    batch: Bytes,
}

impl Dispatch {
    fn payloads(&self) -> [(Channel, &Bytes); 3] {
        [
            (Channel::Command, &self.command),
            (Channel::AnswerKeys, &self.answer_keys),
            (Channel::Exams, &self.batch),
        ]
    }
}

/// Coordinator endpoint of the worker pool
pub struct WorkCoordinator {
    messenger: ChannelMessenger,
    review_logger: Arc<dyn ReviewLogger>,
    shutdown_sent: AtomicBool,
}

impl WorkCoordinator {
    pub fn new(transport: Arc<dyn ClusterTransport>, tags: ChannelTags) -> Self {
        Self {
            messenger: ChannelMessenger::new(transport, tags),
            review_logger: Arc::new(NoReviewLogger),
            shutdown_sent: AtomicBool::new(false),
        }
    }

    pub fn with_review_logger(mut self, logger: Arc<dyn ReviewLogger>) -> Self {
        self.review_logger = logger;
        self
    }

    pub fn pool_size(&self) -> PoolSize {
        self.messenger.pool_size()
    }

    /// Slice `exams` across the workers and send every worker its share.
    ///
    /// Worker `i` (rank `i + 1`) gets REVIEW, then the answer keys for the
    /// stages in its slice, then the slice itself. Every worker gets all
    /// three, even when its slice is empty.
    ///
    /// All three payloads for every worker are encoded and checked against
    /// the transport's frame limit before the first send, so a payload error
    /// leaves the channels untouched.
    pub async fn send_to_workers(
        &self,
        store: &AnswerStore,
        exams: &[StudentExam],
    ) -> Result<(), DistributionError> {
        let pool = self.pool_size();
        let workers = pool.workers();
        if workers == 0 {
            return Err(DistributionError::NoWorkers(pool));
        }

        let mut dispatches = Vec::with_capacity(workers);
        for (index, slice) in slice_exams(exams, workers).into_iter().enumerate() {
            let rank = Rank::of_worker(index);
            let stages: Vec<StageId> = slice.iter().map(|exam| exam.stage).collect();
            let answer_keys = store.serialize_subset(&stages)?;
            dispatches.push(Dispatch {
                rank,
                exams: slice.len(),
                command: self.messenger.prepare(
                    Channel::Command,
                    rank,
                    codec::encode_command(WorkerCommand::Review),
                )?,
                answer_keys: self.messenger.prepare(
                    Channel::AnswerKeys,
                    rank,
                    Bytes::from(answer_keys),
                )?,
                batch: self.messenger.prepare(
                    Channel::Exams,
                    rank,
                    codec::encode_exam_batch(slice),
                )?,
            });
        }

        for dispatch in &dispatches {
            debug!("Sending {} exams to rank {}", dispatch.exams, dispatch.rank);
            for (channel, payload) in dispatch.payloads() {
                self.messenger
                    .send_prepared(channel, dispatch.rank, payload.clone())
                    .await?;
            }
        }

        let slices: Vec<usize> = dispatches.iter().map(|d| d.exams).collect();
        self.review_logger.log(ReviewEvent::new(
            "review_dispatched",
            json!({
                "exams": exams.len(),
                "workers": workers,
                "slices": slices,
            }),
        ));
        Ok(())
    }

    /// Receive one result batch from every worker, in rank order.
    ///
    /// The concatenation follows rank order, which matches submission order
    /// only because slices are contiguous.
    pub async fn receive_results_from_all(&self) -> Result<Vec<ScoreResult>, DistributionError> {
        let mut results = Vec::new();
        for rank in self.pool_size().worker_ranks() {
            let batch = self.messenger.receive_results(rank).await?;
            debug!("Received {} results from rank {}", batch.len(), rank);
            results.extend(batch);
        }
        Ok(results)
    }

    /// Run one full review: fan out, then fan in.
    pub async fn review(
        &self,
        store: &AnswerStore,
        exams: &[StudentExam],
    ) -> Result<Vec<ScoreResult>, DistributionError> {
        info!(
            "Reviewing {} exams across {} workers",
            exams.len(),
            self.pool_size().workers()
        );

        let outcome = match self.send_to_workers(store, exams).await {
            Ok(()) => self.receive_results_from_all().await,
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(results) => self.review_logger.log(ReviewEvent::new(
                "review_completed",
                json!({ "exams": exams.len(), "results": results.len() }),
            )),
            Err(e) => self.review_logger.log(ReviewEvent::new(
                "review_failed",
                json!({ "exams": exams.len(), "error": e.to_string(), "fatal": e.is_fatal() }),
            )),
        }
        outcome
    }

    /// Send SHUTDOWN to every worker, in rank order.
    ///
    /// Only the first call broadcasts; later calls return `Ok(false)`.
    /// Workers do not acknowledge.
    pub async fn broadcast_shutdown(&self) -> Result<bool, DistributionError> {
        if self.shutdown_sent.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already broadcast");
            return Ok(false);
        }

        for rank in self.pool_size().worker_ranks() {
            self.messenger
                .send_command(WorkerCommand::Shutdown, rank)
                .await?;
        }
        info!("Shutdown sent to {} workers", self.pool_size().workers());

        self.review_logger.log(ReviewEvent::new(
            "shutdown",
            json!({ "workers": self.pool_size().workers() }),
        ));
        Ok(true)
    }

    pub fn is_shutdown_sent(&self) -> bool {
        self.shutdown_sent.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{RecordingLogger, ScriptedTransport};
    use bytes::Bytes;
    use scorehive_domain::distribution::codec;
    use scorehive_domain::{Answer, AnswerSet, ExamResponse};

    const ANSWERS: u8 = 100;
    const EXAMS: u8 = 101;
    const RESULTS: u8 = 102;
    const COMMAND: u8 = 103;

    fn store() -> AnswerStore {
        let mut store = AnswerStore::new();
        store.load(vec![
            AnswerSet::new(1, vec![Answer::new(1, 2)]),
            AnswerSet::new(2, vec![Answer::new(1, 3)]),
            AnswerSet::new(3, vec![Answer::new(1, 4)]),
        ]);
        store
    }

    fn exams(stages: &[i32]) -> Vec<StudentExam> {
        stages
            .iter()
            .enumerate()
            .map(|(i, &stage)| StudentExam::new(stage, 100 + i as i32, vec![ExamResponse::new(1, 2)]))
            .collect()
    }

    fn coordinator(transport: &Arc<ScriptedTransport>) -> WorkCoordinator {
        WorkCoordinator::new(transport.clone(), ChannelTags::default())
    }

    fn result(stage: i32, exam_id: i32) -> ScoreResult {
        ScoreResult {
            stage: StageId::new(stage),
            exam_id: exam_id.into(),
            correct: 1,
            wrong: 0,
            unscored: 0,
            score: 1.0,
        }
    }

    #[tokio::test]
    async fn test_send_to_workers_dispatch_order() {
        let transport = Arc::new(ScriptedTransport::coordinator(3));
        coordinator(&transport)
            .send_to_workers(&store(), &exams(&[1, 1, 2, 3, 3]))
            .await
            .unwrap();

        let order: Vec<(u32, u8)> = transport
            .sent()
            .iter()
            .map(|(peer, tag, _)| (peer.get(), *tag))
            .collect();
        assert_eq!(
            order,
            vec![
                (1, COMMAND),
                (1, ANSWERS),
                (1, EXAMS),
                (2, COMMAND),
                (2, ANSWERS),
                (2, EXAMS),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_to_workers_slices_exams() {
        let transport = Arc::new(ScriptedTransport::coordinator(3));
        let batch = exams(&[1, 1, 2, 3, 3]);
        coordinator(&transport)
            .send_to_workers(&store(), &batch)
            .await
            .unwrap();

        let sent = transport.sent_on(EXAMS);
        let first = codec::decode_exam_batch(&sent[0].1).unwrap();
        let second = codec::decode_exam_batch(&sent[1].1).unwrap();
        assert_eq!(first, batch[..3]);
        assert_eq!(second, batch[3..]);
    }

    #[tokio::test]
    async fn test_each_worker_gets_only_its_answer_keys() {
        let transport = Arc::new(ScriptedTransport::coordinator(3));
        coordinator(&transport)
            .send_to_workers(&store(), &exams(&[1, 1, 2, 3, 3]))
            .await
            .unwrap();

        let stages: Vec<Vec<i32>> = transport
            .sent_on(ANSWERS)
            .iter()
            .map(|(_, payload)| {
                let json = std::str::from_utf8(payload).unwrap();
                AnswerSet::parse_list(json)
                    .unwrap()
                    .iter()
                    .map(|set| set.stage.get())
                    .collect()
            })
            .collect();
        assert_eq!(stages, vec![vec![1, 2], vec![3]]);
    }

    #[tokio::test]
    async fn test_idle_workers_still_receive_empty_batches() {
        let transport = Arc::new(ScriptedTransport::coordinator(4));
        coordinator(&transport)
            .send_to_workers(&store(), &exams(&[1]))
            .await
            .unwrap();

        let batches = transport.sent_on(EXAMS);
        assert_eq!(batches.len(), 3);
        assert!(codec::decode_exam_batch(&batches[2].1).unwrap().is_empty());

        let keys = transport.sent_on(ANSWERS);
        assert_eq!(keys[1].1, Bytes::from_static(b"[]"));
        assert_eq!(keys[2].1, Bytes::from_static(b"[]"));
    }

    #[tokio::test]
    async fn test_no_workers_is_request_error() {
        let transport = Arc::new(ScriptedTransport::coordinator(1));
        let err = coordinator(&transport)
            .send_to_workers(&store(), &exams(&[1]))
            .await
            .unwrap_err();

        assert!(matches!(err, DistributionError::NoWorkers(_)));
        assert!(!err.is_fatal());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_results_are_concatenated_in_rank_order() {
        let transport = Arc::new(ScriptedTransport::coordinator(3));
        transport.push_inbound(
            Rank::new(2),
            RESULTS,
            codec::encode_result_batch(&[result(3, 103)]),
        );
        transport.push_inbound(
            Rank::new(1),
            RESULTS,
            codec::encode_result_batch(&[result(1, 100), result(2, 101)]),
        );

        let results = coordinator(&transport)
            .receive_results_from_all()
            .await
            .unwrap();
        let ids: Vec<i32> = results.iter().map(|r| r.exam_id.get()).collect();
        assert_eq!(ids, vec![100, 101, 103]);
    }

    #[tokio::test]
    async fn test_missing_worker_results_are_fatal() {
        let transport = Arc::new(ScriptedTransport::coordinator(3));
        transport.push_inbound(Rank::new(1), RESULTS, codec::encode_result_batch(&[]));

        let err = coordinator(&transport)
            .receive_results_from_all()
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_send_failure_is_fatal() {
        let transport = Arc::new(ScriptedTransport::coordinator(3).failing_sends_to(2));
        let err = coordinator(&transport)
            .send_to_workers(&store(), &exams(&[1, 2]))
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        // Rank 1 was fully served before rank 2 failed
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_broadcast_shutdown_only_once() {
        let transport = Arc::new(ScriptedTransport::coordinator(3));
        let coordinator = coordinator(&transport);

        assert!(coordinator.broadcast_shutdown().await.unwrap());
        assert!(!coordinator.broadcast_shutdown().await.unwrap());
        assert!(coordinator.is_shutdown_sent());

        let sent = transport.sent_on(COMMAND);
        assert_eq!(sent.len(), 2);
        for (_, payload) in &sent {
            assert_eq!(
                codec::decode_command(payload).unwrap(),
                WorkerCommand::Shutdown
            );
        }
    }

    #[tokio::test]
    async fn test_review_logs_outcome() {
        let transport = Arc::new(ScriptedTransport::coordinator(2));
        transport.push_inbound(
            Rank::new(1),
            RESULTS,
            codec::encode_result_batch(&[result(1, 100)]),
        );
        let logger = Arc::new(RecordingLogger::default());
        let coordinator = coordinator(&transport).with_review_logger(logger.clone());

        let results = coordinator.review(&store(), &exams(&[1])).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            logger.event_types(),
            vec!["review_dispatched", "review_completed"]
        );
        assert_eq!(logger.payload("review_dispatched").unwrap()["slices"], json!([1]));
    }

    #[tokio::test]
    async fn test_failed_review_is_logged() {
        let transport = Arc::new(ScriptedTransport::coordinator(1));
        let logger = Arc::new(RecordingLogger::default());
        let coordinator = coordinator(&transport).with_review_logger(logger.clone());

        assert!(coordinator.review(&store(), &exams(&[1])).await.is_err());
        let failed = logger.payload("review_failed").unwrap();
        assert_eq!(failed["fatal"], json!(false));
    }

    /// Store with `count` stages of two answers each
    fn wide_store(count: i32) -> AnswerStore {
        let mut store = AnswerStore::new();
        store.load(
            (1..=count)
                .map(|stage| AnswerSet::new(stage, vec![Answer::new(1, 1), Answer::new(2, 2)]))
                .collect::<Vec<_>>(),
        );
        store
    }

    #[tokio::test]
    async fn test_oversized_answer_keys_fail_before_any_send() {
        let transport = Arc::new(ScriptedTransport::coordinator(3).with_max_payload(4096));
        let stages: Vec<i32> = (1..=300).collect();

        let err = coordinator(&transport)
            .send_to_workers(&wide_store(300), &exams(&stages))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DistributionError::PayloadTooLarge {
                channel: Channel::AnswerKeys,
                max: 4096,
                ..
            }
        ));
        assert!(!err.is_fatal());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_second_slice_leaves_first_worker_untouched() {
        // Rank 1 gets 150 exams of stage 1, rank 2 gets 150 distinct stages
        let transport = Arc::new(ScriptedTransport::coordinator(3).with_max_payload(4096));
        let mut stages = vec![1; 150];
        stages.extend(2..=151);

        let err = coordinator(&transport)
            .send_to_workers(&wide_store(151), &exams(&stages))
            .await
            .unwrap_err();

        match err {
            DistributionError::PayloadTooLarge { peer, channel, .. } => {
                assert_eq!(peer, Rank::new(2));
                assert_eq!(channel, Channel::AnswerKeys);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_review_within_frame_limit_still_dispatches() {
        let transport = Arc::new(ScriptedTransport::coordinator(3).with_max_payload(4096));
        coordinator(&transport)
            .send_to_workers(&wide_store(300), &exams(&[1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(transport.sent().len(), 6);
    }
}
