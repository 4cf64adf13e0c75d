//! Request dispatch
//!
//! Maps each parsed [`Request`] to the answer store or the worker pool and
//! builds the response text.

use super::protocol::{Request, Response};
use scorehive_application::{
    DistributionError, NoReviewLogger, ReviewEvent, ReviewLogger, WorkCoordinator,
};
use scorehive_domain::{AnswerSet, AnswerStore, ScoreResult, StudentExam};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Response text for an accepted SHUTDOWN
pub const SHUTDOWN_ACK: &str = "Server received shutdown signal";

/// Result of handling one request
#[derive(Debug)]
pub struct Outcome {
    pub response: Response,
    /// Set when the worker pool can no longer be used; the server answers
    /// the client and then stops.
    pub fatal: Option<DistributionError>,
}

impl Outcome {
    pub fn respond(response: Response) -> Self {
        Self {
            response,
            fatal: None,
        }
    }
}

/// Executes requests against the coordinator's state
pub struct RequestHandler {
    store: AnswerStore,
    coordinator: Arc<WorkCoordinator>,
    review_logger: Arc<dyn ReviewLogger>,
    stop: CancellationToken,
}

impl RequestHandler {
    pub fn new(coordinator: Arc<WorkCoordinator>, stop: CancellationToken) -> Self {
        Self {
            store: AnswerStore::new(),
            coordinator,
            review_logger: Arc::new(NoReviewLogger),
            stop,
        }
    }

    pub fn with_review_logger(mut self, logger: Arc<dyn ReviewLogger>) -> Self {
        self.review_logger = logger;
        self
    }

    pub fn store(&self) -> &AnswerStore {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<WorkCoordinator> {
        &self.coordinator
    }

    pub async fn handle(&mut self, request: Request) -> Outcome {
        info!("Handling {} request", request.command());
        match request {
            Request::GetAnswers => Outcome::respond(self.get_answers()),
            Request::SetAnswers(data) => Outcome::respond(self.set_answers(&data)),
            Request::Review(data) => self.review(&data).await,
            Request::Echo(data) => Outcome::respond(Response::ok(format!("Echo {data}"))),
            Request::Shutdown => {
                // Workers are told after the client has its answer
                self.stop.cancel();
                Outcome::respond(Response::ok(SHUTDOWN_ACK))
            }
        }
    }

    fn get_answers(&self) -> Response {
        match self.store.save_all() {
            Ok(json) => Response::ok(json),
            Err(e) => Response::error(format!("Get Answers Error: {e}")),
        }
    }

    fn set_answers(&mut self, data: &str) -> Response {
        let sets = match AnswerSet::parse_list(data) {
            Ok(sets) => sets,
            Err(e) => {
                warn!("Rejected answer keys: {}", e);
                return Response::error(format!("Set Answers Error: {e}"));
            }
        };

        let stages: Vec<i32> = sets.iter().map(|set| set.stage.get()).collect();
        let loaded = self.store.load(sets);
        info!("Loaded {} answer sets", loaded);
        self.review_logger.log(ReviewEvent::new(
            "answers_loaded",
            json!({ "sets": loaded, "stages": stages }),
        ));
        Response::ok("Set Answers OK")
    }

    async fn review(&mut self, data: &str) -> Outcome {
        let exams = match StudentExam::parse_batch(data) {
            Ok(exams) => exams,
            Err(e) => {
                warn!("Rejected review batch: {}", e);
                return Outcome::respond(Response::error(format!("Review Error: {e}")));
            }
        };

        let results = match self.coordinator.review(&self.store, &exams).await {
            Ok(results) => results,
            Err(e) => {
                let response = Response::error(format!("Review Error: {e}"));
                if e.is_fatal() {
                    error!("Worker pool failed during review: {}", e);
                    return Outcome {
                        response,
                        fatal: Some(e),
                    };
                }
                warn!("Review failed: {}", e);
                return Outcome::respond(response);
            }
        };

        match ScoreResult::to_json_array(&results) {
            Ok(json) => Outcome::respond(Response::ok(json)),
            Err(e) => Outcome::respond(Response::error(format!("Review Error: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::protocol::ResponseCode;
    use scorehive_application::ClusterTransport;
    use scorehive_domain::{ChannelTags, PoolSize};
    use scorehive_infrastructure::LocalCluster;

    /// Handler over a coordinator endpoint with no worker loops behind it
    fn idle_handler(workers: u32) -> (RequestHandler, Vec<scorehive_infrastructure::LocalEndpoint>) {
        let mut endpoints = LocalCluster::endpoints(PoolSize::with_workers(workers));
        let coordinator: Arc<dyn ClusterTransport> = Arc::new(endpoints.remove(0));
        let coordinator = Arc::new(WorkCoordinator::new(coordinator, ChannelTags::default()));
        (
            RequestHandler::new(coordinator, CancellationToken::new()),
            endpoints,
        )
    }

    #[tokio::test]
    async fn test_echo() {
        let (mut handler, _workers) = idle_handler(1);
        let outcome = handler.handle(Request::Echo("ping".to_string())).await;
        assert_eq!(outcome.response, Response::ok("Echo ping"));
    }

    #[tokio::test]
    async fn test_get_answers_on_empty_store() {
        let (mut handler, _workers) = idle_handler(1);
        let outcome = handler.handle(Request::GetAnswers).await;
        assert_eq!(outcome.response, Response::ok("[]"));
    }

    #[tokio::test]
    async fn test_set_then_get_answers() {
        let (mut handler, _workers) = idle_handler(1);
        let payload = r#"[{"stage":1,"answers":[{"qst_idx":1,"rans_idx":2}]}]"#;

        let outcome = handler.handle(Request::SetAnswers(payload.to_string())).await;
        assert_eq!(outcome.response, Response::ok("Set Answers OK"));
        assert_eq!(handler.store().len(), 1);

        let outcome = handler.handle(Request::GetAnswers).await;
        assert!(outcome.response.is_ok());
        let stored: serde_json::Value = serde_json::from_str(&outcome.response.data).unwrap();
        assert_eq!(stored, serde_json::from_str::<serde_json::Value>(payload).unwrap());
    }

    #[tokio::test]
    async fn test_malformed_answer_keys_leave_store_untouched() {
        let (mut handler, _workers) = idle_handler(1);
        let payload = r#"[{"stage":1,"answers":[]},{"stage":"two"}]"#;

        let outcome = handler.handle(Request::SetAnswers(payload.to_string())).await;
        assert_eq!(outcome.response.code, ResponseCode::Error);
        assert!(outcome.response.data.starts_with("Set Answers Error: "));
        assert!(outcome.fatal.is_none());
        assert!(handler.store().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_review_batch_is_not_fatal() {
        let (mut handler, _workers) = idle_handler(1);
        let outcome = handler.handle(Request::Review("not json".to_string())).await;
        assert_eq!(outcome.response.code, ResponseCode::Error);
        assert!(outcome.response.data.starts_with("Review Error: "));
        assert!(outcome.fatal.is_none());
    }

    #[tokio::test]
    async fn test_review_with_dead_workers_is_fatal() {
        let (mut handler, workers) = idle_handler(1);
        drop(workers);

        let exams = r#"[{"stage":1,"id_exam":7,"answers":[]}]"#;
        let outcome = handler.handle(Request::Review(exams.to_string())).await;
        assert_eq!(outcome.response.code, ResponseCode::Error);
        assert!(outcome.response.data.starts_with("Review Error: "));
        assert!(outcome.fatal.is_some_and(|e| e.is_fatal()));
    }

    #[tokio::test]
    async fn test_shutdown_sets_stop_flag() {
        let (handler, _workers) = idle_handler(1);
        let stop = CancellationToken::new();
        let mut handler = RequestHandler::new(handler.coordinator.clone(), stop.clone());

        let outcome = handler.handle(Request::Shutdown).await;
        assert_eq!(outcome.response, Response::ok(SHUTDOWN_ACK));
        assert!(stop.is_cancelled());
        // The broadcast itself is left to the server loop
        assert!(!handler.coordinator().is_shutdown_sent());
    }
}
