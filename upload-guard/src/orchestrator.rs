use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::clients::{with_deadline, WorkflowEngine};
use crate::config::StarterConfig;
use crate::error::{DispatchFailure, PipelineError};
use crate::event::{normalize, Normalized, WorkflowInput};
use crate::types::{CorrelationId, ObjectIdentity, Stage, StartOutcome, StartedExecution};

/// Step Functions limit on execution names.
const MAX_EXECUTION_NAME: usize = 80;
const EXECUTION_PREFIX: &str = "upload-";
/// Digest-suffixed names use a different prefix so they never meet a plain one.
const HASHED_PREFIX: &str = "upload_";
const DIGEST_CHARS: usize = 16;

/// Starts one workflow execution per validated upload. Performs no checks itself.
pub struct Orchestrator {
    config: StarterConfig,
    engine: Arc<dyn WorkflowEngine>,
}

impl Orchestrator {
    pub fn new(config: StarterConfig, engine: Arc<dyn WorkflowEngine>) -> Self {
        Self { config, engine }
    }

    /// Normalizes a raw S3 notification and starts the workflow for it.
    ///
    /// An explicit `correlation_id` wins over one carried by the notification;
    /// without either a fresh one is generated.
    pub async fn handle_notification(
        &self,
        payload: &serde_json::Value,
        correlation_id: Option<CorrelationId>,
    ) -> Result<StartOutcome, PipelineError> {
        tracing::debug!(stage = %Stage::Received);
        tracing::debug!(stage = %Stage::Normalizing);
        match normalize(payload)? {
            Normalized::NoRecords => {
                info!("notification has no records, nothing to start");
                Ok(StartOutcome::Noop)
            }
            Normalized::Identity { identity, sse_hint, correlation_id: from_event } => {
                let correlation_id = correlation_id.or(from_event).unwrap_or_else(CorrelationId::generate);
                if sse_hint.is_none() {
                    info!(
                        object = %identity,
                        correlation_id = %correlation_id,
                        "event record reports no server-side encryption"
                    );
                }
                let started = self.start(identity, Some(correlation_id)).await?;
                Ok(StartOutcome::Started(started))
            }
        }
    }

    /// Starts the workflow for `identity`. No retry: redelivery of the trigger is the retry.
    #[instrument(skip_all, fields(bucket = %identity.bucket(), key = %identity.key(), correlation_id))]
    pub async fn start(
        &self,
        identity: ObjectIdentity,
        correlation_id: Option<CorrelationId>,
    ) -> Result<StartedExecution, DispatchFailure> {
        tracing::debug!(stage = %Stage::Orchestrating);
        let correlation_id = correlation_id.unwrap_or_else(CorrelationId::generate);
        tracing::Span::current().record("correlation_id", correlation_id.as_str());

        let execution_name = execution_name(&correlation_id);
        let input = WorkflowInput { identity, correlation_id };
        let body = input.to_value().to_string();

        let call = self
            .engine
            .start_execution(&self.config.state_machine_arn, &execution_name, &body);
        match with_deadline("StartExecution", self.config.call_timeout, call).await {
            Ok(execution_arn) => {
                info!(%execution_arn, %execution_name, "workflow execution started");
                Ok(StartedExecution {
                    execution_arn,
                    execution_name,
                    identity: input.identity,
                    correlation_id: input.correlation_id,
                })
            }
            Err(source) => {
                warn!(%execution_name, error = %source, "failed to start workflow execution");
                Err(DispatchFailure { execution_name, source })
            }
        }
    }
}

/// Deterministic execution name for a correlation id.
///
/// Ids that are already `[A-Za-z0-9_-]` and fit the length limit are used as is;
/// anything else becomes `upload_<sanitized prefix>-<digest of the full id>`.
pub fn execution_name(correlation_id: &CorrelationId) -> String {
    let id = correlation_id.as_str();
    let plain = format!("{EXECUTION_PREFIX}{id}");
    if plain.len() <= MAX_EXECUTION_NAME && id.chars().all(is_name_char) {
        return plain;
    }

    let digest = hex::encode(Sha256::digest(id.as_bytes()));
    let digest = &digest[..DIGEST_CHARS];
    let room = MAX_EXECUTION_NAME - HASHED_PREFIX.len() - 1 - DIGEST_CHARS;
    let prefix: String = id
        .chars()
        .take(room)
        .map(|c| if is_name_char(c) { c } else { '-' })
        .collect();
    format!("{HASHED_PREFIX}{prefix}-{digest}")
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::{Fault, MemoryWorkflowEngine};
    use crate::error::ServiceError;
    use serde_json::json;
    use std::time::Duration;

    const SM: &str = "arn:aws:states:us-east-1:111111111111:stateMachine:upload-guard";

    fn orchestrator(engine: Arc<MemoryWorkflowEngine>) -> Orchestrator {
        let config = StarterConfig {
            state_machine_arn: SM.into(),
            call_timeout: Duration::from_millis(200),
        };
        Orchestrator::new(config, engine)
    }

    fn cid(s: &str) -> CorrelationId {
        CorrelationId::from_supplied(Some(s)).unwrap()
    }

    #[test]
    fn execution_names_are_bounded_and_unique() {
        assert_eq!(execution_name(&cid("abc-123")), "upload-abc-123");

        let spaced = execution_name(&cid("job 1"));
        let slashed = execution_name(&cid("job/1"));
        assert_ne!(spaced, slashed);
        assert!(spaced.starts_with("upload_job-1-"));
        assert_eq!(spaced.len(), "upload_job-1-".len() + DIGEST_CHARS);
        assert_ne!(execution_name(&cid("job-1")), spaced);

        let long_a = "x".repeat(80) + "a";
        let long_b = "x".repeat(80) + "b";
        let (a, b) = (execution_name(&cid(&long_a)), execution_name(&cid(&long_b)));
        assert_ne!(a, b);
        assert_eq!(a.len(), MAX_EXECUTION_NAME);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

        // stable across calls
        assert_eq!(execution_name(&cid("job 1")), spaced);
    }

    #[tokio::test]
    async fn similar_correlation_ids_start_separate_executions() {
        let engine = Arc::new(MemoryWorkflowEngine::new());
        let orch = orchestrator(engine.clone());
        let id = ObjectIdentity::new("uploads", "report.pdf").unwrap();

        orch.start(id.clone(), Some(cid("job 1"))).await.unwrap();
        orch.start(id, Some(cid("job/1"))).await.unwrap();
        assert_eq!(engine.execution_count(), 2);
    }

    #[tokio::test]
    async fn redelivered_notification_starts_one_execution() {
        let engine = Arc::new(MemoryWorkflowEngine::new());
        let orch = orchestrator(engine.clone());
        let ev = json!({
            "Records": [{
                "responseElements": {"x-amz-request-id": "C3D13FE58DE4C810"},
                "s3": {
                    "bucket": {"name": "uploads"},
                    "object": {"key": "report.pdf", "sequencer": "0055AED6DCD90281E5"}
                }
            }]
        });

        let first = orch.handle_notification(&ev, None).await.unwrap();
        let second = orch.handle_notification(&ev, None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.execution_count(), 1);

        let mut tagged = ev.clone();
        tagged["correlationId"] = json!("ctx-1");
        let StartOutcome::Started(s) = orch.handle_notification(&tagged, None).await.unwrap() else {
            panic!("expected a started execution");
        };
        assert_eq!(s.correlation_id.as_str(), "ctx-1");
        assert_eq!(s.execution_name, "upload-ctx-1");
        orch.handle_notification(&tagged, None).await.unwrap();
        assert_eq!(engine.execution_count(), 2);

        // an explicit id overrides the notification's
        let StartOutcome::Started(s) = orch.handle_notification(&tagged, Some(cid("cli-7"))).await.unwrap() else {
            panic!("expected a started execution");
        };
        assert_eq!(s.correlation_id.as_str(), "cli-7");
    }

    #[tokio::test]
    async fn starts_with_identity_and_correlation_id() {
        let engine = Arc::new(MemoryWorkflowEngine::new());
        let orch = orchestrator(engine.clone());
        let id = ObjectIdentity::new("uploads", "report.pdf").unwrap();

        let started = orch.start(id.clone(), Some(cid("c-1"))).await.unwrap();
        assert_eq!(started.execution_name, "upload-c-1");
        assert_eq!(started.identity, id);
        assert!(started.execution_arn.ends_with(":execution:upload-guard:upload-c-1"));

        let input: serde_json::Value = serde_json::from_str(&engine.input_of("upload-c-1").unwrap()).unwrap();
        assert_eq!(input, json!({"bucket": "uploads", "key": "report.pdf", "correlationId": "c-1"}));
    }

    #[tokio::test]
    async fn duplicate_triggers_reuse_the_execution() {
        let engine = Arc::new(MemoryWorkflowEngine::new());
        let orch = orchestrator(engine.clone());
        let id = ObjectIdentity::new("uploads", "report.pdf").unwrap();

        let first = orch.start(id.clone(), Some(cid("same"))).await.unwrap();
        let second = orch.start(id, Some(cid("same"))).await.unwrap();
        assert_eq!(first.execution_arn, second.execution_arn);
        assert_eq!(engine.execution_count(), 1);
    }

    #[tokio::test]
    async fn generates_a_correlation_id_when_absent() {
        let engine = Arc::new(MemoryWorkflowEngine::new());
        let orch = orchestrator(engine.clone());
        let id = ObjectIdentity::new("uploads", "report.pdf").unwrap();

        let a = orch.start(id.clone(), None).await.unwrap();
        let b = orch.start(id, None).await.unwrap();
        assert_ne!(a.correlation_id, b.correlation_id);
        assert_eq!(engine.execution_count(), 2);
    }

    #[tokio::test]
    async fn engine_failures_become_dispatch_failures() {
        let engine = Arc::new(MemoryWorkflowEngine::new());
        engine.set_fault(Fault::Fail(ServiceError::call("StartExecution", "AccessDenied")));
        let orch = orchestrator(engine);

        let err = orch
            .start(ObjectIdentity::new("uploads", "a.txt").unwrap(), Some(cid("c-9")))
            .await
            .unwrap_err();
        assert_eq!(err.execution_name, "upload-c-9");
        assert_eq!(err.source, ServiceError::call("StartExecution", "AccessDenied"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_engine_times_out() {
        let engine = Arc::new(MemoryWorkflowEngine::new());
        engine.set_fault(Fault::Hang);
        let orch = orchestrator(engine);

        let err = orch
            .start(ObjectIdentity::new("uploads", "a.txt").unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err.source, ServiceError::Timeout { operation: "StartExecution", .. }));
    }

    #[tokio::test]
    async fn notifications_are_validated_before_any_call() {
        let engine = Arc::new(MemoryWorkflowEngine::new());
        let orch = orchestrator(engine.clone());

        let noop = orch.handle_notification(&json!({"Records": []}), None).await.unwrap();
        assert_eq!(noop, StartOutcome::Noop);

        let bad = json!({"Records": [{"s3": {"bucket": {"name": "uploads"}, "object": {"key": "folder/"}}}]});
        let err = orch.handle_notification(&bad, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let missing = json!({"Records": [{"s3": {"object": {"key": "a.txt"}}}]});
        assert!(orch.handle_notification(&missing, None).await.is_err());
        assert_eq!(engine.calls(), 0);

        let ok = json!({"Records": [{"s3": {"bucket": {"name": "uploads"}, "object": {"key": "a.txt"}}}]});
        let started = orch.handle_notification(&ok, Some(cid("c-2"))).await.unwrap();
        assert!(matches!(started, StartOutcome::Started(s) if s.execution_name == "upload-c-2"));
        assert_eq!(engine.calls(), 1);
    }
}
