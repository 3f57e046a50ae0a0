use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::alerts::AlertDispatcher;
use crate::checks::ComplianceChecker;
use crate::clients::{MetadataStore, Notifier, ObjectStore};
use crate::config::ProcessorConfig;
use crate::error::PipelineError;
use crate::event::{normalize, Normalized, WorkflowInput};
use crate::recorder::{timestamp, MetadataRecorder};
use crate::types::{CorrelationId, NoOp, PipelineResult, RunOutcome, RunStatus, Stage};

/// The processing side of a run: checks, metadata write, alert dispatch.
///
/// Holds no per-run state; one instance serves any number of concurrent runs.
pub struct Pipeline {
    checker: ComplianceChecker,
    recorder: MetadataRecorder,
    dispatcher: AlertDispatcher,
}

impl Pipeline {
    pub fn new(
        config: &ProcessorConfig,
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            checker: ComplianceChecker::new(
                objects,
                metadata.clone(),
                config.table_name.clone(),
                config.call_timeout,
            ),
            recorder: MetadataRecorder::new(metadata, config.table_name.clone(), config.call_timeout),
            dispatcher: AlertDispatcher::new(notifier, config.topic_arn.clone(), config.call_timeout),
        }
    }

    /// Entry point for the workflow task: `{bucket, key, correlationId}`.
    pub async fn handle_task(&self, payload: &Value) -> Result<PipelineResult, PipelineError> {
        let input = WorkflowInput::from_value(payload)?;
        Ok(self.process(input).await)
    }

    /// Runs a raw S3 notification through the whole pipeline in-process, without a workflow engine.
    /// The correlation id resolves like [`crate::Orchestrator::handle_notification`].
    pub async fn handle_notification(
        &self,
        payload: &Value,
        correlation_id: Option<CorrelationId>,
    ) -> Result<RunOutcome, PipelineError> {
        debug!(stage = %Stage::Received);
        debug!(stage = %Stage::Normalizing);
        match normalize(payload)? {
            Normalized::NoRecords => {
                info!("notification has no records, nothing to do");
                Ok(RunOutcome::NoRecords(NoOp {}))
            }
            Normalized::Identity { identity, correlation_id: from_event, .. } => {
                let input = WorkflowInput {
                    identity,
                    correlation_id: correlation_id.or(from_event).unwrap_or_else(CorrelationId::generate),
                };
                Ok(RunOutcome::Completed(self.process(input).await))
            }
        }
    }

    pub async fn process(&self, input: WorkflowInput) -> PipelineResult {
        self.process_at(input, Utc::now()).await
    }

    /// Checks and recording run concurrently; dispatch starts only after all three finish.
    #[instrument(
        name = "run",
        skip_all,
        fields(
            correlation_id = %input.correlation_id,
            bucket = %input.identity.bucket(),
            key = %input.identity.key()
        )
    )]
    pub async fn process_at(&self, input: WorkflowInput, at: DateTime<Utc>) -> PipelineResult {
        let WorkflowInput { identity, correlation_id } = input;

        debug!(stage = %Stage::Checking);
        debug!(stage = %Stage::Recording);
        let (mut alerts, write_alert) = futures::future::join(
            self.checker.check(&identity),
            self.recorder.record(&identity, &correlation_id, at),
        )
        .await;
        alerts.extend(write_alert);

        debug!(stage = %Stage::Dispatching, alerts = alerts.len());
        let alert_sent = self.dispatcher.dispatch(&identity, &correlation_id, &alerts).await;

        debug!(stage = %Stage::Completed);
        info!(alert_sent, alerts = alerts.len(), "run completed");
        PipelineResult {
            status: RunStatus::Success,
            bucket: identity.bucket().to_string(),
            file: identity.key().to_string(),
            timestamp: timestamp(at),
            correlation_id: correlation_id.to_string(),
            alert_sent,
            alerts: alerts.into_iter().map(|a| a.message).collect(),
        }
    }
}
