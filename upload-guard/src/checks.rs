use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clients::{with_deadline, MetadataStore, ObjectStore};
use crate::types::{AlertEntry, CheckOutcome, ObjectIdentity};

/// Status DynamoDB reports for a table with active server-side encryption.
const SSE_ENABLED: &str = "ENABLED";

/// Evaluates the encryption-at-rest policy for an object and the metadata table.
///
/// Never fails: every negative result or query failure becomes at most one
/// alert per check, and one check failing never prevents the other.
pub struct ComplianceChecker {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    table_name: String,
    call_timeout: Duration,
}

impl ComplianceChecker {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        table_name: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            objects,
            metadata,
            table_name: table_name.into(),
            call_timeout,
        }
    }

    /// Runs both checks concurrently and returns their alerts, object check first.
    pub async fn check(&self, identity: &ObjectIdentity) -> Vec<AlertEntry> {
        let (object, store) = futures::future::join(
            self.check_object(identity),
            self.check_store(),
        )
        .await;
        [object, store].into_iter().filter_map(CheckOutcome::into_alert).collect()
    }

    pub async fn check_object(&self, identity: &ObjectIdentity) -> CheckOutcome {
        let head = self.objects.head_object(identity.bucket(), identity.key());
        match with_deadline("HeadObject", self.call_timeout, head).await {
            Ok(Some(sse)) => {
                debug!(object = %identity, %sse, "object is encrypted");
                CheckOutcome::Compliant
            }
            Ok(None) => {
                warn!(object = %identity, "object has no server-side encryption");
                CheckOutcome::Violation(format!("Unencrypted S3 object detected: {}", identity.key()))
            }
            Err(e) => {
                warn!(object = %identity, error = %e, "object encryption check failed");
                CheckOutcome::DetectionFailure(format!("Could not check S3 encryption: {e}"))
            }
        }
    }

    pub async fn check_store(&self) -> CheckOutcome {
        let describe = self.metadata.encryption_status(&self.table_name);
        match with_deadline("DescribeTable", self.call_timeout, describe).await {
            Ok(Some(status)) if status == SSE_ENABLED => {
                debug!(table = %self.table_name, "table is encrypted");
                CheckOutcome::Compliant
            }
            Ok(status) => {
                warn!(table = %self.table_name, status = ?status, "table encryption is not enabled");
                CheckOutcome::Violation(format!("DynamoDB table '{}' is NOT encrypted.", self.table_name))
            }
            Err(e) => {
                warn!(table = %self.table_name, error = %e, "table encryption check failed");
                CheckOutcome::DetectionFailure(format!("Could not check DynamoDB encryption: {e}"))
            }
        }
    }
}
