use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::clients::{with_deadline, MetadataStore};
use crate::types::{AlertEntry, CorrelationId, MetadataRecord, ObjectIdentity};

/// Writes the per-object row to the metadata table.
pub struct MetadataRecorder {
    store: Arc<dyn MetadataStore>,
    table_name: String,
    call_timeout: Duration,
}

impl MetadataRecorder {
    pub fn new(store: Arc<dyn MetadataStore>, table_name: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            store,
            table_name: table_name.into(),
            call_timeout,
        }
    }

    /// Upserts the record; a failed write comes back as an operational alert.
    pub async fn record(
        &self,
        identity: &ObjectIdentity,
        correlation_id: &CorrelationId,
        at: DateTime<Utc>,
    ) -> Option<AlertEntry> {
        let record = MetadataRecord {
            filename: identity.key().to_string(),
            bucket: identity.bucket().to_string(),
            upload_timestamp: timestamp(at),
            correlation_id: correlation_id.to_string(),
        };
        let put = self.store.put_record(&self.table_name, &record);
        match with_deadline("PutItem", self.call_timeout, put).await {
            Ok(()) => {
                info!(table = %self.table_name, filename = %record.filename, "metadata recorded");
                None
            }
            Err(e) => {
                warn!(table = %self.table_name, error = %e, "metadata write failed");
                Some(AlertEntry::operational(format!("Failed to write to DynamoDB: {e}")))
            }
        }
    }
}

/// RFC 3339 UTC with microseconds, e.g. `2026-10-19T08:15:00.123456Z`.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
