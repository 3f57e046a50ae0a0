use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::ServiceError;
use crate::types::MetadataRecord;

pub mod aws;
pub mod memory;

/// Object storage (S3).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Server-side encryption algorithm of the object, if any.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<String>, ServiceError>;
}

/// Metadata table (DynamoDB). Rows are upserted by `filename`.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_record(&self, table: &str, record: &MetadataRecord) -> Result<(), ServiceError>;

    /// At-rest encryption status of the table, e.g. `ENABLED`. `None` when unreported.
    async fn encryption_status(&self, table: &str) -> Result<Option<String>, ServiceError>;
}

/// Notification fan-out (SNS).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> Result<(), ServiceError>;
}

/// Workflow engine (Step Functions). Returns the execution ARN.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn start_execution(
        &self,
        state_machine: &str,
        name: &str,
        input: &str,
    ) -> Result<String, ServiceError>;
}

/// Bounds an external call by `limit`; an elapsed deadline becomes [`ServiceError::Timeout`].
pub async fn with_deadline<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(res) => res,
        Err(_) => Err(ServiceError::Timeout { operation, after: limit }),
    }
}
