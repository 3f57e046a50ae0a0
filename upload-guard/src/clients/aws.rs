use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb as ddb;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_sfn as sfn;
use aws_sdk_sns as sns;
use aws_types::region::Region;

use super::{MetadataStore, Notifier, ObjectStore, WorkflowEngine};
use crate::error::ServiceError;
use crate::types::MetadataRecord;

/// Shared SDK config from the default credential chain; `region` overrides the chain's region.
pub async fn load_config(region: Option<String>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(r) = region {
        loader = loader.region(Region::new(r));
    }
    loader.load().await
}

fn sdk_failure<E: std::error::Error>(operation: &'static str, err: E) -> ServiceError {
    ServiceError::call(operation, DisplayErrorContext(&err).to_string())
}

pub struct S3ObjectStore {
    client: s3::Client,
}

impl S3ObjectStore {
    pub fn new(cfg: &aws_config::SdkConfig) -> Self {
        Self { client: s3::Client::new(cfg) }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<String>, ServiceError> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_failure("HeadObject", e))?;
        Ok(head.server_side_encryption().map(|sse| sse.as_str().to_string()))
    }
}

pub struct DynamoMetadataStore {
    client: ddb::Client,
}

impl DynamoMetadataStore {
    pub fn new(cfg: &aws_config::SdkConfig) -> Self {
        Self { client: ddb::Client::new(cfg) }
    }
}

#[async_trait]
impl MetadataStore for DynamoMetadataStore {
    async fn put_record(&self, table: &str, record: &MetadataRecord) -> Result<(), ServiceError> {
        // PutItem replaces any row with the same Filename
        self.client
            .put_item()
            .table_name(table)
            .item("Filename", AttributeValue::S(record.filename.clone()))
            .item("UploadTimestamp", AttributeValue::S(record.upload_timestamp.clone()))
            .item("Bucket", AttributeValue::S(record.bucket.clone()))
            .item("CorrelationId", AttributeValue::S(record.correlation_id.clone()))
            .send()
            .await
            .map_err(|e| sdk_failure("PutItem", e))?;
        Ok(())
    }

    async fn encryption_status(&self, table: &str) -> Result<Option<String>, ServiceError> {
        let desc = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| sdk_failure("DescribeTable", e))?;
        Ok(desc
            .table()
            .and_then(|t| t.sse_description())
            .and_then(|sse| sse.status())
            .map(|s| s.as_str().to_string()))
    }
}

pub struct SnsNotifier {
    client: sns::Client,
}

impl SnsNotifier {
    pub fn new(cfg: &aws_config::SdkConfig) -> Self {
        Self { client: sns::Client::new(cfg) }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> Result<(), ServiceError> {
        self.client
            .publish()
            .topic_arn(topic)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| sdk_failure("Publish", e))?;
        Ok(())
    }
}

pub struct StepFunctionsEngine {
    client: sfn::Client,
}

impl StepFunctionsEngine {
    pub fn new(cfg: &aws_config::SdkConfig) -> Self {
        Self { client: sfn::Client::new(cfg) }
    }
}

#[async_trait]
impl WorkflowEngine for StepFunctionsEngine {
    async fn start_execution(
        &self,
        state_machine: &str,
        name: &str,
        input: &str,
    ) -> Result<String, ServiceError> {
        let out = self
            .client
            .start_execution()
            .state_machine_arn(state_machine)
            .name(name)
            .input(input)
            .send()
            .await
            .map_err(|e| sdk_failure("StartExecution", e))?;
        Ok(out.execution_arn().to_string())
    }
}
