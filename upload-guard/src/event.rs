//! Validation and extraction of trigger payloads.
//!
//! Two shapes arrive here: the raw S3 event notification that starts a run,
//! and the `{bucket, key, correlationId}` document the workflow hands to the
//! processing task.

use serde_json::Value;

use crate::error::ValidationError;
use crate::types::{CorrelationId, ObjectIdentity};

/// Outcome of normalizing an S3 event notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The notification carried no records; nothing to do.
    NoRecords,
    Identity {
        identity: ObjectIdentity,
        /// `serverSideEncryption` as reported on the event record, when present.
        sse_hint: Option<String>,
        /// Correlation id carried by the notification itself, or derived from
        /// the S3 request id and sequencer so redeliveries map to the same id.
        correlation_id: Option<CorrelationId>,
    },
}

/// Extracts the identity from the first record of an S3 event notification.
pub fn normalize(payload: &Value) -> Result<Normalized, ValidationError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ValidationError::InvalidInput("payload is not a JSON object".into()))?;
    let records = obj
        .get("Records")
        .or_else(|| obj.get("records"))
        .ok_or_else(|| ValidationError::InvalidInput("missing Records".into()))?
        .as_array()
        .ok_or_else(|| ValidationError::InvalidInput("Records is not an array".into()))?;

    let Some(record) = records.first() else {
        return Ok(Normalized::NoRecords);
    };

    let s3 = record
        .get("s3")
        .filter(|v| v.is_object())
        .ok_or_else(|| ValidationError::InvalidInput("missing Records[0].s3".into()))?;
    let bucket = non_empty_str(s3.pointer("/bucket/name"), "s3.bucket.name")?;
    let key = decode_key(non_empty_str(s3.pointer("/object/key"), "s3.object.key")?)?;
    let sse_hint = s3
        .pointer("/object/serverSideEncryption")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Normalized::Identity {
        identity: ObjectIdentity::new(bucket, key)?,
        sse_hint,
        correlation_id: context_correlation_id(obj, record),
    })
}

/// S3 delivers keys form-encoded: spaces as `+`, everything else percent-escaped.
fn decode_key(raw: &str) -> Result<String, ValidationError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|k| k.into_owned())
        .map_err(|e| ValidationError::InvalidInput(format!("s3.object.key is not valid UTF-8: {e}")))
}

fn context_correlation_id(payload: &serde_json::Map<String, Value>, record: &Value) -> Option<CorrelationId> {
    if let Some(id) = CorrelationId::from_supplied(payload.get("correlationId").and_then(Value::as_str)) {
        return Some(id);
    }
    let request_id = record.pointer("/responseElements/x-amz-request-id").and_then(Value::as_str)?;
    let sequencer = record.pointer("/s3/object/sequencer").and_then(Value::as_str)?;
    CorrelationId::from_supplied(Some(&format!("s3-{request_id}-{sequencer}")))
}

/// Input document of the processing task, as built by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowInput {
    pub identity: ObjectIdentity,
    pub correlation_id: CorrelationId,
}

impl WorkflowInput {
    /// Parses `{bucket, key, correlationId?}`; a missing correlation id is generated.
    pub fn from_value(payload: &Value) -> Result<Self, ValidationError> {
        if !payload.is_object() {
            return Err(ValidationError::InvalidInput("expected {bucket, key}".into()));
        }
        let bucket = payload
            .get("bucket")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::InvalidInput("expected {bucket, key}: missing bucket".into()))?;
        let key = payload
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::InvalidInput("expected {bucket, key}: missing key".into()))?;
        let correlation_id = CorrelationId::from_supplied(payload.get("correlationId").and_then(Value::as_str))
            .unwrap_or_else(CorrelationId::generate);

        Ok(Self {
            identity: ObjectIdentity::new(bucket, key)?,
            correlation_id,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "bucket": self.identity.bucket(),
            "key": self.identity.key(),
            "correlationId": self.correlation_id,
        })
    }
}

fn non_empty_str<'a>(v: Option<&'a Value>, field: &str) -> Result<&'a str, ValidationError> {
    v.and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ValidationError::InvalidInput(format!("missing or empty {field}")))
}
