use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// The object a run is about: `s3://{bucket}/{key}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectIdentity {
    bucket: String,
    key: String,
}

impl ObjectIdentity {
    /// Builds an identity, rejecting empty fields and directory placeholder keys.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self, ValidationError> {
        let bucket = bucket.into();
        let key = key.into();
        if bucket.is_empty() {
            return Err(ValidationError::InvalidInput("bucket name is empty".into()));
        }
        if key.is_empty() || key.ends_with('/') {
            return Err(ValidationError::InvalidKey(key));
        }
        Ok(Self { bucket, key })
    }

    pub fn bucket(&self) -> &str { &self.bucket }
    pub fn key(&self) -> &str { &self.key }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Accepts a caller-supplied id; blank strings are treated as absent.
    pub fn from_supplied(s: Option<&str>) -> Option<Self> {
        s.map(str::trim).filter(|s| !s.is_empty()).map(|s| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A policy violation: something is not encrypted.
    Security,
    /// A detection or recording failure.
    Operational,
}

impl Severity {
    pub fn subject(self) -> &'static str {
        match self {
            Severity::Security => "Security Alert",
            Severity::Operational => "Operational Alert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEntry {
    pub severity: Severity,
    pub message: String,
}

impl AlertEntry {
    pub fn security(message: impl Into<String>) -> Self {
        Self { severity: Severity::Security, message: message.into() }
    }

    pub fn operational(message: impl Into<String>) -> Self {
        Self { severity: Severity::Operational, message: message.into() }
    }
}

/// Result of a single compliance check, before it becomes an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Compliant,
    Violation(String),
    DetectionFailure(String),
}

impl CheckOutcome {
    pub fn into_alert(self) -> Option<AlertEntry> {
        match self {
            CheckOutcome::Compliant => None,
            CheckOutcome::Violation(m) => Some(AlertEntry::security(m)),
            CheckOutcome::DetectionFailure(m) => Some(AlertEntry::operational(m)),
        }
    }
}

/// Row written to the metadata table, keyed by `filename`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub filename: String,
    pub bucket: String,
    pub upload_timestamp: String,
    pub correlation_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub status: RunStatus,
    pub bucket: String,
    pub file: String,
    pub timestamp: String,
    pub correlation_id: String,
    pub alert_sent: bool,
    pub alerts: Vec<String>,
}

/// What a run over a raw notification produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Completed(PipelineResult),
    NoRecords(NoOp),
}

/// `{"status": "noop"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename = "noop")]
pub struct NoOp {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedExecution {
    pub execution_arn: String,
    pub execution_name: String,
    #[serde(flatten)]
    pub identity: ObjectIdentity,
    pub correlation_id: CorrelationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StartOutcome {
    Started(StartedExecution),
    Noop,
}

/// Stages of one run, emitted as debug events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Normalizing,
    Orchestrating,
    Checking,
    Recording,
    Dispatching,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::Normalizing => "normalizing",
            Stage::Orchestrating => "orchestrating",
            Stage::Checking => "checking",
            Stage::Recording => "recording",
            Stage::Dispatching => "dispatching",
            Stage::Completed => "completed",
        };
        f.write_str(s)
    }
}
