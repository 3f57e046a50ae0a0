//! Encryption-at-rest compliance pipeline for newly uploaded S3 objects.
//!
//! An S3 notification is normalized and handed to a Step Functions workflow
//! ([`orchestrator`]); the workflow task ([`pipeline`]) checks object and
//! table encryption, records the upload in DynamoDB and publishes every
//! finding to SNS.

pub mod alerts;
pub mod checks;
pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod pipeline;
pub mod recorder;
pub mod types;

pub use error::{ConfigError, DispatchFailure, PipelineError, ServiceError, ValidationError};
pub use orchestrator::Orchestrator;
pub use pipeline::Pipeline;
pub use types::{AlertEntry, CorrelationId, ObjectIdentity, PipelineResult, RunOutcome, Severity};
