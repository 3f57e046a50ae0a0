//! In-memory collaborators used by `--mock` runs and by tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{MetadataStore, Notifier, ObjectStore, WorkflowEngine};
use crate::error::ServiceError;
use crate::types::MetadataRecord;

/// Injected misbehaviour for one operation.
#[derive(Debug, Clone)]
pub enum Fault {
    Fail(ServiceError),
    /// Never answers; only a deadline gets the caller out.
    Hang,
}

async fn inject(fault: &Mutex<Option<Fault>>) -> Result<(), ServiceError> {
    let fault = fault.lock().clone();
    match fault {
        None => Ok(()),
        Some(Fault::Fail(e)) => Err(e),
        Some(Fault::Hang) => std::future::pending().await,
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Option<String>>>,
    fallback: Mutex<Option<Option<String>>>,
    fault: Mutex<Option<Fault>>,
    calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_object(self, bucket: &str, key: &str, sse: Option<&str>) -> Self {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), sse.map(str::to_string));
        self
    }

    /// Objects not added explicitly are reported as existing with `sse`.
    pub fn assume_existing(self, sse: Option<&str>) -> Self {
        *self.fallback.lock() = Some(sse.map(str::to_string));
        self
    }

    pub fn set_fault(&self, fault: Fault) {
        *self.fault.lock() = Some(fault);
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<String>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        inject(&self.fault).await?;
        let found = self.objects.lock().get(&(bucket.to_string(), key.to_string())).cloned();
        match found.or_else(|| self.fallback.lock().clone()) {
            Some(sse) => Ok(sse),
            None => Err(ServiceError::call("HeadObject", format!("NotFound: s3://{bucket}/{key}"))),
        }
    }
}

#[derive(Default)]
pub struct MemoryMetadataStore {
    rows: Mutex<HashMap<String, MetadataRecord>>,
    sse_status: Mutex<Option<String>>,
    put_fault: Mutex<Option<Fault>>,
    describe_fault: Mutex<Option<Fault>>,
    puts: AtomicUsize,
    describes: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self { Self::default() }

    /// A table reporting `ENABLED` server-side encryption.
    pub fn encrypted() -> Self {
        Self::new().with_sse_status(Some("ENABLED"))
    }

    pub fn with_sse_status(self, status: Option<&str>) -> Self {
        *self.sse_status.lock() = status.map(str::to_string);
        self
    }

    pub fn set_put_fault(&self, fault: Fault) {
        *self.put_fault.lock() = Some(fault);
    }

    pub fn set_describe_fault(&self, fault: Fault) {
        *self.describe_fault.lock() = Some(fault);
    }

    pub fn record(&self, filename: &str) -> Option<MetadataRecord> {
        self.rows.lock().get(filename).cloned()
    }

    pub fn row_count(&self) -> usize { self.rows.lock().len() }

    pub fn puts(&self) -> usize { self.puts.load(Ordering::SeqCst) }

    pub fn describes(&self) -> usize { self.describes.load(Ordering::SeqCst) }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn put_record(&self, _table: &str, record: &MetadataRecord) -> Result<(), ServiceError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        inject(&self.put_fault).await?;
        self.rows.lock().insert(record.filename.clone(), record.clone());
        Ok(())
    }

    async fn encryption_status(&self, _table: &str) -> Result<Option<String>, ServiceError> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        inject(&self.describe_fault).await?;
        Ok(self.sse_status.lock().clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub subject: String,
    pub message: String,
}

#[derive(Default)]
pub struct MemoryNotifier {
    published: Mutex<Vec<Published>>,
    failing_attempts: Mutex<HashSet<usize>>,
    attempts: AtomicUsize,
}

impl MemoryNotifier {
    pub fn new() -> Self { Self::default() }

    /// Makes the `n`th publish attempt (0-based) fail.
    pub fn fail_attempt(self, n: usize) -> Self {
        self.failing_attempts.lock().insert(n);
        self
    }

    pub fn published(&self) -> Vec<Published> { self.published.lock().clone() }

    pub fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> Result<(), ServiceError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_attempts.lock().contains(&n) {
            return Err(ServiceError::call("Publish", "Throttling: Rate exceeded"));
        }
        self.published.lock().push(Published {
            topic: topic.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

/// Mirrors Step Functions name idempotency: restarting a name with the same input
/// returns the original ARN, with different input it is rejected.
#[derive(Default)]
pub struct MemoryWorkflowEngine {
    executions: Mutex<HashMap<String, (String, String)>>,
    fault: Mutex<Option<Fault>>,
    calls: AtomicUsize,
}

impl MemoryWorkflowEngine {
    pub fn new() -> Self { Self::default() }

    pub fn set_fault(&self, fault: Fault) {
        *self.fault.lock() = Some(fault);
    }

    pub fn execution_count(&self) -> usize { self.executions.lock().len() }

    pub fn input_of(&self, name: &str) -> Option<String> {
        self.executions.lock().get(name).map(|(_, input)| input.clone())
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl WorkflowEngine for MemoryWorkflowEngine {
    async fn start_execution(
        &self,
        state_machine: &str,
        name: &str,
        input: &str,
    ) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        inject(&self.fault).await?;
        let mut executions = self.executions.lock();
        if let Some((arn, existing)) = executions.get(name) {
            if existing == input {
                return Ok(arn.clone());
            }
            return Err(ServiceError::call(
                "StartExecution",
                format!("ExecutionAlreadyExists: {name}"),
            ));
        }
        let arn = format!("{}:{}", state_machine.replacen(":stateMachine:", ":execution:", 1), name);
        executions.insert(name.to_string(), (arn.clone(), input.to_string()));
        Ok(arn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_objects_are_not_found_unless_assumed() {
        let store = MemoryObjectStore::new().with_object("b", "k", Some("aws:kms"));
        assert_eq!(store.head_object("b", "k").await.unwrap().as_deref(), Some("aws:kms"));
        assert!(store.head_object("b", "missing").await.is_err());

        let store = MemoryObjectStore::new().assume_existing(Some("AES256"));
        assert_eq!(store.head_object("b", "any").await.unwrap().as_deref(), Some("AES256"));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn workflow_names_are_idempotent() {
        let engine = MemoryWorkflowEngine::new();
        let sm = "arn:aws:states:us-east-1:1:stateMachine:guard";
        let a = engine.start_execution(sm, "upload-1", "{}").await.unwrap();
        assert_eq!(a, "arn:aws:states:us-east-1:1:execution:guard:upload-1");
        assert_eq!(engine.start_execution(sm, "upload-1", "{}").await.unwrap(), a);
        assert!(engine.start_execution(sm, "upload-1", "{\"x\":1}").await.is_err());
        assert_eq!(engine.execution_count(), 1);
        assert_eq!(engine.calls(), 3);
    }

    #[tokio::test]
    async fn notifier_fails_only_selected_attempts() {
        let n = MemoryNotifier::new().fail_attempt(0);
        assert!(n.publish("t", "s", "first").await.is_err());
        assert!(n.publish("t", "s", "second").await.is_ok());
        assert_eq!(n.attempts(), 2);
        assert_eq!(n.published().len(), 1);
        assert_eq!(n.published()[0].message, "second");
    }
}
