use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::clients::{with_deadline, Notifier};
use crate::types::{AlertEntry, CorrelationId, ObjectIdentity};

/// Publishes the alerts collected during one run, one notification each.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    topic_arn: String,
    call_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, topic_arn: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            notifier,
            topic_arn: topic_arn.into(),
            call_timeout,
        }
    }

    /// Returns whether any publish was attempted. Failures are logged and skipped.
    pub async fn dispatch(
        &self,
        identity: &ObjectIdentity,
        correlation_id: &CorrelationId,
        alerts: &[AlertEntry],
    ) -> bool {
        for (i, alert) in alerts.iter().enumerate() {
            let body = json!({
                "correlationId": correlation_id,
                "severity": alert.severity,
                "bucket": identity.bucket(),
                "key": identity.key(),
                "message": alert.message,
            })
            .to_string();
            let publish = self.notifier.publish(&self.topic_arn, alert.severity.subject(), &body);
            match with_deadline("Publish", self.call_timeout, publish).await {
                Ok(()) => info!(index = i, severity = ?alert.severity, message = %alert.message, "alert sent"),
                Err(e) => warn!(index = i, error = %e, message = %alert.message, "alert publish failed"),
            }
        }
        !alerts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::MemoryNotifier;

    fn dispatcher(n: Arc<MemoryNotifier>) -> AlertDispatcher {
        AlertDispatcher::new(n, "arn:aws:sns:us-east-1:1:alerts", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn nothing_to_send_is_not_an_attempt() {
        let n = Arc::new(MemoryNotifier::new());
        let id = ObjectIdentity::new("uploads", "a.txt").unwrap();
        assert!(!dispatcher(n.clone()).dispatch(&id, &CorrelationId::generate(), &[]).await);
        assert_eq!(n.attempts(), 0);
    }

    #[tokio::test]
    async fn subjects_distinguish_severity() {
        let n = Arc::new(MemoryNotifier::new());
        let id = ObjectIdentity::new("uploads", "a.txt").unwrap();
        let cid = CorrelationId::from_supplied(Some("c-7")).unwrap();
        let alerts = [AlertEntry::security("s"), AlertEntry::operational("o")];

        assert!(dispatcher(n.clone()).dispatch(&id, &cid, &alerts).await);
        let sent = n.published();
        assert_eq!(sent[0].subject, "Security Alert");
        assert_eq!(sent[1].subject, "Operational Alert");
        assert_eq!(sent[0].topic, "arn:aws:sns:us-east-1:1:alerts");

        let body: serde_json::Value = serde_json::from_str(&sent[1].message).unwrap();
        assert_eq!(
            body,
            json!({"correlationId": "c-7", "severity": "operational", "bucket": "uploads", "key": "a.txt", "message": "o"})
        );
    }

    #[tokio::test]
    async fn a_failed_publish_does_not_stop_the_rest() {
        let n = Arc::new(MemoryNotifier::new().fail_attempt(0));
        let id = ObjectIdentity::new("uploads", "a.txt").unwrap();
        let alerts = [AlertEntry::security("first"), AlertEntry::operational("second")];

        assert!(dispatcher(n.clone()).dispatch(&id, &CorrelationId::generate(), &alerts).await);
        assert_eq!(n.attempts(), 2);
        assert_eq!(n.published().len(), 1);
        assert!(n.published()[0].message.contains("second"));
    }
}
