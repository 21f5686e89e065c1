//! In-process publication of committed facts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medops_core::error::DomainError;
use medops_core::event::DomainEvent;
use tracing::{debug, warn};

use crate::domain::events::RecordEvent;

/// Reacts to committed facts.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Handle one committed fact.
    ///
    /// # Errors
    ///
    /// Errors are logged by the bus and never reach the command caller.
    async fn on_event(&self, event: &RecordEvent) -> Result<(), DomainError>;
}

/// Delivery counts for one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscriber invocations that succeeded.
    pub delivered: usize,
    /// Subscriber invocations that failed or timed out.
    pub failed: usize,
}

/// Hands committed facts to subscribers in registration order.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Vec<Arc<dyn EventSubscriber>>,
    timeout: Duration,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field(
                "subscribers",
                &self.subscribers.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl EventBus {
    /// Creates a bus that gives each subscriber at most `timeout` per fact.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            subscribers: Vec::new(),
            timeout,
        }
    }

    /// Registers a subscriber after the existing ones.
    #[must_use]
    pub fn with_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns `true` when nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Delivers each fact, in order, to every subscriber, in order.
    ///
    /// Failures and timeouts are logged and counted, never returned.
    pub async fn publish(&self, events: &[RecordEvent]) -> PublishReport {
        let mut report = PublishReport::default();
        for event in events {
            for subscriber in &self.subscribers {
                let outcome = tokio::time::timeout(self.timeout, subscriber.on_event(event)).await;
                match outcome {
                    Ok(Ok(())) => {
                        report.delivered += 1;
                        debug!(
                            subscriber = subscriber.name(),
                            record_id = %event.metadata.record_id,
                            version = event.metadata.version,
                            "fact delivered"
                        );
                    }
                    Ok(Err(error)) => {
                        report.failed += 1;
                        warn!(
                            subscriber = subscriber.name(),
                            record_id = %event.metadata.record_id,
                            version = event.metadata.version,
                            event_type = event.event_type(),
                            %error,
                            "subscriber failed"
                        );
                    }
                    Err(_) => {
                        report.failed += 1;
                        warn!(
                            subscriber = subscriber.name(),
                            record_id = %event.metadata.record_id,
                            version = event.metadata.version,
                            event_type = event.event_type(),
                            timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                            "subscriber timed out"
                        );
                    }
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{NoteUpdated, RecordEventKind};
    use chrono::{TimeZone, Utc};
    use medops_core::event::EventMetadata;
    use medops_core::status::RecordStatus;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn note_event(version: i64) -> RecordEvent {
        RecordEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: "medical_record.note_updated".to_owned(),
                record_id: "record-1".to_owned(),
                hospital_id: "H1".to_owned(),
                user_id: "U1".to_owned(),
                version,
                status: RecordStatus::Pending,
                correlation_id: Uuid::new_v4(),
                occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            },
            kind: RecordEventKind::NoteUpdated(NoteUpdated {
                note: format!("note {version}"),
            }),
        }
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<(&'static str, i64)>>>,
    }

    #[async_trait]
    impl EventSubscriber for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn on_event(&self, event: &RecordEvent) -> Result<(), DomainError> {
            self.log.lock().unwrap().push((self.name, event.metadata.version));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventSubscriber for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn on_event(&self, _event: &RecordEvent) -> Result<(), DomainError> {
            Err(DomainError::Infrastructure("view store down".into()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl EventSubscriber for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn on_event(&self, _event: &RecordEvent) -> Result<(), DomainError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_visits_facts_then_subscribers_in_order() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = EventBus::new(Duration::from_secs(1))
            .with_subscriber(Arc::new(Recorder {
                name: "first",
                log: Arc::clone(&log),
            }))
            .with_subscriber(Arc::new(Recorder {
                name: "second",
                log: Arc::clone(&log),
            }));

        // Act
        let report = bus.publish(&[note_event(1), note_event(2)]).await;

        // Assert
        assert_eq!(report, PublishReport { delivered: 4, failed: 0 });
        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_stop_later_subscribers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = EventBus::new(Duration::from_secs(1))
            .with_subscriber(Arc::new(Failing))
            .with_subscriber(Arc::new(Recorder {
                name: "after",
                log: Arc::clone(&log),
            }));

        let report = bus.publish(&[note_event(1)]).await;

        assert_eq!(report, PublishReport { delivered: 1, failed: 1 });
        assert_eq!(*log.lock().unwrap(), vec![("after", 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_subscriber_is_cut_off_by_timeout() {
        let bus = EventBus::new(Duration::from_millis(50)).with_subscriber(Arc::new(Stalled));

        let report = bus.publish(&[note_event(1)]).await;

        assert_eq!(report, PublishReport { delivered: 0, failed: 1 });
    }
}
