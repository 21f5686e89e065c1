//! Bridges committed facts to the notification hub.

use std::sync::Arc;

use async_trait::async_trait;
use medops_core::error::DomainError;
use medops_core::view::ViewRepository;
use medops_records::application::event_bus::EventSubscriber;
use medops_records::domain::events::{RecordEvent, RecordEventKind};
use tracing::{debug, warn};

use crate::hub::{Notification, NotificationHub, NotificationType};

/// Pushes the updated view row to the record's hospital after every fact.
///
/// Registered after the view projector so the row it reads already reflects
/// the fact. A row whose version differs from the fact's is not pushed, so a
/// late fact never resends an older or newer state under its own type.
pub struct NotificationSubscriber {
    hub: Arc<NotificationHub>,
    views: Arc<dyn ViewRepository>,
}

impl std::fmt::Debug for NotificationSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSubscriber")
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

impl NotificationSubscriber {
    /// Creates the subscriber.
    #[must_use]
    pub fn new(hub: Arc<NotificationHub>, views: Arc<dyn ViewRepository>) -> Self {
        Self { hub, views }
    }
}

fn notification_type(kind: &RecordEventKind) -> NotificationType {
    match kind {
        RecordEventKind::ReservationCreated(_) => NotificationType::NewReservation,
        RecordEventKind::DoctorAssigned(_) => NotificationType::DoctorAssign,
        RecordEventKind::Confirmed(_)
        | RecordEventKind::Pending(_)
        | RecordEventKind::Canceled(_)
        | RecordEventKind::Completed(_)
        | RecordEventKind::NoteUpdated(_) => NotificationType::ReservationUpdate,
    }
}

#[async_trait]
impl EventSubscriber for NotificationSubscriber {
    fn name(&self) -> &'static str {
        "notification_fanout"
    }

    async fn on_event(&self, event: &RecordEvent) -> Result<(), DomainError> {
        let record_id = &event.metadata.record_id;
        let Some(view) = self.views.find_by_id(record_id).await? else {
            warn!(
                record_id = %record_id,
                version = event.metadata.version,
                "no view row to notify about"
            );
            return Ok(());
        };
        if view.version != event.metadata.version {
            // A newer fact already owns the row, or the projector fell behind.
            debug!(
                record_id = %record_id,
                version = event.metadata.version,
                view_version = view.version,
                "view row not at fact version, nothing pushed"
            );
            return Ok(());
        }

        let data = serde_json::to_value(&view).map_err(|e| {
            DomainError::Infrastructure(format!("notification serialization failed: {e}"))
        })?;
        let notification = Notification {
            event: notification_type(&event.kind),
            data,
        };
        let delivered = self.hub.push(&view.hospital_id, &notification);
        debug!(
            record_id = %record_id,
            hospital_id = %view.hospital_id,
            event = %notification.event,
            delivered,
            "notification pushed"
        );
        Ok(())
    }
}
