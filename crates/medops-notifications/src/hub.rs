//! Per-hospital subscription registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::NotificationError;

/// Event name carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Sent once to every new subscription.
    Connected,
    /// A reservation was booked.
    NewReservation,
    /// A reservation's status or note changed.
    ReservationUpdate,
    /// A doctor was assigned.
    DoctorAssign,
}

impl NotificationType {
    /// The wire name, used as the SSE event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::NewReservation => "NEW_RESERVATION",
            Self::ReservationUpdate => "RESERVATION_UPDATE",
            Self::DoctorAssign => "DOCTOR_ASSIGN",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pushed message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Event name.
    pub event: NotificationType,
    /// Event body, usually the full view row.
    pub data: serde_json::Value,
}

impl Notification {
    /// The greeting every new subscription receives.
    #[must_use]
    pub fn connected(hospital_id: &str) -> Self {
        Self {
            event: NotificationType::Connected,
            data: serde_json::json!({
                "hospital_id": hospital_id,
                "message": "subscription established",
            }),
        }
    }
}

struct Subscription {
    id: Uuid,
    sender: mpsc::Sender<Notification>,
}

impl Subscription {
    fn try_push(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sender.try_send(notification).map_err(|e| match e {
            TrySendError::Full(_) => NotificationError::Lagging,
            TrySendError::Closed(_) => NotificationError::Closed,
        })
    }
}

/// Live subscriptions keyed by hospital.
///
/// Each subscription is a bounded channel; pushes never wait. A subscription
/// whose channel is closed or full is dropped, and a hospital with no
/// subscriptions left is removed from the map.
pub struct NotificationHub {
    subscriptions: Mutex<HashMap<String, Vec<Subscription>>>,
    buffer: usize,
}

impl fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationHub")
            .field("buffer", &self.buffer)
            .field("connections", &self.connection_status())
            .finish()
    }
}

impl NotificationHub {
    /// Creates a hub whose subscriptions buffer up to `buffer` notifications.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Subscription>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a subscription for `hospital_id`. The returned receiver already
    /// holds a [`NotificationType::Connected`] message. Dropping it ends the
    /// subscription.
    pub fn subscribe(&self, hospital_id: &str) -> mpsc::Receiver<Notification> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let subscription = Subscription {
            id: Uuid::new_v4(),
            sender,
        };
        // Fresh channel with capacity >= 1: the greeting always fits.
        let _ = subscription.try_push(Notification::connected(hospital_id));

        let mut subscriptions = self.lock();
        let entry = subscriptions.entry(hospital_id.to_owned()).or_default();
        info!(
            hospital_id,
            subscription_id = %subscription.id,
            connections = entry.len() + 1,
            "subscription opened"
        );
        entry.push(subscription);
        receiver
    }

    /// Pushes `notification` to every subscription of `hospital_id` and
    /// returns how many accepted it.
    pub fn push(&self, hospital_id: &str, notification: &Notification) -> usize {
        let mut subscriptions = self.lock();
        let Some(entry) = subscriptions.get_mut(hospital_id) else {
            return 0;
        };

        let before = entry.len();
        entry.retain(|subscription| match subscription.try_push(notification.clone()) {
            Ok(()) => true,
            Err(error) => {
                debug!(
                    hospital_id,
                    subscription_id = %subscription.id,
                    %error,
                    "dropping subscription"
                );
                false
            }
        });
        let delivered = entry.len();
        if delivered < before {
            info!(
                hospital_id,
                event = %notification.event,
                dropped = before - delivered,
                remaining = delivered,
                "subscriptions removed after failed push"
            );
        }
        if entry.is_empty() {
            subscriptions.remove(hospital_id);
        }
        delivered
    }

    /// Removes subscriptions whose receiver is gone, and hospitals left
    /// without any.
    pub fn prune(&self) -> usize {
        let mut subscriptions = self.lock();
        let mut removed = 0;
        subscriptions.retain(|_, entry| {
            let before = entry.len();
            entry.retain(|s| !s.sender.is_closed());
            removed += before - entry.len();
            !entry.is_empty()
        });
        if removed > 0 {
            debug!(removed, "closed subscriptions pruned");
        }
        removed
    }

    /// Live subscription count per hospital. Closed subscriptions are pruned
    /// first.
    #[must_use]
    pub fn connection_status(&self) -> BTreeMap<String, usize> {
        self.prune();
        self.lock()
            .iter()
            .map(|(hospital_id, entry)| (hospital_id.clone(), entry.len()))
            .collect()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(64)
    }
}
