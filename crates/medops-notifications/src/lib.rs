//! MedOps: live notification fanout.
//!
//! Admin dashboards subscribe per hospital and receive a typed notification
//! whenever a reservation of that hospital changes.

mod error;
mod hub;
mod subscriber;

pub use error::NotificationError;
pub use hub::{Notification, NotificationHub, NotificationType};
pub use subscriber::NotificationSubscriber;
