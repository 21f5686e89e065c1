//! Push transport errors.

use thiserror::Error;

/// Why a notification could not be handed to a subscription.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NotificationError {
    /// The receiving side is gone.
    #[error("subscription closed")]
    Closed,

    /// The receiving side stopped draining its buffer.
    #[error("subscription buffer full")]
    Lagging,
}
