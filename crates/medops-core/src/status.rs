//! Reservation status shared by facts, aggregate state, and views.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle status of a medical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Requested, awaiting confirmation.
    #[default]
    Pending,
    /// Confirmed by the hospital.
    Reserved,
    /// Canceled. Terminal.
    Canceled,
    /// Treatment done. Terminal.
    Completed,
}

impl RecordStatus {
    /// Returns the stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Reserved => "RESERVED",
            Self::Canceled => "CANCELED",
            Self::Completed => "COMPLETED",
        }
    }

    /// Terminal statuses accept no further status transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled | Self::Completed)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RESERVED" => Ok(Self::Reserved),
            "CANCELED" => Ok(Self::Canceled),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(DomainError::Deserialization(format!(
                "unknown record status: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_form_parses_back() {
        for status in [
            RecordStatus::Pending,
            RecordStatus::Reserved,
            RecordStatus::Canceled,
            RecordStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<RecordStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_is_deserialization_error() {
        let err = "ARCHIVED".parse::<RecordStatus>().unwrap_err();
        assert!(matches!(err, DomainError::Deserialization(_)));
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_value(RecordStatus::Reserved).unwrap();
        assert_eq!(json, serde_json::json!("RESERVED"));
    }

    #[test]
    fn test_only_canceled_and_completed_are_terminal() {
        assert!(!RecordStatus::Pending.is_terminal());
        assert!(!RecordStatus::Reserved.is_terminal());
        assert!(RecordStatus::Canceled.is_terminal());
        assert!(RecordStatus::Completed.is_terminal());
    }
}
