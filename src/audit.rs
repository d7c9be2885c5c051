//! Append-only audit records for Brew POS.
//!
//! Every successful mutation of cash or order state appends exactly one
//! `AuditLogEntry` to the owning aggregate. Entries are never mutated or
//! removed, and the log is only reachable through aggregate methods — the
//! calling layer gets a read-only view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DomainError;

/// Action tags for audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ShiftOpened,
    ClosureInitiated,
    ClosureCancelled,
    ActualCashRecorded,
    VarianceDocumented,
    ResponsibilityConfirmed,
    ShiftClosed,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ShiftOpened => "SHIFT_OPENED",
            Self::ClosureInitiated => "CLOSURE_INITIATED",
            Self::ClosureCancelled => "CLOSURE_CANCELLED",
            Self::ActualCashRecorded => "ACTUAL_CASH_RECORDED",
            Self::VarianceDocumented => "VARIANCE_DOCUMENTED",
            Self::ResponsibilityConfirmed => "RESPONSIBILITY_CONFIRMED",
            Self::ShiftClosed => "SHIFT_CLOSED",
        })
    }
}

/// One immutable audit record: what happened, when, by whom, on which device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub action: AuditAction,
    pub user_id: String,
    pub device_id: String,
    pub at: DateTime<Utc>,
    /// Optional structured payload (amounts, variance, notes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AuditLogEntry {
    /// Build an entry, rejecting empty actor fields and zero timestamps
    /// before anything is appended.
    pub fn new(
        action: AuditAction,
        user_id: &str,
        device_id: &str,
        at: DateTime<Utc>,
        data: Option<Value>,
    ) -> Result<Self, DomainError> {
        if user_id.trim().is_empty() {
            return Err(DomainError::validation("audit entry requires a user id"));
        }
        if device_id.trim().is_empty() {
            return Err(DomainError::validation("audit entry requires a device id"));
        }
        if at.timestamp_millis() <= 0 {
            return Err(DomainError::validation("audit entry requires a timestamp"));
        }
        Ok(Self {
            action,
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            at,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_entry_requires_actor_fields() {
        assert!(AuditLogEntry::new(AuditAction::ShiftClosed, "", "dev-1", ts(), None).is_err());
        assert!(AuditLogEntry::new(AuditAction::ShiftClosed, "u-1", "  ", ts(), None).is_err());
        assert!(AuditLogEntry::new(
            AuditAction::ShiftClosed,
            "u-1",
            "dev-1",
            Utc.timestamp_millis_opt(0).unwrap(),
            None
        )
        .is_err());
    }

    #[test]
    fn test_display_agrees_with_wire_names() {
        for action in [
            AuditAction::ShiftOpened,
            AuditAction::ClosureInitiated,
            AuditAction::ClosureCancelled,
            AuditAction::ActualCashRecorded,
            AuditAction::VarianceDocumented,
            AuditAction::ResponsibilityConfirmed,
            AuditAction::ShiftClosed,
        ] {
            let wire = serde_json::to_value(action).unwrap();
            assert_eq!(action.to_string(), wire.as_str().unwrap());
        }
    }

    #[test]
    fn test_entry_round_trips_with_payload() {
        let entry = AuditLogEntry::new(
            AuditAction::ActualCashRecorded,
            "u-1",
            "dev-1",
            ts(),
            Some(serde_json::json!({ "actual_cash": 245000.0 })),
        )
        .unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("ACTUAL_CASH_RECORDED"));
        let back: AuditLogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, AuditAction::ActualCashRecorded);
        assert_eq!(back.data.unwrap()["actual_cash"], 245000.0);
    }
}
