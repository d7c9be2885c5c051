//! Waiter/barista shift lifecycle for Brew POS.
//!
//! A shift is a role-scoped cash-drawer session with a two-state lifecycle:
//! OPEN → CLOSED via END_SHIFT. One open shift per (user, role) pair at a
//! time — the uniqueness guard keeps a single identity from double-booking a
//! cash drawer. Closed shifts are terminal.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::DbState;
use crate::error::DomainError;
use crate::repository::ShiftStore;
use crate::values::validate_cash_amount;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Roles that operate a cash drawer through this lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftRole {
    Waiter,
    Barista,
}

impl std::fmt::Display for ShiftRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Waiter => "WAITER",
            Self::Barista => "BARISTA",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStatus {
    Open,
    Closed,
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        })
    }
}

/// The only event in this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftEvent {
    EndShift,
}

impl std::fmt::Display for ShiftEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("END_SHIFT")
    }
}

/// Role-scoped cash-drawer session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub role: ShiftRole,
    pub status: ShiftStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub starting_cash: f64,
    /// Running cash revenue total, bumped per cash payment.
    pub cash_sales: f64,
    /// Cash already transferred to a cashier via confirmed handovers.
    pub handed_over: f64,
}

impl Shift {
    /// Open a shift with a starting cash float.
    pub fn open(
        user_id: &str,
        user_name: &str,
        role: ShiftRole,
        starting_cash: f64,
        started_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if user_id.trim().is_empty() {
            return Err(DomainError::validation("shift requires a user id"));
        }
        validate_cash_amount(starting_cash, "starting cash")?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            role,
            status: ShiftStatus::Open,
            started_at,
            ended_at: None,
            starting_cash,
            cash_sales: 0.0,
            handed_over: 0.0,
        })
    }

    /// Adjacency check for the single END_SHIFT edge.
    pub fn validate_event(&self, event: ShiftEvent) -> Result<(), DomainError> {
        match (self.status, event) {
            (ShiftStatus::Open, ShiftEvent::EndShift) => Ok(()),
            (status, event) => Err(DomainError::invalid_transition(status, event)),
        }
    }

    /// End the shift. Terminal — a closed shift never reopens.
    pub fn end(&self, ended_at: DateTime<Utc>) -> Result<Self, DomainError> {
        self.validate_event(ShiftEvent::EndShift)?;
        let mut next = self.clone();
        next.status = ShiftStatus::Closed;
        next.ended_at = Some(ended_at);
        Ok(next)
    }

    /// Shift duration; zero while the shift is still open.
    pub fn duration(&self) -> Duration {
        match self.ended_at {
            Some(ended) => ended - self.started_at,
            None => Duration::zero(),
        }
    }

    /// Cash the drawer should physically hold right now.
    pub fn cash_on_hand(&self) -> f64 {
        self.starting_cash + self.cash_sales - self.handed_over
    }

    /// Record a cash sale against the open drawer.
    pub fn add_cash_sale(&self, amount: f64) -> Result<Self, DomainError> {
        validate_cash_amount(amount, "cash sale amount")?;
        if self.status != ShiftStatus::Open {
            return Err(DomainError::workflow(
                "cannot record a cash sale on a closed shift",
            ));
        }
        let mut next = self.clone();
        next.cash_sales += amount;
        Ok(next)
    }

    /// Record cash leaving the drawer through a confirmed handover.
    pub fn add_handover(&self, amount: f64) -> Result<Self, DomainError> {
        validate_cash_amount(amount, "handover amount")?;
        if self.status != ShiftStatus::Open {
            return Err(DomainError::workflow(
                "cannot hand over cash from a closed shift",
            ));
        }
        let mut next = self.clone();
        next.handed_over += amount;
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Open a new shift for a staff member.
///
/// Fails if the user already has an open shift in the same role; the same
/// user may hold open shifts in different roles simultaneously.
pub fn open_shift(
    db: &DbState,
    user_id: &str,
    user_name: &str,
    role: ShiftRole,
    starting_cash: f64,
) -> Result<Shift, DomainError> {
    let store = ShiftStore::new(db);
    if let Some(existing) = store.find_open(user_id, role)? {
        return Err(DomainError::workflow(format!(
            "{user_id} already has an open {role} shift ({})",
            existing.id
        )));
    }

    let shift = Shift::open(user_id, user_name, role, starting_cash, Utc::now())?;
    store.save(&shift)?;

    info!(shift_id = %shift.id, user_id = %user_id, role = %role, "Shift opened");
    Ok(shift)
}

/// End an open shift.
pub fn end_shift(db: &DbState, shift_id: &str) -> Result<Shift, DomainError> {
    let store = ShiftStore::new(db);
    let shift = store.load(shift_id)?;
    let ended = shift.end(Utc::now())?;
    store.save(&ended)?;

    info!(
        shift_id = %shift_id,
        cash_sales = %ended.cash_sales,
        handed_over = %ended.handed_over,
        "Shift ended"
    );
    Ok(ended)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_duplicate_open_shift_fails_for_same_role() {
        let db = db::test_db();
        open_shift(&db, "user-1", "Ana", ShiftRole::Waiter, 50000.0).unwrap();

        let err = open_shift(&db, "user-1", "Ana", ShiftRole::Waiter, 0.0).unwrap_err();
        match err {
            DomainError::WorkflowViolation(msg) => {
                assert!(msg.contains("already has an open"), "got: {msg}")
            }
            other => panic!("expected WorkflowViolation, got {other:?}"),
        }

        // Different role for the same user is fine
        open_shift(&db, "user-1", "Ana", ShiftRole::Barista, 0.0).unwrap();
    }

    #[test]
    fn test_reopening_after_close_is_allowed() {
        let db = db::test_db();
        let shift = open_shift(&db, "user-1", "Ana", ShiftRole::Waiter, 0.0).unwrap();
        end_shift(&db, &shift.id).unwrap();
        open_shift(&db, "user-1", "Ana", ShiftRole::Waiter, 0.0).unwrap();
    }

    #[test]
    fn test_end_shift_is_terminal() {
        let shift = Shift::open("user-1", "Ana", ShiftRole::Waiter, 0.0, ts(8)).unwrap();
        let ended = shift.end(ts(16)).unwrap();
        assert_eq!(ended.status, ShiftStatus::Closed);

        let err = ended.end(ts(17)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn test_duration_zero_while_open() {
        let shift = Shift::open("user-1", "Ana", ShiftRole::Waiter, 0.0, ts(8)).unwrap();
        assert_eq!(shift.duration(), Duration::zero());

        let ended = shift.end(ts(16)).unwrap();
        assert_eq!(ended.duration(), Duration::hours(8));
    }

    #[test]
    fn test_cash_on_hand_tracks_sales_and_handovers() {
        let shift = Shift::open("user-1", "Ana", ShiftRole::Waiter, 100000.0, ts(8)).unwrap();
        let shift = shift.add_cash_sale(50000.0).unwrap();
        let shift = shift.add_handover(120000.0).unwrap();
        assert_eq!(shift.cash_on_hand(), 30000.0);

        let ended = shift.end(ts(16)).unwrap();
        assert!(ended.add_cash_sale(1000.0).is_err());
        assert!(ended.add_handover(1000.0).is_err());
    }
}
