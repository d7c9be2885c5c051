//! Cash handover workflow for Brew POS.
//!
//! A handover is a cash transfer proposal from a waiter's shift drawer to a
//! cashier's shift drawer: PENDING → CONFIRMED, REJECTED, or DISCREPANCY.
//! When the counted amount disagrees with the requested amount the handover
//! carries discrepancy fields, and above the configured threshold a manager
//! must approve it. Non-zero discrepancies also spawn a `CashDiscrepancy`
//! record whose resolution lifecycle outlives the handover itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::DbState;
use crate::error::DomainError;
use crate::repository::{CashierShiftStore, DiscrepancyStore, HandoverStore, ShiftStore};
use crate::values::{cash_eq, validate_cash_amount};

/// Absolute discrepancy at or above which a manager must approve, when the
/// caller has no configured value.
pub const DEFAULT_DISCREPANCY_THRESHOLD: f64 = 10_000.0;

// ---------------------------------------------------------------------------
// Handover
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoverType {
    /// Mid-shift partial drop.
    Partial,
    /// Full drawer transfer, shift stays open.
    Full,
    /// Final transfer as the waiter ends their shift.
    EndShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoverStatus {
    Pending,
    Confirmed,
    Rejected,
    Discrepancy,
}

impl std::fmt::Display for HandoverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
            Self::Discrepancy => "DISCREPANCY",
        })
    }
}

/// Who carries the shortfall until a manager rules otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyResponsibility {
    Waiter,
    Cashier,
    Unresolved,
}

/// Cash transfer proposal from a waiter shift to a cashier shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashHandover {
    pub id: String,
    pub waiter_shift_id: String,
    pub waiter_id: String,
    pub waiter_name: String,
    pub kind: HandoverType,
    pub status: HandoverStatus,
    pub requested_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashier_shift_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashier_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashier_name: Option<String>,
    /// `actual - requested`; only set when the two disagree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discrepancy_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discrepancy_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsibility: Option<DiscrepancyResponsibility>,
    pub requires_manager_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub requested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl CashHandover {
    /// Propose a transfer of `requested_amount` from a waiter's drawer.
    pub fn request(
        waiter_shift_id: &str,
        waiter_id: &str,
        waiter_name: &str,
        kind: HandoverType,
        requested_amount: f64,
        requested_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_cash_amount(requested_amount, "requested amount")?;
        if requested_amount <= 0.0 {
            return Err(DomainError::validation(
                "handover amount must be greater than zero",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            waiter_shift_id: waiter_shift_id.to_string(),
            waiter_id: waiter_id.to_string(),
            waiter_name: waiter_name.to_string(),
            kind,
            status: HandoverStatus::Pending,
            requested_amount,
            actual_amount: None,
            cashier_shift_id: None,
            cashier_id: None,
            cashier_name: None,
            discrepancy_amount: None,
            discrepancy_reason: None,
            responsibility: None,
            requires_manager_approval: false,
            manager_id: None,
            manager_approved: None,
            manager_notes: None,
            rejection_reason: None,
            notes: None,
            requested_at,
            resolved_at: None,
        })
    }

    /// The cashier counts the received cash and settles the handover.
    ///
    /// A count matching the request confirms outright; any mismatch moves the
    /// handover to DISCREPANCY, and at or above `threshold` (absolute value)
    /// flags it for manager approval.
    pub fn confirm(
        &self,
        cashier_shift_id: &str,
        cashier_id: &str,
        cashier_name: &str,
        actual_amount: f64,
        notes: Option<&str>,
        threshold: f64,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if self.status != HandoverStatus::Pending {
            return Err(DomainError::invalid_transition(self.status, "CONFIRM"));
        }
        validate_cash_amount(actual_amount, "actual amount")?;

        let mut next = self.clone();
        next.cashier_shift_id = Some(cashier_shift_id.to_string());
        next.cashier_id = Some(cashier_id.to_string());
        next.cashier_name = Some(cashier_name.to_string());
        next.actual_amount = Some(actual_amount);
        next.notes = notes.map(str::to_string);

        let discrepancy = actual_amount - self.requested_amount;
        if cash_eq(discrepancy, 0.0) {
            next.status = HandoverStatus::Confirmed;
            next.resolved_at = Some(ts);
        } else {
            next.status = HandoverStatus::Discrepancy;
            next.discrepancy_amount = Some(discrepancy);
            next.responsibility = Some(DiscrepancyResponsibility::Unresolved);
            next.requires_manager_approval = discrepancy.abs() >= threshold;
        }
        Ok(next)
    }

    /// Turn the transfer down with a stated reason.
    pub fn reject(&self, reason: &str, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        if self.status != HandoverStatus::Pending {
            return Err(DomainError::invalid_transition(self.status, "REJECT"));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::validation("rejection requires a reason"));
        }
        let mut next = self.clone();
        next.status = HandoverStatus::Rejected;
        next.rejection_reason = Some(reason.trim().to_string());
        next.resolved_at = Some(ts);
        Ok(next)
    }

    /// Manager rules on a flagged discrepancy. Approval confirms the
    /// handover; a denial keeps it in DISCREPANCY with the ruling recorded.
    pub fn approve_discrepancy(
        &self,
        manager_id: &str,
        approved: bool,
        notes: Option<&str>,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if self.status != HandoverStatus::Discrepancy {
            return Err(DomainError::invalid_transition(self.status, "APPROVE_DISCREPANCY"));
        }
        if !self.requires_manager_approval {
            return Err(DomainError::workflow(
                "handover discrepancy does not require manager approval",
            ));
        }
        if manager_id.trim().is_empty() {
            return Err(DomainError::validation("approval requires a manager id"));
        }
        if self.manager_approved.is_some() {
            return Err(DomainError::workflow("discrepancy has already been ruled on"));
        }
        let mut next = self.clone();
        next.manager_id = Some(manager_id.to_string());
        next.manager_approved = Some(approved);
        next.manager_notes = notes.map(str::to_string);
        if approved {
            next.status = HandoverStatus::Confirmed;
            next.resolved_at = Some(ts);
        }
        Ok(next)
    }

    pub fn has_discrepancy(&self) -> bool {
        self.discrepancy_amount.is_some()
    }
}

// ---------------------------------------------------------------------------
// Discrepancy record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyStatus {
    Pending,
    Resolved,
    Escalated,
}

impl std::fmt::Display for DiscrepancyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Resolved => "RESOLVED",
            Self::Escalated => "ESCALATED",
        })
    }
}

/// Permanent financial audit record for a non-zero handover discrepancy.
/// Lives independently of the handover so the audit trail survives even if
/// the handover document is archived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashDiscrepancy {
    pub id: String,
    pub handover_id: String,
    pub waiter_shift_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashier_shift_id: Option<String>,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub responsibility: DiscrepancyResponsibility,
    pub status: DiscrepancyStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
}

impl CashDiscrepancy {
    /// Derive a discrepancy record from a settled handover. Errors on a zero
    /// discrepancy — matching counts leave no trail to audit.
    pub fn from_handover(handover: &CashHandover, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        let amount = handover.discrepancy_amount.unwrap_or(0.0);
        if cash_eq(amount, 0.0) {
            return Err(DomainError::validation(
                "cannot create a discrepancy record for a zero discrepancy",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            handover_id: handover.id.clone(),
            waiter_shift_id: handover.waiter_shift_id.clone(),
            cashier_shift_id: handover.cashier_shift_id.clone(),
            amount,
            reason: handover.discrepancy_reason.clone(),
            responsibility: handover
                .responsibility
                .unwrap_or(DiscrepancyResponsibility::Unresolved),
            status: DiscrepancyStatus::Pending,
            created_at: ts,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
        })
    }

    /// Close out the discrepancy. Prior state is frozen except for the
    /// resolution fields written here.
    pub fn resolve(
        &self,
        manager_id: &str,
        responsibility: DiscrepancyResponsibility,
        notes: &str,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if self.status != DiscrepancyStatus::Pending {
            return Err(DomainError::invalid_transition(self.status, "RESOLVE"));
        }
        if manager_id.trim().is_empty() {
            return Err(DomainError::validation("resolution requires a manager id"));
        }
        let mut next = self.clone();
        next.status = DiscrepancyStatus::Resolved;
        next.responsibility = responsibility;
        next.resolved_by = Some(manager_id.to_string());
        next.resolved_at = Some(ts);
        next.resolution_notes = Some(notes.to_string());
        Ok(next)
    }

    /// Push the discrepancy up the chain instead of resolving it locally.
    pub fn escalate(
        &self,
        manager_id: &str,
        notes: &str,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if self.status != DiscrepancyStatus::Pending {
            return Err(DomainError::invalid_transition(self.status, "ESCALATE"));
        }
        if manager_id.trim().is_empty() {
            return Err(DomainError::validation("escalation requires a manager id"));
        }
        let mut next = self.clone();
        next.status = DiscrepancyStatus::Escalated;
        next.resolved_by = Some(manager_id.to_string());
        next.resolved_at = Some(ts);
        next.resolution_notes = Some(notes.to_string());
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Waiter requests a cash transfer from their open shift.
///
/// At most one PENDING handover per waiter shift; a rare concurrent duplicate
/// is tolerated and reconciled later rather than locked against.
pub fn request_handover(
    db: &DbState,
    waiter_shift_id: &str,
    kind: HandoverType,
    amount: f64,
) -> Result<CashHandover, DomainError> {
    let shifts = ShiftStore::new(db);
    let shift = shifts.load(waiter_shift_id)?;
    if shift.status != crate::shifts::ShiftStatus::Open {
        return Err(DomainError::workflow(
            "cannot request a handover from a closed shift",
        ));
    }

    let handovers = HandoverStore::new(db);
    if let Some(pending) = handovers.find_pending_by_shift(waiter_shift_id)? {
        return Err(DomainError::workflow(format!(
            "shift already has a pending handover ({})",
            pending.id
        )));
    }

    if amount > shift.cash_on_hand() + 0.001 {
        return Err(DomainError::validation(format!(
            "requested amount {:.2} exceeds cash on hand {:.2}",
            amount,
            shift.cash_on_hand()
        )));
    }

    let handover = CashHandover::request(
        waiter_shift_id,
        &shift.user_id,
        &shift.user_name,
        kind,
        amount,
        Utc::now(),
    )?;
    handovers.save(&handover)?;

    info!(handover_id = %handover.id, shift_id = %waiter_shift_id, amount = %amount, "Handover requested");
    Ok(handover)
}

/// Cashier counts and settles a pending handover.
///
/// Applies the received cash to the cashier shift's system figure and the
/// waiter shift's handed-over total, and creates a `CashDiscrepancy` record
/// whenever the counts disagree.
pub fn confirm_handover(
    db: &DbState,
    handover_id: &str,
    cashier_shift_id: &str,
    actual_amount: f64,
    notes: Option<&str>,
    threshold: Option<f64>,
) -> Result<CashHandover, DomainError> {
    let handovers = HandoverStore::new(db);
    let cashier_shifts = CashierShiftStore::new(db);
    let waiter_shifts = ShiftStore::new(db);

    let handover = handovers.load(handover_id)?;
    let cashier_shift = cashier_shifts.load(cashier_shift_id)?;
    let waiter_shift = waiter_shifts.load(&handover.waiter_shift_id)?;
    let now = Utc::now();

    let confirmed = handover.confirm(
        cashier_shift_id,
        &cashier_shift.cashier_id,
        &cashier_shift.cashier_name,
        actual_amount,
        notes,
        threshold.unwrap_or(DEFAULT_DISCREPANCY_THRESHOLD),
        now,
    )?;

    // The cash physically changed hands, so both drawers are updated even
    // while a manager ruling is still outstanding. All three aggregates are
    // mutated in memory before anything is persisted: a rejected step (a
    // waiter shift that already ended, say) leaves stored state untouched,
    // and a retry cannot credit the same cash twice.
    let discrepancy = confirmed.discrepancy_amount.unwrap_or(0.0);
    let updated_cashier = cashier_shift.update_cash_after_handover(
        actual_amount,
        discrepancy,
        confirmed.has_discrepancy(),
    )?;
    let updated_waiter = waiter_shift.add_handover(actual_amount)?;
    let record = if confirmed.has_discrepancy() {
        Some(CashDiscrepancy::from_handover(&confirmed, now)?)
    } else {
        None
    };

    cashier_shifts.save(&updated_cashier)?;
    waiter_shifts.save(&updated_waiter)?;
    if let Some(record) = &record {
        DiscrepancyStore::new(db).save(record)?;
        warn!(
            handover_id = %handover_id,
            discrepancy = %discrepancy,
            requires_manager_approval = confirmed.requires_manager_approval,
            "Handover settled with discrepancy"
        );
    }
    handovers.save(&confirmed)?;

    info!(
        handover_id = %handover_id,
        status = %confirmed.status,
        actual = %actual_amount,
        "Handover settled"
    );
    Ok(confirmed)
}

/// Cashier turns a pending handover down.
pub fn reject_handover(
    db: &DbState,
    handover_id: &str,
    reason: &str,
) -> Result<CashHandover, DomainError> {
    let handovers = HandoverStore::new(db);
    let rejected = handovers.load(handover_id)?.reject(reason, Utc::now())?;
    handovers.save(&rejected)?;
    info!(handover_id = %handover_id, reason = %reason, "Handover rejected");
    Ok(rejected)
}

/// Manager rules on a handover discrepancy flagged for approval.
pub fn approve_discrepancy(
    db: &DbState,
    handover_id: &str,
    manager_id: &str,
    approved: bool,
    notes: Option<&str>,
) -> Result<CashHandover, DomainError> {
    let handovers = HandoverStore::new(db);
    let ruled = handovers
        .load(handover_id)?
        .approve_discrepancy(manager_id, approved, notes, Utc::now())?;
    handovers.save(&ruled)?;
    info!(handover_id = %handover_id, manager_id = %manager_id, approved, "Discrepancy ruled on");
    Ok(ruled)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cashier_shift::open_cashier_shift;
    use crate::db;
    use crate::repository::CashierShiftStore;
    use crate::shifts::{open_shift, ShiftRole};
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 14, 0, 0).unwrap()
    }

    fn pending(amount: f64) -> CashHandover {
        CashHandover::request("shift-1", "waiter-1", "Ana", HandoverType::Partial, amount, ts())
            .unwrap()
    }

    #[test]
    fn test_matching_count_confirms_without_discrepancy_fields() {
        let handover = pending(50000.0);
        let confirmed = handover
            .confirm("cs-1", "cashier-1", "Marco", 50000.0, None, 10000.0, ts())
            .unwrap();
        assert_eq!(confirmed.status, HandoverStatus::Confirmed);
        assert_eq!(confirmed.actual_amount, Some(50000.0));
        assert!(confirmed.discrepancy_amount.is_none());
        assert!(confirmed.discrepancy_reason.is_none());
        assert!(!confirmed.requires_manager_approval);
        assert!(confirmed.resolved_at.is_some());
    }

    #[test]
    fn test_short_count_below_threshold() {
        let handover = pending(50000.0);
        let settled = handover
            .confirm("cs-1", "cashier-1", "Marco", 45000.0, None, 10000.0, ts())
            .unwrap();
        assert_eq!(settled.status, HandoverStatus::Discrepancy);
        assert_eq!(settled.discrepancy_amount, Some(-5000.0));
        assert!(!settled.requires_manager_approval, "5000 is below the 10000 threshold");
    }

    #[test]
    fn test_short_count_at_threshold_needs_manager() {
        let handover = pending(50000.0);
        let settled = handover
            .confirm("cs-1", "cashier-1", "Marco", 40000.0, None, 10000.0, ts())
            .unwrap();
        assert_eq!(settled.status, HandoverStatus::Discrepancy);
        assert_eq!(settled.discrepancy_amount, Some(-10000.0));
        assert!(settled.requires_manager_approval);
    }

    #[test]
    fn test_confirm_requires_pending() {
        let handover = pending(50000.0);
        let confirmed = handover
            .confirm("cs-1", "cashier-1", "Marco", 50000.0, None, 10000.0, ts())
            .unwrap();
        assert!(confirmed
            .confirm("cs-1", "cashier-1", "Marco", 50000.0, None, 10000.0, ts())
            .is_err());
        assert!(confirmed.reject("late", ts()).is_err());
    }

    #[test]
    fn test_reject_requires_reason() {
        let handover = pending(50000.0);
        assert!(handover.reject("  ", ts()).is_err());
        let rejected = handover.reject("count disputed", ts()).unwrap();
        assert_eq!(rejected.status, HandoverStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("count disputed"));
    }

    #[test]
    fn test_manager_approval_confirms_discrepant_handover() {
        let settled = pending(50000.0)
            .confirm("cs-1", "cashier-1", "Marco", 35000.0, None, 10000.0, ts())
            .unwrap();
        assert!(settled.requires_manager_approval);

        let ruled = settled
            .approve_discrepancy("mgr-1", true, Some("waiter to repay"), ts())
            .unwrap();
        assert_eq!(ruled.status, HandoverStatus::Confirmed);
        assert_eq!(ruled.manager_approved, Some(true));

        // Ruling twice is guarded
        assert!(ruled.approve_discrepancy("mgr-1", true, None, ts()).is_err());
    }

    #[test]
    fn test_manager_denial_keeps_discrepancy_status() {
        let settled = pending(50000.0)
            .confirm("cs-1", "cashier-1", "Marco", 35000.0, None, 10000.0, ts())
            .unwrap();
        let ruled = settled
            .approve_discrepancy("mgr-1", false, Some("recount required"), ts())
            .unwrap();
        assert_eq!(ruled.status, HandoverStatus::Discrepancy);
        assert_eq!(ruled.manager_approved, Some(false));
    }

    #[test]
    fn test_approval_not_required_below_threshold() {
        let settled = pending(50000.0)
            .confirm("cs-1", "cashier-1", "Marco", 49000.0, None, 10000.0, ts())
            .unwrap();
        let err = settled
            .approve_discrepancy("mgr-1", true, None, ts())
            .unwrap_err();
        assert!(matches!(err, DomainError::WorkflowViolation(_)));
    }

    #[test]
    fn test_discrepancy_record_rejects_zero_amount() {
        let confirmed = pending(50000.0)
            .confirm("cs-1", "cashier-1", "Marco", 50000.0, None, 10000.0, ts())
            .unwrap();
        assert!(CashDiscrepancy::from_handover(&confirmed, ts()).is_err());
    }

    #[test]
    fn test_discrepancy_resolution_freezes_record() {
        let settled = pending(50000.0)
            .confirm("cs-1", "cashier-1", "Marco", 45000.0, None, 10000.0, ts())
            .unwrap();
        let record = CashDiscrepancy::from_handover(&settled, ts()).unwrap();
        assert_eq!(record.amount, -5000.0);
        assert_eq!(record.status, DiscrepancyStatus::Pending);

        let resolved = record
            .resolve("mgr-1", DiscrepancyResponsibility::Waiter, "deducted from wages", ts())
            .unwrap();
        assert_eq!(resolved.status, DiscrepancyStatus::Resolved);
        assert_eq!(resolved.responsibility, DiscrepancyResponsibility::Waiter);

        assert!(resolved
            .resolve("mgr-2", DiscrepancyResponsibility::Cashier, "second ruling", ts())
            .is_err());
        assert!(resolved.escalate("mgr-2", "too late", ts()).is_err());
    }

    #[test]
    fn test_escalation_from_pending() {
        let settled = pending(50000.0)
            .confirm("cs-1", "cashier-1", "Marco", 30000.0, None, 10000.0, ts())
            .unwrap();
        let record = CashDiscrepancy::from_handover(&settled, ts()).unwrap();
        let escalated = record.escalate("mgr-1", "possible theft", ts()).unwrap();
        assert_eq!(escalated.status, DiscrepancyStatus::Escalated);
    }

    // -- service-level --

    fn setup_shifts(db: &DbState) -> (crate::shifts::Shift, crate::cashier_shift::CashierShift) {
        let waiter = open_shift(db, "waiter-1", "Ana", ShiftRole::Waiter, 100000.0).unwrap();
        let waiter = {
            let store = ShiftStore::new(db);
            let with_sales = waiter.add_cash_sale(80000.0).unwrap();
            store.save(&with_sales).unwrap();
            with_sales
        };
        let cashier = open_cashier_shift(db, "cashier-1", "Marco", "till-1", 200000.0).unwrap();
        (waiter, cashier)
    }

    #[test]
    fn test_one_pending_handover_per_shift() {
        let db = db::test_db();
        let (waiter, _) = setup_shifts(&db);

        request_handover(&db, &waiter.id, HandoverType::Partial, 50000.0).unwrap();
        let err = request_handover(&db, &waiter.id, HandoverType::Partial, 10000.0).unwrap_err();
        match err {
            DomainError::WorkflowViolation(msg) => {
                assert!(msg.contains("pending handover"), "got: {msg}")
            }
            other => panic!("expected WorkflowViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_request_cannot_exceed_cash_on_hand() {
        let db = db::test_db();
        let (waiter, _) = setup_shifts(&db);
        // Drawer holds 100000 float + 80000 sales
        assert!(request_handover(&db, &waiter.id, HandoverType::Full, 180000.0).is_ok());
    }

    #[test]
    fn test_request_over_drawer_is_rejected() {
        let db = db::test_db();
        let (waiter, _) = setup_shifts(&db);
        let err =
            request_handover(&db, &waiter.id, HandoverType::Full, 200000.0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn test_confirm_after_waiter_shift_ends_leaves_drawers_untouched() {
        let db = db::test_db();
        let (waiter, cashier) = setup_shifts(&db);
        let handover =
            request_handover(&db, &waiter.id, HandoverType::EndShift, 50000.0).unwrap();

        // Waiter ends their shift while the handover is still pending
        crate::shifts::end_shift(&db, &waiter.id).unwrap();

        // Repeated confirm attempts fail without crediting anything
        for _ in 0..2 {
            let err = confirm_handover(&db, &handover.id, &cashier.id, 50000.0, None, None)
                .unwrap_err();
            assert!(matches!(err, DomainError::WorkflowViolation(_)));
        }

        let cashier_reloaded = CashierShiftStore::new(&db).load(&cashier.id).unwrap();
        assert_eq!(cashier_reloaded.system_cash, 200000.0);
        assert_eq!(cashier_reloaded.handover_count, 0);
        let handover_reloaded = HandoverStore::new(&db).load(&handover.id).unwrap();
        assert_eq!(handover_reloaded.status, HandoverStatus::Pending);
    }

    #[test]
    fn test_confirm_syncs_both_shifts_and_creates_discrepancy() {
        let db = db::test_db();
        let (waiter, cashier) = setup_shifts(&db);
        let handover =
            request_handover(&db, &waiter.id, HandoverType::Partial, 50000.0).unwrap();

        let settled =
            confirm_handover(&db, &handover.id, &cashier.id, 45000.0, None, None).unwrap();
        assert_eq!(settled.status, HandoverStatus::Discrepancy);

        let cashier_reloaded = CashierShiftStore::new(&db).load(&cashier.id).unwrap();
        assert_eq!(cashier_reloaded.system_cash, 245000.0);
        assert_eq!(cashier_reloaded.handover_count, 1);
        assert_eq!(cashier_reloaded.discrepancy_count, 1);
        assert_eq!(cashier_reloaded.total_discrepancy, -5000.0);

        let waiter_reloaded = ShiftStore::new(&db).load(&waiter.id).unwrap();
        assert_eq!(waiter_reloaded.handed_over, 45000.0);

        let records = DiscrepancyStore::new(&db)
            .find_by_handover(&handover.id)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, -5000.0);

        // A matching follow-up handover creates no record
        let h2 = request_handover(&db, &waiter.id, HandoverType::Partial, 30000.0).unwrap();
        let settled2 = confirm_handover(&db, &h2.id, &cashier.id, 30000.0, None, None).unwrap();
        assert_eq!(settled2.status, HandoverStatus::Confirmed);
        assert_eq!(
            DiscrepancyStore::new(&db).find_by_handover(&h2.id).unwrap().len(),
            0
        );
    }
}
