//! Cashier shift aggregate and closure workflow for Brew POS.
//!
//! The most involved state machine in the core. A cashier shift advances
//! OPEN → CLOSURE_INITIATED → CLOSED, with a single permitted regression
//! (cancelling an initiated closure) only while no actual cash has been
//! counted. Closure is a multi-step human workflow — count cash, document any
//! variance, confirm responsibility — and the aggregate guarantees the steps
//! cannot be skipped or reordered. Every successful operation appends exactly
//! one audit entry; operations are pure and return a new aggregate value, so
//! a failed call provably leaves stored state untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogEntry};
use crate::db::DbState;
use crate::error::DomainError;
use crate::repository::CashierShiftStore;
use crate::values::{validate_cash_amount, ResponsibilityConfirmation, Variance, VarianceReason};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashierShiftStatus {
    Open,
    ClosureInitiated,
    Closed,
}

impl std::fmt::Display for CashierShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Open => "OPEN",
            Self::ClosureInitiated => "CLOSURE_INITIATED",
            Self::Closed => "CLOSED",
        })
    }
}

/// Events on the cashier shift machine. `CloseShift` is a compound
/// precondition, not a simple edge — see `CashierShift::can_close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashierShiftEvent {
    InitiateClosure,
    CancelClosure,
    RecordActualCash,
    DocumentVariance,
    ConfirmResponsibility,
    CloseShift,
}

impl std::fmt::Display for CashierShiftEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::InitiateClosure => "INITIATE_CLOSURE",
            Self::CancelClosure => "CANCEL_CLOSURE",
            Self::RecordActualCash => "RECORD_ACTUAL_CASH",
            Self::DocumentVariance => "DOCUMENT_VARIANCE",
            Self::ConfirmResponsibility => "CONFIRM_RESPONSIBILITY",
            Self::CloseShift => "CLOSE_SHIFT",
        })
    }
}

/// Cashier shift aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashierShift {
    pub id: String,
    pub cashier_id: String,
    pub cashier_name: String,
    pub status: CashierShiftStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Cash in the drawer when the shift opened.
    pub starting_float: f64,
    /// Theoretical expected cash: float plus every confirmed handover.
    pub system_cash: f64,
    /// Physically counted cash; set exactly once, during closure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_cash: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variance: Option<Variance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<ResponsibilityConfirmation>,
    pub handover_count: u32,
    pub discrepancy_count: u32,
    pub total_discrepancy: f64,
    /// Append-only; mutated only through aggregate methods.
    audit_log: Vec<AuditLogEntry>,
}

// ---------------------------------------------------------------------------
// Standalone step validators
//
// Each mutator's guard is also exposed as a free predicate so the calling
// layer can present "next required step" UX without attempting a mutation
// and rolling it back.
// ---------------------------------------------------------------------------

pub fn validate_initiate_closure(shift: &CashierShift) -> Result<(), DomainError> {
    if shift.status != CashierShiftStatus::Open {
        return Err(DomainError::invalid_transition(
            shift.status,
            CashierShiftEvent::InitiateClosure,
        ));
    }
    Ok(())
}

pub fn validate_cancel_closure(shift: &CashierShift) -> Result<(), DomainError> {
    if shift.status != CashierShiftStatus::ClosureInitiated {
        return Err(DomainError::invalid_transition(
            shift.status,
            CashierShiftEvent::CancelClosure,
        ));
    }
    if shift.actual_cash.is_some() {
        return Err(DomainError::workflow(
            "closure cannot be cancelled once actual cash has been recorded",
        ));
    }
    Ok(())
}

pub fn validate_record_actual_cash(shift: &CashierShift) -> Result<(), DomainError> {
    if shift.status != CashierShiftStatus::ClosureInitiated {
        return Err(DomainError::invalid_transition(
            shift.status,
            CashierShiftEvent::RecordActualCash,
        ));
    }
    if shift.actual_cash.is_some() {
        return Err(DomainError::workflow(
            "actual cash has already been recorded for this shift",
        ));
    }
    Ok(())
}

pub fn validate_document_variance(shift: &CashierShift) -> Result<(), DomainError> {
    if shift.status != CashierShiftStatus::ClosureInitiated {
        return Err(DomainError::invalid_transition(
            shift.status,
            CashierShiftEvent::DocumentVariance,
        ));
    }
    let variance = shift
        .variance
        .as_ref()
        .ok_or_else(|| DomainError::workflow("record actual cash before documenting variance"))?;
    if !variance.requires_documentation() {
        return Err(DomainError::workflow(
            "variance is zero and does not require documentation",
        ));
    }
    if variance.is_documented() {
        return Err(DomainError::workflow("variance is already documented"));
    }
    Ok(())
}

pub fn validate_confirm_responsibility(shift: &CashierShift) -> Result<(), DomainError> {
    if shift.status != CashierShiftStatus::ClosureInitiated {
        return Err(DomainError::invalid_transition(
            shift.status,
            CashierShiftEvent::ConfirmResponsibility,
        ));
    }
    if shift.actual_cash.is_none() {
        return Err(DomainError::workflow(
            "record actual cash before confirming responsibility",
        ));
    }
    if let Some(variance) = &shift.variance {
        if variance.requires_documentation() && !variance.is_documented() {
            return Err(DomainError::workflow(
                "document the cash variance before confirming responsibility",
            ));
        }
    }
    if shift.confirmation.is_some() {
        return Err(DomainError::workflow(
            "responsibility has already been confirmed",
        ));
    }
    Ok(())
}

/// Human-readable label for the next closure step, derived from workflow
/// completeness in order.
pub fn next_required_step(shift: &CashierShift) -> &'static str {
    if shift.actual_cash.is_none() {
        return "record actual cash";
    }
    if let Some(variance) = &shift.variance {
        if variance.requires_documentation() && !variance.is_documented() {
            return "document variance";
        }
    }
    if shift.confirmation.is_none() {
        return "confirm responsibility";
    }
    "close shift"
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

impl CashierShift {
    /// Open a cashier shift with a starting float. The system cash figure
    /// starts at the float and grows with confirmed handovers.
    pub fn open(
        cashier_id: &str,
        cashier_name: &str,
        device_id: &str,
        starting_float: f64,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if cashier_id.trim().is_empty() {
            return Err(DomainError::validation("cashier shift requires a cashier id"));
        }
        validate_cash_amount(starting_float, "starting float")?;
        let entry = AuditLogEntry::new(
            AuditAction::ShiftOpened,
            cashier_id,
            device_id,
            ts,
            Some(json!({ "starting_float": starting_float })),
        )?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            cashier_id: cashier_id.to_string(),
            cashier_name: cashier_name.to_string(),
            status: CashierShiftStatus::Open,
            start_time: ts,
            end_time: None,
            starting_float,
            system_cash: starting_float,
            actual_cash: None,
            variance: None,
            confirmation: None,
            handover_count: 0,
            discrepancy_count: 0,
            total_discrepancy: 0.0,
            audit_log: vec![entry],
        })
    }

    /// Read-only view of the audit trail.
    pub fn audit_log(&self) -> &[AuditLogEntry] {
        &self.audit_log
    }

    /// Adjacency-level validation for the facade. Workflow completeness is
    /// checked by the per-step validators and `can_close`.
    pub fn validate_event(&self, event: CashierShiftEvent) -> Result<(), DomainError> {
        let expected = match event {
            CashierShiftEvent::InitiateClosure => CashierShiftStatus::Open,
            CashierShiftEvent::CancelClosure
            | CashierShiftEvent::RecordActualCash
            | CashierShiftEvent::DocumentVariance
            | CashierShiftEvent::ConfirmResponsibility
            | CashierShiftEvent::CloseShift => CashierShiftStatus::ClosureInitiated,
        };
        if self.status != expected {
            return Err(DomainError::invalid_transition(self.status, event));
        }
        Ok(())
    }

    /// Begin the closure workflow.
    pub fn initiate_closure(
        &self,
        user_id: &str,
        device_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_initiate_closure(self)?;
        let entry = AuditLogEntry::new(AuditAction::ClosureInitiated, user_id, device_id, ts, None)?;
        let mut next = self.clone();
        next.status = CashierShiftStatus::ClosureInitiated;
        next.audit_log.push(entry);
        Ok(next)
    }

    /// Abort an initiated closure and return to OPEN. Only permitted while
    /// no cash has been counted — once a count exists the workflow must run
    /// to completion.
    pub fn cancel_closure(
        &self,
        user_id: &str,
        device_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_cancel_closure(self)?;
        let entry = AuditLogEntry::new(AuditAction::ClosureCancelled, user_id, device_id, ts, None)?;
        let mut next = self.clone();
        next.status = CashierShiftStatus::Open;
        next.audit_log.push(entry);
        Ok(next)
    }

    /// Record the physically counted cash, once. Computes and stores the
    /// variance against the system figure, returning it alongside the
    /// updated aggregate.
    pub fn record_actual_cash(
        &self,
        actual_cash: f64,
        user_id: &str,
        device_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<(Self, Variance), DomainError> {
        validate_record_actual_cash(self)?;
        let variance = Variance::new(self.system_cash, actual_cash)?;
        let entry = AuditLogEntry::new(
            AuditAction::ActualCashRecorded,
            user_id,
            device_id,
            ts,
            Some(json!({
                "system_cash": self.system_cash,
                "actual_cash": actual_cash,
                "variance": variance.amount,
            })),
        )?;
        let mut next = self.clone();
        next.actual_cash = Some(actual_cash);
        next.variance = Some(variance.clone());
        next.audit_log.push(entry);
        Ok((next, variance))
    }

    /// Document a non-zero variance with a reason and notes.
    pub fn document_variance(
        &self,
        reason: VarianceReason,
        notes: &str,
        user_id: &str,
        device_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_document_variance(self)?;
        // Guard above guarantees a variance is present.
        let documented = self
            .variance
            .as_ref()
            .ok_or_else(|| DomainError::workflow("no variance to document"))?
            .document(reason, notes)?;
        let entry = AuditLogEntry::new(
            AuditAction::VarianceDocumented,
            user_id,
            device_id,
            ts,
            Some(json!({ "reason": reason, "notes": notes })),
        )?;
        let mut next = self.clone();
        next.variance = Some(documented);
        next.audit_log.push(entry);
        Ok(next)
    }

    /// Record the cashier's acknowledgment of accountability for the shift's
    /// outcome. Requires the count (and any variance documentation) first.
    pub fn confirm_responsibility(
        &self,
        user_id: &str,
        device_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_confirm_responsibility(self)?;
        let confirmation = ResponsibilityConfirmation::new(user_id, device_id, ts)?;
        let entry =
            AuditLogEntry::new(AuditAction::ResponsibilityConfirmed, user_id, device_id, ts, None)?;
        let mut next = self.clone();
        next.confirmation = Some(confirmation);
        next.audit_log.push(entry);
        Ok(next)
    }

    /// Non-mutating close precondition: closure initiated, responsibility
    /// confirmed, and any non-zero variance fully documented.
    pub fn can_close(&self) -> Result<(), DomainError> {
        if self.status != CashierShiftStatus::ClosureInitiated {
            return Err(DomainError::invalid_transition(
                self.status,
                CashierShiftEvent::CloseShift,
            ));
        }
        if let Some(variance) = &self.variance {
            if variance.requires_documentation()
                && (variance.reason.is_none()
                    || variance.notes.as_deref().unwrap_or("").is_empty())
            {
                return Err(DomainError::workflow(
                    "cash variance must be documented before closing",
                ));
            }
        }
        if self.confirmation.is_none() {
            return Err(DomainError::workflow(
                "responsibility must be confirmed before closing",
            ));
        }
        Ok(())
    }

    /// Close the shift. Terminal — the aggregate is immutable afterwards.
    pub fn close(
        &self,
        user_id: &str,
        device_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        self.can_close()?;
        let entry = AuditLogEntry::new(
            AuditAction::ShiftClosed,
            user_id,
            device_id,
            ts,
            Some(json!({
                "system_cash": self.system_cash,
                "actual_cash": self.actual_cash,
                "variance": self.variance.as_ref().map(|v| v.amount),
            })),
        )?;
        let mut next = self.clone();
        next.status = CashierShiftStatus::Closed;
        next.end_time = Some(ts);
        next.audit_log.push(entry);
        Ok(next)
    }

    /// Add incoming cash to the system figure. Invoked by the handover
    /// subsystem while the shift is open; not part of the closure workflow.
    pub fn update_system_cash(&self, amount: f64) -> Result<Self, DomainError> {
        validate_cash_amount(amount, "handover amount")?;
        if self.status != CashierShiftStatus::Open {
            return Err(DomainError::workflow(
                "cannot receive cash on a shift that is not open",
            ));
        }
        let mut next = self.clone();
        next.system_cash += amount;
        Ok(next)
    }

    /// Apply a confirmed handover: bump the system cash by what was actually
    /// received and keep the reporting counters in sync.
    pub fn update_cash_after_handover(
        &self,
        received: f64,
        discrepancy: f64,
        has_discrepancy: bool,
    ) -> Result<Self, DomainError> {
        let mut next = self.update_system_cash(received)?;
        next.handover_count += 1;
        if has_discrepancy {
            next.discrepancy_count += 1;
            next.total_discrepancy += discrepancy;
        }
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Open a cashier shift. One open shift per cashier at a time.
pub fn open_cashier_shift(
    db: &DbState,
    cashier_id: &str,
    cashier_name: &str,
    device_id: &str,
    starting_float: f64,
) -> Result<CashierShift, DomainError> {
    let store = CashierShiftStore::new(db);
    if let Some(existing) = store.find_open_by_cashier(cashier_id)? {
        return Err(DomainError::workflow(format!(
            "cashier {cashier_id} already has an open shift ({})",
            existing.id
        )));
    }
    let shift = CashierShift::open(cashier_id, cashier_name, device_id, starting_float, Utc::now())?;
    store.save(&shift)?;

    info!(shift_id = %shift.id, cashier_id = %cashier_id, starting_float = %starting_float, "Cashier shift opened");
    Ok(shift)
}

pub fn initiate_closure(
    db: &DbState,
    shift_id: &str,
    user_id: &str,
    device_id: &str,
) -> Result<CashierShift, DomainError> {
    let store = CashierShiftStore::new(db);
    let next = store.load(shift_id)?.initiate_closure(user_id, device_id, Utc::now())?;
    store.save(&next)?;
    info!(shift_id = %shift_id, user_id = %user_id, "Cashier shift closure initiated");
    Ok(next)
}

pub fn cancel_closure(
    db: &DbState,
    shift_id: &str,
    user_id: &str,
    device_id: &str,
) -> Result<CashierShift, DomainError> {
    let store = CashierShiftStore::new(db);
    let next = store.load(shift_id)?.cancel_closure(user_id, device_id, Utc::now())?;
    store.save(&next)?;
    info!(shift_id = %shift_id, user_id = %user_id, "Cashier shift closure cancelled");
    Ok(next)
}

pub fn record_actual_cash(
    db: &DbState,
    shift_id: &str,
    actual_cash: f64,
    user_id: &str,
    device_id: &str,
) -> Result<(CashierShift, Variance), DomainError> {
    let store = CashierShiftStore::new(db);
    let (next, variance) =
        store
            .load(shift_id)?
            .record_actual_cash(actual_cash, user_id, device_id, Utc::now())?;
    store.save(&next)?;
    info!(
        shift_id = %shift_id,
        actual_cash = %actual_cash,
        variance = %variance.amount,
        "Actual cash recorded"
    );
    Ok((next, variance))
}

pub fn document_variance(
    db: &DbState,
    shift_id: &str,
    reason: VarianceReason,
    notes: &str,
    user_id: &str,
    device_id: &str,
) -> Result<CashierShift, DomainError> {
    let store = CashierShiftStore::new(db);
    let next =
        store
            .load(shift_id)?
            .document_variance(reason, notes, user_id, device_id, Utc::now())?;
    store.save(&next)?;
    info!(shift_id = %shift_id, reason = ?reason, "Variance documented");
    Ok(next)
}

pub fn confirm_responsibility(
    db: &DbState,
    shift_id: &str,
    user_id: &str,
    device_id: &str,
) -> Result<CashierShift, DomainError> {
    let store = CashierShiftStore::new(db);
    let next = store
        .load(shift_id)?
        .confirm_responsibility(user_id, device_id, Utc::now())?;
    store.save(&next)?;
    info!(shift_id = %shift_id, user_id = %user_id, "Responsibility confirmed");
    Ok(next)
}

pub fn close_cashier_shift(
    db: &DbState,
    shift_id: &str,
    user_id: &str,
    device_id: &str,
) -> Result<CashierShift, DomainError> {
    let store = CashierShiftStore::new(db);
    let next = store.load(shift_id)?.close(user_id, device_id, Utc::now())?;
    store.save(&next)?;
    info!(
        shift_id = %shift_id,
        variance = ?next.variance.as_ref().map(|v| v.amount),
        "Cashier shift closed"
    );
    Ok(next)
}

// ===========================================================================
// Tests
// ===========================================================================
