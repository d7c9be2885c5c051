//! Cash reconciliation value objects for Brew POS.
//!
//! `Variance` and `ResponsibilityConfirmation` are the immutable proof
//! objects the cashier shift closure workflow is built from. Both validate
//! all input up front; once constructed they are never edited in place
//! (documenting a variance returns a new value).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Cash amounts are stored with at most two decimal places; differences
/// below half a cent are treated as zero.
const CENT_EPSILON: f64 = 0.005;

/// Minimum length for variance documentation notes.
const MIN_VARIANCE_NOTES_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Cash amount validation
// ---------------------------------------------------------------------------

/// Validate a counted cash amount: finite, non-negative, and at most two
/// decimal places (scale-by-100 integer check).
pub fn validate_cash_amount(amount: f64, what: &str) -> Result<(), DomainError> {
    if !amount.is_finite() {
        return Err(DomainError::validation(format!("{what} must be a number")));
    }
    if amount < 0.0 {
        return Err(DomainError::validation(format!(
            "{what} cannot be negative: {amount:.2}"
        )));
    }
    let scaled = amount * 100.0;
    if (scaled - scaled.round()).abs() > 1e-6 {
        return Err(DomainError::validation(format!(
            "{what} cannot have more than 2 decimal places: {amount}"
        )));
    }
    Ok(())
}

/// True when two cash amounts differ by less than half a cent.
pub(crate) fn cash_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < CENT_EPSILON
}

// ---------------------------------------------------------------------------
// Variance
// ---------------------------------------------------------------------------

/// Reasons a cash count can disagree with the system figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VarianceReason {
    CountingError,
    UnrecordedSale,
    UnrecordedExpense,
    ChangeError,
    Theft,
    Other,
}

/// The signed difference between theoretically expected cash and physically
/// counted cash at shift close. A non-zero amount must be documented with a
/// reason and notes before the shift can be closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variance {
    pub system_cash: f64,
    pub actual_cash: f64,
    /// `actual_cash - system_cash`; negative means cash is missing.
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VarianceReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Variance {
    /// Compute the variance between the system figure and a counted amount.
    pub fn new(system_cash: f64, actual_cash: f64) -> Result<Self, DomainError> {
        validate_cash_amount(actual_cash, "actual cash")?;
        Ok(Self {
            system_cash,
            actual_cash,
            amount: actual_cash - system_cash,
            reason: None,
            notes: None,
        })
    }

    /// A variance needs documentation iff its amount is non-zero.
    pub fn requires_documentation(&self) -> bool {
        !cash_eq(self.amount, 0.0)
    }

    /// True once a reason and notes have been recorded.
    pub fn is_documented(&self) -> bool {
        self.reason.is_some() && self.notes.is_some()
    }

    /// Attach a reason and explanatory notes, returning the documented value.
    ///
    /// Notes must carry at least 10 characters — "miscount" is not an
    /// explanation an auditor can act on.
    pub fn document(&self, reason: VarianceReason, notes: &str) -> Result<Self, DomainError> {
        if !self.requires_documentation() {
            return Err(DomainError::workflow(
                "variance is zero and does not require documentation",
            ));
        }
        if self.is_documented() {
            return Err(DomainError::workflow("variance is already documented"));
        }
        let notes = notes.trim();
        if notes.chars().count() < MIN_VARIANCE_NOTES_LEN {
            return Err(DomainError::validation(format!(
                "variance notes must be at least {MIN_VARIANCE_NOTES_LEN} characters"
            )));
        }
        let mut documented = self.clone();
        documented.reason = Some(reason);
        documented.notes = Some(notes.to_string());
        Ok(documented)
    }
}

// ---------------------------------------------------------------------------
// Responsibility confirmation
// ---------------------------------------------------------------------------

/// Recorded acknowledgment that the cashier is accountable for the shift's
/// financial outcome. All three fields are mandatory and immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsibilityConfirmation {
    pub user_id: String,
    pub device_id: String,
    pub confirmed_at: DateTime<Utc>,
}

impl ResponsibilityConfirmation {
    pub fn new(
        user_id: &str,
        device_id: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if user_id.trim().is_empty() {
            return Err(DomainError::validation("confirmation requires a user id"));
        }
        if device_id.trim().is_empty() {
            return Err(DomainError::validation("confirmation requires a device id"));
        }
        if confirmed_at.timestamp_millis() <= 0 {
            return Err(DomainError::validation("confirmation requires a timestamp"));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            confirmed_at,
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
