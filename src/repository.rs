//! Document stores over the SQLite layer.
//!
//! One store per aggregate. Each row carries the full aggregate as a JSON
//! `doc` plus the columns the precondition queries filter on. `save` is a
//! single `INSERT OR REPLACE`, so a persisted aggregate is always a complete,
//! internally consistent document — there is no partial-update path.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::cashier_shift::CashierShift;
use crate::db::DbState;
use crate::error::DomainError;
use crate::handover::{CashDiscrepancy, CashHandover, HandoverStatus};
use crate::orders::Order;
use crate::shifts::{Shift, ShiftRole, ShiftStatus};

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

pub struct OrderStore<'a> {
    db: &'a DbState,
}

impl<'a> OrderStore<'a> {
    pub fn new(db: &'a DbState) -> Self {
        Self { db }
    }

    pub fn load(&self, id: &str) -> Result<Order, DomainError> {
        let conn = self.db.lock()?;
        let doc: Option<String> = conn
            .query_row("SELECT doc FROM orders WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        match doc {
            Some(doc) => Ok(serde_json::from_str(&doc)?),
            None => Err(DomainError::not_found("order", id)),
        }
    }

    pub fn save(&self, order: &Order) -> Result<(), DomainError> {
        let doc = serde_json::to_string(order)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO orders (id, status, waiter_id, doc, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                order.id,
                order.status.to_string(),
                order.waiter_id,
                doc,
                order.created_at.to_rfc3339(),
                order.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Orders opened against a given waiter shift, oldest first.
    pub fn find_by_shift(&self, waiter_shift_id: &str) -> Result<Vec<Order>, DomainError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT doc FROM orders WHERE json_extract(doc, '$.waiter_shift_id') = ?1
             ORDER BY created_at",
        )?;
        let docs = stmt
            .query_map([waiter_shift_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        docs.iter()
            .map(|d| serde_json::from_str(d).map_err(DomainError::from))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Waiter/barista shifts
// ---------------------------------------------------------------------------

pub struct ShiftStore<'a> {
    db: &'a DbState,
}

impl<'a> ShiftStore<'a> {
    pub fn new(db: &'a DbState) -> Self {
        Self { db }
    }

    pub fn load(&self, id: &str) -> Result<Shift, DomainError> {
        let conn = self.db.lock()?;
        let doc: Option<String> = conn
            .query_row("SELECT doc FROM shifts WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        match doc {
            Some(doc) => Ok(serde_json::from_str(&doc)?),
            None => Err(DomainError::not_found("shift", id)),
        }
    }

    pub fn save(&self, shift: &Shift) -> Result<(), DomainError> {
        let doc = serde_json::to_string(shift)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO shifts (id, user_id, role, status, doc, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                shift.id,
                shift.user_id,
                shift.role.to_string(),
                shift.status.to_string(),
                doc,
                shift.started_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The user's open shift in `role`, if any. Backs the one-open-shift
    /// uniqueness guard.
    pub fn find_open(&self, user_id: &str, role: ShiftRole) -> Result<Option<Shift>, DomainError> {
        let conn = self.db.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM shifts
                 WHERE user_id = ?1 AND role = ?2 AND status = ?3
                 LIMIT 1",
                params![user_id, role.to_string(), ShiftStatus::Open.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|d| serde_json::from_str(&d).map_err(DomainError::from))
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Cashier shifts
// ---------------------------------------------------------------------------

pub struct CashierShiftStore<'a> {
    db: &'a DbState,
}

impl<'a> CashierShiftStore<'a> {
    pub fn new(db: &'a DbState) -> Self {
        Self { db }
    }

    pub fn load(&self, id: &str) -> Result<CashierShift, DomainError> {
        let conn = self.db.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM cashier_shifts WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        match doc {
            Some(doc) => Ok(serde_json::from_str(&doc)?),
            None => Err(DomainError::not_found("cashier shift", id)),
        }
    }

    pub fn save(&self, shift: &CashierShift) -> Result<(), DomainError> {
        let doc = serde_json::to_string(shift)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO cashier_shifts
                (id, cashier_id, status, doc, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                shift.id,
                shift.cashier_id,
                shift.status.to_string(),
                doc,
                shift.start_time.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The cashier's open shift, if any. "Open" here means not CLOSED —
    /// a shift mid-closure still blocks opening another.
    pub fn find_open_by_cashier(
        &self,
        cashier_id: &str,
    ) -> Result<Option<CashierShift>, DomainError> {
        let conn = self.db.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM cashier_shifts
                 WHERE cashier_id = ?1 AND status != 'CLOSED'
                 LIMIT 1",
                [cashier_id],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|d| serde_json::from_str(&d).map_err(DomainError::from))
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Handovers and discrepancies
// ---------------------------------------------------------------------------

pub struct HandoverStore<'a> {
    db: &'a DbState,
}

impl<'a> HandoverStore<'a> {
    pub fn new(db: &'a DbState) -> Self {
        Self { db }
    }

    pub fn load(&self, id: &str) -> Result<CashHandover, DomainError> {
        let conn = self.db.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM cash_handovers WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        match doc {
            Some(doc) => Ok(serde_json::from_str(&doc)?),
            None => Err(DomainError::not_found("handover", id)),
        }
    }

    pub fn save(&self, handover: &CashHandover) -> Result<(), DomainError> {
        let doc = serde_json::to_string(handover)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO cash_handovers
                (id, waiter_shift_id, status, doc, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                handover.id,
                handover.waiter_shift_id,
                handover.status.to_string(),
                doc,
                handover.requested_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The waiter shift's pending handover, if one exists. Backs the
    /// one-pending-per-shift guard.
    pub fn find_pending_by_shift(
        &self,
        waiter_shift_id: &str,
    ) -> Result<Option<CashHandover>, DomainError> {
        let conn = self.db.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM cash_handovers
                 WHERE waiter_shift_id = ?1 AND status = ?2
                 LIMIT 1",
                params![waiter_shift_id, HandoverStatus::Pending.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|d| serde_json::from_str(&d).map_err(DomainError::from))
            .transpose()
    }
}

pub struct DiscrepancyStore<'a> {
    db: &'a DbState,
}

impl<'a> DiscrepancyStore<'a> {
    pub fn new(db: &'a DbState) -> Self {
        Self { db }
    }

    pub fn load(&self, id: &str) -> Result<CashDiscrepancy, DomainError> {
        let conn = self.db.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM cash_discrepancies WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        match doc {
            Some(doc) => Ok(serde_json::from_str(&doc)?),
            None => Err(DomainError::not_found("discrepancy", id)),
        }
    }

    pub fn save(&self, record: &CashDiscrepancy) -> Result<(), DomainError> {
        let doc = serde_json::to_string(record)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO cash_discrepancies
                (id, handover_id, status, doc, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.handover_id,
                record.status.to_string(),
                doc,
                record.created_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_handover(
        &self,
        handover_id: &str,
    ) -> Result<Vec<CashDiscrepancy>, DomainError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT doc FROM cash_discrepancies WHERE handover_id = ?1 ORDER BY created_at",
        )?;
        let docs = stmt
            .query_map([handover_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        docs.iter()
            .map(|d| serde_json::from_str(d).map_err(DomainError::from))
            .collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
