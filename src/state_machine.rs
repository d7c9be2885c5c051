//! Unified validation facade over the three lifecycle machines.
//!
//! `StateMachineManager` is the single entry point the command layer asks
//! "may this event fire?" before mutating anything. Per machine it delegates
//! to the aggregate's own validators; the one special case is
//! CLOSE_SHIFT on a cashier shift, which is a compound precondition (count
//! done, variance documented, responsibility confirmed) rather than a plain
//! adjacency edge.

use crate::cashier_shift::{
    self, CashierShift, CashierShiftEvent, CashierShiftStatus,
};
use crate::error::DomainError;
use crate::order_state::{self, OrderEvent, OrderStatus};
use crate::orders::Order;
use crate::shifts::{Shift, ShiftEvent};

/// Stateless validation facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct StateMachineManager;

impl StateMachineManager {
    pub fn new() -> Self {
        Self
    }

    // -- orders --

    /// Full order validation: adjacency plus the aggregate's business guards
    /// (payment present before refund, non-empty items before queueing, …).
    pub fn validate_order_event(&self, order: &Order, event: OrderEvent) -> Result<(), DomainError> {
        order.validate_event(event)
    }

    /// Table-level adjacency check, with no aggregate at hand.
    pub fn validate_order_transition(
        &self,
        state: OrderStatus,
        event: OrderEvent,
    ) -> Result<OrderStatus, DomainError> {
        order_state::transition(state, event)
    }

    pub fn order_valid_events(&self, state: OrderStatus) -> Vec<OrderEvent> {
        order_state::valid_events(state)
    }

    pub fn order_is_terminal(&self, state: OrderStatus) -> bool {
        order_state::is_terminal(state)
    }

    pub fn order_progress(&self, state: OrderStatus) -> u8 {
        order_state::progress(state)
    }

    // -- waiter/barista shifts --

    pub fn validate_shift_event(&self, shift: &Shift, event: ShiftEvent) -> Result<(), DomainError> {
        shift.validate_event(event)
    }

    // -- cashier shifts --

    /// Validate a cashier shift event against both the adjacency table and
    /// the closure workflow's step ordering. CLOSE_SHIFT runs the full
    /// compound precondition.
    pub fn validate_cashier_shift_event(
        &self,
        shift: &CashierShift,
        event: CashierShiftEvent,
    ) -> Result<(), DomainError> {
        match event {
            CashierShiftEvent::InitiateClosure => cashier_shift::validate_initiate_closure(shift),
            CashierShiftEvent::CancelClosure => cashier_shift::validate_cancel_closure(shift),
            CashierShiftEvent::RecordActualCash => cashier_shift::validate_record_actual_cash(shift),
            CashierShiftEvent::DocumentVariance => cashier_shift::validate_document_variance(shift),
            CashierShiftEvent::ConfirmResponsibility => {
                cashier_shift::validate_confirm_responsibility(shift)
            }
            CashierShiftEvent::CloseShift => shift.can_close(),
        }
    }

    /// Events that would currently pass full validation for this shift.
    pub fn cashier_shift_valid_events(&self, shift: &CashierShift) -> Vec<CashierShiftEvent> {
        use CashierShiftEvent::*;
        [
            InitiateClosure,
            CancelClosure,
            RecordActualCash,
            DocumentVariance,
            ConfirmResponsibility,
            CloseShift,
        ]
        .into_iter()
        .filter(|e| self.validate_cashier_shift_event(shift, *e).is_ok())
        .collect()
    }

    /// Label for the next pending closure step, for operator-facing UX.
    pub fn cashier_shift_next_step(&self, shift: &CashierShift) -> Option<&'static str> {
        match shift.status {
            CashierShiftStatus::ClosureInitiated => Some(cashier_shift::next_required_step(shift)),
            CashierShiftStatus::Open | CashierShiftStatus::Closed => None,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(min: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 22, min, 0).unwrap()
    }

    #[test]
    fn test_order_passthroughs_agree_with_table() {
        let sm = StateMachineManager::new();
        assert_eq!(
            sm.validate_order_transition(OrderStatus::Created, OrderEvent::Pay)
                .unwrap(),
            OrderStatus::Paid
        );
        assert!(sm
            .validate_order_transition(OrderStatus::Served, OrderEvent::Cancel)
            .is_err());
        assert!(sm.order_is_terminal(OrderStatus::Locked));
        assert_eq!(sm.order_progress(OrderStatus::Ready), 80);
        assert_eq!(
            sm.order_valid_events(OrderStatus::Paid),
            vec![OrderEvent::SendToBar, OrderEvent::Cancel, OrderEvent::Refund]
        );
    }

    #[test]
    fn test_close_shift_is_compound_not_adjacency() {
        let sm = StateMachineManager::new();
        let shift = CashierShift::open("cashier-1", "Marco", "till-1", 100000.0, ts(0))
            .unwrap()
            .initiate_closure("cashier-1", "till-1", ts(1))
            .unwrap();

        // Adjacency alone would allow CLOSE_SHIFT here; the facade does not.
        assert!(shift.validate_event(CashierShiftEvent::CloseShift).is_ok());
        assert!(sm
            .validate_cashier_shift_event(&shift, CashierShiftEvent::CloseShift)
            .is_err());

        let (shift, _) = shift
            .record_actual_cash(100000.0, "cashier-1", "till-1", ts(2))
            .unwrap();
        let shift = shift
            .confirm_responsibility("cashier-1", "till-1", ts(3))
            .unwrap();
        assert!(sm
            .validate_cashier_shift_event(&shift, CashierShiftEvent::CloseShift)
            .is_ok());
    }

    #[test]
    fn test_cashier_valid_events_track_workflow() {
        let sm = StateMachineManager::new();
        let open = CashierShift::open("cashier-1", "Marco", "till-1", 100000.0, ts(0)).unwrap();
        assert_eq!(
            sm.cashier_shift_valid_events(&open),
            vec![CashierShiftEvent::InitiateClosure]
        );
        assert_eq!(sm.cashier_shift_next_step(&open), None);

        let initiated = open.initiate_closure("cashier-1", "till-1", ts(1)).unwrap();
        assert_eq!(
            sm.cashier_shift_valid_events(&initiated),
            vec![
                CashierShiftEvent::CancelClosure,
                CashierShiftEvent::RecordActualCash,
            ]
        );
        assert_eq!(
            sm.cashier_shift_next_step(&initiated),
            Some("record actual cash")
        );

        let (counted, _) = initiated
            .record_actual_cash(95000.0, "cashier-1", "till-1", ts(2))
            .unwrap();
        // Cancel is gone once cash is counted; documentation is now pending
        assert_eq!(
            sm.cashier_shift_valid_events(&counted),
            vec![CashierShiftEvent::DocumentVariance]
        );
        assert_eq!(sm.cashier_shift_next_step(&counted), Some("document variance"));
    }

    #[test]
    fn test_shift_event_validation() {
        let sm = StateMachineManager::new();
        let shift = crate::shifts::Shift::open(
            "user-1",
            "Ana",
            crate::shifts::ShiftRole::Waiter,
            0.0,
            ts(0),
        )
        .unwrap();
        assert!(sm.validate_shift_event(&shift, ShiftEvent::EndShift).is_ok());
        let ended = shift.end(ts(1)).unwrap();
        assert!(sm
            .validate_shift_event(&ended, ShiftEvent::EndShift)
            .is_err());
    }
}
