//! Order status state machine for Brew POS.
//!
//! Pure transition table: no storage, no aggregates. The `Order` aggregate in
//! `orders.rs` layers business guards (non-zero total, non-empty items, …) on
//! top of the adjacency rules defined here.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// ---------------------------------------------------------------------------
// States and events
// ---------------------------------------------------------------------------

/// Order lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Paid,
    Queued,
    InProgress,
    Ready,
    Served,
    Cancelled,
    Refunded,
    Locked,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Paid => "PAID",
            Self::Queued => "QUEUED",
            Self::InProgress => "IN_PROGRESS",
            Self::Ready => "READY",
            Self::Served => "SERVED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
            Self::Locked => "LOCKED",
        };
        f.write_str(s)
    }
}

/// Events that drive order transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    Pay,
    SendToBar,
    StartPreparing,
    MarkReady,
    Serve,
    Lock,
    Cancel,
    Refund,
}

impl std::fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pay => "PAY",
            Self::SendToBar => "SEND_TO_BAR",
            Self::StartPreparing => "START_PREPARING",
            Self::MarkReady => "MARK_READY",
            Self::Serve => "SERVE",
            Self::Lock => "LOCK",
            Self::Cancel => "CANCEL",
            Self::Refund => "REFUND",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// The adjacency table. Unknown (state, event) pairs return `None` — callers
/// get an explicit `InvalidTransition`, never a silent default.
fn next_state(state: OrderStatus, event: OrderEvent) -> Option<OrderStatus> {
    use OrderEvent::*;
    use OrderStatus::*;
    match (state, event) {
        (Created, Pay) => Some(Paid),
        (Created, Cancel) => Some(Cancelled),
        (Paid, SendToBar) => Some(Queued),
        (Paid, Cancel) => Some(Cancelled),
        (Paid, Refund) => Some(Refunded),
        (Queued, StartPreparing) => Some(InProgress),
        (Queued, Cancel) => Some(Cancelled),
        (InProgress, MarkReady) => Some(Ready),
        (InProgress, Cancel) => Some(Cancelled),
        (Ready, Serve) => Some(Served),
        (Served, Lock) => Some(Locked),
        (Served, Refund) => Some(Refunded),
        _ => None,
    }
}

/// Whether `event` is defined for `state`.
pub fn can_transition(state: OrderStatus, event: OrderEvent) -> bool {
    next_state(state, event).is_some()
}

/// Resolve the next state, or an `InvalidTransition` naming both sides.
pub fn transition(state: OrderStatus, event: OrderEvent) -> Result<OrderStatus, DomainError> {
    next_state(state, event).ok_or_else(|| DomainError::invalid_transition(state, event))
}

/// All events currently valid for `state` (empty for terminal states).
pub fn valid_events(state: OrderStatus) -> Vec<OrderEvent> {
    use OrderEvent::*;
    [Pay, SendToBar, StartPreparing, MarkReady, Serve, Lock, Cancel, Refund]
        .into_iter()
        .filter(|e| can_transition(state, *e))
        .collect()
}

/// True for states with an empty transition set.
pub fn is_terminal(state: OrderStatus) -> bool {
    valid_events(state).is_empty()
}

/// Fulfillment progress percentage for UI display. Monotonic along the happy
/// path; terminal cancel/refund report 0.
pub fn progress(state: OrderStatus) -> u8 {
    match state {
        OrderStatus::Created => 10,
        OrderStatus::Paid => 25,
        OrderStatus::Queued => 40,
        OrderStatus::InProgress => 60,
        OrderStatus::Ready => 80,
        OrderStatus::Served => 95,
        OrderStatus::Locked => 100,
        OrderStatus::Cancelled | OrderStatus::Refunded => 0,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [OrderStatus; 9] = [
        OrderStatus::Created,
        OrderStatus::Paid,
        OrderStatus::Queued,
        OrderStatus::InProgress,
        OrderStatus::Ready,
        OrderStatus::Served,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Locked,
    ];

    const ALL_EVENTS: [OrderEvent; 8] = [
        OrderEvent::Pay,
        OrderEvent::SendToBar,
        OrderEvent::StartPreparing,
        OrderEvent::MarkReady,
        OrderEvent::Serve,
        OrderEvent::Lock,
        OrderEvent::Cancel,
        OrderEvent::Refund,
    ];

    #[test]
    fn test_happy_path_walk() {
        let mut state = OrderStatus::Created;
        for (event, expected) in [
            (OrderEvent::Pay, OrderStatus::Paid),
            (OrderEvent::SendToBar, OrderStatus::Queued),
            (OrderEvent::StartPreparing, OrderStatus::InProgress),
            (OrderEvent::MarkReady, OrderStatus::Ready),
            (OrderEvent::Serve, OrderStatus::Served),
            (OrderEvent::Lock, OrderStatus::Locked),
        ] {
            state = transition(state, event).unwrap();
            assert_eq!(state, expected);
        }
        assert!(is_terminal(state));
    }

    #[test]
    fn test_undefined_pairs_error_and_name_both_sides() {
        for state in ALL_STATES {
            for event in ALL_EVENTS {
                if can_transition(state, event) {
                    continue;
                }
                let err = transition(state, event).unwrap_err();
                match err {
                    DomainError::InvalidTransition { state: s, event: e } => {
                        assert_eq!(s, state.to_string());
                        assert_eq!(e, event.to_string());
                    }
                    other => panic!("expected InvalidTransition, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_events() {
        for state in [
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
            OrderStatus::Locked,
        ] {
            assert!(is_terminal(state), "{state} should be terminal");
            assert!(valid_events(state).is_empty());
        }
        assert!(!is_terminal(OrderStatus::Served));
    }

    #[test]
    fn test_progress_is_monotonic_on_happy_path() {
        let path = [
            OrderStatus::Created,
            OrderStatus::Paid,
            OrderStatus::Queued,
            OrderStatus::InProgress,
            OrderStatus::Ready,
            OrderStatus::Served,
            OrderStatus::Locked,
        ];
        for pair in path.windows(2) {
            assert!(progress(pair[0]) < progress(pair[1]));
        }
        assert_eq!(progress(OrderStatus::Cancelled), 0);
        assert_eq!(progress(OrderStatus::Refunded), 0);
        assert_eq!(progress(OrderStatus::Locked), 100);
    }

    #[test]
    fn test_status_serde_uses_wire_names() {
        let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let event: OrderEvent = serde_json::from_str("\"SEND_TO_BAR\"").unwrap();
        assert_eq!(event, OrderEvent::SendToBar);
    }
}
