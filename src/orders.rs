//! Order aggregate and order services for Brew POS.
//!
//! The aggregate enforces the money invariant (`total = max(0, subtotal -
//! discount)`) and the business guards layered over the pure adjacency table
//! in `order_state.rs`. Operations are pure: each returns a new `Order` value
//! and the caller persists it as one atomic document write. Terminal orders
//! (`CANCELLED`, `REFUNDED`, `LOCKED`) are immutable thereafter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::DbState;
use crate::error::DomainError;
use crate::order_state::{self, OrderEvent, OrderStatus};
use crate::repository::{OrderStore, ShiftStore};
use crate::shifts::ShiftRole;
use crate::values::validate_cash_amount;

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// How an order was paid. Recorded at payment time; refunds require it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
}

/// One line on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

/// Order aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub amount_paid: f64,
    pub amount_due: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    pub waiter_id: String,
    pub waiter_shift_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barista_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preparing_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new order in `CREATED` state for a waiter's open shift.
    ///
    /// Subtotal is derived from the item lines; the stored total always
    /// satisfies `total = max(0, subtotal - discount)`.
    pub fn new(
        waiter_id: &str,
        waiter_shift_id: &str,
        items: Vec<OrderItem>,
        discount: f64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if waiter_id.trim().is_empty() {
            return Err(DomainError::validation("order requires a waiter id"));
        }
        if waiter_shift_id.trim().is_empty() {
            return Err(DomainError::validation("order requires a waiter shift id"));
        }
        validate_cash_amount(discount, "discount")?;
        for item in &items {
            if item.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "item '{}' has zero quantity",
                    item.name
                )));
            }
            validate_cash_amount(item.unit_price, "item unit price")?;
        }

        let subtotal: f64 = items
            .iter()
            .map(|i| i.unit_price * f64::from(i.quantity))
            .sum();
        let total = (subtotal - discount).max(0.0);

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            status: OrderStatus::Created,
            items,
            subtotal,
            discount,
            total,
            amount_paid: 0.0,
            amount_due: total,
            payment_method: None,
            waiter_id: waiter_id.to_string(),
            waiter_shift_id: waiter_shift_id.to_string(),
            barista_id: None,
            created_at,
            paid_at: None,
            queued_at: None,
            preparing_at: None,
            ready_at: None,
            served_at: None,
            locked_at: None,
            cancelled_at: None,
            refunded_at: None,
            updated_at: created_at,
        })
    }

    /// Business guards beyond pure adjacency. Checked by every mutator and
    /// usable standalone for pre-flight validation.
    pub fn validate_event(&self, event: OrderEvent) -> Result<(), DomainError> {
        // Cancel after serving gets an explicit diagnosable error even though
        // the adjacency table already excludes it.
        if event == OrderEvent::Cancel
            && matches!(self.status, OrderStatus::Served | OrderStatus::Locked)
        {
            return Err(DomainError::workflow(
                "cannot cancel an order that has already been served",
            ));
        }

        order_state::transition(self.status, event)?;

        match event {
            OrderEvent::Pay if self.total <= 0.0 => Err(DomainError::workflow(
                "cannot pay an order with a zero total",
            )),
            OrderEvent::SendToBar if self.items.is_empty() => Err(DomainError::workflow(
                "cannot send an order with no items to the bar",
            )),
            OrderEvent::Refund if self.payment_method.is_none() => Err(DomainError::workflow(
                "cannot refund an order with no recorded payment method",
            )),
            _ => Ok(()),
        }
    }

    /// True while the order can still be cancelled (through `IN_PROGRESS`).
    pub fn can_cancel(&self) -> bool {
        self.validate_event(OrderEvent::Cancel).is_ok()
    }

    /// Record full payment. Sets `amount_paid`/`amount_due` and the payment
    /// method the refund guard depends on.
    pub fn pay(&self, method: PaymentMethod, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut next = self.advanced(OrderEvent::Pay, ts)?;
        next.payment_method = Some(method);
        next.amount_paid = next.total;
        next.amount_due = 0.0;
        next.paid_at = Some(ts);
        Ok(next)
    }

    /// Queue the order for the bar.
    pub fn send_to_bar(&self, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut next = self.advanced(OrderEvent::SendToBar, ts)?;
        next.queued_at = Some(ts);
        Ok(next)
    }

    /// Barista picks the order up.
    pub fn start_preparing(&self, barista_id: &str, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        if barista_id.trim().is_empty() {
            return Err(DomainError::validation("preparing requires a barista id"));
        }
        let mut next = self.advanced(OrderEvent::StartPreparing, ts)?;
        next.barista_id = Some(barista_id.to_string());
        next.preparing_at = Some(ts);
        Ok(next)
    }

    pub fn mark_ready(&self, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut next = self.advanced(OrderEvent::MarkReady, ts)?;
        next.ready_at = Some(ts);
        Ok(next)
    }

    pub fn serve(&self, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut next = self.advanced(OrderEvent::Serve, ts)?;
        next.served_at = Some(ts);
        Ok(next)
    }

    /// Lock a served order, making it immutable.
    pub fn lock(&self, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut next = self.advanced(OrderEvent::Lock, ts)?;
        next.locked_at = Some(ts);
        Ok(next)
    }

    pub fn cancel(&self, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut next = self.advanced(OrderEvent::Cancel, ts)?;
        next.cancelled_at = Some(ts);
        Ok(next)
    }

    pub fn refund(&self, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut next = self.advanced(OrderEvent::Refund, ts)?;
        next.refunded_at = Some(ts);
        next.amount_due = 0.0;
        Ok(next)
    }

    /// Shared transition core: guards, adjacency, status, `updated_at`.
    fn advanced(&self, event: OrderEvent, ts: DateTime<Utc>) -> Result<Self, DomainError> {
        self.validate_event(event)?;
        let mut next = self.clone();
        next.status = order_state::transition(self.status, event)?;
        next.updated_at = ts;
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Create an order for a waiter. The waiter must have an open shift — order
/// creation is gated on the waiter shift lifecycle.
pub fn create_order(
    db: &DbState,
    waiter_id: &str,
    items: Vec<OrderItem>,
    discount: f64,
) -> Result<Order, DomainError> {
    let shift = ShiftStore::new(db)
        .find_open(waiter_id, ShiftRole::Waiter)?
        .ok_or_else(|| {
            DomainError::workflow(format!("waiter {waiter_id} has no open shift"))
        })?;

    let order = Order::new(waiter_id, &shift.id, items, discount, Utc::now())?;
    OrderStore::new(db).save(&order)?;

    info!(order_id = %order.id, waiter_id = %waiter_id, total = %order.total, "Order created");
    Ok(order)
}

/// Record payment for an order. Cash payments also bump the waiter shift's
/// running cash total so closure reconciliation has a figure to compare
/// against.
pub fn pay_order(
    db: &DbState,
    order_id: &str,
    method: PaymentMethod,
) -> Result<Order, DomainError> {
    let orders = OrderStore::new(db);
    let shifts = ShiftStore::new(db);
    let order = orders.load(order_id)?;
    let paid = order.pay(method, Utc::now())?;

    // Cash lands in the drawer of the shift that owns the order, so that
    // shift must still be open to take the sale. Validated before either
    // document is written — a rejected payment changes nothing.
    let updated_shift = match method {
        PaymentMethod::Cash => {
            let shift = shifts.load(&paid.waiter_shift_id)?;
            Some(shift.add_cash_sale(paid.total)?)
        }
        PaymentMethod::Card => None,
    };

    orders.save(&paid)?;
    if let Some(shift) = &updated_shift {
        shifts.save(shift)?;
    }

    info!(order_id = %order_id, amount = %paid.total, method = ?method, "Order paid");
    Ok(paid)
}

/// Apply a non-payment lifecycle event to an order and persist the result.
pub fn advance_order(
    db: &DbState,
    order_id: &str,
    event: OrderEvent,
    actor_id: &str,
) -> Result<Order, DomainError> {
    let orders = OrderStore::new(db);
    let order = orders.load(order_id)?;
    let now = Utc::now();

    let next = match event {
        OrderEvent::Pay => {
            return Err(DomainError::validation(
                "use pay_order to record a payment method",
            ))
        }
        OrderEvent::SendToBar => order.send_to_bar(now)?,
        OrderEvent::StartPreparing => order.start_preparing(actor_id, now)?,
        OrderEvent::MarkReady => order.mark_ready(now)?,
        OrderEvent::Serve => order.serve(now)?,
        OrderEvent::Lock => order.lock(now)?,
        OrderEvent::Cancel => order.cancel(now)?,
        OrderEvent::Refund => order.refund(now)?,
    };
    orders.save(&next)?;

    info!(order_id = %order_id, event = %event, status = %next.status, "Order advanced");
    Ok(next)
}

// ===========================================================================
// Tests
// ===========================================================================
