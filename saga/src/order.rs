//! The order saga state machine: statuses, the transition table, and
//! the `Order` record itself.
//!
//! Generalizes the teacher's `services-oms::lifecycle::OrderLifecycleManager`
//! (a `HashMap<OrderStatus, Vec<OrderStatus>>` of legal next-states) from
//! a trading order's fill lifecycle to the manufacturing saga's forward
//! and compensating paths (spec.md §4.1).

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Every status an order can occupy, forward path plus the three
/// cancellation branches described in spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    DeliveryPending,
    PaymentPending,
    Queued,
    Produced,
    Delivering,
    Delivered,
    DeliveryCanceling,
    OrderCancelDeliveryPending,
    OrderCancelPaymentPending,
    OrderCancelWarehousePending,
    OrderCancelPaymentRecharging,
    OrderCancelDeliveryRedelivering,
    Canceled,
}

impl OrderStatus {
    /// `Delivered` and `Canceled` are terminal; no transition leaves them.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Canceled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Parse error for [`OrderStatus::from_str`]; the saga log stores
/// statuses as their `Display` text and must round-trip them.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized order status: {0}")]
pub struct ParseOrderStatusError(String);

impl std::str::FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "DeliveryPending" => Self::DeliveryPending,
            "PaymentPending" => Self::PaymentPending,
            "Queued" => Self::Queued,
            "Produced" => Self::Produced,
            "Delivering" => Self::Delivering,
            "Delivered" => Self::Delivered,
            "DeliveryCanceling" => Self::DeliveryCanceling,
            "OrderCancelDeliveryPending" => Self::OrderCancelDeliveryPending,
            "OrderCancelPaymentPending" => Self::OrderCancelPaymentPending,
            "OrderCancelWarehousePending" => Self::OrderCancelWarehousePending,
            "OrderCancelPaymentRecharging" => Self::OrderCancelPaymentRecharging,
            "OrderCancelDeliveryRedelivering" => Self::OrderCancelDeliveryRedelivering,
            "Canceled" => Self::Canceled,
            other => return Err(ParseOrderStatusError(other.to_string())),
        })
    }
}

/// The legal-transition table described in spec.md §4.1, keyed by
/// current status. Built once and consulted on every mutation attempt.
pub struct OrderLifecycle {
    valid_transitions: FxHashMap<OrderStatus, Vec<OrderStatus>>,
}

impl Default for OrderLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderLifecycle {
    /// Build the transition table for the full saga (forward path plus
    /// all three cancellation branches).
    #[must_use]
    pub fn new() -> Self {
        use OrderStatus::{
            Canceled, DeliveryCanceling, DeliveryPending, Delivered, Delivering,
            OrderCancelDeliveryPending, OrderCancelDeliveryRedelivering, OrderCancelPaymentPending,
            OrderCancelPaymentRecharging, OrderCancelWarehousePending, PaymentPending, Produced,
            Queued,
        };

        let mut valid_transitions = FxHashMap::default();
        valid_transitions.insert(DeliveryPending, vec![PaymentPending, Canceled]);
        valid_transitions.insert(PaymentPending, vec![Queued, DeliveryCanceling]);
        valid_transitions.insert(DeliveryCanceling, vec![Canceled]);
        valid_transitions.insert(Queued, vec![Produced, OrderCancelDeliveryPending]);
        valid_transitions.insert(Produced, vec![Delivering]);
        valid_transitions.insert(Delivering, vec![Delivered]);
        valid_transitions.insert(Delivered, vec![]);
        valid_transitions.insert(Canceled, vec![]);
        valid_transitions.insert(OrderCancelDeliveryPending, vec![OrderCancelPaymentPending]);
        valid_transitions.insert(
            OrderCancelPaymentPending,
            vec![OrderCancelWarehousePending],
        );
        valid_transitions.insert(
            OrderCancelWarehousePending,
            vec![Canceled, OrderCancelPaymentRecharging],
        );
        valid_transitions.insert(
            OrderCancelPaymentRecharging,
            vec![OrderCancelDeliveryRedelivering],
        );
        valid_transitions.insert(OrderCancelDeliveryRedelivering, vec![Queued]);

        Self { valid_transitions }
    }

    /// Whether `from -> to` is a legal single step.
    #[must_use]
    pub fn can_transition(&self, from: OrderStatus, to: OrderStatus) -> bool {
        self.valid_transitions
            .get(&from)
            .is_some_and(|next| next.contains(&to))
    }

    /// The set of statuses reachable in one step from `from`.
    #[must_use]
    pub fn valid_next(&self, from: OrderStatus) -> &[OrderStatus] {
        self.valid_transitions
            .get(&from)
            .map_or(&[], Vec::as_slice)
    }

    /// Whether a user-initiated cancel is admissible from the order's
    /// current status (only `Queued`, per spec.md §6's
    /// `POST /order/cancel/{order_id}` contract).
    #[must_use]
    pub const fn can_cancel(status: OrderStatus) -> bool {
        matches!(status, OrderStatus::Queued)
    }
}

/// The order record. Mutated only by the orchestrator (spec.md §4.1
/// invariant 4); every other participant learns of it only through
/// messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub client_id: String,
    pub count_a: u32,
    pub count_b: u32,
    pub description: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A freshly created order always starts `DeliveryPending`
    /// (spec.md §3).
    #[must_use]
    pub fn new(client_id: String, count_a: u32, count_b: u32, description: String) -> Self {
        let now = Utc::now();
        Self {
            order_id: Uuid::new_v4(),
            client_id,
            count_a,
            count_b,
            description,
            status: OrderStatus::DeliveryPending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OrderStatus::DeliveryPending, OrderStatus::PaymentPending, true)]
    #[case(OrderStatus::DeliveryPending, OrderStatus::Canceled, true)]
    #[case(OrderStatus::DeliveryPending, OrderStatus::Queued, false)]
    #[case(OrderStatus::PaymentPending, OrderStatus::Queued, true)]
    #[case(OrderStatus::PaymentPending, OrderStatus::DeliveryCanceling, true)]
    #[case(OrderStatus::Queued, OrderStatus::OrderCancelDeliveryPending, true)]
    #[case(OrderStatus::OrderCancelWarehousePending, OrderStatus::Canceled, true)]
    #[case(
        OrderStatus::OrderCancelWarehousePending,
        OrderStatus::OrderCancelPaymentRecharging,
        true
    )]
    #[case(OrderStatus::OrderCancelDeliveryRedelivering, OrderStatus::Queued, true)]
    #[case(OrderStatus::Delivered, OrderStatus::Queued, false)]
    fn transition_table_matches_spec(
        #[case] from: OrderStatus,
        #[case] to: OrderStatus,
        #[case] expected: bool,
    ) {
        let lifecycle = OrderLifecycle::new();
        assert_eq!(lifecycle.can_transition(from, to), expected);
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_transitions() {
        let lifecycle = OrderLifecycle::new();
        assert!(lifecycle.valid_next(OrderStatus::Delivered).is_empty());
        assert!(lifecycle.valid_next(OrderStatus::Canceled).is_empty());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(!OrderStatus::Queued.is_terminal());
    }

    #[test]
    fn only_queued_orders_are_user_cancelable() {
        assert!(OrderLifecycle::can_cancel(OrderStatus::Queued));
        assert!(!OrderLifecycle::can_cancel(OrderStatus::PaymentPending));
        assert!(!OrderLifecycle::can_cancel(OrderStatus::Delivered));
    }

    #[test]
    fn status_display_parse_round_trips() {
        for status in [
            OrderStatus::DeliveryPending,
            OrderStatus::OrderCancelPaymentRecharging,
            OrderStatus::Canceled,
        ] {
            let parsed: OrderStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn new_order_starts_delivery_pending() {
        let order = Order::new("client-7".to_string(), 2, 1, "two A one B".to_string());
        assert_eq!(order.status, OrderStatus::DeliveryPending);
    }
}
