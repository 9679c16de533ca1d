//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The fulfillment status of an order.
///
/// Status transitions:
/// ```text
/// created ──► pending ──► shipped ──► delivered
///    │           │           │
///    └───────────┴───────────┴──► error ──► (retried forward)
/// ```
///
/// `delivered` is terminal. `error` is not: an order left in `error`
/// stays eligible for the next inbound event or reconciliation pass,
/// up to the retry cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order record exists but no shipment has been arranged yet.
    #[default]
    Created,

    /// Shipment registered with the carrier, awaiting a tracking code.
    Pending,

    /// Tracking code assigned and the source notified.
    Shipped,

    /// Delivery confirmed by the carrier (terminal state).
    Delivered,

    /// Last processing attempt failed; retried up to the cap.
    Error,
}

impl OrderStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }

    /// Returns true if an order in this state belongs in the
    /// delivery-reconciliation backlog.
    pub fn is_awaiting_delivery(&self) -> bool {
        matches!(
            self,
            OrderStatus::Created | OrderStatus::Pending | OrderStatus::Shipped
        )
    }

    /// Returns true if an order in this state should not be re-ingested.
    pub fn is_already_processed(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Delivered)
    }

    /// Returns true when a write may move this status to `next`.
    ///
    /// Status only moves forward: a write never regresses a
    /// further-along status, and nothing overrides `delivered`.
    pub fn accepts(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Delivered, Delivered) => true,
            (Delivered, _) => false,
            (_, Error) => true,
            (Error, _) => true,
            (current, next) => next.rank() >= current.rank(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Created => 0,
            OrderStatus::Pending => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Delivered => 3,
            // Off the forward axis; handled before rank comparison.
            OrderStatus::Error => 0,
        }
    }

    /// Returns the status name as stored and reported.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Error => "error",
        }
    }

    /// Parses a stored status name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(OrderStatus::Created),
            "pending" => Some(OrderStatus::Pending),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "error" => Some(OrderStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_created() {
        assert_eq!(OrderStatus::default(), OrderStatus::Created);
    }

    #[test]
    fn test_forward_transitions_accepted() {
        assert!(OrderStatus::Created.accepts(OrderStatus::Pending));
        assert!(OrderStatus::Created.accepts(OrderStatus::Shipped));
        assert!(OrderStatus::Pending.accepts(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.accepts(OrderStatus::Delivered));
        assert!(OrderStatus::Created.accepts(OrderStatus::Created));
    }

    #[test]
    fn test_regressions_rejected() {
        assert!(!OrderStatus::Shipped.accepts(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.accepts(OrderStatus::Created));
        assert!(!OrderStatus::Delivered.accepts(OrderStatus::Shipped));
        assert!(!OrderStatus::Delivered.accepts(OrderStatus::Error));
    }

    #[test]
    fn test_delivered_is_terminal() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Delivered.accepts(OrderStatus::Delivered));
        assert!(!OrderStatus::Error.is_terminal());
    }

    #[test]
    fn test_error_is_reachable_and_retryable() {
        assert!(OrderStatus::Created.accepts(OrderStatus::Error));
        assert!(OrderStatus::Pending.accepts(OrderStatus::Error));
        assert!(OrderStatus::Shipped.accepts(OrderStatus::Error));
        assert!(OrderStatus::Error.accepts(OrderStatus::Pending));
        assert!(OrderStatus::Error.accepts(OrderStatus::Shipped));
        assert!(OrderStatus::Error.accepts(OrderStatus::Delivered));
    }

    #[test]
    fn test_awaiting_delivery_set() {
        assert!(OrderStatus::Created.is_awaiting_delivery());
        assert!(OrderStatus::Pending.is_awaiting_delivery());
        assert!(OrderStatus::Shipped.is_awaiting_delivery());
        assert!(!OrderStatus::Delivered.is_awaiting_delivery());
        assert!(!OrderStatus::Error.is_awaiting_delivery());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&OrderStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
        let back: OrderStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(back, OrderStatus::Pending);
    }

    #[test]
    fn test_parse_roundtrip() {
        for status in [
            OrderStatus::Created,
            OrderStatus::Pending,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Error,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("unknown"), None);
    }
}
