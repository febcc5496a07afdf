//! Core order types and identifiers.
//!
//! All identifiers are newtype wrappers. [`OrderType`] carries the limit price
//! in the variants that require one, so a constructed order is valid by
//! construction; the gateway parses wire input into these types exactly once.

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique order identifier, assigned at admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct OrderId(pub u64);

/// Trade identifier, unique across the process lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TradeId(pub u64);

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side an incoming order matches against.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type. Limit, IOC, and FOK carry their limit price; market orders
/// take whatever the book offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit { price: Decimal },
    Ioc { price: Decimal },
    Fok { price: Decimal },
}

impl OrderType {
    /// The price cap (buy) or floor (sell), if this type has one.
    pub fn limit_price(&self) -> Option<Decimal> {
        match self {
            OrderType::Market => None,
            OrderType::Limit { price } | OrderType::Ioc { price } | OrderType::Fok { price } => {
                Some(*price)
            }
        }
    }

    /// Wire name of the type.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit { .. } => "limit",
            OrderType::Ioc { .. } => "ioc",
            OrderType::Fok { .. } => "fok",
        }
    }
}

/// Order lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// Why an order was rejected or cut short.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("quantity must be positive")]
    NonPositiveQuantity,
    #[error("price must be positive")]
    NonPositivePrice,
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    #[error("fill-or-kill quantity not available")]
    FokUnfillable,
}

/// Validated order submission as the engine consumes it. The gateway builds
/// this from wire input; quantity and price are canonical decimals.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
}

impl OrderRequest {
    /// Admission check. The gateway already enforces this for wire traffic;
    /// direct library callers get the same gate.
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.symbol.is_empty() {
            return Err(RejectReason::EmptySymbol);
        }
        if self.quantity <= Decimal::ZERO {
            return Err(RejectReason::NonPositiveQuantity);
        }
        if let Some(price) = self.order_type.limit_price() {
            if price <= Decimal::ZERO {
                return Err(RejectReason::NonPositivePrice);
            }
        }
        Ok(())
    }
}

/// An order under management: immutable identity plus mutable execution state.
///
/// `timestamp` is the per-symbol submission sequence assigned when the symbol
/// lock is acquired; it is the time-priority tie-break within a price level.
#[derive(Clone, Debug)]
pub struct Order {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub remaining: Decimal,
    pub status: OrderStatus,
    pub timestamp: u64,
}

impl Order {
    /// Builds an admitted order from a validated request.
    pub(crate) fn admit(order_id: OrderId, timestamp: u64, request: OrderRequest) -> Order {
        Order {
            order_id,
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            remaining: request.quantity,
            status: OrderStatus::Pending,
            timestamp,
        }
    }

    pub fn limit_price(&self) -> Option<Decimal> {
        self.order_type.limit_price()
    }

    pub fn filled(&self) -> Decimal {
        self.quantity - self.remaining
    }

    /// Applies a fill. `quantity` must not exceed the remaining quantity.
    pub(crate) fn fill(&mut self, quantity: Decimal) {
        debug_assert!(quantity > Decimal::ZERO && quantity <= self.remaining);
        self.remaining -= quantity;
        self.status = if self.remaining.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}

/// Monotonic id source shared across symbols.
#[derive(Debug)]
pub struct IdSequence(AtomicU64);

impl IdSequence {
    pub fn new(start: u64) -> Self {
        IdSequence(AtomicU64::new(start))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limit_request(qty: Decimal, price: Decimal) -> OrderRequest {
        OrderRequest {
            symbol: "BTC-USDT".into(),
            side: Side::Buy,
            order_type: OrderType::Limit { price },
            quantity: qty,
        }
    }

    #[test]
    fn validate_accepts_positive_quantity_and_price() {
        assert!(limit_request(dec!(1), dec!(50000)).validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_positive_quantity() {
        assert_eq!(
            limit_request(dec!(0), dec!(50000)).validate(),
            Err(RejectReason::NonPositiveQuantity)
        );
        assert_eq!(
            limit_request(dec!(-1), dec!(50000)).validate(),
            Err(RejectReason::NonPositiveQuantity)
        );
    }

    #[test]
    fn validate_rejects_non_positive_price() {
        assert_eq!(
            limit_request(dec!(1), dec!(0)).validate(),
            Err(RejectReason::NonPositivePrice)
        );
    }

    #[test]
    fn validate_rejects_empty_symbol() {
        let mut req = limit_request(dec!(1), dec!(50000));
        req.symbol.clear();
        assert_eq!(req.validate(), Err(RejectReason::EmptySymbol));
    }

    #[test]
    fn market_orders_have_no_limit_price() {
        let req = OrderRequest {
            symbol: "BTC-USDT".into(),
            side: Side::Sell,
            order_type: OrderType::Market,
            quantity: dec!(2),
        };
        assert!(req.order_type.limit_price().is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn fill_transitions_partial_then_filled() {
        let mut order = Order::admit(OrderId(1), 1, limit_request(dec!(2), dec!(50000)));
        assert_eq!(order.status, OrderStatus::Pending);
        order.fill(dec!(0.5));
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining, dec!(1.5));
        assert_eq!(order.filled(), dec!(0.5));
        order.fill(dec!(1.5));
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.remaining.is_zero());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn id_sequence_is_monotonic() {
        let ids = IdSequence::new(1);
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
        assert_eq!(ids.next(), 3);
    }
}
