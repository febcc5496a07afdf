//! Order-type dispatch: runs one admitted order against its book.
//!
//! [`match_submission`] executes under the symbol lock and never suspends:
//! market and IOC orders take what they can and terminate, limit orders rest
//! their remainder, and fill-or-kill orders test feasibility read-only before
//! touching the book so a failed FOK leaves no footprint at all.

use crate::events::Trade;
use crate::order_book::OrderBook;
use crate::types::{IdSequence, Order, OrderStatus, OrderType, RejectReason, TradeId};
use rust_decimal::Decimal;

/// What one submission produced beyond the order's own final state.
#[derive(Debug)]
pub struct MatchOutcome {
    pub trades: Vec<Trade>,
    pub reason: Option<RejectReason>,
}

/// Runs matching for one order. Mutates the order's remaining quantity and
/// status, and the book to reflect fills and any resting remainder. Trade ids
/// are drawn from `trade_ids` in execution order.
pub fn match_submission(
    book: &mut OrderBook,
    order: &mut Order,
    trade_ids: &IdSequence,
) -> MatchOutcome {
    let side = order.side;
    let price_limit = order.limit_price();

    // FOK feasibility gate: a read-only scan over cached level sums. On
    // failure the book and the event log are exactly as before the call.
    if matches!(order.order_type, OrderType::Fok { .. })
        && !book.can_fill(side, price_limit, order.remaining)
    {
        order.status = OrderStatus::Cancelled;
        return MatchOutcome {
            trades: Vec::new(),
            reason: Some(RejectReason::FokUnfillable),
        };
    }

    let fills = book.match_against(side, price_limit, order.remaining);
    let mut trades = Vec::with_capacity(fills.len());
    for fill in &fills {
        order.fill(fill.quantity);
        trades.push(Trade {
            trade_id: TradeId(trade_ids.next()),
            symbol: book.symbol().to_string(),
            price: fill.price,
            quantity: fill.quantity,
            aggressor_side: side,
            maker_order_id: fill.maker_order_id,
            taker_order_id: order.order_id,
            timestamp: order.timestamp,
        });
    }

    let mut reason = None;
    match order.order_type {
        OrderType::Market => {
            // Whatever could not fill is refused outright; market orders
            // never rest.
            if order.remaining > Decimal::ZERO {
                order.status = OrderStatus::Rejected;
                reason = Some(RejectReason::InsufficientLiquidity);
            }
        }
        OrderType::Limit { .. } => {
            if order.remaining > Decimal::ZERO {
                book.insert(order.clone());
            }
        }
        OrderType::Ioc { .. } => {
            // Remainder is discarded. A clean miss is Cancelled; a partial
            // keeps PartiallyFilled as its terminal status.
            if order.remaining > Decimal::ZERO && trades.is_empty() {
                order.status = OrderStatus::Cancelled;
            }
        }
        OrderType::Fok { .. } => {
            // Feasibility passed under this same lock, so the walk must have
            // filled everything; a shortfall means the book is corrupt.
            assert!(
                order.remaining.is_zero(),
                "fill-or-kill shortfall after feasibility passed on {}",
                book.symbol()
            );
        }
    }

    MatchOutcome { trades, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderId, OrderRequest, Side};
    use rust_decimal_macros::dec;

    fn admitted(
        id: u64,
        side: Side,
        order_type: OrderType,
        qty: Decimal,
    ) -> Order {
        let request = OrderRequest {
            symbol: "BTC-USDT".into(),
            side,
            order_type,
            quantity: qty,
        };
        Order::admit(OrderId(id), id, request)
    }

    fn seed_book(book: &mut OrderBook, id: u64, side: Side, qty: Decimal, price: Decimal) {
        book.insert(admitted(id, side, OrderType::Limit { price }, qty));
    }

    fn run(book: &mut OrderBook, order: &mut Order) -> MatchOutcome {
        let trade_ids = IdSequence::new(1);
        match_submission(book, order, &trade_ids)
    }

    #[test]
    fn limit_rests_when_book_is_empty() {
        let mut book = OrderBook::new("BTC-USDT");
        let mut order = admitted(1, Side::Buy, OrderType::Limit { price: dec!(50000) }, dec!(1));

        let outcome = run(&mut book, &mut order);
        assert!(outcome.trades.is_empty());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(book.best_bid(), Some((dec!(50000), dec!(1))));
    }

    #[test]
    fn limit_crosses_resting_order_at_equal_price() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Buy, dec!(1), dec!(50000));
        let mut sell = admitted(2, Side::Sell, OrderType::Limit { price: dec!(50000) }, dec!(1));

        let outcome = run(&mut book, &mut sell);
        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.price, dec!(50000));
        assert_eq!(trade.quantity, dec!(1));
        assert_eq!(trade.maker_order_id, OrderId(1));
        assert_eq!(trade.taker_order_id, OrderId(2));
        assert_eq!(trade.aggressor_side, Side::Sell);
        assert_eq!(sell.status, OrderStatus::Filled);
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn limit_partial_fill_rests_remainder() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Sell, dec!(0.4), dec!(50000));
        let mut buy = admitted(2, Side::Buy, OrderType::Limit { price: dec!(50000) }, dec!(1));

        let outcome = run(&mut book, &mut buy);
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].quantity, dec!(0.4));
        assert_eq!(buy.status, OrderStatus::PartiallyFilled);
        assert_eq!(buy.remaining, dec!(0.6));
        assert_eq!(book.best_bid(), Some((dec!(50000), dec!(0.6))));
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn market_buy_sweeps_levels_and_improves_price() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Sell, dec!(1), dec!(49990));
        seed_book(&mut book, 2, Side::Sell, dec!(1), dec!(50000));
        let mut buy = admitted(3, Side::Buy, OrderType::Market, dec!(1.5));

        let outcome = run(&mut book, &mut buy);
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].price, dec!(49990));
        assert_eq!(outcome.trades[0].quantity, dec!(1));
        assert_eq!(outcome.trades[1].price, dec!(50000));
        assert_eq!(outcome.trades[1].quantity, dec!(0.5));
        assert_eq!(buy.status, OrderStatus::Filled);
        assert!(outcome.reason.is_none());
        assert_eq!(book.best_ask(), Some((dec!(50000), dec!(0.5))));
    }

    #[test]
    fn market_remainder_is_refused_and_never_rests() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Sell, dec!(0.5), dec!(50000));
        let mut buy = admitted(2, Side::Buy, OrderType::Market, dec!(1));

        let outcome = run(&mut book, &mut buy);
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].quantity, dec!(0.5));
        assert_eq!(buy.status, OrderStatus::Rejected);
        assert_eq!(outcome.reason, Some(RejectReason::InsufficientLiquidity));
        assert!(book.best_bid().is_none(), "market orders never rest");
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn market_against_empty_book_is_refused_with_no_trades() {
        let mut book = OrderBook::new("BTC-USDT");
        let mut buy = admitted(1, Side::Buy, OrderType::Market, dec!(1));

        let outcome = run(&mut book, &mut buy);
        assert!(outcome.trades.is_empty());
        assert_eq!(buy.status, OrderStatus::Rejected);
        assert_eq!(outcome.reason, Some(RejectReason::InsufficientLiquidity));
    }

    #[test]
    fn time_priority_fills_earlier_order_first() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Buy, dec!(1), dec!(50000));
        seed_book(&mut book, 2, Side::Buy, dec!(1), dec!(50000));
        let mut sell = admitted(3, Side::Sell, OrderType::Limit { price: dec!(50000) }, dec!(1.5));

        let outcome = run(&mut book, &mut sell);
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].maker_order_id, OrderId(1));
        assert_eq!(outcome.trades[0].quantity, dec!(1));
        assert_eq!(outcome.trades[1].maker_order_id, OrderId(2));
        assert_eq!(outcome.trades[1].quantity, dec!(0.5));
    }

    #[test]
    fn ioc_partial_fill_discards_remainder() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Sell, dec!(0.3), dec!(50000));
        let mut buy = admitted(2, Side::Buy, OrderType::Ioc { price: dec!(50000) }, dec!(1));

        let outcome = run(&mut book, &mut buy);
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].quantity, dec!(0.3));
        assert_eq!(buy.status, OrderStatus::PartiallyFilled);
        assert!(book.best_bid().is_none(), "IOC remainder must not rest");
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn ioc_with_no_match_is_cancelled() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Sell, dec!(1), dec!(50010));
        let mut buy = admitted(2, Side::Buy, OrderType::Ioc { price: dec!(50000) }, dec!(1));

        let outcome = run(&mut book, &mut buy);
        assert!(outcome.trades.is_empty());
        assert_eq!(buy.status, OrderStatus::Cancelled);
        assert_eq!(book.best_ask(), Some((dec!(50010), dec!(1))));
    }

    #[test]
    fn fok_fillable_executes_in_full() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Sell, dec!(0.6), dec!(49990));
        seed_book(&mut book, 2, Side::Sell, dec!(0.6), dec!(50000));
        let mut buy = admitted(3, Side::Buy, OrderType::Fok { price: dec!(50000) }, dec!(1));

        let outcome = run(&mut book, &mut buy);
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(buy.status, OrderStatus::Filled);
        assert_eq!(book.best_ask(), Some((dec!(50000), dec!(0.2))));
    }

    #[test]
    fn fok_unfillable_leaves_no_footprint() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Sell, dec!(0.5), dec!(50000));
        let mut buy = admitted(2, Side::Buy, OrderType::Fok { price: dec!(50000) }, dec!(1));

        let outcome = run(&mut book, &mut buy);
        assert!(outcome.trades.is_empty());
        assert_eq!(buy.status, OrderStatus::Cancelled);
        assert_eq!(outcome.reason, Some(RejectReason::FokUnfillable));
        assert_eq!(book.best_ask(), Some((dec!(50000), dec!(0.5))));
        assert_eq!(book.order_count(), 1);
    }

    #[test]
    fn trade_prices_never_cross_the_taker_limit() {
        let mut book = OrderBook::new("BTC-USDT");
        seed_book(&mut book, 1, Side::Sell, dec!(1), dec!(49980));
        seed_book(&mut book, 2, Side::Sell, dec!(1), dec!(49990));
        seed_book(&mut book, 3, Side::Sell, dec!(1), dec!(50010));
        let mut buy = admitted(4, Side::Buy, OrderType::Limit { price: dec!(50000) }, dec!(3));

        let outcome = run(&mut book, &mut buy);
        assert_eq!(outcome.trades.len(), 2);
        for trade in &outcome.trades {
            assert!(trade.price <= dec!(50000));
        }
        // Remainder rests at the taker's limit; book stays uncrossed.
        assert_eq!(book.best_bid(), Some((dec!(50000), dec!(1))));
        assert_eq!(book.best_ask(), Some((dec!(50010), dec!(1))));
    }
}
