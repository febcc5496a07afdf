//! Multi-symbol matching engine facade.
//!
//! One order book per symbol, created lazily on first submission. Every
//! submit/cancel/read on a symbol serializes through that symbol's lock, so
//! matching is linearizable per symbol while unrelated symbols proceed in
//! parallel. The submission sequence number (time priority) is assigned at
//! lock acquisition, which makes replays deterministic: the trade stream is a
//! pure function of lock-acquisition order.
//!
//! Market-data events are published to the [`EventBus`] before the lock is
//! released, in canonical order: trades in execution order, then the BBO delta
//! if the top of book moved, then one coalesced depth update if the book
//! changed at all. Publication never blocks; slow subscribers lose events and
//! are counted, not waited for.

use crate::events::{BboSnapshot, DepthSnapshot, EventBus, EventKind, EventStream, MarketEvent, Trade};
use crate::matching::match_submission;
use crate::order_book::OrderBook;
use crate::types::{IdSequence, Order, OrderId, OrderRequest, OrderStatus, RejectReason};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Levels carried in each depth event and default snapshot.
const DEPTH_LEVELS: usize = 10;

/// Ring capacity of the event bus; how far a subscriber may lag.
const EVENT_BUS_CAPACITY: usize = 1024;

/// Acknowledgement for one submission: terminal or resting state plus every
/// trade it produced.
#[derive(Clone, Debug)]
pub struct SubmissionResult {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    /// Quantity still live on the book (the whole order for a freshly rested
    /// limit, the residue for a partially filled one, zero otherwise).
    pub remaining_quantity: Decimal,
    pub trades: Vec<Trade>,
    pub reason: Option<RejectReason>,
}

/// Outcome of a cancellation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelResult {
    /// The order was resting and has been removed.
    Cancelled,
    /// No order with this id was ever live on this symbol.
    NotFound,
    /// The order existed but already reached a terminal state (filled,
    /// cancelled, or rejected) before this request took the lock.
    AlreadyTerminal,
}

/// Book plus the per-symbol state that must change under the same lock.
#[derive(Debug)]
struct SymbolBook {
    book: OrderBook,
    /// Next submission sequence number; assigned at lock acquisition.
    next_seq: u64,
    /// Ids of orders on this symbol that reached a terminal state, so a late
    /// cancel can be told apart from a cancel for an id that never existed.
    terminal: HashSet<OrderId>,
}

impl SymbolBook {
    fn new(symbol: &str) -> Self {
        SymbolBook {
            book: OrderBook::new(symbol),
            next_seq: 1,
            terminal: HashSet::new(),
        }
    }
}

/// The engine. Cheap to share: all methods take `&self`.
#[derive(Debug)]
pub struct MatchingEngine {
    books: DashMap<String, Arc<Mutex<SymbolBook>>>,
    bus: EventBus,
    order_ids: IdSequence,
    trade_ids: IdSequence,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        MatchingEngine {
            books: DashMap::new(),
            bus: EventBus::new(EVENT_BUS_CAPACITY),
            order_ids: IdSequence::new(1),
            trade_ids: IdSequence::new(1),
        }
    }

    fn book_for(&self, symbol: &str) -> Arc<Mutex<SymbolBook>> {
        self.books
            .entry(symbol.to_string())
            .or_insert_with(|| {
                info!(symbol, "creating order book");
                Arc::new(Mutex::new(SymbolBook::new(symbol)))
            })
            .clone()
    }

    fn existing_book(&self, symbol: &str) -> Option<Arc<Mutex<SymbolBook>>> {
        self.books.get(symbol).map(|entry| entry.value().clone())
    }

    /// Submits an order. Runs matching to completion under the symbol lock
    /// and returns the order's terminal or resting state with its trades.
    pub fn submit(&self, request: OrderRequest) -> SubmissionResult {
        let order_id = OrderId(self.order_ids.next());
        if let Err(reason) = request.validate() {
            warn!(order_id = order_id.0, %reason, "order rejected at admission");
            return SubmissionResult {
                order_id,
                status: OrderStatus::Rejected,
                filled_quantity: Decimal::ZERO,
                remaining_quantity: Decimal::ZERO,
                trades: Vec::new(),
                reason: Some(reason),
            };
        }

        let slot = self.book_for(&request.symbol);
        let mut state = slot.lock().expect("symbol lock poisoned");
        let seq = state.next_seq;
        state.next_seq += 1;
        let mut order = Order::admit(order_id, seq, request);
        debug!(
            order_id = order_id.0,
            symbol = %order.symbol,
            side = ?order.side,
            order_type = order.order_type.kind(),
            quantity = %order.quantity,
            "processing order"
        );

        let bbo_before = state.book.bbo();
        let outcome = match_submission(&mut state.book, &mut order, &self.trade_ids);

        // Anything admitted here that is not resting afterwards is done for
        // good; that includes an IOC whose remainder was discarded while its
        // reported status stays PartiallyFilled.
        let resting = state.book.contains(order_id);
        if !resting {
            state.terminal.insert(order_id);
        }
        for trade in &outcome.trades {
            // Makers consumed to zero left the book and are terminal too.
            if !state.book.contains(trade.maker_order_id) {
                state.terminal.insert(trade.maker_order_id);
            }
        }
        let book_changed = !outcome.trades.is_empty() || resting;
        for trade in &outcome.trades {
            self.bus.publish(MarketEvent::Trade(trade.clone()));
        }
        let bbo_after = state.book.bbo();
        if bbo_after != bbo_before {
            self.bus.publish(MarketEvent::Bbo(bbo_after));
        }
        if book_changed {
            self.bus
                .publish(MarketEvent::Depth(state.book.depth(DEPTH_LEVELS)));
        }

        let remaining_quantity = if resting { order.remaining } else { Decimal::ZERO };
        info!(
            order_id = order_id.0,
            symbol = %order.symbol,
            status = ?order.status,
            trades = outcome.trades.len(),
            "order processed"
        );
        drop(state);

        SubmissionResult {
            order_id,
            status: order.status,
            filled_quantity: order.filled(),
            remaining_quantity,
            trades: outcome.trades,
            reason: outcome.reason,
        }
    }

    /// Cancels a resting order. A cancel that loses the race against a fill
    /// (or repeats an earlier cancel) reports [`CancelResult::AlreadyTerminal`].
    pub fn cancel(&self, order_id: OrderId, symbol: &str) -> CancelResult {
        let Some(slot) = self.existing_book(symbol) else {
            return CancelResult::NotFound;
        };
        let mut state = slot.lock().expect("symbol lock poisoned");

        let bbo_before = state.book.bbo();
        match state.book.cancel(order_id) {
            Some(_) => {
                state.terminal.insert(order_id);
                let bbo_after = state.book.bbo();
                if bbo_after != bbo_before {
                    self.bus.publish(MarketEvent::Bbo(bbo_after));
                }
                self.bus
                    .publish(MarketEvent::Depth(state.book.depth(DEPTH_LEVELS)));
                info!(order_id = order_id.0, symbol, "order cancelled");
                CancelResult::Cancelled
            }
            None if state.terminal.contains(&order_id) => CancelResult::AlreadyTerminal,
            None => CancelResult::NotFound,
        }
    }

    /// Copied top-of-book view, or `None` for a symbol that has never traded.
    pub fn bbo(&self, symbol: &str) -> Option<BboSnapshot> {
        let slot = self.existing_book(symbol)?;
        let state = slot.lock().expect("symbol lock poisoned");
        Some(state.book.bbo())
    }

    /// Copied depth view of the top `depth` levels per side.
    pub fn snapshot(&self, symbol: &str, depth: usize) -> Option<DepthSnapshot> {
        let slot = self.existing_book(symbol)?;
        let state = slot.lock().expect("symbol lock poisoned");
        Some(state.book.depth(depth))
    }

    /// Symbols with a live book.
    pub fn symbols(&self) -> Vec<String> {
        self.books.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Registers a consumer for one event kind. Dropping the stream
    /// unsubscribes.
    pub fn subscribe(&self, kind: EventKind) -> EventStream {
        self.bus.subscribe(kind)
    }

    /// Registers a consumer for all event kinds in publication order.
    pub fn subscribe_all(&self) -> EventStream {
        self.bus.subscribe_all()
    }

    /// Events lost to slow subscribers since startup.
    pub fn dropped_events(&self) -> u64 {
        self.bus.dropped_events()
    }
}
