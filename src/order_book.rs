//! Single-symbol order book: bids and asks with price-time priority.
//!
//! Price levels live in `BTreeMap`s (bids keyed descending via [`Reverse`],
//! asks ascending), so level insertion and removal are O(log L) and the top of
//! book is an O(1) read of the first entry. Order bodies live in one slab
//! arena shared by both sides; the `order_id → slab key` index plus the
//! intrusive queue links in [`PriceLevel`] make cancellation O(1) once the id
//! is resolved. Matching walks the opposite side best price outward and
//! consumes each level FIFO; fills always price at the maker's resting price.

use crate::events::{BboSnapshot, DepthLevel, DepthSnapshot, Quote};
use crate::price_level::{OrderNode, PriceLevel};
use crate::types::{Order, OrderId, Side};
use rust_decimal::Decimal;
use slab::Slab;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// One maker consumed (fully or partially) by a matching walk.
#[derive(Clone, Debug)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Maker's remaining quantity after this fill; zero means it left the book.
    pub maker_remaining: Decimal,
}

/// Order book for one symbol. Not thread-safe; the engine serializes access.
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    arena: Slab<OrderNode>,
    bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
    index: HashMap<OrderId, usize>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        OrderBook {
            symbol: symbol.into(),
            arena: Slab::new(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Number of resting orders across both sides.
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    /// Remaining quantity of a resting order, if it is on the book.
    pub fn resting_remaining(&self, order_id: OrderId) -> Option<Decimal> {
        self.index
            .get(&order_id)
            .map(|&key| self.arena[key].remaining())
    }

    /// Rests an order at the tail of its price level, creating the level if
    /// absent. Only priced orders rest; a price-less order reaching this point
    /// means the matcher is broken, and a corrupt book is worse than a crash.
    pub fn insert(&mut self, order: Order) {
        let price = order
            .limit_price()
            .unwrap_or_else(|| panic!("order {} rested without a limit price", order.order_id.0));
        debug_assert!(order.remaining > Decimal::ZERO);

        let order_id = order.order_id;
        let side = order.side;
        let key = self.arena.insert(OrderNode::new(order));
        self.index.insert(order_id, key);
        match side {
            Side::Buy => self
                .bids
                .entry(Reverse(price))
                .or_insert_with(|| PriceLevel::new(price))
                .push_back(key, &mut self.arena),
            Side::Sell => self
                .asks
                .entry(price)
                .or_insert_with(|| PriceLevel::new(price))
                .push_back(key, &mut self.arena),
        }
    }

    /// Removes a resting order by id. O(1) past the id lookup: the index
    /// yields the arena key and the node's links splice it out of its level.
    /// Collapses the level if it empties. Returns the removed order.
    pub fn cancel(&mut self, order_id: OrderId) -> Option<Order> {
        let key = self.index.remove(&order_id)?;
        let side = self.arena[key].order.side;
        let price = self.arena[key]
            .order
            .limit_price()
            .expect("resting orders always carry a price");

        match side {
            Side::Buy => {
                let level = self
                    .bids
                    .get_mut(&Reverse(price))
                    .expect("resting order's level exists");
                level.remove(key, &mut self.arena);
                if level.is_empty() {
                    self.bids.remove(&Reverse(price));
                }
            }
            Side::Sell => {
                let level = self
                    .asks
                    .get_mut(&price)
                    .expect("resting order's level exists");
                level.remove(key, &mut self.arena);
                if level.is_empty() {
                    self.asks.remove(&price);
                }
            }
        }
        Some(self.arena.remove(key).order)
    }

    /// Best bid as (price, aggregate quantity at that price).
    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids
            .first_key_value()
            .map(|(Reverse(price), level)| (*price, level.total_quantity()))
    }

    /// Best ask as (price, aggregate quantity at that price).
    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks
            .first_key_value()
            .map(|(price, level)| (*price, level.total_quantity()))
    }

    /// Copied top-of-book view.
    pub fn bbo(&self) -> BboSnapshot {
        BboSnapshot {
            symbol: self.symbol.clone(),
            bid: self.best_bid().map(|(price, quantity)| Quote { price, quantity }),
            ask: self.best_ask().map(|(price, quantity)| Quote { price, quantity }),
        }
    }

    /// Copied view of the top `depth` levels per side, best first.
    pub fn depth(&self, depth: usize) -> DepthSnapshot {
        DepthSnapshot {
            symbol: self.symbol.clone(),
            bids: self
                .bids
                .values()
                .take(depth)
                .map(|level| DepthLevel {
                    price: level.price,
                    quantity: level.total_quantity(),
                })
                .collect(),
            asks: self
                .asks
                .values()
                .take(depth)
                .map(|level| DepthLevel {
                    price: level.price,
                    quantity: level.total_quantity(),
                })
                .collect(),
        }
    }

    /// Read-only feasibility walk: can `want_qty` be filled from the side
    /// opposite `taker_side` without violating `price_limit`? Sums the cached
    /// level quantities, so the queue contents are never touched.
    pub fn can_fill(
        &self,
        taker_side: Side,
        price_limit: Option<Decimal>,
        want_qty: Decimal,
    ) -> bool {
        let mut need = want_qty;
        match taker_side {
            Side::Buy => {
                for (&price, level) in &self.asks {
                    if price_limit.is_some_and(|limit| price > limit) {
                        break;
                    }
                    need -= level.total_quantity();
                    if need <= Decimal::ZERO {
                        return true;
                    }
                }
            }
            Side::Sell => {
                for (&Reverse(price), level) in &self.bids {
                    if price_limit.is_some_and(|limit| price < limit) {
                        break;
                    }
                    need -= level.total_quantity();
                    if need <= Decimal::ZERO {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Consumes liquidity from the side opposite `taker_side`, best price
    /// outward, FIFO within each level, until `want_qty` is exhausted or the
    /// next level violates `price_limit`. Fully consumed makers leave the
    /// book; emptied levels collapse. Returns one [`Fill`] per maker touched,
    /// in execution order.
    pub fn match_against(
        &mut self,
        taker_side: Side,
        price_limit: Option<Decimal>,
        want_qty: Decimal,
    ) -> Vec<Fill> {
        let mut fills = Vec::new();
        let mut outstanding = want_qty;

        while outstanding > Decimal::ZERO {
            match taker_side {
                Side::Buy => {
                    let Some(mut entry) = self.asks.first_entry() else {
                        break;
                    };
                    let price = *entry.key();
                    if price_limit.is_some_and(|limit| price > limit) {
                        break;
                    }
                    Self::consume_level(
                        entry.get_mut(),
                        &mut self.arena,
                        &mut self.index,
                        &mut outstanding,
                        &mut fills,
                    );
                    if entry.get().is_empty() {
                        entry.remove();
                    }
                }
                Side::Sell => {
                    let Some(mut entry) = self.bids.first_entry() else {
                        break;
                    };
                    let Reverse(price) = *entry.key();
                    if price_limit.is_some_and(|limit| price < limit) {
                        break;
                    }
                    Self::consume_level(
                        entry.get_mut(),
                        &mut self.arena,
                        &mut self.index,
                        &mut outstanding,
                        &mut fills,
                    );
                    if entry.get().is_empty() {
                        entry.remove();
                    }
                }
            }
        }
        fills
    }

    /// Takes from one level's queue head-first until the level or the
    /// outstanding quantity runs out.
    fn consume_level(
        level: &mut PriceLevel,
        arena: &mut Slab<OrderNode>,
        index: &mut HashMap<OrderId, usize>,
        outstanding: &mut Decimal,
        fills: &mut Vec<Fill>,
    ) {
        while *outstanding > Decimal::ZERO {
            let Some(head) = level.peek_head() else {
                break;
            };
            let head_remaining = arena[head].remaining();
            if head_remaining <= Decimal::ZERO {
                // A zero-quantity head must never trade; discard it.
                let stale_id = arena[head].order.order_id;
                level.remove(head, arena);
                arena.remove(head);
                index.remove(&stale_id);
                continue;
            }

            let take = head_remaining.min(*outstanding);
            *outstanding -= take;
            arena[head].order.fill(take);
            level.reduce_quantity(take);

            let maker_order_id = arena[head].order.order_id;
            let maker_remaining = arena[head].remaining();
            fills.push(Fill {
                maker_order_id,
                price: level.price,
                quantity: take,
                maker_remaining,
            });

            if maker_remaining.is_zero() {
                level.remove(head, arena);
                arena.remove(head);
                index.remove(&maker_order_id);
            }
        }
    }
}
