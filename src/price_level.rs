//! FIFO queue of resting orders at a single price.
//!
//! Orders at a level form a doubly-linked list over a shared slab arena: the
//! level holds head/tail keys, each [`OrderNode`] holds its neighbor keys.
//! Enqueue appends at the tail, matching consumes from the head, and any order
//! can be unlinked in O(1) given its slab key. The level caches the sum of
//! remaining quantities so feasibility scans never walk the queue.

use crate::types::Order;
use rust_decimal::Decimal;
use slab::Slab;

/// A resting order plus its queue links. Links are slab keys, not references.
#[derive(Clone, Debug)]
pub struct OrderNode {
    pub order: Order,
    pub(crate) next: Option<usize>,
    pub(crate) prev: Option<usize>,
}

impl OrderNode {
    pub fn new(order: Order) -> Self {
        OrderNode {
            order,
            next: None,
            prev: None,
        }
    }

    pub fn remaining(&self) -> Decimal {
        self.order.remaining
    }
}

/// One price level: queue metadata plus the cached aggregate quantity.
///
/// The cached sum equals the sum of remaining quantities over the queue at all
/// times; `reduce_quantity` keeps it in step with partial fills of the head.
#[derive(Debug)]
pub struct PriceLevel {
    pub price: Decimal,
    total_quantity: Decimal,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl PriceLevel {
    pub fn new(price: Decimal) -> Self {
        PriceLevel {
            price,
            total_quantity: Decimal::ZERO,
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Aggregate remaining quantity across the queue.
    pub fn total_quantity(&self) -> Decimal {
        self.total_quantity
    }

    /// Oldest order at this level (next to be matched).
    pub fn peek_head(&self) -> Option<usize> {
        self.head
    }

    /// Appends an order node at the tail.
    pub fn push_back(&mut self, key: usize, arena: &mut Slab<OrderNode>) {
        let quantity = arena[key].remaining();
        arena[key].prev = self.tail;
        arena[key].next = None;

        match self.tail {
            Some(tail_key) => arena[tail_key].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.len += 1;
        self.total_quantity += quantity;
    }

    /// Unlinks an order node anywhere in the queue. Returns the quantity
    /// removed from the cached sum. The node itself stays in the arena; the
    /// caller decides whether to free it.
    pub fn remove(&mut self, key: usize, arena: &mut Slab<OrderNode>) -> Decimal {
        let quantity = arena[key].remaining();
        let prev = arena[key].prev;
        let next = arena[key].next;

        match prev {
            Some(prev_key) => arena[prev_key].next = next,
            None => self.head = next,
        }
        match next {
            Some(next_key) => arena[next_key].prev = prev,
            None => self.tail = prev,
        }
        arena[key].prev = None;
        arena[key].next = None;

        self.len -= 1;
        self.total_quantity -= quantity;
        quantity
    }

    /// Reflects a partial fill of the head order in the cached sum. The caller
    /// has already decremented the order's remaining quantity.
    pub fn reduce_quantity(&mut self, delta: Decimal) {
        self.total_quantity -= delta;
    }

    /// Queue order ids oldest-first, for assertions and snapshots.
    #[cfg(test)]
    pub(crate) fn iter_order_ids(&self, arena: &Slab<OrderNode>) -> Vec<crate::types::OrderId> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(key) = cursor {
            out.push(arena[key].order.order_id);
            cursor = arena[key].next;
        }
        out
    }
}
