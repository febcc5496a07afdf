//! Trades, market-data events, and the in-process event bus.
//!
//! The bus is a single bounded broadcast ring shared by all subscribers: the
//! engine publishes under the symbol lock without ever blocking, and each
//! subscriber drains at its own pace. A subscriber that falls more than the
//! buffer capacity behind loses its oldest undelivered events; every loss is
//! added to an operator-visible counter. Relative event order is preserved for
//! subscribers that keep up.

use crate::types::{OrderId, Side, TradeId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A completed match. Emitted exactly once per fill; the price is always the
/// maker's resting price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub aggressor_side: Side,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    /// The taker's submission sequence on its symbol.
    pub timestamp: u64,
}

/// One side of the top of book: best price and aggregate quantity there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Copied top-of-book view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BboSnapshot {
    pub symbol: String,
    pub bid: Option<Quote>,
    pub ask: Option<Quote>,
}

impl BboSnapshot {
    pub fn empty(symbol: impl Into<String>) -> Self {
        BboSnapshot {
            symbol: symbol.into(),
            bid: None,
            ask: None,
        }
    }
}

/// One aggregated price level in a depth view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Copied depth view: top levels per side, best first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub symbol: String,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl DepthSnapshot {
    pub fn empty(symbol: impl Into<String>) -> Self {
        DepthSnapshot {
            symbol: symbol.into(),
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }
}

/// Everything the engine publishes. Per submission the canonical order is
/// trades (in execution order), then the BBO delta, then the depth update.
#[derive(Clone, Debug, PartialEq)]
pub enum MarketEvent {
    Trade(Trade),
    Bbo(BboSnapshot),
    Depth(DepthSnapshot),
}

impl MarketEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MarketEvent::Trade(_) => EventKind::Trade,
            MarketEvent::Bbo(_) => EventKind::Bbo,
            MarketEvent::Depth(_) => EventKind::Depth,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::Trade(t) => &t.symbol,
            MarketEvent::Bbo(b) => &b.symbol,
            MarketEvent::Depth(d) => &d.symbol,
        }
    }
}

/// Subscription filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Trade,
    Bbo,
    Depth,
}

/// Bounded fan-out from the matching path to any number of consumers.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<MarketEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// `capacity` bounds how far any subscriber may lag before losing events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publishes without blocking. Having no subscribers is not an error.
    pub(crate) fn publish(&self, event: MarketEvent) {
        let _ = self.tx.send(event);
    }

    /// Registers a consumer for one event kind. Dropping the returned stream
    /// unsubscribes.
    pub fn subscribe(&self, kind: EventKind) -> EventStream {
        EventStream {
            kind: Some(kind),
            rx: self.tx.subscribe(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Registers a consumer for every event kind, in publication order.
    pub fn subscribe_all(&self) -> EventStream {
        EventStream {
            kind: None,
            rx: self.tx.subscribe(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Total events lost to slow subscribers since startup.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A subscriber's view of the bus. `recv` skips events outside the subscribed
/// kind; overflow is counted and survived, never surfaced as an error.
#[derive(Debug)]
pub struct EventStream {
    kind: Option<EventKind>,
    rx: broadcast::Receiver<MarketEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventStream {
    fn wants(&self, event: &MarketEvent) -> bool {
        self.kind.is_none_or(|k| k == event.kind())
    }

    /// Next matching event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<MarketEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped.fetch_add(n, Ordering::Relaxed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant for synchronous callers and tests.
    pub fn try_recv(&mut self) -> Option<MarketEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    self.dropped.fetch_add(n, Ordering::Relaxed);
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }
}
