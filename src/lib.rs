//! # Riptide Exchange
//!
//! Single-venue crypto matching engine: per-symbol limit order books with
//! price-time priority, four order types (market, limit, IOC, FOK), and a
//! non-blocking market-data event bus. The HTTP/WebSocket gateway in
//! [`api`] is thin translation over the in-process core.
//!
//! ## Entry point
//!
//! Use [`MatchingEngine`] as the single entry point: create with
//! [`MatchingEngine::new`], then [`MatchingEngine::submit`],
//! [`MatchingEngine::cancel`], and the read-side [`MatchingEngine::bbo`] /
//! [`MatchingEngine::snapshot`] / [`MatchingEngine::subscribe`].
//!
//! ## Example
//!
//! ```rust
//! use riptide_exchange::{MatchingEngine, OrderRequest, OrderStatus, OrderType, Side};
//! use rust_decimal::Decimal;
//!
//! let engine = MatchingEngine::new();
//! let resting = engine.submit(OrderRequest {
//!     symbol: "BTC-USDT".into(),
//!     side: Side::Buy,
//!     order_type: OrderType::Limit { price: Decimal::from(50_000) },
//!     quantity: Decimal::from(1),
//! });
//! assert_eq!(resting.status, OrderStatus::Pending);
//!
//! let taker = engine.submit(OrderRequest {
//!     symbol: "BTC-USDT".into(),
//!     side: Side::Sell,
//!     order_type: OrderType::Limit { price: Decimal::from(50_000) },
//!     quantity: Decimal::from(1),
//! });
//! assert_eq!(taker.status, OrderStatus::Filled);
//! assert_eq!(taker.trades.len(), 1);
//! ```
//!
//! ## Lower-level API
//!
//! [`OrderBook`] and [`matching::match_submission`] are usable directly if
//! you manage symbols, locking, and ids yourself.

pub mod api;
pub mod engine;
pub mod events;
pub mod market_data_gen;
pub mod matching;
pub mod order_book;
pub mod price_level;
pub mod types;

pub use engine::{CancelResult, MatchingEngine, SubmissionResult};
pub use events::{
    BboSnapshot, DepthLevel, DepthSnapshot, EventBus, EventKind, EventStream, MarketEvent, Quote,
    Trade,
};
pub use order_book::{Fill, OrderBook};
pub use types::{
    Order, OrderId, OrderRequest, OrderStatus, OrderType, RejectReason, Side, TradeId,
};
