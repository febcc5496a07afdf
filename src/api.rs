//! REST + WebSocket gateway over the engine.
//!
//! The gateway is translation only: it parses the wire format (string-typed
//! decimals, lowercase side/type names) into validated core types exactly
//! once, and serializes core outcomes back out. Each WebSocket client drains
//! its own event-bus subscription on its own task, so a slow or dead socket
//! never touches the matching path.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::engine::{CancelResult, MatchingEngine};
use crate::events::{BboSnapshot, DepthSnapshot, EventKind, MarketEvent, Trade};
use crate::types::{OrderId, OrderRequest, OrderStatus, OrderType, Side};

/// Shared app state: one engine per process.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchingEngine>,
}

/// Builds shared app state with a fresh engine.
pub fn create_app_state() -> AppState {
    AppState {
        engine: Arc::new(MatchingEngine::new()),
    }
}

/// Builds the REST/WebSocket router with the given state.
pub fn create_router_with_state(state: AppState) -> Router<()> {
    Router::new()
        .route("/health", get(health))
        .route("/orders", post(submit_order))
        .route("/orders/{order_id}", delete(cancel_order))
        .route("/market-data/{symbol}", get(market_data))
        .route("/bbo/{symbol}", get(bbo))
        .route("/ws/trades", get(ws_trades))
        .route("/ws/market-data/{symbol}", get(ws_market_data))
        .route("/ws/bbo/{symbol}", get(ws_bbo))
        .layer(Extension(state))
}

/// Builds the router with a new state (convenience for tests and `main`).
pub fn create_router() -> Router<()> {
    create_router_with_state(create_app_state())
}

/// Gateway error type; everything maps to a status code and a JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already terminal: {0}")]
    AlreadyTerminal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::AlreadyTerminal(msg) => (StatusCode::CONFLICT, "ALREADY_TERMINAL", msg),
        };
        let body = Json(serde_json::json!({ "error": code, "message": message }));
        (status, body).into_response()
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Order submission as it arrives on the wire: numbers are decimal strings.
#[derive(Debug, Deserialize)]
struct SubmitOrderBody {
    symbol: String,
    order_type: String,
    side: String,
    quantity: String,
    #[serde(default)]
    price: Option<String>,
}

impl SubmitOrderBody {
    /// The one place wire input becomes a validated core request.
    fn into_request(self) -> Result<OrderRequest, ApiError> {
        let side = match self.side.as_str() {
            "buy" => Side::Buy,
            "sell" => Side::Sell,
            other => return Err(ApiError::BadRequest(format!("invalid side: {other}"))),
        };
        let quantity: Decimal = self
            .quantity
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("invalid quantity: {}", self.quantity)))?;
        let price = self
            .price
            .as_deref()
            .map(|raw| {
                raw.parse::<Decimal>()
                    .map_err(|_| ApiError::BadRequest(format!("invalid price: {raw}")))
            })
            .transpose()?;
        let order_type = match (self.order_type.as_str(), price) {
            ("market", None) => OrderType::Market,
            ("market", Some(_)) => {
                return Err(ApiError::BadRequest(
                    "market orders must not carry a price".into(),
                ))
            }
            ("limit", Some(price)) => OrderType::Limit { price },
            ("ioc", Some(price)) => OrderType::Ioc { price },
            ("fok", Some(price)) => OrderType::Fok { price },
            ("limit", None) | ("ioc", None) | ("fok", None) => {
                return Err(ApiError::BadRequest(format!(
                    "price required for {} orders",
                    self.order_type
                )))
            }
            (other, _) => return Err(ApiError::BadRequest(format!("invalid order type: {other}"))),
        };
        Ok(OrderRequest {
            symbol: self.symbol,
            side,
            order_type,
            quantity,
        })
    }
}

#[derive(Serialize)]
struct OrderResponse {
    order_id: OrderId,
    status: OrderStatus,
    filled_quantity: Decimal,
    remaining_quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    trades: Vec<Trade>,
}

async fn submit_order(
    Extension(state): Extension<AppState>,
    Json(body): Json<SubmitOrderBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    let request = body.into_request()?;
    let result = state.engine.submit(request);
    Ok(Json(OrderResponse {
        order_id: result.order_id,
        status: result.status,
        filled_quantity: result.filled_quantity,
        remaining_quantity: result.remaining_quantity,
        reason: result.reason.map(|r| r.to_string()),
        trades: result.trades,
    }))
}

#[derive(Deserialize)]
struct CancelParams {
    symbol: String,
}

async fn cancel_order(
    Extension(state): Extension<AppState>,
    Path(order_id): Path<u64>,
    Query(params): Query<CancelParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.engine.cancel(OrderId(order_id), &params.symbol) {
        CancelResult::Cancelled => Ok(Json(serde_json::json!({ "status": "cancelled" }))),
        CancelResult::NotFound => Err(ApiError::NotFound(format!("order {order_id}"))),
        CancelResult::AlreadyTerminal => {
            Err(ApiError::AlreadyTerminal(format!("order {order_id}")))
        }
    }
}

#[derive(Deserialize)]
struct DepthParams {
    #[serde(default = "default_depth")]
    depth: usize,
}

fn default_depth() -> usize {
    10
}

#[derive(Serialize)]
struct MarketDataResponse {
    as_of_unix_ms: u64,
    #[serde(flatten)]
    snapshot: DepthSnapshot,
}

async fn market_data(
    Extension(state): Extension<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<DepthParams>,
) -> Result<Json<MarketDataResponse>, ApiError> {
    let snapshot = state
        .engine
        .snapshot(&symbol, params.depth)
        .ok_or_else(|| ApiError::NotFound(format!("symbol {symbol}")))?;
    Ok(Json(MarketDataResponse {
        as_of_unix_ms: unix_ms(),
        snapshot,
    }))
}

#[derive(Serialize)]
struct BboResponse {
    as_of_unix_ms: u64,
    #[serde(flatten)]
    snapshot: BboSnapshot,
}

async fn bbo(
    Extension(state): Extension<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<BboResponse>, ApiError> {
    let snapshot = state
        .engine
        .bbo(&symbol)
        .ok_or_else(|| ApiError::NotFound(format!("symbol {symbol}")))?;
    Ok(Json(BboResponse {
        as_of_unix_ms: unix_ms(),
        snapshot,
    }))
}

/// The core is deterministic and clock-free; display timestamps are stamped
/// here at egress.
fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Serialize)]
struct WsFrame<'a, T: Serialize> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    as_of_unix_ms: u64,
    #[serde(flatten)]
    payload: &'a T,
}

async fn send_frame<T: Serialize>(
    socket: &mut WebSocket,
    msg_type: &'static str,
    payload: &T,
) -> Result<(), ()> {
    let frame = WsFrame {
        msg_type,
        as_of_unix_ms: unix_ms(),
        payload,
    };
    let json = match serde_json::to_string(&frame) {
        Ok(json) => json,
        Err(_) => return Ok(()),
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Trade stream across all symbols.
async fn ws_trades(Extension(state): Extension<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| handle_trades_socket(state, socket))
}

async fn handle_trades_socket(state: AppState, mut socket: WebSocket) {
    let mut stream = state.engine.subscribe(EventKind::Trade);
    loop {
        tokio::select! {
            event = stream.recv() => match event {
                Some(MarketEvent::Trade(trade)) => {
                    if send_frame(&mut socket, "trade", &trade).await.is_err() {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

/// Depth stream for one symbol; sends a snapshot on connect.
async fn ws_market_data(
    Extension(state): Extension<AppState>,
    Path(symbol): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_market_data_socket(state, symbol, socket))
}

async fn handle_market_data_socket(state: AppState, symbol: String, mut socket: WebSocket) {
    // Subscribe before snapshotting so nothing published in between is lost.
    let mut stream = state.engine.subscribe(EventKind::Depth);
    let snapshot = state
        .engine
        .snapshot(&symbol, default_depth())
        .unwrap_or_else(|| DepthSnapshot::empty(&symbol));
    if send_frame(&mut socket, "snapshot", &snapshot).await.is_err() {
        return;
    }
    loop {
        tokio::select! {
            event = stream.recv() => match event {
                Some(MarketEvent::Depth(depth)) if depth.symbol == symbol => {
                    if send_frame(&mut socket, "depth", &depth).await.is_err() {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

/// BBO stream for one symbol; sends a snapshot on connect.
async fn ws_bbo(
    Extension(state): Extension<AppState>,
    Path(symbol): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_bbo_socket(state, symbol, socket))
}

async fn handle_bbo_socket(state: AppState, symbol: String, mut socket: WebSocket) {
    let mut stream = state.engine.subscribe(EventKind::Bbo);
    let snapshot = state
        .engine
        .bbo(&symbol)
        .unwrap_or_else(|| BboSnapshot::empty(&symbol));
    if send_frame(&mut socket, "snapshot", &snapshot).await.is_err() {
        return;
    }
    loop {
        tokio::select! {
            event = stream.recv() => match event {
                Some(MarketEvent::Bbo(bbo)) if bbo.symbol == symbol => {
                    if send_frame(&mut socket, "bbo", &bbo).await.is_err() {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}
