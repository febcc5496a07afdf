//! Service binary: configuration from the environment, then serve the
//! gateway. `HOST`/`PORT` choose the bind address; `LOG_LEVEL` feeds the
//! tracing filter.

use riptide_exchange::api;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let state = api::create_app_state();
    let app = api::create_router_with_state(state);

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await.expect("bind");
    tracing::info!(%addr, "matching engine listening");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("serve");
}
