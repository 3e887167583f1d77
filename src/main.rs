use axum::{
    extract::{
        ws::WebSocketUpgrade,
        ConnectInfo, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use relaycore::config::Config;
use relaycore::state::AppState;
use relaycore::{db, session};

/// Upgrade-request query params. Auth-token minting and verification are an
/// external collaborator per spec.md §1 ("consumed via a `Principal` context
/// value") — this binary's own job stops at wiring the already-authenticated
/// caller id through to the session. A real deployment would replace this
/// with the actual token-verification middleware the auth service exposes.
#[derive(Debug, serde::Deserialize)]
struct WsParams {
    user_id: Uuid,
}

async fn health_check(State(state): State<AppState>) -> Response {
    match relaycore::db::health_check(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unavailable", "error": e.to_string() }))).into_response(),
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    if !state.admission.can_connect() {
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }
    if !state.admission.check_rate_limit(addr.ip(), chrono::Utc::now()).await {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response();
    }

    state.admission.add_connection();
    let admission = state.admission.clone();
    let hub = state.hub.clone();
    let ws = ws.max_frame_size(relaycore::session::protocol::MAX_INBOUND_FRAME_BYTES);
    ws.on_upgrade(move |socket| async move {
        session::run(socket, params.user_id, hub).await;
        admission.remove_connection();
    })
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "relaycore=info,tower_http=info,sqlx=warn".parse().unwrap());

    if std::env::var("APP_ENV").as_deref() == Ok("production") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("relaycore starting");

    let config = Config::from_env().expect("failed to load configuration");
    info!("configuration loaded");

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    db::health_check(&pool).await.expect("database health check failed");
    info!("database health check passed");

    let (hub, _hub_join) = relaycore::hub::HubHandle::spawn();

    let app_state = AppState::new(pool, hub, config.clone());

    // §4.3 `sweep()` runs on a fixed 60s cadence, independent of
    // `staleEntryAge` (the threshold an entry must exceed to be dropped).
    let sweeper = app_state.admission.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            sweeper.sweep(chrono::Utc::now()).await;
        }
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = config.server_addr();
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("failed to bind to address");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server failed to start");
}
