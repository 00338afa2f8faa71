use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{FromRequest, Path, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ApiError, Bid, ErrorCode, Game, GameEvent, GameStatus, Item, Money, Participant,
    SCHEMA_VERSION_V1,
};
use divvy_core::{EngineError, GameState};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{EngineApi, GameApiError, PersistenceError};

const DEFAULT_SQLITE_PATH: &str = "divvy_games.sqlite";
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

include!("error.rs");
include!("state.rs");
include!("routes/games.rs");
include!("routes/bids.rs");
include!("util.rs");

pub async fn serve(addr: SocketAddr, sqlite_path: Option<String>) -> Result<(), ServerError> {
    let mut api = EngineApi::new();
    if let Some(path) = sqlite_path.or_else(default_sqlite_path) {
        api.attach_sqlite_store(&path)?;
        api.restore_from_store()?;
    }

    let state = AppState::new(api);
    spawn_expiry_sweeper(state.clone());
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/games", post(create_game).get(list_games))
        .route("/api/v1/games/{game}", get(get_game))
        .route(
            "/api/v1/games/{game}/items",
            post(add_item).get(list_items),
        )
        .route(
            "/api/v1/games/{game}/participants",
            post(join_game).get(list_participants),
        )
        .route("/api/v1/games/{game}/bids", get(list_bids))
        .route("/api/v1/games/{game}/events", get(list_events))
        .route("/api/v1/games/{game}/resolution", get(get_resolution))
        .route("/api/v1/games/{game}/propose", post(propose_price))
        .route("/api/v1/games/{game}/confirm", post(confirm_bid))
        .route("/api/v1/games/{game}/reset", post(reset_game))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

fn spawn_expiry_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let mut inner = state.inner.lock().await;
            inner.sweep_expired(now_ms());
        }
    });
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}
