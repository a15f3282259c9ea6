use crate::core::DaemonEvent;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tv_proto::protocol::{CatalogState, Channel, Command, QuickSelectView, RemoteKey};
use tv_proto::state::CatalogEngine;

#[derive(Clone)]
pub struct HttpState {
    pub engine: CatalogEngine,
    pub quick_select: watch::Receiver<QuickSelectView>,
    pub event_tx: mpsc::Sender<DaemonEvent>,
}

#[derive(Deserialize)]
struct PlayRequest {
    channel_id: String,
    #[serde(default)]
    group_id: Option<String>,
}

#[derive(Deserialize)]
struct ToggleQuery {
    channel_id: Option<String>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/quick-select", get(get_quick_select))
        .route("/api/key/:key", post(press_key))
        .route("/api/navigate/:index", post(navigate))
        .route("/api/index/:index", post(set_index))
        .route("/api/play", post(play))
        .route("/api/favorites", axum::routing::put(set_favorites))
        .route("/api/favorites/toggle", post(toggle_favorite))
        .route("/api/groups/:id/activate", post(activate_group))
        .route("/api/load-more", post(load_more))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    engine: CatalogEngine,
    quick_select: watch::Receiver<QuickSelectView>,
    event_tx: mpsc::Sender<DaemonEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(HttpState {
            engine,
            quick_select,
            event_tx,
        });

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn send(state: &HttpState, cmd: Command) -> StatusCode {
    if state.event_tx.send(DaemonEvent::ClientCommand(cmd)).await.is_err() {
        error!("Failed to forward HTTP command, event loop is gone");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::OK
}

async fn get_state(State(state): State<HttpState>) -> Json<CatalogState> {
    Json(state.engine.snapshot().await)
}

async fn get_quick_select(State(state): State<HttpState>) -> Json<QuickSelectView> {
    Json(state.quick_select.borrow().clone())
}

async fn press_key(State(state): State<HttpState>, Path(key): Path<String>) -> StatusCode {
    let key: RemoteKey = match key.parse() {
        Ok(k) => k,
        Err(e) => {
            warn!("HTTP API: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    info!("HTTP API: Key {:?}", key);
    send(&state, Command::Key { key }).await
}

async fn navigate(State(state): State<HttpState>, Path(index): Path<i64>) -> StatusCode {
    info!("HTTP API: Navigate to {}", index);
    send(&state, Command::NavigateToChannel { index }).await
}

async fn set_index(State(state): State<HttpState>, Path(index): Path<usize>) -> StatusCode {
    send(&state, Command::SetCurrentIndex { index }).await
}

async fn play(State(state): State<HttpState>, Json(req): Json<PlayRequest>) -> StatusCode {
    info!("HTTP API: Play {}", req.channel_id);
    let cmd = Command::PlayChannel {
        channel_id: req.channel_id,
        group_id: req.group_id,
    };
    send(&state, cmd).await
}

async fn set_favorites(
    State(state): State<HttpState>,
    Json(favorites): Json<Vec<Channel>>,
) -> StatusCode {
    info!("HTTP API: Replace favorites ({} channels)", favorites.len());
    send(&state, Command::SetFavorites { favorites }).await
}

async fn toggle_favorite(
    State(state): State<HttpState>,
    Query(query): Query<ToggleQuery>,
) -> StatusCode {
    send(
        &state,
        Command::ToggleFavorite {
            channel_id: query.channel_id,
        },
    )
    .await
}

async fn activate_group(State(state): State<HttpState>, Path(group_id): Path<String>) -> StatusCode {
    info!("HTTP API: Activate group {}", group_id);
    send(&state, Command::SetActiveGroup { group_id }).await
}

async fn load_more(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::LoadMoreGroups).await
}
