use crate::config::AppConfig;
use crate::hub::{Dashboard, PatchBatch};
use crate::reconcile::VisualState;
use crate::ui::{self, AppProps};
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub dashboard: Dashboard,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/state", get(current_state))
        .route("/api/mode", post(select_mode))
        .route("/ws/dashboard", get(ws_dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = state.config.http_bind.parse()?;
    let router = router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Dashboard listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown())
        .await?;

    Ok(())
}

async fn graceful_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down http server");
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let visual = state.dashboard.visual_state().await;
    let mode = state.dashboard.mode().await;
    Html(ui::render_html(AppProps::new(
        state.dashboard.surface(),
        visual.as_ref(),
        mode.as_deref(),
    )))
}

#[derive(Serialize)]
struct StateResponse {
    status: Option<VisualState>,
    mode: Option<String>,
}

async fn current_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(StateResponse {
        status: state.dashboard.visual_state().await,
        mode: state.dashboard.mode().await,
    })
}

#[derive(Deserialize)]
struct ModeRequest {
    mode: String,
}

async fn select_mode(
    State(state): State<AppState>,
    Json(body): Json<ModeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mode = body.mode.trim().to_string();
    if mode.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Mode must not be empty".into()));
    }
    tracing::info!("Mode {mode} selected via API");
    let _ = state.dashboard.select_mode(mode).await;
    Ok(StatusCode::ACCEPTED)
}

/// Messages a page sends over the dashboard socket.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientMessage {
    SelectMode { mode: String },
}

async fn ws_dashboard(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let mut updates = state.dashboard.subscribe();
    let snapshot = PatchBatch {
        patches: state.dashboard.snapshot_patches().await,
    };
    if send_batch(&mut socket, &snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(batch) => {
                    if send_batch(&mut socket, &batch).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Page lagged by {skipped} updates, resending snapshot");
                    let snapshot = PatchBatch {
                        patches: state.dashboard.snapshot_patches().await,
                    };
                    if send_batch(&mut socket, &snapshot).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => handle_client_message(&state, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!("Dashboard socket error: {err}");
                    break;
                }
            },
        }
    }
}

async fn handle_client_message(state: &AppState, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::SelectMode { mode }) if !mode.trim().is_empty() => {
            tracing::info!("Mode {mode} selected on dashboard");
            let _ = state.dashboard.select_mode(mode).await;
        }
        Ok(_) => tracing::debug!("Ignoring empty mode selection"),
        Err(err) => tracing::debug!("Ignoring page message {text}: {err}"),
    }
}

async fn send_batch(socket: &mut WebSocket, batch: &PatchBatch) -> Result<(), ()> {
    let payload = serde_json::to_string(batch).map_err(|_| ())?;
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}
