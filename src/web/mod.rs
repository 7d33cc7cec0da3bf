use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    commands::{Applied, Command},
    session::Session,
    state::{GameState, StateSummary},
};

/// Poll period while the game is paused.
const PAUSED_POLL: Duration = Duration::from_millis(100);

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    broadcaster: broadcast::Sender<String>,
}

impl AppState {
    /// A panic elsewhere never leaves a half-applied state behind, so a
    /// poisoned lock is still safe to use.
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct WebServerConfig {
    pub session: Session,
    pub host: String,
    pub port: u16,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        session,
        host,
        port,
    } = config;
    let scenario_name = session.scenario_name().to_string();

    let (tx, _) = broadcast::channel::<String>(512);
    let state = AppState {
        session: Arc::new(Mutex::new(session)),
        broadcaster: tx,
    };

    tokio::spawn(tick_loop(state.clone()));

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(scenario = %scenario_name, %addr, "serving simulation");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(summary))
        .route("/api/snapshot", get(snapshot))
        .route("/api/export", get(export))
        .route("/api/load", post(load))
        .route("/api/command", post(command))
        .route("/api/events", get(stream_events))
        .with_state(state)
}

/// Steps the session at the cadence its speed asks for and publishes a
/// summary after every tick.
async fn tick_loop(state: AppState) {
    loop {
        let interval = state.session().tick_interval();
        let Some(interval) = interval else {
            tokio::time::sleep(PAUSED_POLL).await;
            continue;
        };
        tokio::time::sleep(interval).await;

        let result = {
            let mut session = state.session();
            // Speed may have dropped to zero while we slept.
            if session.tick_interval().is_none() {
                continue;
            }
            session.tick().map(|_| session.summary())
        };
        match result {
            Ok(summary) => {
                publish(&state.broadcaster, &summary);
            }
            Err(err) => {
                warn!(error = %err, "tick failed, state unchanged");
                tokio::time::sleep(PAUSED_POLL).await;
            }
        }
    }
}

/// Serialize and broadcast one event. Returns false when the payload could
/// not be serialized; having no subscribers is not a failure.
fn publish<T: Serialize>(broadcaster: &broadcast::Sender<String>, event: &T) -> bool {
    match serde_json::to_string(event) {
        Ok(payload) => {
            let _ = broadcaster.send(payload);
            true
        }
        Err(err) => {
            warn!(error = %err, "failed to serialize tick summary, event dropped");
            false
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

async fn summary(State(state): State<AppState>) -> Json<StateSummary> {
    Json(state.session().summary())
}

async fn snapshot(State(state): State<AppState>) -> Json<Arc<GameState>> {
    Json(state.session().snapshot())
}

async fn export(State(state): State<AppState>) -> Result<String, ApiError> {
    let snapshot = state.session().snapshot();
    crate::commands::export_state(&snapshot)
        .map_err(|err| ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

#[derive(Serialize)]
struct Loaded {
    loaded: bool,
    tick: u64,
}

async fn load(State(state): State<AppState>, blob: String) -> Result<Json<Loaded>, ApiError> {
    let mut session = state.session();
    session
        .load_state(&blob)
        .map_err(|err| ApiError(StatusCode::BAD_REQUEST, err.to_string()))?;
    Ok(Json(Loaded {
        loaded: true,
        tick: session.state().tick(),
    }))
}

async fn command(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> Result<Json<Applied>, ApiError> {
    state
        .session()
        .apply(&command)
        .map(Json)
        .map_err(|err| ApiError(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()))
}

async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().event("tick").data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
