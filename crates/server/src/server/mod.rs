//! Game server implementation.
//!
//! HTTP and websocket front end around the shared [`GameState`]. Tokens are
//! verified before the upgrade, so a refused handshake never touches the game.

use crate::auth::{Identity, TokenGate};
use crate::config::Config;
use axum::{
    Json, Router,
    extract::{
        ConnectInfo, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use protocol::ProtocolError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub mod client;
pub mod game;

pub use client::{Client, OUTBOUND_QUEUE, Outbound};
pub use game::{
    GameState, SNAPSHOT_BACKLOG, run_game_loop, run_heartbeat_loop, run_snapshot_loop,
};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub game: Arc<RwLock<GameState>>,
    pub gate: TokenGate,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            game: Arc::new(RwLock::new(GameState::new(config))),
            gate: TokenGate::new(&config.server.jwt_secret),
        }
    }
}

/// Handles of the background loops.
pub struct Loops {
    pub game: JoinHandle<()>,
    pub snapshot: JoinHandle<()>,
    pub heartbeat: JoinHandle<()>,
}

impl Loops {
    /// Spawn the physics, snapshot and heartbeat loops.
    pub fn spawn(game: &Arc<RwLock<GameState>>, config: &Config) -> Self {
        let server = &config.server;
        Self {
            game: tokio::spawn(run_game_loop(Arc::clone(game), server.tick_rate_hz)),
            snapshot: tokio::spawn(run_snapshot_loop(
                Arc::clone(game),
                server.snapshot_rate_hz,
            )),
            heartbeat: tokio::spawn(run_heartbeat_loop(
                Arc::clone(game),
                Duration::from_secs(server.heartbeat_interval_secs),
            )),
        }
    }

    fn abort(&self) {
        self.game.abort();
        self.snapshot.abort();
        self.heartbeat.abort();
    }
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health))
        .route("/", get(banner))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind the configured address and run until the physics loop dies.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    let state = AppState::new(&config);
    serve(listener, state).await
}

/// Serve on an already bound listener.
///
/// Returns an error if the physics loop stops, since the world can no longer be
/// trusted after that.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let config = state.game.read().await.config.clone();
    let mut loops = Loops::spawn(&state.game, &config);

    let addr = listener.local_addr()?;
    info!("Server running on http://{}", addr);
    info!("Game WebSocket endpoint: ws://{}/ws", addr);

    let app = router(state);
    let server =
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).into_future();

    let result = tokio::select! {
        result = server => result.map_err(anyhow::Error::from),
        result = &mut loops.game => match result {
            Ok(()) => Err(anyhow::anyhow!("game loop exited")),
            Err(e) => {
                error!("Game loop failed: {}", e);
                Err(anyhow::anyhow!("game loop failed: {e}"))
            }
        },
    };
    loops.abort();
    result
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

/// Verify the token, check capacity, then upgrade.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let identity = match state.gate.verify(params.token.as_deref()) {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Handshake from {} rejected: {}", addr, e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    if !state.game.read().await.admits(&identity.id) {
        warn!("Connection rejected (limit reached): {}", addr);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    debug!("Upgrading {} for player {}", addr, identity.id);
    ws.on_upgrade(move |socket| handle_connection(socket, addr, identity, state.game))
}

/// Pump one websocket until it closes, then clean up.
async fn handle_connection(
    socket: WebSocket,
    addr: SocketAddr,
    identity: Identity,
    game_state: Arc<RwLock<GameState>>,
) {
    let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE);
    let (mut write, mut read) = socket.split();

    // Subscribe under the same lock as the join so no update precedes `init`.
    let joined = {
        let mut game = game_state.write().await;
        game.add_client(addr, &identity, tx)
            .map(|id| (id, game.subscribe_snapshots()))
    };
    let Some((client_id, mut snapshots)) = joined else {
        let _ = write.send(Message::Close(None)).await;
        return;
    };

    loop {
        tokio::select! {
            biased;

            outbound = rx.recv() => {
                let frame = match outbound {
                    Some(Outbound::Text(text)) => Message::Text(text),
                    Some(Outbound::Ping) => Message::Ping(bytes::Bytes::new()),
                    Some(Outbound::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = write.send(frame).await {
                    debug!("Send to {} failed: {}", addr, e);
                    break;
                }
            }
            update = snapshots.recv() => {
                match update {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            debug!("Send to {} failed: {}", addr, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Client {} skipped {} game updates", addr, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let mut game = game_state.write().await;
                        if let Err(e) = game.handle_message(client_id, text.as_str()) {
                            warn!("Dropped message from {}: {}", addr, e);
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Dropped message from {}: {}", addr, ProtocolError::BinaryFrame);
                    }
                    Some(Ok(Message::Pong(_))) => {
                        game_state.write().await.mark_alive(client_id);
                    }
                    // Pings are answered by the transport.
                    Some(Ok(Message::Ping(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    game_state.write().await.remove_client(client_id);
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    players: usize,
    timestamp: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let players = state.game.read().await.world.counts().alive;
    Json(HealthReport {
        status: "ok",
        players,
        timestamp: protocol::now_millis(),
    })
}

async fn banner() -> &'static str {
    "Arena game server is running. Connect a websocket to /ws?token=<jwt>."
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
