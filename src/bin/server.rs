use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use maze_pursuit_server::config::GameConfig;
use maze_pursuit_server::error::Result;
use maze_pursuit_server::logging::init_tracing;
use maze_pursuit_server::server_protocol::{parse_client_message, ParsedClientMessage};
use maze_pursuit_server::server_utils::{normalize_maze_size, normalize_seed, parse_port};
use maze_pursuit_server::session::{SessionDriver, TracingAudioSink};
use maze_pursuit_server::text_gen::text_generator_from_env;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    session: SessionDriver,
    tick_ms: u64,
    summary_sent: bool,
}

impl ServerState {
    fn new(session: SessionDriver) -> Self {
        let tick_ms = session.config().tick_ms();
        Self {
            clients: HashMap::new(),
            session,
            tick_ms,
            summary_sent: false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    let port = parse_port(std::env::var("PORT").ok().as_deref(), 8080);
    let config = GameConfig::from_env()?;
    config.validate()?;
    let seed = resolve_seed(
        std::env::var("SEED")
            .ok()
            .and_then(|value| value.parse::<i64>().ok()),
    );

    let session = SessionDriver::new(
        config,
        seed,
        text_generator_from_env(),
        Arc::new(TracingAudioSink),
    );
    let state = Arc::new(Mutex::new(ServerState::new(session)));
    start_tick_loop(state.clone()).await;

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/level", get(level_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        info!(root = %static_dir.to_string_lossy(), "serving static files");
        app.fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)))
    } else {
        warn!("static file root not found, serving the API only");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!(port, seed, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [PathBuf::from("dist/client"), PathBuf::from("public")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn level_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(guard.session.engine().level_init())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard
            .clients
            .insert(client_id.clone(), ClientContext { tx: tx.clone() });
        send_welcome(&mut guard, &client_id);
    }
    debug!(client = %client_id, "client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => ws_sender.send(Message::Text(payload.into())).await,
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = std::str::from_utf8(&raw) {
                    handle_client_message(&state, &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.lock().await.clients.remove(&client_id);
    debug!(client = %client_id, "client disconnected");
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        send_error_to_client(state, client_id, "invalid message").await;
        return;
    };

    let mut guard = state.lock().await;
    match message {
        ParsedClientMessage::Input { intent } => {
            guard.session.receive_input(intent);
        }
        ParsedClientMessage::Restart { seed, maze_size } => {
            let config = restart_config(guard.session.config(), maze_size);
            let level = guard.session.restart(resolve_seed(seed), Some(config));
            guard.summary_sent = false;
            info!(client = %client_id, session = %level.session_id, "restart requested");
            broadcast(
                &mut guard,
                &json!({
                    "type": "level",
                    "level": level,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::Ping { t } => {
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }
}

fn send_welcome(state: &mut ServerState, client_id: &str) {
    let engine = state.session.engine();
    let welcome = json!({
        "type": "welcome",
        "clientId": client_id,
        "level": engine.level_init(),
        "config": state.session.config(),
    });
    send_to_client(state, client_id, &welcome, QueuePolicy::DisconnectOnFull);
}

async fn start_tick_loop(state: SharedState) {
    let tick_ms = state.lock().await.tick_ms;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_session(&mut guard);
        }
    });
}

fn tick_session(state: &mut ServerState) {
    let snapshot = state.session.tick(state.tick_ms);
    broadcast(
        state,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );

    if state.summary_sent || !state.session.engine().is_ended() {
        return;
    }
    let summary = state.session.summary();
    info!(
        session = %summary.session_id,
        phase = ?summary.phase,
        duration_ms = summary.duration_ms,
        "session over"
    );
    broadcast(
        state,
        &json!({
            "type": "session_over",
            "summary": summary,
        }),
        QueuePolicy::DisconnectOnFull,
    );
    state.summary_sent = true;
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        disconnect_client(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &Value, policy: QueuePolicy) {
    let payload = message.to_string();
    let mut failed_clients = Vec::new();
    for (client_id, client) in &state.clients {
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id.clone());
        }
    }
    for client_id in failed_clients {
        disconnect_client(state, &client_id);
    }
}

/// Asks the writer task to close; the socket loop removes the entry.
fn disconnect_client(state: &mut ServerState, client_id: &str) {
    let Some(client) = state.clients.remove(client_id) else {
        return;
    };
    warn!(client = %client_id, "outbound queue full, disconnecting");
    let _ = client.tx.try_send(OutboundMessage::Close {
        code: 1013,
        reason: "client too slow".to_string(),
    });
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn restart_config(current: &GameConfig, maze_size: Option<i64>) -> GameConfig {
    let size = normalize_maze_size(maze_size, current.maze_width);
    GameConfig {
        maze_width: size,
        maze_height: size,
        ..current.clone()
    }
}

fn resolve_seed(raw: Option<i64>) -> u32 {
    normalize_seed(raw.unwrap_or_else(|| chrono::Utc::now().timestamp_millis()))
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}
