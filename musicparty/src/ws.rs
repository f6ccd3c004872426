//! The real-time channel: one WebSocket per client, JSON frames both ways.
//!
//! Client frames are `{"method": "...", "reqId": n, ...}` commands; server
//! frames are either broadcast `PartyEvent`s (tagged with `type`) or
//! per-call `reply` / `call_error` frames carrying the same `reqId`.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use musicparty_core::models::{ActionId, ConnectionId, PartyEvent};
use musicparty_core::Error;

use crate::http::SessionToken;
use crate::state::AppState;

/// One frame per command; `reqId` is echoed back on the reply so the
/// client can pair calls with answers.
#[derive(Debug, Deserialize)]
struct CommandFrame {
    #[serde(rename = "reqId", default)]
    req_id: Option<u64>,
    #[serde(flatten)]
    command: ClientCommand,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    Rename { new_name: String },
    #[serde(rename_all = "camelCase")]
    EnqueueMusic { id: String, api_name: String },
    #[serde(rename_all = "camelCase")]
    TopSong { action_id: String },
    #[serde(rename_all = "camelCase")]
    RemoveSong { action_id: String },
    NextSong,
    RequestSetNowPlaying,
    ChatSay { content: String },
    GetMusicQueue,
    GetOnlineUsers,
}

pub async fn music_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
) -> Response {
    // Limit max message size to 64KB; command frames are tiny.
    ws.max_message_size(64 * 1024)
        .on_upgrade(move |socket| handle_socket(socket, state, token.0))
}

async fn handle_socket(socket: WebSocket, state: AppState, token: String) {
    let name = state
        .sessions
        .name(&token)
        .unwrap_or_else(|| "guest".to_string());
    let (conn_id, mut events) = state.hub.connect(name);
    info!(connection_id = %conn_id, "WebSocket connection established");

    let (mut sink, mut stream) = socket.split();

    // Single writer task; hub events and call replies share the channel so
    // frames go out in the order they were produced.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let event_pump = tokio::spawn({
        let out_tx = out_tx.clone();
        async move {
            while let Some(event) = events.recv().await {
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if out_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(error = %err, "failed to serialize party event"),
                }
            }
        }
    });

    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_frame(&state, &token, &conn_id, text.as_str(), &out_tx).await;
            }
            Ok(Message::Close(_)) => break,
            Err(err) => {
                debug!(connection_id = %conn_id, error = %err, "WebSocket read error");
                break;
            }
            // Ignore binary, ping and pong frames.
            Ok(_) => {}
        }
    }

    // Covers both graceful closes and abrupt network loss: the read stream
    // ending is the transport's disconnect notification.
    state.hub.disconnect(&conn_id);
    event_pump.abort();
    writer.abort();
    info!(connection_id = %conn_id, "WebSocket connection closed");
}

async fn handle_frame(
    state: &AppState,
    token: &str,
    conn_id: &ConnectionId,
    text: &str,
    out_tx: &mpsc::UnboundedSender<String>,
) {
    let frame: CommandFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            let _ = out_tx.send(call_error(None, &format!("malformed frame: {err}")));
            return;
        }
    };

    let req_id = frame.req_id;
    match dispatch(state, token, conn_id, frame.command).await {
        Ok(data) => {
            if req_id.is_some() {
                let _ = out_tx.send(reply(req_id, data));
            }
        }
        Err(err) => {
            let message = match &err {
                // Full detail for expected, client-actionable failures.
                Error::Validation(_)
                | Error::Auth(_)
                | Error::Upstream(_)
                | Error::NotFound(_)
                | Error::NotImplemented(_) => err.to_string(),
                Error::Internal(_) => {
                    warn!(error = %err, "internal error handling client command");
                    // Unclassified failures reach the client as a generic
                    // server-error push, without internals.
                    let push = PartyEvent::ServerError {
                        message: "internal server error".to_string(),
                    };
                    if let Ok(text) = serde_json::to_string(&push) {
                        let _ = out_tx.send(text);
                    }
                    "internal server error".to_string()
                }
            };
            let _ = out_tx.send(call_error(req_id, &message));
        }
    }
}

async fn dispatch(
    state: &AppState,
    token: &str,
    conn_id: &ConnectionId,
    command: ClientCommand,
) -> Result<Value, Error> {
    match command {
        ClientCommand::Rename { new_name } => {
            state.hub.rename(conn_id, &new_name)?;
            // Keep the session profile in step so reconnects keep the name.
            state.sessions.set_name(token, new_name.trim());
            Ok(Value::Null)
        }
        ClientCommand::EnqueueMusic { id, api_name } => {
            let entry = state.hub.enqueue_music(conn_id, &id, &api_name).await?;
            Ok(serde_json::to_value(entry)?)
        }
        ClientCommand::TopSong { action_id } => {
            state
                .hub
                .top_song(conn_id, &ActionId::from_string(action_id))?;
            Ok(Value::Null)
        }
        ClientCommand::RemoveSong { action_id } => {
            state
                .hub
                .remove_song(conn_id, &ActionId::from_string(action_id))?;
            Ok(Value::Null)
        }
        ClientCommand::NextSong => {
            state.hub.next_song(conn_id).await?;
            Ok(Value::Null)
        }
        ClientCommand::RequestSetNowPlaying => {
            state.hub.request_set_now_playing(conn_id).await?;
            Ok(Value::Null)
        }
        ClientCommand::ChatSay { content } => {
            state.hub.chat_say(conn_id, &content)?;
            Ok(Value::Null)
        }
        ClientCommand::GetMusicQueue => Ok(serde_json::to_value(state.hub.music_queue())?),
        ClientCommand::GetOnlineUsers => Ok(serde_json::to_value(state.hub.online_users())?),
    }
}

fn reply(req_id: Option<u64>, data: Value) -> String {
    json!({"type": "reply", "reqId": req_id, "data": data}).to_string()
}

fn call_error(req_id: Option<u64>, message: &str) -> String {
    json!({"type": "call_error", "reqId": req_id, "message": message}).to_string()
}
