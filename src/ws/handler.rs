//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::entity::PlayerId;
use crate::game::ArenaError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Errors from writing to a client socket
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("socket send failed: {0}")]
    Socket(#[from] axum::Error),
}

/// WebSocket upgrade handler. Every connection gets a fresh ephemeral id.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let player_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: PlayerId, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");
    state.connections.open(player_id);

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id,
        mode: state.arena.mode,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        state.connections.close(&player_id);
        return;
    }

    let snapshot_rx = state.arena.subscribe();
    run_session(player_id, &state, ws_sink, ws_stream, snapshot_rx).await;

    // Cleanup on disconnect; a stopped arena has nothing left to clean
    if let Err(e) = state.arena.disconnect(player_id).await {
        debug!(player_id = %player_id, error = %e, "Disconnect not delivered");
    }
    state.connections.close(&player_id);

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: PlayerId,
    state: &AppState,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    snapshot_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    let (direct_tx, direct_rx) = mpsc::channel::<ServerMsg>(16);

    let writer_handle = tokio::spawn(run_writer(player_id, ws_sink, snapshot_rx, direct_rx));

    // Reader loop: WebSocket -> arena
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        if !admit(&client_msg, &rate_limiter) {
                            warn!(player_id = %player_id, "Rate limited input message");
                            continue;
                        }
                        if let Err(ArenaError::Closed) =
                            handle_client_msg(player_id, state, client_msg, &direct_tx).await
                        {
                            debug!(player_id = %player_id, "Arena channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        let _ = direct_tx
                            .send(ServerMsg::Error {
                                code: "bad_message".to_string(),
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Only input is throttled; join and ping always go through.
fn admit(msg: &ClientMsg, rate_limiter: &ConnectionRateLimiter) -> bool {
    match msg {
        ClientMsg::Input(_) => rate_limiter.check_input(),
        ClientMsg::Join(_) | ClientMsg::Ping { .. } => true,
    }
}

/// Route one parsed client message. Only `ArenaError::Closed` is fatal.
async fn handle_client_msg(
    player_id: PlayerId,
    state: &AppState,
    msg: ClientMsg,
    direct_tx: &mpsc::Sender<ServerMsg>,
) -> Result<(), ArenaError> {
    match msg {
        ClientMsg::Join(request) => match state.arena.join(player_id, request).await {
            Ok(()) => {
                state.connections.mark_joined(&player_id);
                let _ = direct_tx.send(ServerMsg::Joined { player_id }).await;
            }
            Err(ArenaError::Join(e)) => {
                debug!(player_id = %player_id, error = %e, "Join rejected");
                let _ = direct_tx
                    .send(ServerMsg::JoinRejected {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    })
                    .await;
            }
            Err(e) => return Err(e),
        },
        ClientMsg::Input(input) => state.arena.input(player_id, input).await?,
        ClientMsg::Ping { t } => {
            let _ = direct_tx.send(ServerMsg::Pong { t }).await;
        }
    }
    Ok(())
}

/// Writer task: replies and broadcast snapshots -> WebSocket.
///
/// A lagging client skips snapshots instead of slowing the arena down.
async fn run_writer(
    player_id: PlayerId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
    mut direct_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            direct = direct_rx.recv() => match direct {
                Some(msg) => msg,
                None => break,
            },
            snapshot = snapshot_rx.recv() => match snapshot {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(player_id = %player_id, lagged_count = n, "Client lagged, skipping {} snapshots", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "Snapshot channel closed");
                    break;
                }
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(player_id = %player_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), ProtocolError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
