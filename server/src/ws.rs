use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{encode_server_msg, parse_client_msg, ProtocolError, ServerMsg};
use crate::relay_loop::RelayCommand;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub relay_tx: mpsc::Sender<RelayCommand>,
    pub outbound_buffer: usize,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMsg>(app_state.outbound_buffer);

    // Register with the relay
    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .relay_tx
        .send(RelayCommand::Connect {
            outbound: outbound_tx,
            response: resp_tx,
        })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Connect command");
        return;
    }

    let my_id = match resp_rx.await {
        Ok(id) => id,
        Err(_) => {
            tracing::error!("Failed to receive player id");
            return;
        }
    };

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match parse_client_msg(&text) {
                        Ok(client_msg) => {
                            let cmd = RelayCommand::Message {
                                id: my_id.clone(),
                                msg: client_msg,
                            };
                            if app_state.relay_tx.send(cmd).await.is_err() {
                                break;
                            }
                        }
                        Err(ProtocolError::UnknownKind(kind)) => {
                            tracing::trace!(player_id = %my_id, %kind, "unknown message kind");
                        }
                        Err(e) => {
                            tracing::warn!(player_id = %my_id, error = %e, "malformed message");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore ping/pong/binary
                    Some(Err(e)) => {
                        tracing::warn!(player_id = %my_id, error = %e, "socket error");
                        break;
                    }
                }
            }

            // Server -> Client
            outbound = outbound_rx.recv() => {
                let Some(server_msg) = outbound else {
                    // Session dropped by the relay (sweep or shutdown)
                    break;
                };
                let json = match encode_server_msg(&server_msg) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(player_id = %my_id, error = %e, "failed to encode message");
                        continue;
                    }
                };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;

    // Cleanup on disconnect; a no-op if the relay already dropped this session.
    let _ = app_state
        .relay_tx
        .send(RelayCommand::Disconnect { id: my_id.clone() })
        .await;
    tracing::debug!(player_id = %my_id, "connection closed");
}
