use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::protocol::{ClientMsg, ServerMsg};
use crate::router::Room;
use crate::session::PlayerId;
use crate::world::WorldState;

/// Commands from client connections to the relay loop
#[derive(Debug)]
pub enum RelayCommand {
    Connect {
        outbound: mpsc::Sender<ServerMsg>,
        response: oneshot::Sender<PlayerId>,
    },
    Message {
        id: PlayerId,
        msg: ClientMsg,
    },
    Disconnect {
        id: PlayerId,
    },
    /// Close every session and stop. Replies with the number of sessions closed.
    Shutdown {
        done: oneshot::Sender<usize>,
    },
}

/// Spawn the relay loop and return the channel connections talk to it on.
pub fn spawn_relay(config: ServerConfig) -> (mpsc::Sender<RelayCommand>, JoinHandle<()>) {
    let (relay_tx, relay_rx) = mpsc::channel::<RelayCommand>(config.command_buffer);
    let handle = tokio::spawn(run_relay_loop(relay_rx, config));
    (relay_tx, handle)
}

/// Run the relay loop. Owns the room; every event is handled to completion
/// before the next one is looked at.
pub async fn run_relay_loop(mut cmd_rx: mpsc::Receiver<RelayCommand>, config: ServerConfig) {
    let mut room = Room::new(WorldState::new(config.world.clone()));

    let mut sweep_interval = tokio::time::interval(config.sweep_interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; there is nothing to sweep yet.
    sweep_interval.tick().await;

    loop {
        tokio::select! {
            _ = sweep_interval.tick() => {
                room.sweep();
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    RelayCommand::Connect { outbound, response } => {
                        let id = room.connect(outbound);
                        if response.send(id.clone()).is_err() {
                            // Connection task gave up before hearing its id.
                            room.disconnect(&id);
                        }
                    }
                    RelayCommand::Message { id, msg } => {
                        let kind = msg.kind();
                        if let Err(e) = room.handle_message(&id, msg) {
                            tracing::debug!(player_id = %id, kind, error = %e, "message rejected");
                        }
                    }
                    RelayCommand::Disconnect { id } => {
                        room.disconnect(&id);
                    }
                    RelayCommand::Shutdown { done } => {
                        let closed = room.shutdown();
                        let _ = done.send(closed);
                        break;
                    }
                }
            }
        }
    }

    room.shutdown();
    tracing::info!("Relay loop ended");
}
