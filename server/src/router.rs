//! Per-room message routing.
//!
//! A [`Room`] owns the session registry and the shared world, and applies one
//! inbound event at a time. Each session moves through a small state machine:
//!
//! ```text
//! Pending --init--> Active --close/sweep--> (removed)
//! ```
//!
//! Only `init` is accepted while pending, and `init` is rejected once active.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::{
    ChatMessageMsg, ClientMsg, CoinCollectedMsg, InitMsg, PlayerLeftMsg, PlayerPosition,
    PlayerState, PlayerUpdateMsg, PowerUpCollectedMsg, ServerMsg, TrickPerformedMsg, Vec3,
    PROTOCOL_VERSION,
};
use crate::registry::Registry;
use crate::session::{PlayerId, SessionPhase};
use crate::world::WorldState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("no session with id {0}")]
    UnknownSession(PlayerId),
    #[error("session {0} has not sent init")]
    NotActive(PlayerId),
    #[error("session {0} is already active")]
    AlreadyActive(PlayerId),
}

/// One relay room: its players and the world they share.
pub struct Room {
    registry: Registry,
    world: WorldState,
}

impl Room {
    pub fn new(world: WorldState) -> Self {
        Self {
            registry: Registry::new(),
            world,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Register a new connection. The session starts pending and the world
    /// seed is created if this is the first connection.
    pub fn connect(&mut self, outbound: mpsc::Sender<ServerMsg>) -> PlayerId {
        self.world.ensure_seed();
        let id = self.registry.register(outbound).id.clone();
        tracing::info!(player_id = %id, players = self.registry.len(), "player connected");
        id
    }

    /// Apply one parsed message from session `id`.
    pub fn handle_message(&mut self, id: &str, msg: ClientMsg) -> Result<(), RouteError> {
        let phase = self
            .registry
            .get(id)
            .map(|s| s.phase)
            .ok_or_else(|| RouteError::UnknownSession(id.to_string()))?;

        match (phase, msg) {
            (SessionPhase::Pending, ClientMsg::Init { username }) => {
                self.on_init(id, username);
                Ok(())
            }
            (SessionPhase::Active, ClientMsg::Init { .. }) => {
                Err(RouteError::AlreadyActive(id.to_string()))
            }
            (SessionPhase::Pending, _) => Err(RouteError::NotActive(id.to_string())),
            (SessionPhase::Active, ClientMsg::Update { position, state }) => {
                self.on_update(id, position, state);
                Ok(())
            }
            (SessionPhase::Active, ClientMsg::CoinCollected { coin }) => {
                self.on_coin_collected(id, coin);
                Ok(())
            }
            (SessionPhase::Active, ClientMsg::PowerUpCollected { power_up }) => {
                self.on_power_up_collected(id, power_up);
                Ok(())
            }
            (SessionPhase::Active, ClientMsg::TrickPerformed { trick_name }) => {
                self.on_trick_performed(id, trick_name);
                Ok(())
            }
            (SessionPhase::Active, ClientMsg::ChatMessage { message }) => {
                self.on_chat_message(id, message);
                Ok(())
            }
        }
    }

    /// Close event for session `id`. Returns false if it was already gone.
    pub fn disconnect(&mut self, id: &str) -> bool {
        self.drop_session(id, "disconnected")
    }

    /// Remove every session whose socket closed without a close event.
    /// Returns the ids removed.
    pub fn sweep(&mut self) -> Vec<PlayerId> {
        let stale = self.registry.closed_ids();
        for id in &stale {
            self.drop_session(id, "swept");
        }
        if !stale.is_empty() {
            tracing::info!(count = stale.len(), "swept stale sessions");
        }
        stale
    }

    /// Drop all sessions, closing their sockets. Returns how many were open.
    pub fn shutdown(&mut self) -> usize {
        let count = self.registry.clear();
        tracing::info!(count, "closed all sessions");
        count
    }

    fn drop_session(&mut self, id: &str, reason: &'static str) -> bool {
        let Some(session) = self.registry.remove(id) else {
            return false;
        };
        tracing::info!(
            player_id = %id,
            username = session.username.as_deref().unwrap_or(""),
            reason,
            active = self.registry.active_count(),
            "player left"
        );
        // Pending sessions were never announced, so nobody needs to hear they left.
        if session.is_active() {
            let msg = ServerMsg::PlayerLeft(PlayerLeftMsg {
                id: session.id,
                username: session.username,
            });
            self.registry.broadcast(&msg, None);
        }
        true
    }

    fn on_init(&mut self, id: &str, username: String) {
        let game_state = self.world.game_state();
        let Some(session) = self.registry.get_mut(id) else {
            return;
        };
        session.activate(username);
        let username = session.username.clone().unwrap_or_default();
        tracing::info!(
            player_id = %id,
            %username,
            active = self.registry.active_count(),
            "player joined"
        );

        let reply = ServerMsg::Init(InitMsg {
            protocol_version: PROTOCOL_VERSION,
            id: id.to_string(),
            game_state,
        });
        self.send_or_log(id, reply);

        let others: Vec<_> = self
            .registry
            .all()
            .into_iter()
            .filter(|s| s.id != id)
            .filter_map(|s| s.joined_msg())
            .collect();
        for joined in others {
            self.send_or_log(id, ServerMsg::PlayerJoined(joined));
        }

        if let Some(joined) = self.registry.get(id).and_then(|s| s.joined_msg()) {
            let msg = ServerMsg::PlayerJoined(joined);
            self.registry.broadcast(&msg, Some(id));
        }
    }

    fn on_update(&mut self, id: &str, position: PlayerPosition, state: Option<PlayerState>) {
        let Some(session) = self.registry.get_mut(id) else {
            return;
        };
        session.apply_update(position, state);
        let msg = ServerMsg::Update(PlayerUpdateMsg {
            id: id.to_string(),
            position: session.position,
            state: session.state.clone(),
        });
        self.registry.broadcast(&msg, Some(id));
    }

    fn on_coin_collected(&mut self, id: &str, coin: Vec3) {
        match self.world.consume_coin(&coin) {
            Some(index) => {
                tracing::debug!(player_id = %id, index, "coin collected");
                let msg = ServerMsg::CoinCollected(CoinCollectedMsg {
                    coin_index: index as u32,
                    player_id: id.to_string(),
                });
                self.registry.broadcast(&msg, Some(id));
            }
            None => tracing::debug!(player_id = %id, ?coin, "coin already collected"),
        }
    }

    fn on_power_up_collected(&mut self, id: &str, power_up: Vec3) {
        match self.world.consume_power_up(&power_up) {
            Some(index) => {
                tracing::debug!(player_id = %id, index, "power-up collected");
                let msg = ServerMsg::PowerUpCollected(PowerUpCollectedMsg {
                    power_up_index: index as u32,
                    player_id: id.to_string(),
                });
                self.registry.broadcast(&msg, Some(id));
            }
            None => tracing::debug!(player_id = %id, ?power_up, "power-up already collected"),
        }
    }

    fn on_trick_performed(&mut self, id: &str, trick_name: String) {
        let Some(session) = self.registry.get(id) else {
            return;
        };
        let msg = ServerMsg::TrickPerformed(TrickPerformedMsg {
            player_id: id.to_string(),
            trick_name,
            position: session.position,
        });
        self.registry.broadcast(&msg, Some(id));
    }

    fn on_chat_message(&mut self, id: &str, message: String) {
        let Some(session) = self.registry.get(id) else {
            return;
        };
        let msg = ServerMsg::ChatMessage(ChatMessageMsg {
            player_id: id.to_string(),
            username: session.username.clone().unwrap_or_default(),
            message,
        });
        self.registry.broadcast(&msg, Some(id));
    }

    fn send_or_log(&self, id: &str, msg: ServerMsg) {
        let kind = msg.kind();
        if let Err(e) = self.registry.send_to(id, msg) {
            tracing::warn!(player_id = %id, kind, error = %e, "send failed");
        }
    }
}
