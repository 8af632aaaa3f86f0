use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::protocol::{PlayerJoinedMsg, PlayerPosition, PlayerState, ServerMsg};

pub type PlayerId = String;

/// Where a session is in the join handshake. A closed session is simply gone
/// from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, waiting for `init`
    Pending,
    /// Username received, visible to other players
    Active,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("outbound queue full")]
    Full,
    #[error("socket closed")]
    Closed,
}

/// Server-side record of one connected client.
///
/// Owns the only sender feeding the connection's socket writer; dropping the
/// session closes the socket.
#[derive(Debug)]
pub struct Session {
    pub id: PlayerId,
    outbound: mpsc::Sender<ServerMsg>,
    pub phase: SessionPhase,
    pub username: Option<String>,
    pub position: PlayerPosition,
    pub state: PlayerState,
}

impl Session {
    pub fn new(id: PlayerId, outbound: mpsc::Sender<ServerMsg>) -> Self {
        Self {
            id,
            outbound,
            phase: SessionPhase::Pending,
            username: None,
            position: PlayerPosition::default(),
            state: PlayerState::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Whether the connection's writer is still receiving.
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Queue a message for this session without waiting.
    pub fn send(&self, msg: ServerMsg) -> Result<(), SendError> {
        self.outbound.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Pending -> Active. Returns false (and changes nothing) if already active.
    pub fn activate(&mut self, username: String) -> bool {
        if self.is_active() {
            return false;
        }
        self.username = Some(username);
        self.phase = SessionPhase::Active;
        true
    }

    /// Replace the position wholesale and merge any reported flags.
    pub fn apply_update(&mut self, position: PlayerPosition, state: Option<PlayerState>) {
        self.position = position;
        if let Some(state) = state {
            self.state.merge(state);
        }
    }

    /// Snapshot announced to other players. `None` until the session is active.
    pub fn joined_msg(&self) -> Option<PlayerJoinedMsg> {
        if !self.is_active() {
            return None;
        }
        Some(PlayerJoinedMsg {
            id: self.id.clone(),
            username: self.username.clone()?,
            position: self.position,
            state: self.state.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(capacity: usize) -> (Session, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Session::new("1".to_string(), tx), rx)
    }

    #[test]
    fn new_session_is_pending_at_origin() {
        let (s, _rx) = session(4);
        assert_eq!(s.phase, SessionPhase::Pending);
        assert_eq!(s.position, PlayerPosition::default());
        assert!(s.username.is_none());
        assert!(s.joined_msg().is_none());
    }

    #[test]
    fn activate_only_once() {
        let (mut s, _rx) = session(4);
        assert!(s.activate("Alice".to_string()));
        assert!(!s.activate("Mallory".to_string()));
        assert_eq!(s.username.as_deref(), Some("Alice"));
        assert_eq!(s.joined_msg().unwrap().username, "Alice");
    }

    #[test]
    fn update_replaces_position_and_merges_state() {
        let (mut s, _rx) = session(4);
        s.apply_update(
            PlayerPosition::new(1.0, 2.0, 3.0, 0.5),
            Some(PlayerState {
                speed: Some(10.0),
                ..Default::default()
            }),
        );
        s.apply_update(PlayerPosition::new(4.0, 5.0, 6.0, 1.0), None);
        assert_eq!(s.position, PlayerPosition::new(4.0, 5.0, 6.0, 1.0));
        assert_eq!(s.state.speed, Some(10.0));
    }

    #[test]
    fn send_reports_full_and_closed() {
        let (s, rx) = session(1);
        let msg = || {
            ServerMsg::PlayerLeft(crate::protocol::PlayerLeftMsg {
                id: "x".to_string(),
                username: None,
            })
        };
        assert!(s.send(msg()).is_ok());
        assert_eq!(s.send(msg()), Err(SendError::Full));
        drop(rx);
        assert!(!s.is_open());
        assert_eq!(s.send(msg()), Err(SendError::Closed));
    }
}
