use indexmap::IndexMap;
use tokio::sync::mpsc;

use crate::protocol::ServerMsg;
use crate::session::{PlayerId, SendError, Session};

/// All live sessions of one room, in registration order.
pub struct Registry {
    sessions: IndexMap<PlayerId, Session>,
    next_id: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: IndexMap::new(),
            next_id: 1,
        }
    }

    /// Create a pending session for a freshly accepted connection.
    ///
    /// Ids come from a monotonically increasing counter, so they never repeat
    /// within the lifetime of the registry.
    pub fn register(&mut self, outbound: mpsc::Sender<ServerMsg>) -> &Session {
        let id = to_base36(self.next_id);
        self.next_id += 1;
        debug_assert!(!self.sessions.contains_key(&id));

        self.sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id, outbound))
    }

    /// Remove a session. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: &str) -> Option<Session> {
        self.sessions.shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub fn all(&self) -> Vec<&Session> {
        self.sessions.values().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_active()).count()
    }

    /// Sessions whose socket writer has gone away.
    pub fn closed_ids(&self) -> Vec<PlayerId> {
        self.sessions
            .values()
            .filter(|s| !s.is_open())
            .map(|s| s.id.clone())
            .collect()
    }

    /// Drop every session, closing all sockets.
    pub fn clear(&mut self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }

    /// Send to one session.
    pub fn send_to(&self, id: &str, msg: ServerMsg) -> Result<(), SendError> {
        match self.sessions.get(id) {
            Some(session) => session.send(msg),
            None => Err(SendError::Closed),
        }
    }

    /// Best-effort fan-out to every open, active session except `exclude`.
    ///
    /// A failing recipient is logged and skipped; the rest still get the
    /// message. Returns the number of sessions the message was queued for.
    pub fn broadcast(&self, msg: &ServerMsg, exclude: Option<&str>) -> usize {
        let mut delivered = 0;
        for session in self.sessions.values() {
            if Some(session.id.as_str()) == exclude || !session.is_active() || !session.is_open()
            {
                continue;
            }
            match session.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        player_id = %session.id,
                        kind = msg.kind(),
                        error = %e,
                        "broadcast send failed"
                    );
                }
            }
        }
        delivered
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PlayerLeftMsg;
    use std::collections::HashSet;

    fn left(id: &str) -> ServerMsg {
        ServerMsg::PlayerLeft(PlayerLeftMsg {
            id: id.to_string(),
            username: None,
        })
    }

    fn register_active(
        registry: &mut Registry,
        name: &str,
        capacity: usize,
    ) -> (PlayerId, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = registry.register(tx).id.clone();
        registry.get_mut(&id).unwrap().activate(name.to_string());
        (id, rx)
    }

    #[test]
    fn base36_ids() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn ids_are_distinct_across_churn() {
        let mut registry = Registry::new();
        let mut live = HashSet::new();
        let mut receivers = Vec::new();
        for round in 0..200 {
            let (tx, rx) = mpsc::channel(1);
            receivers.push(rx);
            let id = registry.register(tx).id.clone();
            assert!(live.insert(id.clone()), "duplicate live id {}", id);
            if round % 3 == 0 {
                registry.remove(&id);
                live.remove(&id);
            }
        }
        assert_eq!(registry.len(), live.len());
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut registry = Registry::new();
        let (tx, _rx) = mpsc::channel(1);
        let first = registry.register(tx).id.clone();
        registry.remove(&first);
        let (tx, _rx2) = mpsc::channel(1);
        let second = registry.register(tx).id.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = Registry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = registry.register(tx).id.clone();
        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn all_is_in_registration_order() {
        let mut registry = Registry::new();
        let (a, _ra) = register_active(&mut registry, "a", 1);
        let (b, _rb) = register_active(&mut registry, "b", 1);
        let (c, _rc) = register_active(&mut registry, "c", 1);
        registry.remove(&b);
        let ids: Vec<_> = registry.all().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn broadcast_skips_excluded_and_pending() {
        let mut registry = Registry::new();
        let (a, mut ra) = register_active(&mut registry, "a", 4);
        let (_b, mut rb) = register_active(&mut registry, "b", 4);
        let (tx, mut pending_rx) = mpsc::channel(4);
        registry.register(tx);

        let delivered = registry.broadcast(&left("z"), Some(&a));
        assert_eq!(delivered, 1);
        assert!(ra.try_recv().is_err());
        assert!(rb.try_recv().is_ok());
        assert!(pending_rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_isolates_failing_recipient() {
        let mut registry = Registry::new();
        let (_a, mut ra) = register_active(&mut registry, "a", 4);
        // Full queue: every send to `b` fails.
        let (b, _rb) = register_active(&mut registry, "b", 1);
        registry.send_to(&b, left("filler")).unwrap();
        let (_c, mut rc) = register_active(&mut registry, "c", 4);

        let delivered = registry.broadcast(&left("z"), None);
        assert_eq!(delivered, 2);
        assert!(ra.try_recv().is_ok());
        assert!(rc.try_recv().is_ok());
    }

    #[test]
    fn closed_ids_reports_dropped_writers() {
        let mut registry = Registry::new();
        let (a, ra) = register_active(&mut registry, "a", 1);
        let (_b, _rb) = register_active(&mut registry, "b", 1);
        drop(ra);
        assert_eq!(registry.closed_ids(), vec![a]);
    }

    #[test]
    fn clear_closes_every_socket() {
        let mut registry = Registry::new();
        let (_a, mut ra) = register_active(&mut registry, "a", 1);
        assert_eq!(registry.clear(), 1);
        assert!(matches!(
            ra.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
