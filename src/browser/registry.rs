// Registry of open playback sessions, keyed by session id

use std::collections::BTreeMap;

use crate::player::{PlaybackSession, SessionId};

#[derive(Debug, Default)]
pub struct OpenSessionRegistry {
    next_id: u64,
    sessions: BTreeMap<SessionId, PlaybackSession>,
}

impl OpenSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh id; ids are never reused
    pub fn allocate_id(&mut self) -> SessionId {
        self.next_id += 1;
        SessionId(self.next_id)
    }

    pub fn insert(&mut self, session: PlaybackSession) {
        self.sessions.insert(session.id(), session);
    }

    pub fn get(&self, id: SessionId) -> Option<&PlaybackSession> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut PlaybackSession> {
        self.sessions.get_mut(&id)
    }

    pub fn remove(&mut self, id: SessionId) -> Option<PlaybackSession> {
        self.sessions.remove(&id)
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close and drop every session
    pub fn close_all(&mut self) {
        for (_, mut session) in std::mem::take(&mut self.sessions) {
            session.close();
        }
    }
}
