//! Process-lifetime session table mapping opaque tokens to identities.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::models::Identity;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub logged_in_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

/// 32 bytes from the OS RNG, hex encoded. Uniqueness is probabilistic.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, identity: Identity) -> String {
        let token = generate_token();
        let session = Session {
            identity,
            logged_in_at: Utc::now(),
        };
        self.sessions.write().insert(token.clone(), session);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Session> {
        self.sessions.read().get(token).cloned()
    }

    /// Returns whether a session was removed. Absent tokens are not an error.
    pub fn destroy(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn clear(&self) -> usize {
        let mut sessions = self.sessions.write();
        let dropped = sessions.len();
        sessions.clear();
        dropped
    }
}
