use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};


/// Device identity and bearer token used to authenticate bus jobs
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub uuid: String,
    pub token: String,
}

impl Credentials {
    pub fn new(uuid: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            token: token.into(),
        }
    }
}

// Tokens stay out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("uuid", &self.uuid)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Authenticated state of one client connection
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub connection_id: String,
    pub credentials: Credentials,
    pub authenticated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(connection_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            connection_id: connection_id.into(),
            credentials,
            authenticated_at: Utc::now(),
        }
    }
}

/// Per-connection credential registry.
///
/// In-process only. Entries are created on successful authentication and
/// removed on unregister or disconnect; nothing survives a restart.
pub struct SessionStore {
    /// connection_id -> Session
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Look up the session bound to a connection
    pub fn get(&self, connection_id: &str) -> Option<Session> {
        self.sessions.get(connection_id).map(|s| s.clone())
    }

    /// Bind a session to a connection, replacing any previous one wholesale
    pub fn save(&self, connection_id: &str, session: Session) {
        self.sessions.insert(connection_id.to_string(), session);
    }

    /// Drop the session bound to a connection
    pub fn remove(&self, connection_id: &str) -> Option<Session> {
        self.sessions.remove(connection_id).map(|(_, s)| s)
    }

    /// Drop the session authenticated as `uuid` (used after unregistration).
    ///
    /// Returns the connection id whose session was removed.
    pub fn remove_by_uuid(&self, uuid: &str) -> Option<String> {
        let connection_id = self
            .sessions
            .iter()
            .find(|entry| entry.value().credentials.uuid == uuid)
            .map(|entry| entry.key().clone())?;
        self.sessions.remove(&connection_id);
        Some(connection_id)
    }

    /// Number of authenticated connections
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
