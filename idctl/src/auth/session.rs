//! Login sessions.
//!
//! Sessions are held in process memory, keyed by an opaque bearer token. The
//! cache evicts a session after it has been idle for the configured timeout,
//! so every command an admin runs pushes their expiry forward. Each session
//! carries the [`SearchSession`] that gives paging cursors their state.

use crate::search::SearchSession;
use crate::types::{AdminId, UserId};
use base64::{Engine as _, engine::general_purpose};
use moka::future::Cache;
use rand::prelude::RngExt;
use rand::rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// An opaque 256-bit bearer token, base64url encoded without padding.
///
/// The `Debug` impl is redacted so tokens never reach the logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generates a fresh token from 32 bytes of CSPRNG output.
    pub fn generate() -> Self {
        let mut token_bytes = [0u8; 32];
        rng().fill(&mut token_bytes);

        Self(general_purpose::URL_SAFE_NO_PAD.encode(token_bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for SessionToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(redacted)")
    }
}

/// The account a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOwner {
    Admin(AdminId),
    User(UserId),
}

impl SessionOwner {
    /// The owning account id, whichever kind it is.
    pub fn id(self) -> Uuid {
        match self {
            SessionOwner::Admin(id) => id,
            SessionOwner::User(id) => id,
        }
    }
}

/// The mutable state of one live session.
///
/// The search state sits behind its own async mutex: two commands arriving on
/// the same session serialize their cursor movements instead of racing.
#[derive(Debug)]
pub struct SessionState {
    pub owner: SessionOwner,
    pub search: Mutex<SearchSession>,
}

impl SessionState {
    fn new(owner: SessionOwner) -> Self {
        Self {
            owner,
            search: Mutex::new(SearchSession::new()),
        }
    }
}

/// The in-memory session store.
///
/// Cheap to clone; clones share the underlying cache.
#[derive(Clone)]
pub struct SessionService {
    sessions: Cache<SessionToken, Arc<SessionState>>,
}

impl SessionService {
    /// Creates a store evicting sessions idle for longer than `idle_timeout`,
    /// holding at most `capacity` sessions.
    pub fn new(capacity: u64, idle_timeout: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(idle_timeout)
            .build();

        Self { sessions }
    }

    /// Creates a session for `owner` and returns its token and state.
    pub async fn create(&self, owner: SessionOwner) -> (SessionToken, Arc<SessionState>) {
        let token = SessionToken::generate();
        let state = Arc::new(SessionState::new(owner));
        self.sessions.insert(token.clone(), Arc::clone(&state)).await;
        (token, state)
    }

    /// Looks up a live session, refreshing its idle clock.
    pub async fn get(&self, token: &SessionToken) -> Option<Arc<SessionState>> {
        self.sessions.get(token).await
    }

    /// Ends a session. A miss is not an error.
    pub async fn delete(&self, token: &SessionToken) {
        self.sessions.invalidate(token).await;
    }
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("entry_count", &self.sessions.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_distinct_base64url() {
        let token1 = SessionToken::generate();
        let token2 = SessionToken::generate();

        assert_ne!(token1, token2);

        // 32 bytes encode to 43 chars without padding
        assert_eq!(token1.as_str().len(), 43);
        assert!(
            token1
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert!(!token1.as_str().contains('='));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = SessionToken::generate();
        let rendered = format!("{token:?}");
        assert_eq!(rendered, "SessionToken(redacted)");
        assert!(!rendered.contains(token.as_str()));
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let service = SessionService::new(100, Duration::from_secs(60));
        let owner = SessionOwner::Admin(Uuid::new_v4());

        let (token, state) = service.create(owner).await;
        assert_eq!(state.owner, owner);

        let found = service.get(&token).await.unwrap();
        assert_eq!(found.owner, owner);
        assert!(Arc::ptr_eq(&found, &state));

        service.delete(&token).await;
        assert!(service.get(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_token_misses() {
        let service = SessionService::new(100, Duration::from_secs(60));
        assert!(service.get(&SessionToken::from("no-such-token")).await.is_none());
    }

    #[tokio::test]
    async fn test_sessions_expire_when_idle() {
        let service = SessionService::new(100, Duration::from_millis(50));
        let (token, _) = service.create(SessionOwner::User(Uuid::new_v4())).await;

        assert!(service.get(&token).await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(service.get(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_sessions_share_state_across_clones() {
        let service = SessionService::new(100, Duration::from_secs(60));
        let clone = service.clone();

        let (token, _) = service.create(SessionOwner::Admin(Uuid::new_v4())).await;
        assert!(clone.get(&token).await.is_some());
    }
}
