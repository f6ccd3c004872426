//! Shared server state: the hub, the catalog registry, and guest sessions.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use musicparty_core::provider::ApiRegistry;
use musicparty_core::service::PartyHub;
use nanoid::nanoid;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<PartyHub>,
    pub apis: Arc<ApiRegistry>,
    pub sessions: Arc<SessionStore>,
}

struct UserSession {
    name: String,
    /// Catalog name -> bound upstream account identifier.
    bindings: HashMap<String, String>,
}

/// In-memory guest sessions, keyed by the cookie token. Session-scoped by
/// design: a restart forgets everyone, like the party itself.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, UserSession>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session with a generated guest name.
    pub fn create(&self) -> (String, String) {
        let token = nanoid!(24);
        let name = format!("guest-{}", nanoid!(6));
        self.sessions.insert(
            token.clone(),
            UserSession {
                name: name.clone(),
                bindings: HashMap::new(),
            },
        );
        (token, name)
    }

    #[must_use]
    pub fn exists(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    #[must_use]
    pub fn name(&self, token: &str) -> Option<String> {
        self.sessions.get(token).map(|s| s.name.clone())
    }

    pub fn set_name(&self, token: &str, name: &str) {
        if let Some(mut session) = self.sessions.get_mut(token) {
            session.name = name.to_string();
        }
    }

    pub fn bind(&self, token: &str, api_name: &str, identifier: &str) {
        if let Some(mut session) = self.sessions.get_mut(token) {
            session
                .bindings
                .insert(api_name.to_string(), identifier.to_string());
        }
    }

    #[must_use]
    pub fn binding(&self, token: &str, api_name: &str) -> Option<String> {
        self.sessions
            .get(token)
            .and_then(|s| s.bindings.get(api_name).cloned())
    }

    #[must_use]
    pub fn bindings(&self, token: &str) -> HashMap<String, String> {
        self.sessions
            .get(token)
            .map(|s| s.bindings.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let store = SessionStore::new();
        let (token, name) = store.create();
        assert!(name.starts_with("guest-"));
        assert!(store.exists(&token));
        assert_eq!(store.name(&token).as_deref(), Some(name.as_str()));

        store.set_name(&token, "Alice");
        assert_eq!(store.name(&token).as_deref(), Some("Alice"));

        store.bind(&token, "QQMusic", "12345");
        assert_eq!(store.binding(&token, "QQMusic").as_deref(), Some("12345"));
        assert!(store.binding(&token, "Netease").is_none());
        assert_eq!(store.bindings(&token).len(), 1);

        assert!(!store.exists("unknown"));
        assert!(store.name("unknown").is_none());
    }
}
