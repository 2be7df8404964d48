//! Session state and the connect-time session gate.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ConnectRefusal;

/// What the transport needs to know about the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    /// Whether a user is signed in.
    pub is_authenticated: bool,
}

/// Source of session state, owned outside the transport.
pub trait SessionProvider: Send + Sync {
    /// Current session.
    fn current_session(&self) -> Session;
}

/// Read-only check consulted before connecting.
#[derive(Clone)]
pub struct SessionGate {
    provider: Arc<dyn SessionProvider>,
}

impl SessionGate {
    /// Create a gate over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    /// Whether a signed-in user is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.provider.current_session().is_authenticated
    }

    /// Check the gate.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectRefusal::NotAuthenticated`] when nobody is signed in.
    pub fn check(&self) -> Result<(), ConnectRefusal> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ConnectRefusal::NotAuthenticated)
        }
    }
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: u64,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Bearer token, also used as the connect-time credential.
    #[serde(default)]
    pub token: Option<String>,
    /// Whether the user completed sign-in.
    #[serde(default)]
    pub is_logged_in: bool,
}

/// Single-writer holder of the current user.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<User>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a signed-in user.
    pub fn sign_in(&self, user: User) {
        *self.current.write() = Some(user);
    }

    /// Forget the current user.
    pub fn sign_out(&self) {
        *self.current.write() = None;
    }

    /// Replace the token of the current user. Returns `false` if nobody is
    /// signed in.
    pub fn refresh_token(&self, token: impl Into<String>) -> bool {
        let mut current = self.current.write();
        match current.as_mut() {
            Some(user) => {
                user.token = Some(token.into());
                true
            }
            None => false,
        }
    }

    /// Snapshot of the current user.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.current.read().clone()
    }

    /// Token of the current user.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.current.read().as_ref().and_then(|u| u.token.clone())
    }
}

impl SessionProvider for SessionStore {
    fn current_session(&self) -> Session {
        Session {
            is_authenticated: self
                .current
                .read()
                .as_ref()
                .is_some_and(|u| u.is_logged_in),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(logged_in: bool) -> User {
        User {
            id: 7,
            name: Some("ada".to_string()),
            email: Some("ada@example.com".to_string()),
            token: Some("t0k".to_string()),
            is_logged_in: logged_in,
        }
    }

    #[test]
    fn test_empty_store_is_not_authenticated() {
        let store = Arc::new(SessionStore::new());
        let gate = SessionGate::new(store);
        assert!(!gate.is_authenticated());
        assert_eq!(gate.check(), Err(ConnectRefusal::NotAuthenticated));
    }

    #[test]
    fn test_user_must_be_logged_in() {
        let store = Arc::new(SessionStore::new());
        let gate = SessionGate::new(store.clone());

        store.sign_in(user(false));
        assert!(!gate.is_authenticated());

        store.sign_in(user(true));
        assert!(gate.check().is_ok());

        store.sign_out();
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn test_refresh_token() {
        let store = SessionStore::new();
        assert!(!store.refresh_token("new"));

        store.sign_in(user(true));
        assert!(store.refresh_token("new"));
        assert_eq!(store.token().as_deref(), Some("new"));
        assert_eq!(store.current_user().map(|u| u.id), Some(7));
    }

    #[test]
    fn test_user_deserializes_with_defaults() {
        let user: User = serde_json::from_str(r#"{"id": 3}"#).expect("decode");
        assert_eq!(user.id, 3);
        assert!(!user.is_logged_in);
        assert!(user.token.is_none());
    }

    #[test]
    fn test_gate_debug_does_not_leak_token() {
        let store = Arc::new(SessionStore::new());
        store.sign_in(user(true));
        let debug = format!("{:?}", SessionGate::new(store));
        assert!(debug.contains("authenticated: true"));
        assert!(!debug.contains("t0k"));
    }
}
