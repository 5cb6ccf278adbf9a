//! Client-persisted session state.
//!
//! The gateway never owns the credential: the sign-in view writes it, the
//! gateway only reads the token and wipes everything on expiry.

use std::collections::HashMap;
use std::sync::Mutex;

/// Storage key holding `"true"` while the user is signed in.
pub const LOGIN_STATUS_KEY: &str = "loginstatus";
/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "key";

/// Key/value storage that survives across views (the browser session
/// storage in the web client).
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    /// Remove every entry, not only the session keys.
    fn clear(&self);
}

/// In-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().expect("session store mutex poisoned").is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("session store mutex poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("session store mutex poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn clear(&self) {
        self.entries.lock().expect("session store mutex poisoned").clear();
    }
}

/// The signed-in user's credential as persisted in a [`SessionStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    pub login_flag: bool,
}

impl SessionCredential {
    /// A fresh credential for a successful sign-in.
    pub fn signed_in(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            login_flag: true,
        }
    }

    pub fn load(store: &dyn SessionStore) -> Self {
        Self {
            token: store.get(TOKEN_KEY).unwrap_or_default(),
            login_flag: store.get(LOGIN_STATUS_KEY).as_deref() == Some("true"),
        }
    }

    pub fn persist(&self, store: &dyn SessionStore) {
        store.set(TOKEN_KEY, &self.token);
        store.set(LOGIN_STATUS_KEY, if self.login_flag { "true" } else { "false" });
    }

    /// Signed in with a non-empty token.
    pub fn is_authenticated(&self) -> bool {
        self.login_flag && !self.token.is_empty()
    }
}
