//! Bearer-credential access.
//!
//! The client never owns the credential. It asks a [`TokenProvider`] for the
//! current value on every request, so a token written (or cleared) between two
//! calls is honored on the next one. Persisted storage stays outside the crate
//! behind the [`KeyValueStore`] accessor.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Default key the console token is stored under.
pub const TOKEN_KEY: &str = "console_token";

/// Source of the current bearer credential.
///
/// Returns an empty string when no credential is present.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> String;
}

impl<F> TokenProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn token(&self) -> String {
        self()
    }
}

/// A fixed credential.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> String {
        self.0.clone()
    }
}

/// String key-value accessor for persisted client state.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

/// A [`TokenProvider`] that reads through a [`KeyValueStore`] on every call.
pub struct StoredToken<S: KeyValueStore> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> StoredToken<S> {
    /// Read the token from [`TOKEN_KEY`].
    pub fn new(store: S) -> Self {
        Self::with_key(store, TOKEN_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Write a new token through the accessor.
    pub fn set(&self, token: &str) {
        self.store.set(&self.key, token);
    }

    /// Remove the token.
    pub fn clear(&self) {
        self.store.remove(&self.key);
    }
}

impl<S: KeyValueStore> TokenProvider for StoredToken<S> {
    fn token(&self) -> String {
        self.store.get(&self.key).unwrap_or_default()
    }
}
