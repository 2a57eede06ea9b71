//! The persistent credential store, as an external collaborator.
//!
//! The client needs three things remembered across restarts: the access
//! token, the refresh token, and the signed-in user. *Where* they live
//! (browser localStorage, a keyring, a file) is the host application's
//! business, expressed through the [`TokenStore`] trait.

use std::collections::HashMap;
use std::sync::Mutex;

/// Storage key for the raw access token.
pub const KEY_ACCESS_TOKEN: &str = "accessToken";
/// Storage key for the raw refresh token.
pub const KEY_REFRESH_TOKEN: &str = "refreshToken";
/// Storage key for the serialized session (user + tokens).
pub const KEY_CURRENT_USER: &str = "currentUser";

/// A string key/value store for credentials.
///
/// Implementations are synchronous — the contract is localStorage-shaped,
/// and the manager only touches it at session transitions, never on the
/// frame path.
pub trait TokenStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// An in-memory [`TokenStore`] for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("store lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("store lock")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().expect("store lock").remove(key);
    }
}
