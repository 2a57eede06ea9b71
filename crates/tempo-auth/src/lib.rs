//! Session token lifecycle for Tempo.
//!
//! This crate owns the client's single live [`Session`]:
//!
//! 1. **Storage** — persisting credentials through the [`TokenStore`]
//!    trait (an external key/value store; the client never embeds
//!    storage-technology specifics).
//! 2. **Expiry tracking** — knowing when the access token is about to
//!    lapse ([`Session::expires_within`]).
//! 3. **Silent refresh** — a background check that exchanges the refresh
//!    credential before the access token expires, and the single forced-
//!    logout path when that exchange fails ([`SessionManager`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection layer (above)  ← reads the access token for each (re)connect
//!     ↕
//! Auth layer (this crate)   ← owns the session and its refresh timer
//!     ↕
//! AuthApi / TokenStore      ← external collaborators behind traits
//! ```

mod api;
mod error;
mod manager;
mod session;
mod storage;

pub use api::{AuthApi, TokenGrant};
pub use error::AuthError;
pub use manager::{AuthConfig, SessionManager};
pub use session::Session;
pub use storage::{
    MemoryStore, TokenStore, KEY_ACCESS_TOKEN, KEY_CURRENT_USER,
    KEY_REFRESH_TOKEN,
};
