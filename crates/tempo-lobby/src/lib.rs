//! Challenge lifecycle and presence for Tempo.
//!
//! [`ChallengeTracker`] models the handshake that turns two online users
//! into a game:
//!
//! ```text
//! Pending ──accept──→ Accepted { game_id }   (terminal success)
//!    │────decline──→ Declined               (terminal failure)
//!    └────timeout/connection loss──→ Expired (terminal failure)
//! ```
//!
//! Like the game engine, the tracker holds no connection: `send`,
//! `accept`, and `decline` return the outbound publish for the caller to
//! route, and inbound challenge frames are fed back in. [`PresenceSet`]
//! is the server-authoritative roster of online users, replaced
//! wholesale on every update.

mod api;
mod challenge;
mod error;
mod presence;

pub use api::LobbyApi;
pub use challenge::{Challenge, ChallengeTracker, LobbyNotice};
pub use error::LobbyError;
pub use presence::PresenceSet;
