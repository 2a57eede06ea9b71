//! Error types for the lobby layer.

use tempo_protocol::ChallengeId;

/// Errors surfaced by challenge handling.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// A challenge could not be completed (failed accept, server-side
    /// refusal). The challenge has been removed locally.
    #[error("challenge failed: {0}")]
    ChallengeFailed(String),

    /// The id doesn't name any tracked challenge.
    #[error("unknown challenge {0}")]
    UnknownChallenge(ChallengeId),
}
