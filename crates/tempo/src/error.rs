//! Unified error type for the Tempo client.

use tempo_auth::AuthError;
use tempo_client::ClientError;
use tempo_game::GameError;
use tempo_lobby::LobbyError;
use tempo_protocol::{ApiError, ProtocolError};
use tempo_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tempo` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TempoError {
    /// A transport-level error (dial, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-format error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session error (sign-in, refresh, forced logout).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A connection-layer error (no credential, not connected,
    /// exhausted reconnection).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A move-handling error (illegal, rejected, out of turn).
    #[error(transparent)]
    Game(#[from] GameError),

    /// A challenge error (failed, unknown).
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A request/response call failed with a server-provided message.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The client has no active game for the requested operation.
    #[error("no active game")]
    NoActiveGame,
}
