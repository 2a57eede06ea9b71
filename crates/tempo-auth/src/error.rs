//! Error types for the auth layer.

use tempo_protocol::ApiError;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// An operation that needs a live session found none.
    #[error("no live session")]
    NoSession,

    /// The refresh credential was rejected or unreachable. This is fatal
    /// to the session: the manager has already cleared it (forced logout)
    /// by the time this error is returned.
    #[error("session expired: {0}")]
    Expired(#[source] ApiError),

    /// A non-fatal request/response failure (sign-in, sign-up).
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The persisted session could not be decoded.
    #[error("stored session is corrupt: {0}")]
    CorruptStore(String),
}
