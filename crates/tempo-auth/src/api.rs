//! The non-real-time auth calls, consumed as an external collaborator.
//!
//! Tempo doesn't implement HTTP plumbing — the host application does
//! (reqwest, a browser fetch shim, whatever). This crate defines the
//! [`AuthApi`] trait: the four request/response pairs the session
//! lifecycle needs, each with a well-defined success payload and an
//! error payload carrying a message string.

use tempo_protocol::ApiError;

use crate::Session;

/// A fresh access credential returned by a refresh exchange.
///
/// `refresh_token` is `Some` only when the server rotates the refresh
/// credential along with the access one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Unix timestamp (seconds) at which `access_token` lapses.
    pub access_token_expiry: u64,
    pub refresh_token: Option<String>,
}

/// The authentication endpoints, behind a trait so production code can
/// use a real HTTP client and tests can use a scripted fake.
pub trait AuthApi: Send + Sync + 'static {
    /// Exchanges credentials for a full session.
    fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Session, ApiError>> + Send;

    /// Registers a new account. The caller signs in separately.
    fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;

    /// Exchanges the refresh credential for a new access credential.
    ///
    /// A failure here (network error, invalid or expired refresh token)
    /// is what forces logout — see
    /// [`SessionManager::refresh`](crate::SessionManager::refresh).
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl std::future::Future<Output = Result<TokenGrant, ApiError>> + Send;

    /// Tells the server the session is ending. Best-effort; failures are
    /// logged and ignored.
    fn sign_out(
        &self,
        access_token: &str,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;
}
