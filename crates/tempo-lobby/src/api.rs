//! Non-real-time lobby calls, consumed as results only.

use std::future::Future;

use tempo_protocol::{ApiError, UserDescriptor};

/// The lobby's request/response endpoints.
///
/// The presence *stream* stays authoritative once connected; this
/// fetch exists for the first paint and for polling fallback while the
/// connection is down.
pub trait LobbyApi: Send + Sync + 'static {
    /// Everyone currently online.
    fn online_users(
        &self,
    ) -> impl Future<Output = Result<Vec<UserDescriptor>, ApiError>> + Send;
}
