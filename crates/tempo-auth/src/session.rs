//! The session type: the client's record of an authenticated user.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tempo_protocol::UserId;

/// An authenticated session.
///
/// At most one `Session` is live in the process at a time, owned by the
/// [`SessionManager`](crate::SessionManager). Created on successful
/// sign-in, mutated on refresh, destroyed on logout or irrecoverable
/// refresh failure. `access_token_expiry` is always consistent with the
/// most recently stored `access_token` — both are replaced together in
/// [`Session::adopt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<String>,
    pub access_token: String,
    /// Unix timestamp (seconds) at which `access_token` lapses.
    pub access_token_expiry: u64,
    pub refresh_token: String,
}

impl Session {
    /// Whether the access token lapses within `margin` of `now`.
    ///
    /// Pure function of its inputs; an already-expired token is trivially
    /// expiring.
    pub fn expires_within(&self, margin: Duration, now: SystemTime) -> bool {
        let now_secs = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        self.access_token_expiry.saturating_sub(now_secs)
            < margin.as_secs()
    }

    /// Replaces the access credential (and, when the server rotates it,
    /// the refresh credential) after a successful refresh.
    pub fn adopt(&mut self, grant: crate::TokenGrant) {
        self.access_token = grant.access_token;
        self.access_token_expiry = grant.access_token_expiry;
        if let Some(refresh) = grant.refresh_token {
            self.refresh_token = refresh;
        }
    }
}
