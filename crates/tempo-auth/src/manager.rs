//! The session manager: owns the single live session and its refresh timer.
//!
//! # Concurrency note
//!
//! The manager is shared between the caller (sign-in, logout, the
//! connection layer reading the access token) and one background task
//! (the periodic refresh check). State lives behind a `tokio::sync::Mutex`
//! and observers watch a `tokio::sync::watch` channel — there is no
//! callback registry, so forced logout can't re-enter caller code while
//! the lock is held.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    AuthApi, AuthError, Session, TokenStore, KEY_ACCESS_TOKEN,
    KEY_CURRENT_USER, KEY_REFRESH_TOKEN,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing knobs for the session lifecycle.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Refresh when time-to-expiry drops below this. Default: 5 minutes.
    pub refresh_margin: Duration,
    /// How often the background check wakes up. Default: 4 minutes —
    /// strictly less than `refresh_margin`, so a token can't lapse
    /// between two checks.
    pub check_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_margin: Duration::from_secs(5 * 60),
            check_interval: Duration::from_secs(4 * 60),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

struct Inner<S: TokenStore, A: AuthApi> {
    store: S,
    api: A,
    config: AuthConfig,
    session: tokio::sync::Mutex<Option<Session>>,
    changes: watch::Sender<Option<Session>>,
    /// Abort handle for the background refresh check. `None` while no
    /// session is live.
    checker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Owns the client's single live [`Session`].
///
/// ## Lifecycle
///
/// ```text
/// sign_in()/restore() ──→ set_session() ──→ [refresh check every 4 min]
///                              │                      │ expiring soon?
///                              │                      ▼
///                              │                  refresh() ──ok──→ tokens rotated
///                              │                      │ err
///                              ▼                      ▼
///                         clear_session() ←── forced logout (AuthError::Expired)
/// ```
///
/// Cheap to clone; all clones share the same state.
pub struct SessionManager<S: TokenStore, A: AuthApi> {
    inner: Arc<Inner<S, A>>,
}

impl<S: TokenStore, A: AuthApi> Clone for SessionManager<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TokenStore, A: AuthApi> SessionManager<S, A> {
    /// Creates a manager with no live session.
    pub fn new(store: S, api: A, config: AuthConfig) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                store,
                api,
                config,
                session: tokio::sync::Mutex::new(None),
                changes,
                checker: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Observes session changes. Receives `None` on logout — including
    /// the forced logout after a failed refresh — so the connection layer
    /// can tear down without polling.
    pub fn changes(&self) -> watch::Receiver<Option<Session>> {
        self.inner.changes.subscribe()
    }

    /// The current session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.inner.session.lock().await.clone()
    }

    /// The current access token, if a session is live.
    pub async fn access_token(&self) -> Option<String> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Installs a session: persists it, publishes the change, and starts
    /// the background refresh check.
    pub async fn set_session(&self, session: Session) {
        {
            let mut guard = self.inner.session.lock().await;
            self.persist(&session);
            *guard = Some(session.clone());
        }
        tracing::info!(user = %session.user_id, "session established");
        let _ = self.inner.changes.send(Some(session));
        self.spawn_checker();
    }

    /// Drops the session and wipes persisted credentials. Idempotent;
    /// this is the single forced-logout path.
    pub async fn clear_session(&self) {
        let removed = {
            let mut guard = self.inner.session.lock().await;
            guard.take()
        };
        if let Some(session) = removed {
            self.inner.store.remove(KEY_ACCESS_TOKEN);
            self.inner.store.remove(KEY_REFRESH_TOKEN);
            self.inner.store.remove(KEY_CURRENT_USER);
            let _ = self.inner.changes.send(None);
            tracing::info!(user = %session.user_id, "session cleared");
        }
        let handle = self.inner.checker.lock().expect("checker lock").take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Whether the access token lapses within the configured margin.
    pub async fn is_expiring_soon(&self) -> bool {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| {
                s.expires_within(
                    self.inner.config.refresh_margin,
                    SystemTime::now(),
                )
            })
    }

    /// Exchanges the refresh credential for a new access credential.
    ///
    /// # Errors
    /// - [`AuthError::NoSession`] if nothing is live.
    /// - [`AuthError::Expired`] if the exchange failed — the session has
    ///   already been cleared (forced logout) when this returns.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let refresh_token = {
            let guard = self.inner.session.lock().await;
            guard
                .as_ref()
                .ok_or(AuthError::NoSession)?
                .refresh_token
                .clone()
        };

        match self.inner.api.refresh(&refresh_token).await {
            Ok(grant) => {
                let updated = {
                    let mut guard = self.inner.session.lock().await;
                    let Some(session) = guard.as_mut() else {
                        // Logged out while the exchange was in flight; the
                        // new credential belongs to nobody. Drop it.
                        return Err(AuthError::NoSession);
                    };
                    session.adopt(grant);
                    self.persist(session);
                    session.clone()
                };
                tracing::debug!(
                    user = %updated.user_id,
                    expiry = updated.access_token_expiry,
                    "access token refreshed"
                );
                let _ = self.inner.changes.send(Some(updated));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, forcing logout");
                self.clear_session().await;
                Err(AuthError::Expired(e))
            }
        }
    }

    /// Registers a new account. The caller signs in separately.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        self.inner.api.sign_up(username, email, password).await?;
        Ok(())
    }

    /// Signs in and installs the resulting session.
    pub async fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = self.inner.api.sign_in(username, password).await?;
        self.set_session(session.clone()).await;
        Ok(session)
    }

    /// Loads a previously persisted session from the store, if present.
    ///
    /// # Errors
    /// Returns [`AuthError::CorruptStore`] when the stored value exists
    /// but cannot be decoded; the caller decides whether to wipe it.
    pub async fn restore(&self) -> Result<Option<Session>, AuthError> {
        let Some(raw) = self.inner.store.get(KEY_CURRENT_USER) else {
            return Ok(None);
        };
        let session: Session = serde_json::from_str(&raw)
            .map_err(|e| AuthError::CorruptStore(e.to_string()))?;
        self.set_session(session.clone()).await;
        Ok(Some(session))
    }

    /// Notifies the server (best-effort) and clears the session.
    pub async fn logout(&self) {
        if let Some(token) = self.access_token().await {
            if let Err(e) = self.inner.api.sign_out(&token).await {
                tracing::debug!(error = %e, "sign-out notification failed");
            }
        }
        self.clear_session().await;
    }

    fn persist(&self, session: &Session) {
        self.inner.store.set(KEY_ACCESS_TOKEN, &session.access_token);
        self.inner
            .store
            .set(KEY_REFRESH_TOKEN, &session.refresh_token);
        let raw = serde_json::to_string(session)
            .expect("session serializes to JSON");
        self.inner.store.set(KEY_CURRENT_USER, &raw);
    }

    /// Starts the periodic refresh check, replacing any previous one.
    ///
    /// The task holds only a `Weak` reference so an abandoned manager is
    /// not kept alive by its own timer. Each firing re-checks that a
    /// session is still live — cancellation is not instantaneous, and a
    /// firing that races a logout must do nothing.
    fn spawn_checker(&self) {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.check_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let manager = SessionManager { inner };
                if manager.session().await.is_none() {
                    break;
                }
                if manager.is_expiring_soon().await {
                    // A failed refresh has already forced logout; the
                    // abort from clear_session ends this task.
                    if manager.refresh().await.is_err() {
                        break;
                    }
                }
            }
        });

        let replaced = self
            .inner
            .checker
            .lock()
            .expect("checker lock")
            .replace(handle);
        if let Some(old) = replaced {
            old.abort();
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
