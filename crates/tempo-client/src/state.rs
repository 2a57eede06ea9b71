//! Connection state machine and epoch identity.

use std::fmt;

/// Identity of one connection instance.
///
/// Every successful dial gets a fresh epoch, and an explicit disconnect
/// burns the current one. Anything still tagged with a superseded epoch —
/// a frame read by an old reader task, a loss notification from a
/// connection that was already replaced — is dropped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Epoch(u64);

impl Epoch {
    /// The epoch before any connection has existed.
    pub const ZERO: Self = Self(0);

    /// The next epoch.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch-{}", self.0)
    }
}

/// The lifecycle state of the single transport connection.
///
/// ```text
/// Disconnected → Connecting → Connected ──(loss)──→ Reconnecting ⇄ Connecting
///       ▲             │                                   │
///       └─(explicit disconnect, from anywhere)            │ attempts exhausted
///                                                         ▼
///                                                       Failed ──(manual reconnect)──→ Connecting
/// ```
///
/// Outbound publishes are accepted only in `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, none wanted.
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// Live connection under the given epoch.
    Connected { epoch: Epoch },
    /// Connection lost; attempt `attempt` is scheduled.
    Reconnecting { attempt: u32 },
    /// Automatic reconnection gave up. Requires an explicit reconnect.
    Failed,
}

impl ConnectionState {
    /// Whether outbound publishes are accepted right now.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { epoch } => write!(f, "Connected({epoch})"),
            Self::Reconnecting { attempt } => {
                write!(f, "Reconnecting(attempt {attempt})")
            }
            Self::Failed => write!(f, "Failed"),
        }
    }
}
