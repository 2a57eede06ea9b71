//! The server-authoritative presence set.

use tempo_protocol::{UserDescriptor, UserId};

/// The set of currently online users.
///
/// Replaced wholesale on every presence update — never patched
/// incrementally, so a missed update can't leave ghosts behind once the
/// next one lands.
#[derive(Debug, Default)]
pub struct PresenceSet {
    users: Vec<UserDescriptor>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts the server's roster, discarding whatever was held before.
    pub fn replace_all(&mut self, users: Vec<UserDescriptor>) {
        self.users = users;
    }

    pub fn users(&self) -> &[UserDescriptor] {
        &self.users
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
