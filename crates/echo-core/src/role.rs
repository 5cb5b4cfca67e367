//! Process roles decided by the election.

use std::fmt;

/// The role a process plays for its whole lifetime.
///
/// Never chosen by the user: the first process to claim the election token
/// becomes the [`Role::Collector`], every other process is a [`Role::Sender`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Long-lived process that accumulates and periodically re-emits messages.
    Collector,
    /// Short-lived process that hands over a single message and exits.
    Sender,
}

impl Role {
    /// Returns the role on the other end of a handshake.
    pub fn peer(self) -> Role {
        match self {
            Role::Collector => Role::Sender,
            Role::Sender => Role::Collector,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Collector => "collector",
            Role::Sender => "sender",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
