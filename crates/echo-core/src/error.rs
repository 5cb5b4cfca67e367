//! Error taxonomy shared by every layer.
//!
//! Only [`EchoError::PeerDead`] describes an expected failure mode (the
//! other side of a handshake went away); everything else is fatal for the
//! process.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::Role;

/// Handshake stage in which a failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ready,
    Capture,
    Open,
    Enter,
    Quit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ready => "ready",
            Stage::Capture => "capture",
            Stage::Open => "open",
            Stage::Enter => "enter",
            Stage::Quit => "quit",
        };
        f.write_str(name)
    }
}

fn peer_outcome(stage: &Stage) -> &'static str {
    match stage {
        Stage::Quit | Stage::Open => "failed",
        _ => "is dead",
    }
}

/// Errors that can end a transfer or the whole process.
#[derive(Error, Debug)]
pub enum EchoError {
    /// A no-wait liveness probe found the peer gone.
    ///
    /// Before the transfer the peer is reported dead, afterwards it is
    /// reported as having failed. Not retried automatically.
    #[error("{peer} process {}", peer_outcome(.stage))]
    PeerDead { peer: Role, stage: Stage },

    /// Counter set or byte channel failed for a reason other than blocking.
    #[error("{context}: {source}")]
    Resource {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// The byte channel delivered fewer bytes than the frame declared.
    #[error("can't receive full data: expected {expected} bytes, got {received}")]
    Framing { expected: usize, received: usize },

    /// Buffer growth failed.
    #[error("failed to allocate {requested} bytes")]
    AllocationFailure { requested: usize },

    /// An external termination signal arrived.
    #[error("{signal} caught")]
    TerminationRequested { signal: String },

    /// A role-restricted operation was invoked from the wrong side.
    #[error("{stage} is not a {role} stage")]
    WrongRole { role: Role, stage: Stage },
}

impl EchoError {
    /// Wraps an I/O error with a short description of the failed operation.
    pub fn resource(context: &'static str, source: io::Error) -> Self {
        Self::Resource { context, source }
    }

    /// Returns true if the error reports a vanished peer.
    pub fn is_peer_dead(&self) -> bool {
        matches!(self, Self::PeerDead { .. })
    }
}

/// Result type for echoloop operations.
pub type EchoResult<T> = Result<T, EchoError>;
