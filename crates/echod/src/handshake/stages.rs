//! Batch construction for each handshake stage.
//!
//! Pure functions of the side running the stage, kept apart from the state
//! machine so the choreography can be read (and tested) in one place.

use echo_core::Role;

use crate::counters::{Batch, Counter, Flags};

/// Collector: wait out any running transfer, then announce readiness.
pub fn ready() -> Batch {
    Batch::new()
        .wait_zero(Counter::TransferActive)
        .adjust(Counter::Collector, 1, Flags::UNDO)
}

/// Sender: wait out any running transfer and any other registered sender,
/// then register.
pub fn capture() -> Batch {
    Batch::new()
        .wait_zero(Counter::TransferActive)
        .wait_zero(Counter::Sender)
        .adjust(Counter::Sender, 1, Flags::UNDO)
}

/// Enter, first half: wait for the peer to exist, then step inside.
///
/// The sender also probes the election token so it fails fast when no
/// collector exists at all.
pub fn enter_wait(role: Role) -> Batch {
    let peer = Counter::readiness(role.peer());
    let batch = match role {
        Role::Sender => Batch::new().at_least(Counter::Single, 1, Flags::NO_WAIT),
        Role::Collector => Batch::new(),
    };
    batch
        .at_least(peer, 1, Flags::NONE)
        .adjust(Counter::TransferActive, 1, Flags::UNDO)
}

/// Enter, second half: peer still alive and both sides inside.
pub fn enter_confirm(role: Role) -> Batch {
    Batch::new()
        .at_least(Counter::readiness(role.peer()), 1, Flags::NO_WAIT)
        .at_least(Counter::TransferActive, 2, Flags::NONE)
}

/// Quit, first step: this side's work is done.
pub fn quit_done() -> Batch {
    Batch::new().adjust(Counter::TransferDone, 1, Flags::UNDO)
}

/// Quit, second step: peer still inside, peer done too, drop own readiness.
pub fn quit_release(role: Role) -> Batch {
    Batch::new()
        .at_least(Counter::TransferActive, 2, Flags::NO_WAIT)
        .at_least(Counter::TransferDone, 2, Flags::NONE)
        .adjust(Counter::readiness(role), -1, Flags::UNDO)
}

/// Quit, final step: wait for the peer to drop its readiness, then restore
/// the transfer counters to baseline.
pub fn quit_restore(role: Role) -> Batch {
    Batch::new()
        .wait_zero(Counter::readiness(role.peer()))
        .adjust(Counter::TransferActive, -1, Flags::UNDO)
        .adjust(Counter::TransferDone, -1, Flags::UNDO)
}
