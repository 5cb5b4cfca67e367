//! One-shot role election.

use echo_core::{EchoError, EchoResult, Role};
use tracing::info;

use crate::counters::{Batch, Counter, CounterError, CounterSet, Flags};

/// Decides this process's role by racing for the `Single` token.
///
/// Waits for any running transfer to finish, then tries to move `Single`
/// from 0 to 1 without waiting. The winner is the collector and keeps the
/// token (undo-tagged) for the rest of its life. Losing the race is the
/// normal outcome for every other process, not an error.
///
/// # Errors
///
/// `EchoError::Resource` if the counter set itself fails.
pub fn elect<C: CounterSet + ?Sized>(counters: &C) -> EchoResult<Role> {
    let claim = Batch::new()
        .wait_zero(Counter::TransferActive)
        .adjust(Counter::Single, 0, Flags::NO_WAIT)
        .adjust(Counter::Single, 1, Flags::UNDO);

    let role = match counters.apply(&claim) {
        Ok(()) => Role::Collector,
        Err(CounterError::Blocked) => Role::Sender,
        Err(CounterError::Io { op, source }) => return Err(EchoError::resource(op, source)),
    };
    info!(%role, "Role elected");
    Ok(role)
}
