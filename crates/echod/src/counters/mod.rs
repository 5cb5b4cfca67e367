//! The five shared counters and the atomic batch primitive.
//!
//! Every coordination step in echoloop is a single [`Batch`] applied through
//! a [`CounterSet`]. A batch is an ordered list of `(counter, delta, flags)`
//! entries that commits as a whole or not at all:
//!
//! - a negative delta blocks while the running value would drop below zero,
//! - a zero delta blocks until the running value is zero,
//! - an entry flagged [`Flags::NO_WAIT`] turns "would block" into an
//!   immediate [`CounterError::Blocked`] for the whole batch,
//! - an entry flagged [`Flags::UNDO`] is reversed automatically when the
//!   owning process dies.
//!
//! Two backends implement the trait: [`SemSet`] over a SysV semaphore set
//! (the production path, shared across processes) and [`Arbiter`], a
//! mutex/condvar arbiter for a single process where each [`Participant`]
//! stands in for one process.

mod arbiter;
mod sem;

pub use arbiter::{Arbiter, Participant};
pub use sem::SemSet;

use std::fmt;
use std::io;
use std::ops::BitOr;

use echo_core::{EchoError, Role, Stage};
use thiserror::Error;

/// Number of counters in the set.
pub const COUNTER_COUNT: usize = 5;

/// The named counters, in kernel set order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Election token. Non-zero while a collector lives.
    Single,
    /// Collector is alive and willing to receive.
    Collector,
    /// A sender is registered for the next transfer.
    Sender,
    /// Participants inside the handshake critical section (0, 1 or 2).
    TransferActive,
    /// Participants whose half of the current transfer is finished.
    TransferDone,
}

impl Counter {
    pub const ALL: [Counter; COUNTER_COUNT] = [
        Counter::Single,
        Counter::Collector,
        Counter::Sender,
        Counter::TransferActive,
        Counter::TransferDone,
    ];

    /// Position of the counter in the kernel semaphore set.
    pub fn index(self) -> u16 {
        match self {
            Counter::Single => 0,
            Counter::Collector => 1,
            Counter::Sender => 2,
            Counter::TransferActive => 3,
            Counter::TransferDone => 4,
        }
    }

    /// The readiness counter owned by `role`.
    pub fn readiness(role: Role) -> Counter {
        match role {
            Role::Collector => Counter::Collector,
            Role::Sender => Counter::Sender,
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Counter::Single => "single",
            Counter::Collector => "collector-ready",
            Counter::Sender => "sender-ready",
            Counter::TransferActive => "transfer-active",
            Counter::TransferDone => "transfer-done",
        };
        f.write_str(name)
    }
}

/// Per-entry flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Reverse this adjustment when the owner dies.
    pub const UNDO: Flags = Flags(0b01);
    /// Fail the batch instead of blocking on this entry.
    pub const NO_WAIT: Flags = Flags(0b10);

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// One adjustment inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub counter: Counter,
    pub delta: i16,
    pub flags: Flags,
}

/// An ordered list of adjustments applied as one indivisible unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    entries: Vec<Entry>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Appends a raw adjustment.
    pub fn adjust(mut self, counter: Counter, delta: i16, flags: Flags) -> Self {
        self.push(Entry {
            counter,
            delta,
            flags,
        });
        self
    }

    /// Barrier: blocks until `counter` is zero.
    pub fn wait_zero(self, counter: Counter) -> Self {
        self.adjust(counter, 0, Flags::NONE)
    }

    /// Requires `counter >= n` without changing it.
    ///
    /// Expands to `-n` followed by `+n`. `flags` apply to the decrement, so
    /// passing [`Flags::NO_WAIT`] turns the barrier into a liveness probe.
    pub fn at_least(self, counter: Counter, n: i16, flags: Flags) -> Self {
        self.adjust(counter, -n, flags)
            .adjust(counter, n, Flags::NONE)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A value for each counter.
///
/// Used for arbiter state, for per-owner undo ledgers and for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterValues {
    pub single: i32,
    pub collector: i32,
    pub sender: i32,
    pub transfer_active: i32,
    pub transfer_done: i32,
}

impl CounterValues {
    pub fn get(&self, counter: Counter) -> i32 {
        match counter {
            Counter::Single => self.single,
            Counter::Collector => self.collector,
            Counter::Sender => self.sender,
            Counter::TransferActive => self.transfer_active,
            Counter::TransferDone => self.transfer_done,
        }
    }

    pub fn slot(&mut self, counter: Counter) -> &mut i32 {
        match counter {
            Counter::Single => &mut self.single,
            Counter::Collector => &mut self.collector,
            Counter::Sender => &mut self.sender,
            Counter::TransferActive => &mut self.transfer_active,
            Counter::TransferDone => &mut self.transfer_done,
        }
    }

    /// Adds every `UNDO` entry of a committed batch.
    pub fn record_undo(&mut self, batch: &Batch) {
        for entry in batch.entries() {
            if entry.flags.contains(Flags::UNDO) {
                *self.slot(entry.counter) += i32::from(entry.delta);
            }
        }
    }

    /// True when every counter is zero.
    pub fn is_baseline(&self) -> bool {
        Counter::ALL.iter().all(|c| self.get(*c) == 0)
    }
}

/// Result of evaluating a batch against a set of values.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Commit(CounterValues),
    Wait,
    Blocked,
}

/// Evaluates `batch` in order against a working copy of `current`.
pub(crate) fn evaluate(current: &CounterValues, batch: &Batch) -> Outcome {
    let mut next = *current;
    for entry in batch.entries() {
        let slot = next.slot(entry.counter);
        let delta = i32::from(entry.delta);
        let would_block = if delta == 0 {
            *slot != 0
        } else {
            *slot + delta < 0
        };
        if would_block {
            return if entry.flags.contains(Flags::NO_WAIT) {
                Outcome::Blocked
            } else {
                Outcome::Wait
            };
        }
        *slot += delta;
    }
    Outcome::Commit(next)
}

/// Errors from applying a batch.
#[derive(Error, Debug)]
pub enum CounterError {
    /// A `NO_WAIT` entry could not be satisfied.
    #[error("counter operation would block")]
    Blocked,

    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl CounterError {
    pub fn io(op: &'static str, source: io::Error) -> Self {
        Self::Io { op, source }
    }

    /// Maps a failed handshake batch to the domain error.
    ///
    /// `Blocked` means the peer's liveness probe failed.
    pub fn into_echo(self, peer: Role, stage: Stage) -> EchoError {
        match self {
            CounterError::Blocked => EchoError::PeerDead { peer, stage },
            CounterError::Io { op, source } => EchoError::resource(op, source),
        }
    }
}

/// A shared counter set supporting atomic batches.
pub trait CounterSet: Send + Sync {
    /// Applies `batch` atomically.
    ///
    /// Blocks until every entry can be satisfied, unless a `NO_WAIT` entry
    /// would block, in which case nothing is applied and
    /// [`CounterError::Blocked`] is returned.
    fn apply(&self, batch: &Batch) -> Result<(), CounterError>;

    /// Reads the current value of one counter.
    fn value(&self, counter: Counter) -> Result<i32, CounterError>;

    /// Reads every counter. Not atomic across counters.
    fn values(&self) -> Result<CounterValues, CounterError> {
        let mut values = CounterValues::default();
        for counter in Counter::ALL {
            *values.slot(counter) = self.value(counter)?;
        }
        Ok(values)
    }
}

impl<C: CounterSet + ?Sized> CounterSet for std::sync::Arc<C> {
    fn apply(&self, batch: &Batch) -> Result<(), CounterError> {
        (**self).apply(batch)
    }

    fn value(&self, counter: Counter) -> Result<i32, CounterError> {
        (**self).value(counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(single: i32, transfer_active: i32) -> CounterValues {
        CounterValues {
            single,
            transfer_active,
            ..CounterValues::default()
        }
    }

    #[test]
    fn test_flags_combine() {
        let flags = Flags::UNDO | Flags::NO_WAIT;
        assert!(flags.contains(Flags::UNDO));
        assert!(flags.contains(Flags::NO_WAIT));
        assert!(!Flags::UNDO.contains(Flags::NO_WAIT));
        assert!(Flags::UNDO.contains(Flags::NONE));
    }

    #[test]
    fn test_at_least_expands_to_pair() {
        let batch = Batch::new().at_least(Counter::TransferActive, 2, Flags::NO_WAIT);
        assert_eq!(
            batch.entries(),
            &[
                Entry {
                    counter: Counter::TransferActive,
                    delta: -2,
                    flags: Flags::NO_WAIT
                },
                Entry {
                    counter: Counter::TransferActive,
                    delta: 2,
                    flags: Flags::NONE
                },
            ]
        );
    }

    #[test]
    fn test_evaluate_commits_all_entries() {
        let batch = Batch::new()
            .wait_zero(Counter::TransferActive)
            .adjust(Counter::Single, 1, Flags::UNDO);
        assert_eq!(evaluate(&values(0, 0), &batch), Outcome::Commit(values(1, 0)));
    }

    #[test]
    fn test_evaluate_zero_delta_waits_on_nonzero() {
        let batch = Batch::new().wait_zero(Counter::TransferActive);
        assert_eq!(evaluate(&values(0, 1), &batch), Outcome::Wait);
    }

    #[test]
    fn test_evaluate_no_wait_entry_blocks() {
        let batch = Batch::new()
            .adjust(Counter::Single, 0, Flags::NO_WAIT)
            .adjust(Counter::Single, 1, Flags::UNDO);
        assert_eq!(evaluate(&values(1, 0), &batch), Outcome::Blocked);
    }

    #[test]
    fn test_evaluate_probe_is_net_zero() {
        let current = values(1, 2);
        let batch = Batch::new()
            .at_least(Counter::Single, 1, Flags::NO_WAIT)
            .at_least(Counter::TransferActive, 2, Flags::NONE);
        assert_eq!(evaluate(&current, &batch), Outcome::Commit(current));
    }

    #[test]
    fn test_evaluate_first_blocking_entry_decides() {
        // The waiting barrier comes first, so the probe is never reached.
        let batch = Batch::new()
            .at_least(Counter::TransferActive, 2, Flags::NONE)
            .at_least(Counter::Sender, 1, Flags::NO_WAIT);
        assert_eq!(evaluate(&values(0, 1), &batch), Outcome::Wait);
    }

    #[test]
    fn test_evaluate_uses_running_value() {
        // +1 then "== 0" inside one batch sees the incremented value.
        let batch = Batch::new()
            .adjust(Counter::Sender, 1, Flags::NONE)
            .wait_zero(Counter::Sender);
        assert_eq!(evaluate(&CounterValues::default(), &batch), Outcome::Wait);
    }

    #[test]
    fn test_record_undo_only_counts_undo_entries() {
        let batch = Batch::new()
            .at_least(Counter::Collector, 1, Flags::NONE)
            .adjust(Counter::TransferActive, 1, Flags::UNDO);
        let mut held = CounterValues::default();
        held.record_undo(&batch);
        assert_eq!(held.transfer_active, 1);
        assert_eq!(held.collector, 0);
        assert!(!held.is_baseline());
    }

    #[test]
    fn test_blocked_maps_to_peer_dead() {
        let err = CounterError::Blocked.into_echo(Role::Sender, Stage::Enter);
        assert!(matches!(
            err,
            EchoError::PeerDead {
                peer: Role::Sender,
                stage: Stage::Enter
            }
        ));
    }

    #[test]
    fn test_readiness_counters() {
        assert_eq!(Counter::readiness(Role::Collector), Counter::Collector);
        assert_eq!(Counter::readiness(Role::Sender), Counter::Sender);
        assert_eq!(Counter::TransferDone.index(), 4);
    }
}
