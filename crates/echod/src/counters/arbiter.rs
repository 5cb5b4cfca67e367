//! In-process counter arbiter.
//!
//! One mutex owns all five counters and one condvar wakes waiters on every
//! change. Each [`Participant`] plays the part of a process: it keeps a
//! ledger of its `UNDO` adjustments and reverses them when dropped, which is
//! how a crash is modelled without the kernel.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::trace;

use super::{evaluate, Batch, Counter, CounterError, CounterSet, CounterValues, Outcome};

/// Shared owner of the counters.
#[derive(Debug, Default)]
pub struct Arbiter {
    state: Mutex<CounterValues>,
    changed: Condvar,
}

impl Arbiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a new participant handle bound to this arbiter.
    pub fn participant(self: &Arc<Self>) -> Participant {
        Participant {
            arbiter: Arc::clone(self),
            undo: Mutex::new(CounterValues::default()),
        }
    }

    /// Current value of every counter.
    pub fn snapshot(&self) -> CounterValues {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, CounterValues> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One arbiter client, standing in for one process.
#[derive(Debug)]
pub struct Participant {
    arbiter: Arc<Arbiter>,
    undo: Mutex<CounterValues>,
}

impl Participant {
    /// Adjustments this participant would have reversed if dropped now.
    pub fn pending_undo(&self) -> CounterValues {
        *self.undo.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CounterSet for Participant {
    fn apply(&self, batch: &Batch) -> Result<(), CounterError> {
        let mut state = self.arbiter.lock();
        loop {
            match evaluate(&state, batch) {
                Outcome::Commit(next) => {
                    *state = next;
                    self.undo
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .record_undo(batch);
                    self.arbiter.changed.notify_all();
                    trace!(values = ?next, "Batch committed");
                    return Ok(());
                }
                Outcome::Blocked => return Err(CounterError::Blocked),
                Outcome::Wait => {
                    state = self
                        .arbiter
                        .changed
                        .wait(state)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    fn value(&self, counter: Counter) -> Result<i32, CounterError> {
        Ok(self.arbiter.lock().get(counter))
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        let undo = *self.undo.get_mut().unwrap_or_else(|e| e.into_inner());
        if undo.is_baseline() {
            return;
        }
        let mut state = self.arbiter.lock();
        for counter in Counter::ALL {
            let slot = state.slot(counter);
            // The kernel clamps undo results at zero; so do we.
            *slot = (*slot - undo.get(counter)).max(0);
        }
        trace!(values = ?*state, "Participant gone, undo applied");
        self.arbiter.changed.notify_all();
    }
}
