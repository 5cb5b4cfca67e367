//! Collector/sender handshake over the shared counters.
//!
//! Both sides run the same state machine mirrored on each other's readiness
//! counter:
//!
//! ```text
//!   collector                        sender
//!   ---------                        ------
//!   ready    (TA == 0, C += 1)       capture (TA == 0, S == 0, S += 1)
//!   enter    (S >= 1, TA += 1)       enter   (C >= 1, TA += 1)
//!            (S alive?, TA == 2)             (C alive?, TA == 2)
//!        ...... data transfer over the byte channel ......
//!   quit     (TD += 1)               quit    (TD += 1)
//!            (TA alive?, TD == 2, C -= 1)    (TA alive?, TD == 2, S -= 1)
//!            (S == 0, TA -= 1, TD -= 1)      (C == 0, TA -= 1, TD -= 1)
//! ```
//!
//! Every "alive?" check is a no-wait probe: when the peer has died, the
//! kernel has already reversed its adjustments, the probe fails and the
//! stage reports [`EchoError::PeerDead`] instead of blocking forever.

pub mod stages;

use echo_core::{EchoError, EchoResult, Role, Stage};
use tracing::{debug, warn};

use crate::counters::{Batch, Counter, CounterSet, CounterValues, Flags};

/// One side of one transfer.
///
/// Tracks the `UNDO` adjustments it currently holds so a failed attempt can
/// put them back with [`Handshake::abandon`] without waiting for process
/// exit.
pub struct Handshake<'a, C: CounterSet + ?Sized> {
    counters: &'a C,
    role: Role,
    held: CounterValues,
}

impl<'a, C: CounterSet + ?Sized> Handshake<'a, C> {
    pub fn new(counters: &'a C, role: Role) -> Self {
        Self {
            counters,
            role,
            held: CounterValues::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Adjustments currently held by this side.
    pub fn held(&self) -> CounterValues {
        self.held
    }

    /// Collector: signal willingness to receive.
    pub fn ready(&mut self) -> EchoResult<()> {
        self.require(Role::Collector, Stage::Ready)?;
        self.submit(stages::ready(), Stage::Ready)
    }

    /// Sender: take the single sender slot.
    pub fn capture(&mut self) -> EchoResult<()> {
        self.require(Role::Sender, Stage::Capture)?;
        self.submit(stages::capture(), Stage::Capture)
    }

    /// Waits for the peer, then enters the critical section together with it.
    ///
    /// Returns only once both sides are inside; the data transfer may start.
    pub fn enter(&mut self) -> EchoResult<()> {
        self.submit(stages::enter_wait(self.role), Stage::Enter)?;
        self.submit(stages::enter_confirm(self.role), Stage::Enter)?;
        debug!(role = %self.role, "Critical section entered");
        Ok(())
    }

    /// Leaves the critical section and restores every counter to baseline.
    pub fn quit(&mut self) -> EchoResult<()> {
        self.submit(stages::quit_done(), Stage::Quit)?;
        self.submit(stages::quit_release(self.role), Stage::Quit)?;
        self.submit(stages::quit_restore(self.role), Stage::Quit)?;
        debug!(role = %self.role, "Critical section left");
        Ok(())
    }

    /// Releases whatever this side still holds.
    ///
    /// Used after a failed attempt. Every release is no-wait: the value
    /// being released is this side's own contribution, so it is present.
    pub fn abandon(&mut self) {
        if self.held.is_baseline() {
            return;
        }
        let mut batch = Batch::new();
        for counter in Counter::ALL {
            let held = self.held.get(counter);
            if held != 0 {
                // Held values are 0 or 1, well inside i16.
                let delta = i16::try_from(-held).unwrap_or(0);
                batch = batch.adjust(counter, delta, Flags::UNDO | Flags::NO_WAIT);
            }
        }
        match self.counters.apply(&batch) {
            Ok(()) => {
                debug!(role = %self.role, released = ?self.held, "Handshake abandoned");
                self.held = CounterValues::default();
            }
            Err(e) => {
                warn!(role = %self.role, error = %e, "Failed to release held counters");
            }
        }
    }

    fn require(&self, role: Role, stage: Stage) -> EchoResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(EchoError::WrongRole {
                role: self.role,
                stage,
            })
        }
    }

    fn submit(&mut self, batch: Batch, stage: Stage) -> EchoResult<()> {
        match self.counters.apply(&batch) {
            Ok(()) => {
                self.held.record_undo(&batch);
                debug!(role = %self.role, %stage, "Stage batch committed");
                Ok(())
            }
            Err(e) => {
                let err = e.into_echo(self.role.peer(), stage);
                if err.is_peer_dead() {
                    warn!(role = %self.role, %stage, "Peer liveness probe failed");
                }
                Err(err)
            }
        }
    }
}
