//! Periodic re-emission of the collector's log.
//!
//! Runs as its own tokio task, independent of where the receive loop is in
//! the handshake. The log only ever grows and hands out snapshots, so a
//! flush never observes a half-linked message.

use std::io::{self, Write};
use std::time::Duration;

use echo_core::MessageLog;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Spawns the flush task.
///
/// The first dump happens one `every` after the call, then once per `every`
/// until `cancel` fires. A write failure ends the task with the error.
pub fn spawn_flush_task<W>(
    log: MessageLog,
    every: Duration,
    mut out: W,
    cancel: CancellationToken,
) -> JoinHandle<io::Result<()>>
where
    W: Write + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Flush task stopping");
                    return Ok(());
                }

                _ = ticker.tick() => {
                    if let Err(e) = log.write_to(&mut out) {
                        error!(error = %e, "Failed to flush message log");
                        return Err(e);
                    }
                    trace!(messages = log.len(), "Message log flushed");
                }
            }
        }
    })
}
