//! Termination signals and the single cleanup checkpoint.
//!
//! Signals never interrupt the main flow directly. A dedicated task waits
//! for them; the process then enters the [`Checkpoint`] exactly once, which
//! cancels every task and drops the process-lifetime state before exit.
//! Undo-tagged counter adjustments are reversed by the kernel at exit, so
//! nothing else needs releasing.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use echo_core::{EchoError, MessageLog};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Process-wide cleanup point, entered at most once.
#[derive(Debug)]
pub struct Checkpoint {
    entered: AtomicBool,
    cancel: CancellationToken,
    log: Mutex<Option<MessageLog>>,
}

impl Checkpoint {
    pub fn new(cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            entered: AtomicBool::new(false),
            cancel,
            log: Mutex::new(None),
        })
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Registers the collector's log so the checkpoint releases it.
    pub fn attach_log(&self, log: MessageLog) {
        *self.log.lock().unwrap_or_else(|e| e.into_inner()) = Some(log);
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    /// Cancels all tasks and releases the log.
    ///
    /// Returns `false` without doing anything if the checkpoint was already
    /// entered.
    pub fn enter(&self, reason: &EchoError) -> bool {
        if self.entered.swap(true, Ordering::SeqCst) {
            debug!(reason = %reason, "Checkpoint already entered");
            return false;
        }
        match reason {
            EchoError::TerminationRequested { .. } => info!(reason = %reason, "Shutting down"),
            _ => error!(reason = %reason, "Shutting down after fatal error"),
        }
        self.cancel.cancel();
        let released = self
            .log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(log) = released {
            debug!(messages = log.len(), "Message log released");
        }
        true
    }
}

/// Handlers for SIGINT, SIGQUIT and SIGTERM.
///
/// The handlers are live from [`ShutdownSignals::install`] on, so a signal
/// that arrives before the first [`recv`](ShutdownSignals::recv) is kept
/// rather than killing the process.
#[derive(Debug)]
pub struct ShutdownSignals {
    interrupt: Signal,
    quit: Signal,
    terminate: Signal,
}

impl ShutdownSignals {
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Waits for the next termination signal.
    ///
    /// Returns the conventional description of the signal (as `strsignal`
    /// would print it).
    pub async fn recv(&mut self) -> &'static str {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "Interrupt",
            _ = self.quit.recv() => "Quit",
            _ = self.terminate.recv() => "Terminated",
        };
        info!(signal = name, "Received termination signal");
        name
    }
}
