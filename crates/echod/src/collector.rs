//! The collector role: receive forever, flush periodically.

use std::fs::File;
use std::io;
use std::sync::Arc;

use echo_core::{EchoError, EchoResult, Message, MessageLog, Role};
use echo_protocol::read_frame;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::counters::CounterSet;
use crate::flush::spawn_flush_task;
use crate::handshake::Handshake;
use crate::rendezvous::join_error;
use crate::shutdown::Checkpoint;

/// Receive side of the byte channel plus the log it feeds.
pub struct Collector<C: CounterSet + ?Sized> {
    counters: Arc<C>,
    log: MessageLog,
    channel: File,
}

impl<C: CounterSet + ?Sized> Collector<C> {
    pub fn new(counters: Arc<C>, log: MessageLog, channel: File) -> Self {
        Self {
            counters,
            log,
            channel,
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Runs one full handshake and appends the received message.
    ///
    /// On failure any counters still held by this attempt are released
    /// before the error is returned.
    pub fn receive_one(&mut self) -> EchoResult<Message> {
        let counters = Arc::clone(&self.counters);
        let mut handshake = Handshake::new(&*counters, Role::Collector);
        let result = self.transfer(&mut handshake);
        if result.is_err() {
            handshake.abandon();
        }
        result
    }

    fn transfer(&mut self, handshake: &mut Handshake<'_, C>) -> EchoResult<Message> {
        handshake.ready()?;
        handshake.enter()?;

        let message = Message::from(read_frame(&mut self.channel)?);
        self.log.append(message.clone())?;

        handshake.quit()?;
        info!(
            bytes = message.len(),
            total = self.log.len(),
            "Message received"
        );
        Ok(message)
    }

    /// Receives until `cancel` fires or a transfer fails.
    ///
    /// Blocking: run it on a blocking thread.
    pub fn run(mut self, cancel: &CancellationToken) -> EchoResult<()> {
        while !cancel.is_cancelled() {
            self.receive_one()?;
        }
        Ok(())
    }
}

/// Runs the collector role until failure or cancellation.
///
/// Seeds the log with `first`, receives on the already opened read end
/// `channel`, starts the flush task on stdout and drives the receive loop on a
/// blocking thread.
pub async fn run_collector<C>(
    counters: Arc<C>,
    config: &Config,
    channel: File,
    first: Message,
    checkpoint: &Checkpoint,
) -> EchoResult<()>
where
    C: CounterSet + ?Sized + 'static,
{
    let log = MessageLog::seeded(first);
    checkpoint.attach_log(log.clone());

    let cancel = checkpoint.cancel_token();
    let mut flush = spawn_flush_task(
        log.clone(),
        config.flush_interval,
        io::stdout(),
        cancel.clone(),
    );

    let collector = Collector::new(counters, log, channel);
    let loop_cancel = cancel.clone();
    let mut receive = tokio::task::spawn_blocking(move || collector.run(&loop_cancel));

    info!(
        path = %config.path.display(),
        interval_ms = config.flush_interval.as_millis() as u64,
        "Collector running"
    );

    tokio::select! {
        result = &mut receive => {
            cancel.cancel();
            result.map_err(join_error)?
        }
        result = &mut flush => match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(EchoError::resource("flush", e)),
            Err(e) => Err(join_error(e)),
        },
    }
}
