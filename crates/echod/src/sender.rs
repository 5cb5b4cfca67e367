//! The sender role: hand over one message and leave.

use std::path::Path;

use echo_core::{EchoResult, Message, Role};
use echo_protocol::write_frame;
use tracing::info;

use crate::channel;
use crate::counters::CounterSet;
use crate::handshake::Handshake;

/// Delivers `message` to the collector listening on `path`.
///
/// Blocking. On failure any counters still held are released before the
/// error is returned.
pub fn send<C: CounterSet + ?Sized>(
    counters: &C,
    path: &Path,
    message: &Message,
) -> EchoResult<()> {
    let mut handshake = Handshake::new(counters, Role::Sender);
    let result = transfer(&mut handshake, path, message);
    if result.is_err() {
        handshake.abandon();
    }
    result
}

fn transfer<C: CounterSet + ?Sized>(
    handshake: &mut Handshake<'_, C>,
    path: &Path,
    message: &Message,
) -> EchoResult<()> {
    handshake.capture()?;
    let mut writer = channel::open_writer(path)?;
    handshake.enter()?;

    write_frame(&mut writer, message.as_bytes())?;
    drop(writer);

    handshake.quit()?;
    info!(bytes = message.len(), "Message delivered");
    Ok(())
}

/// The line a sender prints after a successful handoff.
pub fn completion_line(message: &Message) -> String {
    format!("echoloop for \"{}\" finished", message.display())
}
