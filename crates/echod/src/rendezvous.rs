//! Top-level flow: elect, then play the elected role.

use std::io;
use std::sync::Arc;

use echo_core::{EchoError, EchoResult, Message, Role};
use tokio::task::{spawn_blocking, JoinError};
use tracing::debug;

use crate::channel;
use crate::collector::run_collector;
use crate::config::Config;
use crate::counters::CounterSet;
use crate::election::elect;
use crate::sender;
use crate::shutdown::Checkpoint;

/// Elects a role and runs it.
///
/// The read end of the byte channel is opened before the election, so a
/// collector is always reading by the time any sender loses to it. Senders
/// drop their read end right after the election.
///
/// A sender returns `Ok(Role::Sender)` once its message is delivered. A
/// collector only returns when the checkpoint cancels it or a transfer
/// fails. Blocking counter and channel calls run on blocking threads.
pub async fn run<C>(
    counters: Arc<C>,
    config: &Config,
    message: Message,
    checkpoint: &Checkpoint,
) -> EchoResult<Role>
where
    C: CounterSet + ?Sized + 'static,
{
    let channel = channel::open_reader(&config.path)?;
    let electing = Arc::clone(&counters);
    let role = spawn_blocking(move || elect(&*electing))
        .await
        .map_err(join_error)??;

    match role {
        Role::Collector => {
            run_collector(counters, config, channel, message, checkpoint).await?;
        }
        Role::Sender => {
            drop(channel);
            let path = config.path.clone();
            spawn_blocking(move || sender::send(&*counters, &path, &message))
                .await
                .map_err(join_error)??;
        }
    }

    debug!(%role, "Role finished");
    Ok(role)
}

pub(crate) fn join_error(err: JoinError) -> EchoError {
    EchoError::resource("blocking task", io::Error::new(io::ErrorKind::Other, err))
}
