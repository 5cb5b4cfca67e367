//! echoloop - rendezvous without a server
//!
//! The first process to run becomes the collector: it keeps every message
//! it receives and prints all of them, one per line, once per interval,
//! until killed. Every later process becomes a sender: it hands its message
//! to the collector, prints a completion line and exits.
//!
//! # Usage
//!
//! ```bash
//! # Terminal 1: becomes the collector
//! echoloop A
//!
//! # Terminal 2: becomes a sender
//! echoloop B
//!
//! # Use another rendezvous path and a faster flush
//! ECHOLOOP_PATH=/run/user/1000/echo.fifo ECHOLOOP_FLUSH_MS=200 echoloop A
//!
//! # Enable debug logging (stderr)
//! RUST_LOG=echod=debug echoloop A
//! ```
//!
//! # Signal Handling
//!
//! - SIGINT/SIGQUIT/SIGTERM: enter the cleanup checkpoint, exit with status 1

use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStringExt;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use echo_core::{EchoError, Message, Role};
use echod::channel::ensure_fifo;
use echod::sender::completion_line;
use echod::{run, Checkpoint, Config, SemSet, ShutdownSignals};

/// Hand a message to the running collector, or become the collector
#[derive(Parser, Debug)]
#[command(name = "echoloop", version, about)]
struct Args {
    /// Message to broadcast; may start with `-`
    #[arg(allow_hyphen_values = true)]
    message: OsString,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(log_filter(
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        ))
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    let message = Message::from(args.message.into_vec());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let result = runtime.block_on(run_echoloop(config, message));

    // The collector's receive thread may still be parked in a counter
    // wait; do not join it.
    runtime.shutdown_background();
    result
}

/// Directives used when `RUST_LOG` is unset, empty or unparsable.
const DEFAULT_LOG_DIRECTIVES: &str = "echoloop=warn,echod=warn,echo_core=warn";

/// `RUST_LOG` wins as a whole; the defaults only fill in for it.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}

async fn run_echoloop(config: Config, message: Message) -> Result<()> {
    // Before anything is opened, so an early signal still reaches the
    // checkpoint.
    let mut signals = ShutdownSignals::install().context("Failed to install signal handlers")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        path = %config.path.display(),
        "echoloop starting"
    );

    ensure_fifo(&config.path).context("Failed to create byte channel")?;
    let counters = Arc::new(
        SemSet::open(&config.path).context("Failed to open counter set")?,
    );

    let checkpoint = Checkpoint::new(CancellationToken::new());

    tokio::select! {
        signal = signals.recv() => {
            eprintln!("{signal} caught, exiting...");
            checkpoint.enter(&EchoError::TerminationRequested {
                signal: signal.to_string(),
            });
            process::exit(1);
        }

        outcome = run(counters, &config, message.clone(), &checkpoint) => match outcome {
            Ok(Role::Sender) => {
                println!("{}", completion_line(&message));
                Ok(())
            }
            Ok(Role::Collector) => {
                debug!("Collector cancelled");
                Ok(())
            }
            Err(e) => {
                checkpoint.enter(&e);
                Err(e).context("echoloop failed")
            }
        },
    }
}
