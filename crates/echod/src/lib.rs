//! echoloop runtime - election, handshake and the two roles
//!
//! Independently launched processes rendezvous on one filesystem path. The
//! first one to claim the election token becomes the collector; every later
//! one becomes a sender that hands over its message and exits.
//!
//! - `counters` - the five shared counters and their atomic batches
//! - `election` - one-shot collector/sender decision
//! - `handshake` - the paired critical-section state machine
//! - `channel` - the FIFO byte channel
//! - `collector` / `sender` - the two roles
//! - `flush` - periodic re-emission of the collector's log
//! - `shutdown` - signals and the single cleanup checkpoint
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  elect   ┌───────────────────────────────────────┐
//! │  any process │────────▶ │            Counter Set (SysV)         │
//! └──────┬───────┘          │ single · collector · sender · TA · TD │
//!        │                  └───────────────────▲───────────────────┘
//!        │ won                     handshake    │    handshake
//!        ▼                                      │
//! ┌──────────────┐   frame (FIFO)     ┌─────────┴────┐
//! │  Collector   │◀───────────────────│    Sender    │
//! │ receive loop │                    └──────────────┘
//! │      │       │
//! │      ▼       │  every interval  ┌────────┐
//! │  MessageLog ─┼─────────────────▶│ stdout │
//! └──────────────┘   flush task     └────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`

pub mod channel;
pub mod collector;
pub mod config;
pub mod counters;
pub mod election;
pub mod flush;
pub mod handshake;
pub mod rendezvous;
pub mod sender;
pub mod shutdown;

pub use collector::{run_collector, Collector};
pub use config::{Config, ConfigError};
pub use counters::{Arbiter, Counter, CounterSet, Participant, SemSet};
pub use election::elect;
pub use handshake::Handshake;
pub use rendezvous::run;
pub use shutdown::{Checkpoint, ShutdownSignals};
