//! echoloop Core - Shared types for the collector/sender rendezvous
//!
//! This crate provides the domain types shared between the runtime
//! (`echod`) and the `echoloop` binary.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod log;
pub mod message;
pub mod role;

// Re-exports for convenience
pub use error::{EchoError, EchoResult, Stage};
pub use log::MessageLog;
pub use message::Message;
pub use role::Role;
