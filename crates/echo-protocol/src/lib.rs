//! echoloop Protocol - Wire framing for the byte channel
//!
//! A frame is a host-word-width unsigned length prefix immediately followed
//! by exactly that many raw bytes. There is no magic, no terminator and no
//! checksum: the handshake already guarantees a single writer and a single
//! reader per transfer.

pub mod frame;

pub use frame::{read_frame, write_frame, FrameError, PREFIX_LEN};
