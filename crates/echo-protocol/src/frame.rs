//! Length-prefixed frame codec.
//!
//! The prefix is a native-endian `usize`. Its width follows the host word
//! size, so processes sharing a rendezvous path must agree on it.

use std::io::{self, ErrorKind, Read, Write};
use std::mem;

use echo_core::EchoError;
use thiserror::Error;

/// Width of the length prefix in bytes.
pub const PREFIX_LEN: usize = mem::size_of::<usize>();

/// Errors that can occur while moving a frame across the channel.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The stream ended before the declared number of bytes arrived.
    #[error("truncated frame: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    /// The payload buffer could not be allocated.
    #[error("cannot allocate {0} bytes for frame payload")]
    Allocation(usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<FrameError> for EchoError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Truncated { expected, received } => {
                EchoError::Framing { expected, received }
            }
            FrameError::Allocation(requested) => EchoError::AllocationFailure { requested },
            FrameError::Io(source) => EchoError::resource("byte channel", source),
        }
    }
}

/// Writes one frame, looping over partial writes until every byte is sent.
pub fn write_frame<W: Write>(out: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    out.write_all(&payload.len().to_ne_bytes())?;
    out.write_all(payload)?;
    out.flush()?;
    Ok(())
}

/// Reads one frame.
///
/// A zero-length read before the declared length is consumed is a
/// [`FrameError::Truncated`], never a clean end of stream. Interrupted reads
/// are resumed.
pub fn read_frame<R: Read>(input: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut prefix = [0u8; PREFIX_LEN];
    fill(input, &mut prefix)?;
    let len = usize::from_ne_bytes(prefix);

    let mut payload = Vec::new();
    payload
        .try_reserve_exact(len)
        .map_err(|_| FrameError::Allocation(len))?;

    // Only bytes that actually arrive are written into the buffer;
    // `read_to_end` resumes interrupted reads itself.
    input.take(len as u64).read_to_end(&mut payload)?;
    if payload.len() < len {
        return Err(FrameError::Truncated {
            expected: len,
            received: payload.len(),
        });
    }
    Ok(payload)
}

fn fill<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    let expected = buf.len();
    let mut received = 0;
    while received < expected {
        let rest = buf.get_mut(received..).unwrap_or_default();
        match input.read(rest) {
            Ok(0) => return Err(FrameError::Truncated { expected, received }),
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
