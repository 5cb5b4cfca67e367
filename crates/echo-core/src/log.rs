//! Append-only message log owned by the collector.
//!
//! The log is written by the collector's receive loop and read by the
//! periodic flush task. A message becomes visible only after it is fully
//! built, and once visible it is never mutated or removed while the log
//! lives, so a reader can take a snapshot at any moment.

use std::io::{self, Write};
use std::mem;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::{EchoError, EchoResult, Message};

/// Cheap-to-clone handle to the shared, insertion-ordered message log.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Arc<RwLock<Vec<Message>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log already holding `first`.
    ///
    /// The collector seeds the log with its own message so the first flush
    /// contains it.
    pub fn seeded(first: Message) -> Self {
        let log = Self::new();
        if let Ok(mut entries) = log.entries.write() {
            entries.push(first);
        }
        log
    }

    /// Links a message at the tail.
    ///
    /// # Errors
    ///
    /// `EchoError::AllocationFailure` if the log cannot grow.
    pub fn append(&self, message: Message) -> EchoResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .try_reserve(1)
            .map_err(|_| EchoError::AllocationFailure {
                requested: mem::size_of::<Message>(),
            })?;
        entries.push(message);
        debug!(len = entries.len(), "Message appended to log");
        Ok(())
    }

    /// Returns every message visible right now, in insertion order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes every message followed by a newline, in insertion order.
    ///
    /// The lock is held only while taking the snapshot, never across I/O.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for message in self.snapshot() {
            out.write_all(message.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_log_holds_first_message() {
        let log = MessageLog::seeded(Message::from("A"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.snapshot(), vec![Message::from("A")]);
    }

    #[test]
    fn test_write_to_preserves_insertion_order() {
        let log = MessageLog::seeded(Message::from("A"));
        log.append(Message::from("B")).unwrap();
        log.append(Message::from("C")).unwrap();

        let mut out = Vec::new();
        log.write_to(&mut out).unwrap();
        assert_eq!(out, b"A\nB\nC\n");
    }

    #[test]
    fn test_write_to_repeats_full_log_each_time() {
        let log = MessageLog::seeded(Message::from("A"));
        let mut first = Vec::new();
        log.write_to(&mut first).unwrap();

        log.append(Message::from("B")).unwrap();
        let mut second = Vec::new();
        log.write_to(&mut second).unwrap();

        assert_eq!(first, b"A\n");
        assert_eq!(second, b"A\nB\n");
    }

    #[test]
    fn test_binary_payload_written_verbatim() {
        let log = MessageLog::new();
        log.append(Message::from(vec![0u8, 1, 2])).unwrap();
        let mut out = Vec::new();
        log.write_to(&mut out).unwrap();
        assert_eq!(out, vec![0u8, 1, 2, b'\n']);
    }

    #[test]
    fn test_empty_log_writes_nothing() {
        let log = MessageLog::new();
        assert!(log.is_empty());
        let mut out = Vec::new();
        log.write_to(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_reader_sees_consistent_prefix_while_appending() {
        let log = MessageLog::seeded(Message::from("0"));
        let writer = log.clone();

        let append = tokio::task::spawn_blocking(move || {
            for i in 1..200 {
                writer.append(Message::from(i.to_string().as_str())).unwrap();
            }
        });

        for _ in 0..50 {
            let snap = log.snapshot();
            for (i, msg) in snap.iter().enumerate() {
                assert_eq!(msg.display(), i.to_string());
            }
            tokio::task::yield_now().await;
        }

        append.await.unwrap();
        assert_eq!(log.len(), 200);
    }
}
