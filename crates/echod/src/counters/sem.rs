//! SysV semaphore backend.
//!
//! The kernel gives us exactly the primitive the protocol needs: `semop`
//! applies a list of operations atomically, `IPC_NOWAIT` fails fast and
//! `SEM_UNDO` reverses an adjustment when the process exits for any reason.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use tracing::{debug, trace};

use super::{Batch, Counter, CounterError, CounterSet, Flags, COUNTER_COUNT};

/// `ftok` project id shared by every process using a rendezvous path.
const PROJECT_ID: libc::c_int = 1;

/// Permissions for a newly created set.
const SET_MODE: libc::c_int = 0o644;

/// Handle to a five-counter SysV semaphore set.
///
/// The set outlives every process that uses it; dropping the handle does
/// not remove it. Use [`SemSet::remove`] to delete it explicitly.
#[derive(Debug)]
pub struct SemSet {
    id: libc::c_int,
}

impl SemSet {
    /// Opens (creating if needed) the set keyed by `path`.
    ///
    /// The path must already exist: its inode is part of the key.
    pub fn open(path: &Path) -> Result<Self, CounterError> {
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| {
            CounterError::io("ftok", io::Error::new(io::ErrorKind::InvalidInput, e))
        })?;

        // SAFETY: `c_path` is a valid NUL-terminated string for the call.
        let key = unsafe { libc::ftok(c_path.as_ptr(), PROJECT_ID) };
        if key == -1 {
            return Err(CounterError::io("ftok", io::Error::last_os_error()));
        }

        let set = Self::get(key)?;
        debug!(path = %path.display(), key, semid = set.id, "Counter set opened");
        Ok(set)
    }

    /// Creates a fresh set not reachable through any path.
    pub fn private() -> Result<Self, CounterError> {
        Self::get(libc::IPC_PRIVATE)
    }

    fn get(key: libc::key_t) -> Result<Self, CounterError> {
        // SAFETY: plain syscall with integer arguments.
        let id = unsafe {
            libc::semget(key, COUNTER_COUNT as libc::c_int, libc::IPC_CREAT | SET_MODE)
        };
        if id == -1 {
            return Err(CounterError::io("semget", io::Error::last_os_error()));
        }
        Ok(Self { id })
    }

    /// Kernel identifier of the set.
    pub fn id(&self) -> libc::c_int {
        self.id
    }

    /// Deletes the set from the system. Blocked callers fail with `EIDRM`.
    pub fn remove(self) -> Result<(), CounterError> {
        // SAFETY: IPC_RMID takes no fourth argument.
        let ret = unsafe { libc::semctl(self.id, 0, libc::IPC_RMID) };
        if ret == -1 {
            return Err(CounterError::io("semctl(IPC_RMID)", io::Error::last_os_error()));
        }
        Ok(())
    }

    fn sembuf(entry: &super::Entry) -> libc::sembuf {
        let mut flags = 0;
        if entry.flags.contains(Flags::UNDO) {
            flags |= libc::SEM_UNDO;
        }
        if entry.flags.contains(Flags::NO_WAIT) {
            flags |= libc::IPC_NOWAIT;
        }
        libc::sembuf {
            sem_num: entry.counter.index(),
            sem_op: entry.delta,
            sem_flg: flags as libc::c_short,
        }
    }
}

impl CounterSet for SemSet {
    fn apply(&self, batch: &Batch) -> Result<(), CounterError> {
        let mut ops: Vec<libc::sembuf> = batch.entries().iter().map(Self::sembuf).collect();
        loop {
            // SAFETY: `ops` is a live, correctly sized buffer of sembuf.
            let ret = unsafe { libc::semop(self.id, ops.as_mut_ptr(), ops.len()) };
            if ret == 0 {
                trace!(semid = self.id, ops = ops.len(), "semop committed");
                return Ok(());
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                // Interrupted waits resume instead of failing.
                Some(libc::EINTR) => continue,
                Some(libc::EAGAIN) => return Err(CounterError::Blocked),
                _ => return Err(CounterError::io("semop", err)),
            }
        }
    }

    fn value(&self, counter: Counter) -> Result<i32, CounterError> {
        // SAFETY: GETVAL takes no fourth argument.
        let ret = unsafe {
            libc::semctl(self.id, libc::c_int::from(counter.index()), libc::GETVAL)
        };
        if ret == -1 {
            return Err(CounterError::io("semctl(GETVAL)", io::Error::last_os_error()));
        }
        Ok(ret)
    }
}
