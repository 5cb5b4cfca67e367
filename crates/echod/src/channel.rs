//! Point-to-point byte channel over a named FIFO.
//!
//! Both ends are opened non-blocking and then switched to blocking. For the
//! reader this avoids waiting for a writer that may never come; for the
//! writer it turns "no collector is reading" into an immediate `ENXIO`
//! instead of a hang.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use echo_core::{EchoError, EchoResult, Role, Stage};
use tracing::debug;

/// Mode for a newly created FIFO (before umask).
const FIFO_MODE: libc::mode_t = 0o666;

/// Creates the FIFO at `path`. An existing file is not an error.
pub fn ensure_fifo(path: &Path) -> EchoResult<()> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| {
        EchoError::resource("mkfifo", io::Error::new(io::ErrorKind::InvalidInput, e))
    })?;

    // SAFETY: `c_path` is a valid NUL-terminated string for the call.
    let ret = unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE) };
    if ret == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EEXIST) {
            return Err(EchoError::resource("mkfifo", err));
        }
    }
    Ok(())
}

/// Opens the collector's read end.
pub fn open_reader(path: &Path) -> EchoResult<File> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| EchoError::resource("open byte channel", e))?;
    set_blocking(&file)?;
    debug!(path = %path.display(), "Byte channel reader open");
    Ok(file)
}

/// Opens a sender's write end.
///
/// # Errors
///
/// `EchoError::PeerDead` if nobody holds the read end, which means no
/// collector is running.
pub fn open_writer(path: &Path) -> EchoResult<File> {
    let file = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| match e.raw_os_error() {
            Some(libc::ENXIO) => EchoError::PeerDead {
                peer: Role::Collector,
                stage: Stage::Open,
            },
            _ => EchoError::resource("open byte channel", e),
        })?;
    set_blocking(&file)?;
    debug!(path = %path.display(), "Byte channel writer open");
    Ok(file)
}

fn set_blocking(file: &File) -> EchoResult<()> {
    let fd = file.as_raw_fd();
    // SAFETY: `fd` is owned by `file`, which outlives both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(EchoError::resource("fcntl", io::Error::last_os_error()));
    }
    // SAFETY: as above.
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
    if ret == -1 {
        return Err(EchoError::resource("fcntl", io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_protocol::{read_frame, write_frame};
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn test_ensure_fifo_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echoloop.fifo");
        ensure_fifo(&path).unwrap();
        ensure_fifo(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().file_type().is_fifo());
    }

    #[test]
    fn test_writer_without_reader_is_peer_dead() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echoloop.fifo");
        ensure_fifo(&path).unwrap();

        let err = open_writer(&path).unwrap_err();
        assert!(matches!(
            err,
            EchoError::PeerDead {
                peer: Role::Collector,
                stage: Stage::Open
            }
        ));
    }

    #[test]
    fn test_frame_crosses_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echoloop.fifo");
        ensure_fifo(&path).unwrap();

        let mut reader = open_reader(&path).unwrap();
        let mut writer = open_writer(&path).unwrap();
        write_frame(&mut writer, b"over\0the pipe").unwrap();
        drop(writer);

        assert_eq!(read_frame(&mut reader).unwrap(), b"over\0the pipe");
    }
}
