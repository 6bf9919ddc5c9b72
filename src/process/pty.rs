// src/process/pty.rs

//! Pseudo-terminal process.
//!
//! The child gets the slave side as its controlling terminal on
//! stdin/stdout/stderr. The master is non-blocking: output is polled by the
//! reader loop, and input writes retry while the terminal buffer is full.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};

use nix::libc;
use nix::pty::{Winsize, openpty};
use nix::unistd::setsid;
use tracing::debug;

use crate::process::decode::{Utf8Decoder, incomplete_tail_len, normalize_newlines};
use crate::process::os::{set_cloexec, set_nonblocking};
use crate::process::{OutputSource, ProcessSpec, ReadOutcome, Spawned, READ_CHUNK_SIZE};

const TERMINAL_COLUMNS: u16 = 120;
const TERMINAL_ROWS: u16 = 40;

/// Give up on an input write that keeps hitting a full terminal buffer.
const INPUT_WRITE_DEADLINE: Duration = Duration::from_secs(5);
const INPUT_WRITE_BACKOFF: Duration = Duration::from_millis(5);

pub(crate) fn spawn(spec: &ProcessSpec) -> io::Result<Spawned> {
    let winsize = Winsize {
        ws_row: TERMINAL_ROWS,
        ws_col: TERMINAL_COLUMNS,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let pty = openpty(Some(&winsize), None)?;

    set_cloexec(pty.master.as_fd())?;
    set_cloexec(pty.slave.as_fd())?;
    set_nonblocking(pty.master.as_fd())?;

    let mut command = spec.command();
    command
        .stdin(Stdio::from(pty.slave.try_clone()?))
        .stdout(Stdio::from(pty.slave.try_clone()?))
        .stderr(Stdio::from(pty.slave.try_clone()?));

    // SAFETY: the hook only calls async-signal-safe functions (setsid, ioctl)
    // between fork and exec.
    unsafe {
        command.pre_exec(attach_controlling_terminal);
    }

    let child = command.spawn()?;
    drop(command);

    let input = File::from(pty.master.try_clone()?);
    debug!(pid = child.id(), "spawned pty process");

    Ok(Spawned {
        child,
        source: Box::new(PtySource {
            master: File::from(pty.master),
            _slave: pty.slave,
            decoder: Utf8Decoder::new(),
        }),
        input: Box::new(PtyInput { master: input }),
    })
}

/// Runs in the child: new session, slave (already on fd 0) becomes the
/// controlling terminal.
fn attach_controlling_terminal() -> io::Result<()> {
    setsid()?;
    // SAFETY: plain ioctl on the child's own stdin descriptor.
    let rc = unsafe { libc::ioctl(libc::STDIN_FILENO, libc::TIOCSCTTY as _, 0) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Owns both terminal descriptors; they are closed when the reader loop
/// drops the source, however the loop ended.
struct PtySource {
    master: File,
    _slave: OwnedFd,
    decoder: Utf8Decoder,
}

impl PtySource {
    /// Read one more byte if one is available right now.
    fn read_one(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.master.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(err) if is_transient(&err) || is_hangup(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl OutputSource for PtySource {
    fn read_available(&mut self) -> io::Result<ReadOutcome> {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let n = match self.master.read(&mut buf) {
            Ok(0) => return Ok(ReadOutcome::Eof),
            Ok(n) => n,
            Err(err) if is_transient(&err) => return Ok(ReadOutcome::Pending),
            // Linux reports EIO once the slave side is gone.
            Err(err) if is_hangup(&err) => return Ok(ReadOutcome::Eof),
            Err(err) => return Err(err),
        };

        let mut data = buf[..n].to_vec();

        // Complete a multi-byte character cut by the read boundary; if the
        // rest is not there yet the decoder carries it to the next cycle.
        while incomplete_tail_len(&data) > 0 {
            match self.read_one()? {
                Some(byte) => data.push(byte),
                None => break,
            }
        }

        // Peek past a trailing carriage return so `\r\n` is not split.
        if data.last() == Some(&b'\r') {
            if let Some(byte) = self.read_one()? {
                data.push(byte);
            }
        }

        let text = self.decoder.decode(&data);
        Ok(ReadOutcome::Data(normalize_newlines(&text)))
    }

    fn finish(&mut self) -> String {
        normalize_newlines(&self.decoder.finish())
    }
}

struct PtyInput {
    master: File,
}

impl Write for PtyInput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let started = Instant::now();
        loop {
            match self.master.write(buf) {
                Err(err) if is_transient(&err) => {
                    if started.elapsed() >= INPUT_WRITE_DEADLINE {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "terminal input buffer stayed full",
                        ));
                    }
                    thread::sleep(INPUT_WRITE_BACKOFF);
                }
                other => return other,
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.master.flush()
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn is_hangup(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}
