// src/process/os.rs

//! Platform glue: signalling process groups and file descriptor flags.
//!
//! On unix every script runs in its own process group (pipe variant) or
//! session (PTY variant), so signals reach the whole subtree. Elsewhere only
//! the direct child is targeted.

use std::io;

#[cfg(unix)]
mod imp {
    use std::io;
    use std::os::fd::BorrowedFd;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    use nix::errno::Errno;
    use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::{Pid, getpgid};

    /// Process group of `pid`.
    pub fn process_group(pid: u32) -> io::Result<i32> {
        let pgid = getpgid(Some(Pid::from_raw(pid as i32)))?;
        Ok(pgid.as_raw())
    }

    pub fn terminate_group(pgid: i32) -> io::Result<()> {
        killpg(Pid::from_raw(pgid), Signal::SIGTERM)?;
        Ok(())
    }

    /// SIGKILL the group. A group that is already gone is not an error.
    pub fn kill_group(pgid: i32) -> io::Result<()> {
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn set_nonblocking(fd: BorrowedFd<'_>) -> io::Result<()> {
        let flags = fcntl(fd, FcntlArg::F_GETFL)?;
        let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        fcntl(fd, FcntlArg::F_SETFL(flags))?;
        Ok(())
    }

    pub fn set_cloexec(fd: BorrowedFd<'_>) -> io::Result<()> {
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        Ok(())
    }

    pub fn exit_code(status: ExitStatus) -> i32 {
        status
            .code()
            .or_else(|| status.signal().map(|signal| -signal))
            .unwrap_or(-1)
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;
    use std::process::{Command, ExitStatus, Stdio};

    fn taskkill(args: &[&str]) -> io::Result<()> {
        let status = Command::new("taskkill")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("taskkill exited with {status}")))
        }
    }

    pub fn terminate_child(pid: u32) -> io::Result<()> {
        taskkill(&["/PID", &pid.to_string()])
    }

    pub fn kill_tree(pid: u32) -> io::Result<()> {
        taskkill(&["/F", "/T", "/PID", &pid.to_string()])
    }

    pub fn exit_code(status: ExitStatus) -> i32 {
        status.code().unwrap_or(-1)
    }
}

pub(crate) use imp::*;

/// What `stop()` left behind for the follow-up kill.
#[cfg_attr(unix, allow(dead_code))]
pub(crate) enum Terminated {
    /// Group signalled; kill it once the leader exits.
    #[cfg_attr(not(unix), allow(dead_code))]
    Group(i32),
    /// Only the direct child could be signalled.
    Child,
}

/// Graceful termination of the process (group) behind `pid`.
pub(crate) fn terminate(pid: u32) -> io::Result<Terminated> {
    #[cfg(unix)]
    {
        let pgid = process_group(pid)?;
        terminate_group(pgid)?;
        Ok(Terminated::Group(pgid))
    }
    #[cfg(not(unix))]
    {
        terminate_child(pid)?;
        Ok(Terminated::Child)
    }
}

/// Immediate termination of the process (group) behind `pid`.
pub(crate) fn force_kill(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        kill_group(process_group(pid)?)
    }
    #[cfg(not(unix))]
    {
        kill_tree(pid)
    }
}
