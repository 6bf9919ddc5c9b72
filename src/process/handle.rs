// src/process/handle.rs

//! Lifecycle of one OS process.
//!
//! `start()` spawns the child and two threads:
//!
//! - `process-output-<pid>` polls the output source with a short backoff,
//!   pushes text into the output stream and closes it when done;
//! - `process-wait-<pid>` blocks on the OS wait, records the exit code,
//!   waits for the reader to drain, then runs the finish listeners.
//!
//! The output stream is closed exactly once whichever way the reader ends.

use std::io::{self, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::process::Child;
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::errors::{Result, ScriptcastError};
use crate::process::os;
use crate::process::{OutputSource, ProcessKind, ProcessSpec, ReadOutcome, Spawned};
use crate::stream::publisher::lock;
use crate::stream::{Publisher, Stream};

/// Callback run once when the process has finished and its output is fully
/// drained.
pub type FinishListener = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

pub const STOPPED_MARKER: &str = "\n>> STOPPED BY USER\n";
pub const KILLED_MARKER: &str = "\n>> KILLED\n";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error occurred\n";

/// Pause between polls while the process is alive and silent.
const READ_BACKOFF: Duration = Duration::from_millis(10);

/// Consecutive empty polls after exit before the output counts as drained.
const DRAIN_IDLE_POLLS: u32 = 2;

#[derive(Default)]
struct Lifecycle {
    started: bool,
    exit_code: Option<i32>,
    finished: bool,
    listeners: Vec<FinishListener>,
}

pub struct ProcessHandle {
    spec: ProcessSpec,
    kind: ProcessKind,
    pid: OnceLock<u32>,
    output: Publisher<String>,
    input: Mutex<Option<Box<dyn Write + Send>>>,
    lifecycle: Mutex<Lifecycle>,
    finished_cv: Condvar,
}

impl ProcessHandle {
    /// Create an unstarted handle. Its output stream can be subscribed right
    /// away, so nothing the process prints is missed.
    pub fn new(spec: ProcessSpec, kind: ProcessKind) -> Arc<Self> {
        Arc::new(Self {
            spec,
            kind,
            pid: OnceLock::new(),
            output: Publisher::new(),
            input: Mutex::new(None),
            lifecycle: Mutex::new(Lifecycle::default()),
            finished_cv: Condvar::new(),
        })
    }

    /// Spawn the process and its reader / finish-watcher threads.
    pub fn start(self: &Arc<Self>) -> Result<u32> {
        {
            let mut lifecycle = lock(&self.lifecycle);
            if lifecycle.started {
                return Err(ScriptcastError::AlreadyStarted);
            }
            lifecycle.started = true;
        }

        let spawned = match crate::process::spawn(&self.spec, self.kind) {
            Ok(spawned) => spawned,
            Err(source) => {
                self.output.close();
                return Err(ScriptcastError::SpawnFailure {
                    command: self.spec.display_command(),
                    source,
                });
            }
        };

        let Spawned {
            child,
            source,
            input,
        } = spawned;

        let pid = child.id();
        let _ = self.pid.set(pid);
        *lock(&self.input) = Some(input);

        info!(
            pid,
            command = %self.spec.display_command(),
            kind = ?self.kind,
            "process started"
        );

        let reader = Arc::clone(self);
        let watcher = Arc::clone(self);
        let workers = thread::Builder::new()
            .name(format!("process-output-{pid}"))
            .spawn(move || reader.pipe_output(source))
            .and_then(|_| {
                thread::Builder::new()
                    .name(format!("process-wait-{pid}"))
                    .spawn(move || watcher.watch_finish(child))
            });

        if let Err(err) = workers {
            error!(pid, error = %err, "failed to start process worker threads");
            if let Err(kill_err) = os::force_kill(pid) {
                warn!(pid, error = %kill_err, "failed to kill orphaned process");
            }
            self.output.close();
            return Err(err.into());
        }

        Ok(pid)
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid.get().copied()
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Raw process output (stdout and stderr merged).
    pub fn output(&self) -> Stream<String> {
        self.output.stream()
    }

    /// Exited and output fully drained.
    pub fn is_finished(&self) -> bool {
        lock(&self.lifecycle).finished
    }

    /// Exit code, once the OS reported the exit. Signal-terminated processes
    /// report `-signal` on unix.
    pub fn return_code(&self) -> Option<i32> {
        lock(&self.lifecycle).exit_code
    }

    fn has_exited(&self) -> bool {
        lock(&self.lifecycle).exit_code.is_some()
    }

    /// Block until the process is finished.
    pub fn wait_finish(&self, timeout: Option<Duration>) -> Result<()> {
        let lifecycle = lock(&self.lifecycle);
        match timeout {
            None => {
                let _lifecycle = self
                    .finished_cv
                    .wait_while(lifecycle, |l| !l.finished)
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(())
            }
            Some(limit) => {
                let (lifecycle, _) = self
                    .finished_cv
                    .wait_timeout_while(lifecycle, limit, |l| !l.finished)
                    .unwrap_or_else(PoisonError::into_inner);
                if lifecycle.finished {
                    Ok(())
                } else {
                    Err(ScriptcastError::StreamTimeout(limit))
                }
            }
        }
    }

    /// Register a listener. If the process already finished, it runs right
    /// here on the calling thread.
    pub fn add_finish_listener(&self, listener: FinishListener) {
        {
            let mut lifecycle = lock(&self.lifecycle);
            if !lifecycle.finished {
                lifecycle.listeners.push(listener);
                return;
            }
        }
        run_listener(self.pid(), listener);
    }

    /// Send a line to the process; a trailing newline is added if missing.
    pub fn write_to_input(&self, text: &str) {
        if self.has_exited() {
            warn!(pid = ?self.pid(), "process already finished; input dropped");
            return;
        }

        let mut line = text.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }

        let mut input = lock(&self.input);
        let Some(writer) = input.as_mut() else {
            warn!(pid = ?self.pid(), "process input is closed; input dropped");
            return;
        };
        if let Err(err) = writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush())
        {
            warn!(pid = ?self.pid(), error = %err, "failed to write process input");
        }
    }

    /// Graceful termination of the whole process group. Children that
    /// outlive the leader are killed once it has exited.
    pub fn stop(&self) {
        let Some(pid) = self.pid() else {
            warn!("stop requested for a process that was never started");
            return;
        };
        if self.has_exited() {
            return;
        }

        info!(pid, "stopping process");
        self.push_output(STOPPED_MARKER.to_string());
        match os::terminate(pid) {
            #[cfg(unix)]
            Ok(os::Terminated::Group(pgid)) => {
                self.add_finish_listener(Box::new(move || {
                    os::kill_group(pgid)?;
                    Ok(())
                }));
            }
            Ok(_) => {}
            Err(err) => warn!(pid, error = %err, "failed to terminate process"),
        }
    }

    /// Immediate termination of the whole process group.
    pub fn kill(&self) {
        let Some(pid) = self.pid() else {
            warn!("kill requested for a process that was never started");
            return;
        };
        if self.has_exited() {
            return;
        }

        info!(pid, "killing process");
        self.push_output(KILLED_MARKER.to_string());
        if let Err(err) = os::force_kill(pid) {
            warn!(pid, error = %err, "failed to kill process");
        }
    }

    /// Release stdin and the output stream.
    pub fn cleanup(&self) {
        lock(&self.input).take();
        self.output.close();
        debug!(pid = ?self.pid(), "process resources released");
    }

    fn push_output(&self, text: String) {
        if text.is_empty() {
            return;
        }
        if self.output.push(text).is_err() {
            debug!(pid = ?self.pid(), "output already closed; text dropped");
        }
    }

    fn pipe_output(&self, mut source: Box<dyn OutputSource>) {
        let _close = CloseOnDrop(&self.output);

        let result = self.read_until_exit(source.as_mut());
        self.push_output(source.finish());
        drop(source);

        if let Err(err) = result {
            error!(pid = ?self.pid(), error = %err, "failed to read process output");
            self.push_output(UNEXPECTED_ERROR_MESSAGE.to_string());
            self.kill();
        }
        debug!(pid = ?self.pid(), "output reader finished");
    }

    fn read_until_exit(&self, source: &mut dyn OutputSource) -> io::Result<()> {
        loop {
            match source.read_available()? {
                ReadOutcome::Data(text) => self.push_output(text),
                ReadOutcome::Eof => return Ok(()),
                ReadOutcome::Pending => {
                    if self.has_exited() {
                        return self.drain(source);
                    }
                    thread::sleep(READ_BACKOFF);
                }
            }
        }
    }

    /// Read what the exited process left behind.
    fn drain(&self, source: &mut dyn OutputSource) -> io::Result<()> {
        let mut idle_polls = 0;
        while idle_polls < DRAIN_IDLE_POLLS {
            match source.read_available()? {
                ReadOutcome::Data(text) => {
                    idle_polls = 0;
                    self.push_output(text);
                }
                ReadOutcome::Eof => return Ok(()),
                ReadOutcome::Pending => {
                    idle_polls += 1;
                    thread::sleep(READ_BACKOFF);
                }
            }
        }
        Ok(())
    }

    fn watch_finish(&self, mut child: Child) {
        let pid = child.id();
        let exit_code = match child.wait() {
            Ok(status) => os::exit_code(status),
            Err(err) => {
                error!(pid, error = %err, "failed to wait for process");
                -1
            }
        };
        lock(&self.lifecycle).exit_code = Some(exit_code);
        info!(pid, exit_code, "process exited");

        // The reader sees the exit code, drains and closes the output.
        let _ = self.output.stream().wait_close(None);

        let listeners = {
            let mut lifecycle = lock(&self.lifecycle);
            lifecycle.finished = true;
            std::mem::take(&mut lifecycle.listeners)
        };
        self.finished_cv.notify_all();

        for listener in listeners {
            run_listener(Some(pid), listener);
        }
    }
}

struct CloseOnDrop<'a>(&'a Publisher<String>);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn run_listener(pid: Option<u32>, listener: FinishListener) {
    match catch_unwind(AssertUnwindSafe(listener)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(?pid, error = %err, "finish listener failed"),
        Err(_) => error!(?pid, "finish listener panicked"),
    }
}
