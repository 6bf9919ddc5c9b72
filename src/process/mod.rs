// src/process/mod.rs

//! OS process ownership and output capture.
//!
//! - [`handle`] owns one process: spawning, the output reader and finish
//!   watcher threads, stdin, stop/kill and finish listeners.
//! - [`pipe`] and [`pty`] are the two ways of wiring the child's stdio; both
//!   hand back an [`OutputSource`] polled by the same reader loop.
//! - [`decode`] turns chunked bytes into text without splitting characters.
//! - [`os`] contains the platform-specific signalling.

pub mod decode;
pub mod handle;
pub(crate) mod os;
pub(crate) mod pipe;
#[cfg(unix)]
pub(crate) mod pty;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, Command};

pub use handle::{FinishListener, ProcessHandle};

/// Size of a single raw read from the child's output.
pub(crate) const READ_CHUNK_SIZE: usize = 4096;

/// What to run. Environment entries are added on top of the inherited
/// environment.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program followed by its arguments, for logs.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(&self.env);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// How the child's stdio is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    Pipe,
    /// Pseudo-terminal; falls back to `Pipe` where PTYs are unavailable.
    Pty,
}

impl ProcessKind {
    pub fn for_terminal(requires_terminal: bool) -> Self {
        if requires_terminal {
            ProcessKind::Pty
        } else {
            ProcessKind::Pipe
        }
    }
}

/// Result of one non-blocking read attempt.
pub(crate) enum ReadOutcome {
    /// Decoded text; may be empty when only part of a character arrived.
    Data(String),
    /// Nothing available right now.
    Pending,
    /// The output side is closed for good.
    Eof,
}

pub(crate) trait OutputSource: Send {
    fn read_available(&mut self) -> io::Result<ReadOutcome>;

    /// Text still held back by the decoder once reading stops.
    fn finish(&mut self) -> String;
}

pub(crate) struct Spawned {
    pub(crate) child: Child,
    pub(crate) source: Box<dyn OutputSource>,
    pub(crate) input: Box<dyn Write + Send>,
}

pub(crate) fn spawn(spec: &ProcessSpec, kind: ProcessKind) -> io::Result<Spawned> {
    match kind {
        ProcessKind::Pipe => pipe::spawn(spec),
        #[cfg(unix)]
        ProcessKind::Pty => pty::spawn(spec),
        #[cfg(not(unix))]
        ProcessKind::Pty => {
            tracing::warn!("pseudo-terminals are not supported here; using a pipe");
            pipe::spawn(spec)
        }
    }
}
