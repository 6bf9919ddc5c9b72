// src/exec/executor.rs

//! One script invocation on top of a [`ProcessHandle`].

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ScriptConfig;
use crate::errors::{Result, ScriptcastError};
use crate::exec::args::build_command;
use crate::exec::env::build_env;
use crate::exec::masking::{SecretMasker, secret_values, secure_values};
use crate::exec::stdin::StdinTrigger;
use crate::process::{FinishListener, ProcessHandle, ProcessKind, ProcessSpec};
use crate::stream::Stream;
use crate::stream::publisher::lock;
use crate::types::{ExecutionId, ParameterValues};

/// Window of the time buffer between the process output and the raw stream.
pub const OUTPUT_FLUSH_PERIOD: Duration = Duration::from_millis(100);

pub struct ScriptExecutor {
    config: Arc<ScriptConfig>,
    values: ParameterValues,
    start_lock: Mutex<()>,
    running: OnceLock<Running>,
}

struct Running {
    execution_id: ExecutionId,
    process: Arc<ProcessHandle>,
    raw: Stream<String>,
    protected: Stream<String>,
}

impl ScriptExecutor {
    pub fn new(config: Arc<ScriptConfig>, values: ParameterValues) -> Self {
        Self {
            config,
            values,
            start_lock: Mutex::new(()),
            running: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &Arc<ScriptConfig> {
        &self.config
    }

    pub fn values(&self) -> &ParameterValues {
        &self.values
    }

    /// Spawn the script and wire its output pipeline. Returns the pid.
    pub fn start(&self, execution_id: ExecutionId) -> Result<u32> {
        let _start = lock(&self.start_lock);
        if self.running.get().is_some() {
            return Err(ScriptcastError::AlreadyStarted);
        }

        // Fallible setup first: once the pipeline exists, only a closed
        // output stops its flusher thread.
        let masker = SecretMasker::new(secret_values(&self.config, &self.values))?;
        let (program, args) = build_command(&self.config, &self.values)?;
        let spec = ProcessSpec {
            program,
            args,
            working_dir: self.config.working_directory().map(|dir| dir.to_path_buf()),
            env: build_env(&self.config, &self.values, execution_id),
        };
        let kind = ProcessKind::for_terminal(self.config.requires_terminal());
        let process = ProcessHandle::new(spec, kind);

        // Subscribed before start so the first bytes are not lost.
        let raw = process
            .output()
            .time_buffered(OUTPUT_FLUSH_PERIOD)
            .replay();
        let protected = match masker {
            Some(masker) => raw.map(move |chunk: &String| masker.mask(chunk)).replay(),
            None => raw.clone(),
        };

        let immediate_input = self.attach_stdin(&process, &raw);

        let pid = process.start()?;
        for text in immediate_input.iter() {
            process.write_to_input(text);
        }

        info!(
            execution_id,
            pid,
            script = %self.config.name(),
            command = %self.secure_command().unwrap_or_default(),
            "script started"
        );

        let _ = self.running.set(Running {
            execution_id,
            process,
            raw,
            protected,
        });
        Ok(pid)
    }

    /// Subscribes pattern triggers; returns the values to write right after
    /// the start.
    fn attach_stdin(&self, process: &Arc<ProcessHandle>, raw: &Stream<String>) -> Vec<String> {
        let mut immediate = Vec::new();
        for parameter in self.config.parameters().iter() {
            if !parameter.pass_as.as_stdin() {
                continue;
            }
            let Some(value) = self.values.get(&parameter.name) else {
                continue;
            };
            let text = value.to_plain_string();

            match parameter.stdin_expected_text.as_deref() {
                Some(expected) if !expected.is_empty() => {
                    debug!(parameter = %parameter.name, expected, "waiting for stdin trigger");
                    let target = Arc::clone(process);
                    raw.subscribe(StdinTrigger::new(expected, text, move |value: &str| {
                        target.write_to_input(value)
                    }));
                }
                _ => immediate.push(text),
            }
        }
        immediate
    }

    fn running(&self) -> Result<&Running> {
        self.running.get().ok_or(ScriptcastError::NotStarted)
    }

    pub fn execution_id(&self) -> Option<ExecutionId> {
        self.running.get().map(|r| r.execution_id)
    }

    pub fn process(&self) -> Option<&Arc<ProcessHandle>> {
        self.running.get().map(|r| &r.process)
    }

    /// Buffered output exactly as the script printed it.
    pub fn raw_output(&self) -> Result<Stream<String>> {
        Ok(self.running()?.raw.clone())
    }

    /// Buffered output with secrets masked; the raw stream itself when there
    /// is nothing to mask.
    pub fn protected_output(&self) -> Result<Stream<String>> {
        Ok(self.running()?.protected.clone())
    }

    /// Command line with secure values masked. For audit logs only; never
    /// executed.
    pub fn secure_command(&self) -> Result<String> {
        let secured = secure_values(&self.config, &self.values);
        let (program, args) = build_command(&self.config, &secured)?;
        Ok(std::iter::once(program)
            .chain(args)
            .collect::<Vec<_>>()
            .join(" "))
    }

    pub fn pid(&self) -> Option<u32> {
        self.process().and_then(|p| p.pid())
    }

    pub fn is_finished(&self) -> bool {
        self.process().is_some_and(|p| p.is_finished())
    }

    pub fn return_code(&self) -> Option<i32> {
        self.process().and_then(|p| p.return_code())
    }

    pub fn stop(&self) -> Result<()> {
        self.running()?.process.stop();
        Ok(())
    }

    pub fn kill(&self) -> Result<()> {
        self.running()?.process.kill();
        Ok(())
    }

    pub fn write_to_input(&self, text: &str) -> Result<()> {
        self.running()?.process.write_to_input(text);
        Ok(())
    }

    pub fn add_finish_listener(&self, listener: FinishListener) -> Result<()> {
        self.running()?.process.add_finish_listener(listener);
        Ok(())
    }

    pub fn wait_finish(&self, timeout: Option<Duration>) -> Result<()> {
        self.running()?.process.wait_finish(timeout)
    }

    /// Drop the replay buffers and release the process resources.
    pub fn cleanup(&self) {
        let Some(running) = self.running.get() else {
            warn!(script = %self.config.name(), "cleanup of a script that never started");
            return;
        };
        running.raw.dispose();
        running.protected.dispose();
        running.process.cleanup();
        debug!(execution_id = running.execution_id, "script resources released");
    }
}
