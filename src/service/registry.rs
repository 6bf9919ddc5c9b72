// src/service/registry.rs

use std::collections::{BTreeSet, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::config::ScriptConfig;
use crate::errors::{Result, ScriptcastError};
use crate::exec::ScriptExecutor;
use crate::service::access::{AccessMode, Authorizer, OwnersOnly};
use crate::service::id::IdGenerator;
use crate::service::info::ExecutionInfo;
use crate::stream::Stream;
use crate::stream::publisher::lock;
use crate::types::{ExecutionId, ParameterValues, User};

/// Start / finish callback. Gets the execution id and its owner.
pub type ExecutionListener = Arc<dyn Fn(ExecutionId, &User) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct Registry {
    executors: HashMap<ExecutionId, Arc<ScriptExecutor>>,
    infos: HashMap<ExecutionId, Arc<ExecutionInfo>>,
    active: BTreeSet<ExecutionId>,
    /// Exit codes of cleaned-up executions.
    exit_codes: HashMap<ExecutionId, i32>,
}

pub struct ExecutionService {
    authorizer: Arc<dyn Authorizer>,
    ids: IdGenerator,
    registry: Mutex<Registry>,
    start_listeners: Mutex<Vec<ExecutionListener>>,
    finish_listeners: Arc<Mutex<Vec<ExecutionListener>>>,
}

impl Default for ExecutionService {
    fn default() -> Self {
        Self::new(Arc::new(OwnersOnly))
    }
}

impl ExecutionService {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self::with_id_generator(authorizer, IdGenerator::default())
    }

    pub fn with_id_generator(authorizer: Arc<dyn Authorizer>, ids: IdGenerator) -> Self {
        Self {
            authorizer,
            ids,
            registry: Mutex::new(Registry::default()),
            start_listeners: Mutex::new(Vec::new()),
            finish_listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Start a script on behalf of `user`.
    ///
    /// Start listeners have run by the time the id is returned. Only a failed
    /// spawn (or an unusable command line) is an error.
    pub fn start_script(
        &self,
        config: Arc<ScriptConfig>,
        values: ParameterValues,
        user: User,
    ) -> Result<ExecutionId> {
        let execution_id = self.ids.next_id();
        let executor = Arc::new(ScriptExecutor::new(Arc::clone(&config), values));
        let audit_command = executor.secure_command()?;

        executor.start(execution_id)?;

        let info = Arc::new(ExecutionInfo::new(
            execution_id,
            user.clone(),
            config,
            audit_command,
        ));
        {
            let mut registry = lock(&self.registry);
            registry
                .executors
                .insert(execution_id, Arc::clone(&executor));
            registry.infos.insert(execution_id, Arc::clone(&info));
            registry.active.insert(execution_id);
        }

        let listeners = Arc::clone(&self.finish_listeners);
        let owner = user.clone();
        executor.add_finish_listener(Box::new(move || {
            info!(execution_id, user = %owner, "execution finished");
            let snapshot = lock(&listeners).clone();
            notify(&snapshot, execution_id, &owner, "finish");
            Ok(())
        }))?;

        info!(
            execution_id,
            user = %user,
            script = %info.config.name(),
            command = %info.audit_command,
            "execution started"
        );

        let snapshot = lock(&self.start_listeners).clone();
        notify(&snapshot, execution_id, &user, "start");

        Ok(execution_id)
    }

    /// Check that `user` may act on `execution_id` in the given mode.
    pub fn validate_execution_id(
        &self,
        execution_id: ExecutionId,
        user: &User,
        mode: AccessMode,
    ) -> Result<()> {
        let registry = lock(&self.registry);
        self.check_access(&registry, execution_id, user, mode)
    }

    fn check_access(
        &self,
        registry: &Registry,
        execution_id: ExecutionId,
        user: &User,
        mode: AccessMode,
    ) -> Result<()> {
        if mode == AccessMode::Owner && !registry.active.contains(&execution_id) {
            return Err(ScriptcastError::NotFound(execution_id));
        }
        let info = registry
            .infos
            .get(&execution_id)
            .ok_or(ScriptcastError::NotFound(execution_id))?;

        let allowed = info.is_owned_by(user)
            || (mode == AccessMode::History && self.authorizer.has_full_history_access(user));
        if !allowed {
            warn!(execution_id, user = %user, ?mode, "execution access prohibited");
            return Err(ScriptcastError::AccessProhibited {
                execution_id,
                user_id: user.user_id.clone(),
            });
        }
        Ok(())
    }

    /// Validate, then hand out the executor. `None` for a cleaned-up
    /// execution (history access only).
    fn executor(
        &self,
        execution_id: ExecutionId,
        user: &User,
        mode: AccessMode,
    ) -> Result<Option<Arc<ScriptExecutor>>> {
        let registry = lock(&self.registry);
        self.check_access(&registry, execution_id, user, mode)?;
        Ok(registry.executors.get(&execution_id).cloned())
    }

    fn owned_executor(&self, execution_id: ExecutionId, user: &User) -> Result<Arc<ScriptExecutor>> {
        self.executor(execution_id, user, AccessMode::Owner)?
            .ok_or(ScriptcastError::NotFound(execution_id))
    }

    pub fn stop_script(&self, execution_id: ExecutionId, user: &User) -> Result<()> {
        let executor = self.owned_executor(execution_id, user)?;
        info!(execution_id, user = %user, "stop requested");
        executor.stop()
    }

    pub fn kill_script(&self, execution_id: ExecutionId, user: &User) -> Result<()> {
        let executor = self.owned_executor(execution_id, user)?;
        info!(execution_id, user = %user, "kill requested");
        executor.kill()
    }

    pub fn is_running(&self, execution_id: ExecutionId, user: &User) -> Result<bool> {
        let executor = self.executor(execution_id, user, AccessMode::History)?;
        Ok(executor.is_some_and(|e| !e.is_finished()))
    }

    pub fn get_exit_code(&self, execution_id: ExecutionId, user: &User) -> Result<Option<i32>> {
        let registry = lock(&self.registry);
        self.check_access(&registry, execution_id, user, AccessMode::History)?;
        Ok(match registry.executors.get(&execution_id) {
            Some(executor) => executor.return_code(),
            None => registry.exit_codes.get(&execution_id).copied(),
        })
    }

    pub fn get_process_id(&self, execution_id: ExecutionId, user: &User) -> Result<Option<u32>> {
        Ok(self.owned_executor(execution_id, user)?.pid())
    }

    pub fn get_raw_output_stream(
        &self,
        execution_id: ExecutionId,
        user: &User,
    ) -> Result<Stream<String>> {
        self.owned_executor(execution_id, user)?.raw_output()
    }

    /// Output with secure parameter values masked.
    pub fn get_anonymized_output_stream(
        &self,
        execution_id: ExecutionId,
        user: &User,
    ) -> Result<Stream<String>> {
        self.owned_executor(execution_id, user)?.protected_output()
    }

    pub fn write_to_input(&self, execution_id: ExecutionId, user: &User, text: &str) -> Result<()> {
        self.owned_executor(execution_id, user)?.write_to_input(text)
    }

    /// Active executions owned by `user_id`, ascending.
    pub fn get_active_executions(&self, user_id: &str) -> Vec<ExecutionId> {
        let registry = lock(&self.registry);
        registry
            .active
            .iter()
            .copied()
            .filter(|id| {
                registry
                    .infos
                    .get(id)
                    .is_some_and(|info| info.owner.user_id == user_id)
            })
            .collect()
    }

    /// Active executions whose process has not finished, any owner.
    pub fn get_running_executions(&self) -> Vec<ExecutionId> {
        let registry = lock(&self.registry);
        registry
            .active
            .iter()
            .copied()
            .filter(|id| {
                registry
                    .executors
                    .get(id)
                    .is_some_and(|executor| !executor.is_finished())
            })
            .collect()
    }

    pub fn get_execution_info(&self, execution_id: ExecutionId) -> Option<Arc<ExecutionInfo>> {
        lock(&self.registry).infos.get(&execution_id).cloned()
    }

    pub fn get_owner(&self, execution_id: ExecutionId) -> Option<User> {
        self.get_execution_info(execution_id)
            .map(|info| info.owner.clone())
    }

    pub fn get_audit_name(&self, execution_id: ExecutionId) -> Option<String> {
        self.get_execution_info(execution_id)
            .map(|info| info.audit_name().to_string())
    }

    pub fn get_audit_command(&self, execution_id: ExecutionId) -> Option<String> {
        self.get_execution_info(execution_id)
            .map(|info| info.audit_command.clone())
    }

    pub fn get_config(&self, execution_id: ExecutionId) -> Option<Arc<ScriptConfig>> {
        self.get_execution_info(execution_id)
            .map(|info| Arc::clone(&info.config))
    }

    /// Release a finished execution. Its info stays available.
    ///
    /// Fails with `NotFinished` while the process runs; of several
    /// concurrent calls exactly one succeeds, the others get `NotFound`.
    pub fn cleanup_execution(&self, execution_id: ExecutionId, user: &User) -> Result<()> {
        let executor = {
            let mut registry = lock(&self.registry);
            self.check_access(&registry, execution_id, user, AccessMode::Owner)?;
            let executor = registry
                .executors
                .get(&execution_id)
                .cloned()
                .ok_or(ScriptcastError::NotFound(execution_id))?;
            if !executor.is_finished() {
                return Err(ScriptcastError::NotFinished(execution_id));
            }

            registry.active.remove(&execution_id);
            registry.executors.remove(&execution_id);
            if let Some(code) = executor.return_code() {
                registry.exit_codes.insert(execution_id, code);
            }
            executor
        };

        executor.cleanup();
        debug!(execution_id, user = %user, "execution cleaned up");
        Ok(())
    }

    pub fn add_start_listener(&self, listener: ExecutionListener) {
        lock(&self.start_listeners).push(listener);
    }

    /// Without an id the listener hears about every execution that finishes
    /// from now on. With an id it fires once for that execution, right away
    /// if it already finished.
    pub fn add_finish_listener(
        &self,
        listener: ExecutionListener,
        execution_id: Option<ExecutionId>,
    ) -> Result<()> {
        let Some(execution_id) = execution_id else {
            lock(&self.finish_listeners).push(listener);
            return Ok(());
        };

        let (executor, owner) = {
            let registry = lock(&self.registry);
            let executor = registry
                .executors
                .get(&execution_id)
                .cloned()
                .ok_or(ScriptcastError::NotFound(execution_id))?;
            let owner = registry
                .infos
                .get(&execution_id)
                .map(|info| info.owner.clone())
                .ok_or(ScriptcastError::NotFound(execution_id))?;
            (executor, owner)
        };

        executor.add_finish_listener(Box::new(move || listener(execution_id, &owner)))
    }
}

fn notify(listeners: &[ExecutionListener], execution_id: ExecutionId, user: &User, event: &str) {
    for listener in listeners.iter() {
        match catch_unwind(AssertUnwindSafe(|| listener(execution_id, user))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(execution_id, event, error = %err, "execution listener failed"),
            Err(_) => error!(execution_id, event, "execution listener panicked"),
        }
    }
}
