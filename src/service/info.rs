// src/service/info.rs

use std::sync::Arc;
use std::time::SystemTime;

use crate::config::ScriptConfig;
use crate::types::{ExecutionId, User};

/// What was started, by whom and when. Outlives the execution's cleanup.
#[derive(Debug, Clone)]
pub struct ExecutionInfo {
    pub execution_id: ExecutionId,
    pub owner: User,
    pub config: Arc<ScriptConfig>,
    /// Command line with secrets masked.
    pub audit_command: String,
    pub started_at: SystemTime,
}

impl ExecutionInfo {
    pub fn new(
        execution_id: ExecutionId,
        owner: User,
        config: Arc<ScriptConfig>,
        audit_command: String,
    ) -> Self {
        Self {
            execution_id,
            owner,
            config,
            audit_command,
            started_at: SystemTime::now(),
        }
    }

    pub fn audit_name(&self) -> &str {
        &self.owner.audit_name
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        self.owner.user_id == user.user_id
    }
}
