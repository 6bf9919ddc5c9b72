// src/service/access.rs

//! Who may see what.

use std::collections::BTreeSet;

use crate::types::User;

/// How strictly an execution id is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Id must be active and owned by the caller.
    Owner,
    /// Id may be finished and cleaned up; callers with full history access
    /// need not own it.
    History,
}

pub trait Authorizer: Send + Sync {
    /// May read executions started by other users.
    fn has_full_history_access(&self, user: &User) -> bool;
}

/// Nobody is exempt from ownership checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnersOnly;

impl Authorizer for OwnersOnly {
    fn has_full_history_access(&self, _user: &User) -> bool {
        false
    }
}

/// A fixed set of user ids with full history access.
#[derive(Debug, Clone, Default)]
pub struct HistoryAdmins {
    user_ids: BTreeSet<String>,
}

impl HistoryAdmins {
    pub fn new<I, S>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_ids: user_ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorizer for HistoryAdmins {
    fn has_full_history_access(&self, user: &User) -> bool {
        self.user_ids.contains(&user.user_id)
    }
}
