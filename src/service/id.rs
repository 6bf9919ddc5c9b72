// src/service/id.rs

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::ExecutionId;

/// Hands out unique, increasing execution ids.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn starting_at(first: ExecutionId) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> ExecutionId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
