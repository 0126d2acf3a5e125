use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::command::Command;
use crate::error::Result;
use crate::executor::ExecutionResult;
use crate::store_manager::StoreManager;

/// Decides when an execution counts as a use and records it.
///
/// One use per execute call that reached a finished process, whatever its
/// exit code. Failures before a process existed (bad parameters, missing
/// working directory, spawn errors) are not counted.
pub struct UsageTracker {
    store: Arc<StoreManager>,
}

impl UsageTracker {
    pub fn new(store: Arc<StoreManager>) -> Self {
        Self { store }
    }

    pub fn counts(outcome: &Result<ExecutionResult>) -> bool {
        outcome.is_ok()
    }

    pub fn on_executed(&self, id: Uuid) -> Result<Command> {
        self.store.record_usage(id, Utc::now())
    }
}
