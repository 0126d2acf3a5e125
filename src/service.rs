//! Operations the presentation layer calls.
//!
//! Registry access goes straight to the [`StoreManager`]. Execution is
//! resolve, then launch, then usage bookkeeping; the executor never touches
//! the registry itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::command::{Command, CommandUpdate, NewCommand};
use crate::config::Config;
use crate::error::Result;
use crate::executor::{
    ExecutionRequest, ExecutionResult, LaunchSettings, ProcessExecutor, ProcessLauncher,
    SystemLauncher,
};
use crate::resolver;
use crate::store_manager::StoreManager;
use crate::usage::UsageTracker;

pub struct CommandService<L = SystemLauncher> {
    store: Arc<StoreManager>,
    executor: ProcessExecutor<L>,
    usage: UsageTracker,
}

impl CommandService<SystemLauncher> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = StoreManager::open(config.store_path())?;
        let executor = ProcessExecutor::system(LaunchSettings::from(&config.execution));
        Ok(Self::new(store, executor))
    }
}

impl<L: ProcessLauncher> CommandService<L> {
    pub fn new(store: StoreManager, executor: ProcessExecutor<L>) -> Self {
        let store = Arc::new(store);
        Self {
            usage: UsageTracker::new(Arc::clone(&store)),
            store,
            executor,
        }
    }

    pub fn store(&self) -> &StoreManager {
        &self.store
    }

    pub fn executor(&self) -> &ProcessExecutor<L> {
        &self.executor
    }

    pub fn list_commands(&self) -> Result<Vec<Command>> {
        self.store.list()
    }

    pub fn get_command(&self, id: Uuid) -> Result<Command> {
        self.store.get(id)
    }

    pub fn create_command(&self, request: NewCommand) -> Result<Command> {
        self.store.create(request)
    }

    pub fn update_command(&self, id: Uuid, request: CommandUpdate) -> Result<Command> {
        self.store.update(id, request)
    }

    pub fn delete_command(&self, id: Uuid) -> Result<()> {
        self.store.delete(id)
    }

    pub fn search_commands_by_name(&self, query: &str) -> Result<Vec<Command>> {
        self.store.search_by_name(query)
    }

    pub fn search_commands_by_tags(&self, tags: &[String]) -> Result<Vec<Command>> {
        self.store.search_by_tags(tags)
    }

    pub fn execute_command(&self, id: Uuid, use_shell: bool) -> Result<ExecutionResult> {
        self.execute_command_with_parameters(id, &HashMap::new(), use_shell)
    }

    pub fn execute_command_with_parameters(
        &self,
        id: Uuid,
        values: &HashMap<String, String>,
        use_shell: bool,
    ) -> Result<ExecutionResult> {
        let command = self.store.get(id)?;
        let resolved = resolver::resolve(&command, values)?;
        let request = ExecutionRequest::for_command(&command, resolved, use_shell);

        let outcome = self.executor.execute(&request);

        if UsageTracker::counts(&outcome) {
            // The process already ran; a bookkeeping failure must not hide its output.
            match self.usage.on_executed(id) {
                Ok(updated) => info!(id = %id, use_count = updated.use_count, "execution counted"),
                Err(e) => warn!(id = %id, error = %e, "failed to record usage"),
            }
        }

        outcome
    }
}

impl<L: ProcessLauncher + 'static> CommandService<L> {
    /// Runs the execution on its own thread so the caller stays free for
    /// unrelated registry work.
    pub fn spawn_execute(
        self: &Arc<Self>,
        id: Uuid,
        values: HashMap<String, String>,
        use_shell: bool,
    ) -> JoinHandle<Result<ExecutionResult>> {
        let service = Arc::clone(self);
        thread::spawn(move || service.execute_command_with_parameters(id, &values, use_shell))
    }
}
