//! Saved, parameterized shell commands.
//!
//! The registry of command definitions lives in a single JSON file owned by
//! [`StoreManager`]. Running a command resolves its `{placeholders}`
//! ([`resolver`]), launches it directly, through the shell or through a
//! version-manager shim ([`executor`]), and counts the use ([`usage`]).
//! [`CommandService`] ties these together for a front end.

pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod fuzzy_matcher;
pub mod i18n;
pub mod resolver;
pub mod service;
pub mod store_manager;
pub mod usage;

pub use command::{
    validate, Command, CommandParameter, CommandUpdate, EnvironmentVariable, NewCommand,
    ParameterType,
};
pub use config::Config;
pub use error::{ArgusError, Result, ValidationError};
pub use executor::{
    ExecutionRequest, ExecutionResult, LaunchPlan, LaunchSettings, LaunchStrategy,
    ProcessExecutor, ProcessLauncher, ProcessOutput, SystemLauncher,
};
pub use service::CommandService;
pub use store_manager::StoreManager;
pub use usage::UsageTracker;
