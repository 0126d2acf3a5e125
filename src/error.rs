use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Shape problems in a command definition. Recoverable by re-prompting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Command name must not be empty")]
    EmptyName,

    #[error("Executable must not be empty")]
    EmptyCommand,

    #[error("Parameter name must not be empty")]
    EmptyParameterName,

    #[error("Parameter '{0}' is declared more than once")]
    DuplicateParameterName(String),

    #[error("Default '{value}' of select parameter '{parameter}' is not one of its options")]
    InvalidSelectDefault { parameter: String, value: String },

    #[error("Command with name '{0}' already exists")]
    DuplicateName(String),
}

#[derive(Error, Debug)]
pub enum ArgusError {
    #[error("Invalid command: {0}")]
    Validation(#[from] ValidationError),

    #[error("Command not found: {0}")]
    NotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry file {} cannot be parsed: {source}", path.display())]
    CorruptData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing value for required parameter '{0}'")]
    MissingRequiredParameter(String),

    #[error("Value '{value}' is not an option of parameter '{parameter}'")]
    InvalidSelectValue { parameter: String, value: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ArgusError>;
