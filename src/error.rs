use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query execution failed: {message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("embedding provider error: {message}")]
    Provider { message: String },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("failed to persist {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("failed to load run record {}: {message}", path.display())]
    RunRecord { path: PathBuf, message: String },
}

impl EvalError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn run_record(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::RunRecord {
            path: path.into(),
            message: message.into(),
        }
    }
}
