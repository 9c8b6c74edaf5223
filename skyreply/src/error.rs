//! Workflow error taxonomy.

use serde::Serialize;
use thiserror::Error;

/// Why a workflow stopped before a network action completed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowError {
    /// The backend or the social network failed.
    #[error("{action} failed: {message}")]
    Collaborator { action: String, message: String },
    /// Human input did not name a valid choice.
    #[error("invalid selection: {0:?}")]
    InvalidSelection(String),
}

impl WorkflowError {
    /// Wrap a collaborator error, keeping its full context chain.
    pub fn collaborator(action: &str, err: &anyhow::Error) -> Self {
        Self::Collaborator {
            action: action.to_string(),
            message: format!("{err:#}"),
        }
    }

    pub fn invalid_selection(input: &str) -> Self {
        Self::InvalidSelection(input.trim().to_string())
    }
}
