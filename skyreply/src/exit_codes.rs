//! Stable exit codes for the `skyreply` CLI.

use crate::error::WorkflowError;
use crate::session::{AbortReason, Outcome};

/// Posted, or the menu exited normally.
pub const OK: i32 = 0;
/// Invalid configuration, credentials or arguments.
pub const INVALID: i32 = 1;
/// The human declined or gave an invalid answer.
pub const ABORTED: i32 = 2;
/// A backend or network call failed.
pub const FAILED: i32 = 3;

pub fn for_outcome(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::Posted { .. } => OK,
        Outcome::Aborted(AbortReason::Declined) => ABORTED,
        Outcome::Aborted(AbortReason::Failed(WorkflowError::InvalidSelection(_))) => ABORTED,
        Outcome::Aborted(AbortReason::Failed(WorkflowError::Collaborator { .. })) => FAILED,
    }
}
