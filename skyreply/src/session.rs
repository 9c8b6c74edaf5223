//! Per-invocation workflow state.
//!
//! A [`WorkflowSession`] is created when a workflow starts and threaded
//! explicitly through every stage. It owns the fetched batch, the selected
//! post, the candidate chain and the trail of states entered. Nothing in it
//! outlives the invocation except the optional transcript.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::core::length::NETWORK_BUDGET;
use crate::core::types::{CandidateReply, PostRecord};
use crate::error::WorkflowError;
use crate::io::backend::Backend;
use crate::io::console::Prompter;
use crate::io::network::{ActionReport, SocialNetwork};
use crate::io::prompt::PromptBuilder;

/// Which workflow a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Workflow {
    Post,
    Reply,
}

impl Workflow {
    pub fn as_str(self) -> &'static str {
        match self {
            Workflow::Post => "post",
            Workflow::Reply => "reply",
        }
    }
}

/// States of the orchestration engine, in the order a reply passes through
/// them. The post workflow visits the `Drafted..` suffix only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Fetched,
    Categorized,
    Displayed,
    Selected,
    Liked,
    ReplyDecision,
    Drafted,
    Normalized,
    PendingApproval,
    Posted,
    Aborted,
}

/// Why a workflow ended without posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The human declined at a decision point.
    Declined,
    Failed(WorkflowError),
}

impl From<WorkflowError> for AbortReason {
    fn from(err: WorkflowError) -> Self {
        AbortReason::Failed(err)
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Declined => f.write_str("declined"),
            AbortReason::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// Terminal result of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Posted { text: String, report: ActionReport },
    Aborted(AbortReason),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Posted { report, .. } => write!(f, "Done: {}", report.message),
            Outcome::Aborted(reason) => write!(f, "Aborted: {reason}"),
        }
    }
}

/// Collaborators every workflow stage may call.
pub struct Collaborators<'a, N, B, P> {
    pub network: &'a N,
    pub backend: &'a B,
    pub prompter: &'a P,
    pub prompts: &'a PromptBuilder,
}

impl<'a, N: SocialNetwork, B: Backend, P: Prompter> Collaborators<'a, N, B, P> {
    pub fn new(
        network: &'a N,
        backend: &'a B,
        prompter: &'a P,
        prompts: &'a PromptBuilder,
    ) -> Self {
        Self {
            network,
            backend,
            prompter,
            prompts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSession {
    workflow: Workflow,
    started_at: DateTime<Utc>,
    posts: Vec<PostRecord>,
    selected: Option<usize>,
    candidates: Vec<CandidateReply>,
    trail: Vec<WorkflowState>,
}

impl WorkflowSession {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            started_at: Utc::now(),
            posts: Vec::new(),
            selected: None,
            candidates: Vec::new(),
            trail: vec![WorkflowState::Idle],
        }
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn enter(&mut self, state: WorkflowState) {
        debug!(workflow = self.workflow.as_str(), ?state, "entering state");
        self.trail.push(state);
    }

    pub fn state(&self) -> WorkflowState {
        self.trail.last().copied().unwrap_or(WorkflowState::Idle)
    }

    pub fn trail(&self) -> &[WorkflowState] {
        &self.trail
    }

    pub fn set_posts(&mut self, posts: Vec<PostRecord>) {
        self.posts = posts;
        self.selected = None;
    }

    pub fn posts(&self) -> &[PostRecord] {
        &self.posts
    }

    pub fn posts_mut(&mut self) -> &mut [PostRecord] {
        &mut self.posts
    }

    /// Select by sequence number; `None` when out of range.
    pub fn select(&mut self, sequence_number: u32) -> Option<&PostRecord> {
        let index = self
            .posts
            .iter()
            .position(|post| post.sequence_number == sequence_number)?;
        self.selected = Some(index);
        self.posts.get(index)
    }

    pub fn selected(&self) -> Option<&PostRecord> {
        self.selected.and_then(|index| self.posts.get(index))
    }

    /// Append a candidate; it supersedes the current one.
    pub fn push_candidate(&mut self, candidate: CandidateReply) {
        debug!(
            origin = ?candidate.origin,
            chars = candidate.normalized_text.chars().count(),
            budget = candidate.budget,
            "new candidate"
        );
        self.candidates.push(candidate);
    }

    /// Supersede the current candidate with one enforced at the network budget.
    ///
    /// No-op when the current candidate already carries that budget.
    pub fn tighten_current(&mut self) {
        let Some(current) = self.candidates.last() else {
            return;
        };
        if current.budget > NETWORK_BUDGET {
            let tightened = current.tightened(NETWORK_BUDGET);
            self.push_candidate(tightened);
        }
    }

    pub fn current_candidate(&self) -> Option<&CandidateReply> {
        self.candidates.last()
    }

    /// Mark the current candidate approved and return a copy of it.
    pub(crate) fn approve_current(&mut self) -> Option<CandidateReply> {
        let current = self.candidates.last_mut()?;
        current.mark_approved();
        Some(current.clone())
    }

    pub fn candidates(&self) -> &[CandidateReply] {
        &self.candidates
    }
}

/// A finished workflow: its session and how it ended.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub session: WorkflowSession,
    pub outcome: Outcome,
}

impl WorkflowRun {
    /// Record the terminal state and pair the session with its outcome.
    pub fn finish(mut session: WorkflowSession, result: Result<Outcome, AbortReason>) -> Self {
        let outcome = result.unwrap_or_else(Outcome::Aborted);
        let terminal = match outcome {
            Outcome::Posted { .. } => WorkflowState::Posted,
            Outcome::Aborted(_) => WorkflowState::Aborted,
        };
        session.enter(terminal);
        Self { session, outcome }
    }
}
