//! Reply orchestration engine.
//!
//! Drives one reply from timeline fetch to a posted reply or an abort:
//!
//! `Idle → Fetched → Categorized → Displayed → Selected → (Liked) →
//! ReplyDecision → Drafted → Normalized → PendingApproval → Posted | Aborted`
//!
//! Every state entered is recorded on the session. The network `reply` call
//! happens at most once, and only for an approved candidate.

use tracing::{info, instrument, warn};

use crate::approval::ApprovalGate;
use crate::categorize::categorize;
use crate::core::input::{Selection, is_decline, is_yes, parse_selection};
use crate::core::length::{NETWORK_BUDGET, enforce};
use crate::core::types::{PostRecord, ReplyMode};
use crate::draft::{draft, draft_alternative};
use crate::error::WorkflowError;
use crate::io::backend::Backend;
use crate::io::console::Prompter;
use crate::io::network::SocialNetwork;
use crate::session::{
    AbortReason, Collaborators, Outcome, Workflow, WorkflowRun, WorkflowSession, WorkflowState,
};

const SELECT_PROMPT: &str = "Select a post number to interact with (or 'skip'): ";
const LIKE_PROMPT: &str = "Like this post? (yes/no): ";
const MODE_PROMPT: &str = "Reply as 'human' or 'agent' (or 'skip'): ";

/// Run the reply workflow against the latest `limit` timeline posts.
#[instrument(skip_all, fields(limit = limit))]
pub fn run_reply<N: SocialNetwork, B: Backend, P: Prompter>(
    collab: &Collaborators<'_, N, B, P>,
    limit: u32,
) -> WorkflowRun {
    let mut session = WorkflowSession::new(Workflow::Reply);
    let result = reply_flow(&mut session, collab, limit);
    let run = WorkflowRun::finish(session, result);
    info!(outcome = %run.outcome, "reply workflow finished");
    run
}

fn reply_flow<N: SocialNetwork, B: Backend, P: Prompter>(
    session: &mut WorkflowSession,
    collab: &Collaborators<'_, N, B, P>,
    limit: u32,
) -> Result<Outcome, AbortReason> {
    let prompter = collab.prompter;

    let raw = collab
        .network
        .fetch_timeline(limit)
        .map_err(|err| WorkflowError::collaborator("fetch timeline", &err))?;
    session.set_posts(PostRecord::batch_from(raw));
    session.enter(WorkflowState::Fetched);
    if session.posts().is_empty() {
        prompter.say("The timeline is empty.");
        return Err(AbortReason::Declined);
    }

    categorize(session.posts_mut(), collab.backend, collab.prompts);
    session.enter(WorkflowState::Categorized);

    for post in session.posts() {
        prompter.say(&post.display_line());
    }
    session.enter(WorkflowState::Displayed);

    let post = select_post(session, prompter)?;
    session.enter(WorkflowState::Selected);
    prompter.say(&format!("Selected: {}", post.display_line()));

    if is_yes(&prompter.ask(LIKE_PROMPT)) {
        match collab.network.like(&post.address) {
            Ok(report) => {
                prompter.say(&report.message);
                session.enter(WorkflowState::Liked);
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "like failed");
                prompter.say(&format!("Like failed: {err:#}"));
            }
        }
    }

    session.enter(WorkflowState::ReplyDecision);
    let answer = prompter.ask(MODE_PROMPT);
    let mode = match ReplyMode::parse(&answer) {
        Some(mode) => mode,
        None if is_decline(&answer) => return Err(AbortReason::Declined),
        None => return Err(WorkflowError::invalid_selection(&answer).into()),
    };

    let candidate = draft(&post, mode, collab)?;
    session.push_candidate(candidate);
    session.enter(WorkflowState::Drafted);

    session.tighten_current();
    session.enter(WorkflowState::Normalized);

    session.enter(WorkflowState::PendingApproval);
    let gate = ApprovalGate::new(collab, "reply", Some(post.body_text.as_str()));
    let approved = gate.run(session, || match mode {
        ReplyMode::Agent => draft_alternative(&post, collab),
        ReplyMode::Human => None,
    })?;

    let text = enforce(&approved.normalized_text, NETWORK_BUDGET);
    let report = collab
        .network
        .reply(&post.address, &text)
        .map_err(|err| WorkflowError::collaborator("reply", &err))?;
    prompter.say(&report.message);
    Ok(Outcome::Posted { text, report })
}

fn select_post<P: Prompter>(
    session: &mut WorkflowSession,
    prompter: &P,
) -> Result<PostRecord, AbortReason> {
    let answer = prompter.ask(SELECT_PROMPT);
    match parse_selection(&answer) {
        Some(Selection::Skip) => Err(AbortReason::Declined),
        Some(Selection::Post(number)) => session
            .select(number)
            .cloned()
            .ok_or_else(|| WorkflowError::invalid_selection(&answer).into()),
        None => Err(WorkflowError::invalid_selection(&answer).into()),
    }
}
