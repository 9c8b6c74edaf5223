//! Reply drafting stage.

use tracing::{info, instrument, warn};

use crate::core::extract::DRAFT_PRIORITY_FIELDS;
use crate::core::length::INTERIM_BUDGET;
use crate::core::types::{CandidateOrigin, CandidateReply, PostRecord, ReplyMode};
use crate::error::WorkflowError;
use crate::io::backend::Backend;
use crate::io::console::Prompter;
use crate::responder::{Responder, shape_output};
use crate::session::{AbortReason, Collaborators};

const HUMAN_PROMPT: &str = "Type your reply (blank to cancel): ";
const MANUAL_PROMPT: &str = "No usable reply was generated. Type one yourself (blank to cancel): ";

/// Produce the first candidate for `post`, enforced at the interim budget.
///
/// Human mode takes the typed text verbatim. Agent mode asks the routed
/// responder once; if nothing can be extracted the raw-if-short fallback is
/// used, and failing that the human is asked for text.
#[instrument(skip_all, fields(post = post.sequence_number, mode = ?mode))]
pub fn draft<N, B: Backend, P: Prompter>(
    post: &PostRecord,
    mode: ReplyMode,
    collab: &Collaborators<'_, N, B, P>,
) -> Result<CandidateReply, AbortReason> {
    match mode {
        ReplyMode::Human => {
            let text = collab.prompter.ask(HUMAN_PROMPT);
            human_candidate(CandidateOrigin::Human, &text)
        }
        ReplyMode::Agent => {
            let responder = Responder::for_category(post.category_or_default(), collab.backend);
            info!(persona = %responder.persona(), "drafting reply");
            let origin = CandidateOrigin::Drafted(responder.persona());
            match generate_draft(post, &responder, collab, origin)? {
                Some(candidate) => Ok(candidate),
                None => {
                    warn!("no reply text in backend output");
                    let text = collab.prompter.ask(MANUAL_PROMPT);
                    human_candidate(CandidateOrigin::Manual, &text)
                }
            }
        }
    }
}

/// One more backend draft for the approval gate; `None` on any failure.
pub fn draft_alternative<N, B: Backend, P: Prompter>(
    post: &PostRecord,
    collab: &Collaborators<'_, N, B, P>,
) -> Option<CandidateReply> {
    let responder = Responder::for_category(post.category_or_default(), collab.backend);
    let origin = CandidateOrigin::Alternative(responder.persona());
    match generate_draft(post, &responder, collab, origin) {
        Ok(candidate) => candidate,
        Err(reason) => {
            warn!(%reason, "alternative draft failed");
            None
        }
    }
}

fn generate_draft<N, B: Backend, P>(
    post: &PostRecord,
    responder: &Responder<'_, B>,
    collab: &Collaborators<'_, N, B, P>,
    origin: CandidateOrigin,
) -> Result<Option<CandidateReply>, AbortReason> {
    let prompt = collab
        .prompts
        .render_draft(post, responder.persona(), INTERIM_BUDGET)
        .map_err(|err| WorkflowError::collaborator("render draft prompt", &err))?;
    let raw = responder.generate(&prompt)?;
    Ok(shape_output(origin, &raw, DRAFT_PRIORITY_FIELDS, INTERIM_BUDGET))
}

fn human_candidate(origin: CandidateOrigin, text: &str) -> Result<CandidateReply, AbortReason> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AbortReason::Declined);
    }
    Ok(CandidateReply::new(origin, text, text, None, INTERIM_BUDGET))
}
