//! Original post workflow.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use crate::approval::ApprovalGate;
use crate::core::extract::REWRITE_PRIORITY_FIELDS;
use crate::core::length::{INTERIM_BUDGET, NETWORK_BUDGET, enforce};
use crate::core::router::Persona;
use crate::core::types::{CandidateOrigin, CandidateReply};
use crate::error::WorkflowError;
use crate::io::backend::Backend;
use crate::io::console::Prompter;
use crate::io::media::{ImageAttachment, load_image};
use crate::io::network::{ActionReport, SocialNetwork};
use crate::responder::{Responder, shape_output};
use crate::session::{
    AbortReason, Collaborators, Outcome, Workflow, WorkflowRun, WorkflowSession, WorkflowState,
};

const MESSAGE_PROMPT: &str = "What would you like to post? ";
const IMAGE_PROMPT: &str = "Attach an image? Enter a file path (blank for none): ";

/// What the caller already knows about the post.
///
/// Missing text is asked for interactively. The image path is only asked
/// for when the text was too.
#[derive(Debug, Clone, Default)]
pub struct PostRequest {
    pub text: Option<String>,
    pub image: Option<PathBuf>,
    pub image_alt: String,
}

#[instrument(skip_all, fields(with_text = request.text.is_some()))]
pub fn run_post<N: SocialNetwork, B: Backend, P: Prompter>(
    collab: &Collaborators<'_, N, B, P>,
    request: &PostRequest,
) -> WorkflowRun {
    let mut session = WorkflowSession::new(Workflow::Post);
    let result = post_flow(&mut session, collab, request);
    let run = WorkflowRun::finish(session, result);
    info!(outcome = %run.outcome, "post workflow finished");
    run
}

fn post_flow<N: SocialNetwork, B: Backend, P: Prompter>(
    session: &mut WorkflowSession,
    collab: &Collaborators<'_, N, B, P>,
    request: &PostRequest,
) -> Result<Outcome, AbortReason> {
    let prompter = collab.prompter;
    let interactive = request.text.is_none();
    let message = match &request.text {
        Some(text) => text.clone(),
        None => prompter.ask(MESSAGE_PROMPT),
    };
    let message = message.trim().to_string();
    if message.is_empty() {
        return Err(AbortReason::Declined);
    }

    let image_path = match &request.image {
        Some(path) => Some(path.clone()),
        None if interactive => {
            let answer = prompter.ask(IMAGE_PROMPT);
            let answer = answer.trim();
            (!answer.is_empty()).then(|| PathBuf::from(answer))
        }
        None => None,
    };
    let image = image_path
        .map(|path| load_image(&path, &request.image_alt))
        .transpose()
        .map_err(|err| WorkflowError::collaborator("load image", &err))?;

    let drafted = compose(&message, collab, CandidateOrigin::Drafted(Persona::Strategist));
    session.push_candidate(drafted);
    session.enter(WorkflowState::Drafted);
    session.tighten_current();
    session.enter(WorkflowState::Normalized);

    session.enter(WorkflowState::PendingApproval);
    let gate = ApprovalGate::new(collab, "post", None);
    let approved = gate.run(session, || {
        Some(compose(
            &message,
            collab,
            CandidateOrigin::Alternative(Persona::Strategist),
        ))
    })?;

    let text = enforce(&approved.normalized_text, NETWORK_BUDGET);
    let report = post_once(collab.network, &text, image.as_ref())?;
    prompter.say(&report.message);
    Ok(Outcome::Posted { text, report })
}

/// Strategist rewrite of the message, or the message itself if that fails.
fn compose<N, B: Backend, P: Prompter>(
    message: &str,
    collab: &Collaborators<'_, N, B, P>,
    origin: CandidateOrigin,
) -> CandidateReply {
    let human =
        || CandidateReply::new(CandidateOrigin::Human, message, message, None, INTERIM_BUDGET);
    let prompt = match collab.prompts.render_compose(message, NETWORK_BUDGET) {
        Ok(prompt) => prompt,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "compose prompt failed to render");
            return human();
        }
    };
    match Responder::new(Persona::Strategist, collab.backend).generate(&prompt) {
        Ok(raw) => match shape_output(origin, &raw, REWRITE_PRIORITY_FIELDS, INTERIM_BUDGET) {
            Some(candidate) if candidate.origin == origin => candidate,
            _ => {
                collab
                    .prompter
                    .say("No usable rewrite was generated; using your message.");
                human()
            }
        },
        Err(err) => {
            collab
                .prompter
                .say(&format!("Rewrite unavailable ({err}); using your message."));
            human()
        }
    }
}

fn post_once<N: SocialNetwork>(
    network: &N,
    text: &str,
    image: Option<&ImageAttachment>,
) -> Result<ActionReport, WorkflowError> {
    network
        .post(text, image)
        .map_err(|err| WorkflowError::collaborator("post", &err))
}
