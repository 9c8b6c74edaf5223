//! Interactive menu over the post and reply workflows.

use tracing::{debug, instrument};

use crate::io::backend::Backend;
use crate::io::console::Prompter;
use crate::io::network::SocialNetwork;
use crate::io::transcript::{TranscriptWriter, record_run};
use crate::post::{PostRequest, run_post};
use crate::reply::run_reply;
use crate::session::{Collaborators, Outcome};

const MENU_PROMPT: &str = "Choose an option (1-3): ";

/// Settings the menu passes on to each workflow.
pub struct MenuOptions<'a> {
    pub timeline_limit: u32,
    pub image_alt: &'a str,
    pub transcript: Option<&'a TranscriptWriter>,
}

/// Loop until the human exits; returns every workflow outcome in order.
#[instrument(skip_all)]
pub fn run_menu<N: SocialNetwork, B: Backend, P: Prompter>(
    collab: &Collaborators<'_, N, B, P>,
    options: &MenuOptions<'_>,
) -> Vec<Outcome> {
    let prompter = collab.prompter;
    let mut outcomes = Vec::new();
    loop {
        prompter.say("");
        prompter.say("1. Post a message");
        prompter.say("2. Reply to a timeline post");
        prompter.say("3. Exit");
        let choice = prompter.ask(MENU_PROMPT);
        let run = match choice.trim() {
            "1" => run_post(
                collab,
                &PostRequest {
                    image_alt: options.image_alt.to_string(),
                    ..PostRequest::default()
                },
            ),
            "2" => run_reply(collab, options.timeline_limit),
            "3" | "" => break,
            other => {
                debug!(choice = other, "unknown menu choice");
                prompter.say(&format!("Unknown option: {other}"));
                continue;
            }
        };
        prompter.say(&run.outcome.to_string());
        record_run(options.transcript, &run);
        outcomes.push(run.outcome);
    }
    outcomes
}
