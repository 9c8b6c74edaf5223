//! Human approval gate.
//!
//! Every network-visible text passes through [`ApprovalGate::run`]. The gate
//! shows the current candidate and accepts approval, one alternative request
//! or rejection. Rejection walks a fixed recovery path: offer the unused
//! fallback, take manual text, rewrite it through the strategist (verbatim if
//! that fails) and ask for a final yes/no. The gate never loops on backend
//! failure.

use tracing::{debug, info, instrument};

use crate::core::extract::REWRITE_PRIORITY_FIELDS;
use crate::core::input::{GateDecision, is_yes};
use crate::core::length::NETWORK_BUDGET;
use crate::core::router::Persona;
use crate::core::types::{CandidateOrigin, CandidateReply};
use crate::io::backend::Backend;
use crate::io::console::Prompter;
use crate::io::prompt::PromptBuilder;
use crate::responder::{Responder, shape_output};
use crate::session::{AbortReason, Collaborators, WorkflowSession};

const APPROVE_PROMPT: &str = "Approve? (yes / alt for an alternative / anything else to reject): ";
const FALLBACK_PROMPT: &str = "Use this instead? (yes/no): ";
const MANUAL_PROMPT: &str = "Enter your own text (blank to cancel): ";
const FINAL_PROMPT: &str = "Send this? (yes/no): ";

pub struct ApprovalGate<'a, B, P> {
    backend: &'a B,
    prompter: &'a P,
    prompts: &'a PromptBuilder,
    /// Noun used when presenting ("reply", "post").
    subject: &'static str,
    /// Text being answered, given to the rewrite prompt.
    context_text: Option<&'a str>,
}

impl<'a, B: Backend, P: Prompter> ApprovalGate<'a, B, P> {
    pub fn new<N>(
        collab: &Collaborators<'a, N, B, P>,
        subject: &'static str,
        context_text: Option<&'a str>,
    ) -> Self {
        Self {
            backend: collab.backend,
            prompter: collab.prompter,
            prompts: collab.prompts,
            subject,
            context_text,
        }
    }

    /// Run the gate on the session's current candidate.
    ///
    /// `alternative` is called at most once, the first time the human asks
    /// for one. Returns the approved candidate, enforced at the network
    /// budget.
    #[instrument(skip_all, fields(subject = self.subject))]
    pub fn run<F>(
        &self,
        session: &mut WorkflowSession,
        alternative: F,
    ) -> Result<CandidateReply, AbortReason>
    where
        F: FnOnce() -> Option<CandidateReply>,
    {
        let mut alternative = Some(alternative);
        loop {
            let Some(current) = session.current_candidate() else {
                return Err(AbortReason::Declined);
            };
            self.show(current);

            match GateDecision::parse(&self.prompter.ask(APPROVE_PROMPT)) {
                GateDecision::Approve => {
                    info!("candidate approved");
                    return session.approve_current().ok_or(AbortReason::Declined);
                }
                GateDecision::Alternative => {
                    let Some(make) = alternative.take() else {
                        self.prompter
                            .say("Only one alternative is offered per draft.");
                        break;
                    };
                    match make() {
                        Some(candidate) => {
                            session.push_candidate(candidate);
                            session.tighten_current();
                        }
                        None => {
                            self.prompter.say("No alternative could be generated.");
                            break;
                        }
                    }
                }
                GateDecision::Reject => break,
            }
        }
        debug!("candidate rejected");
        self.recover(session)
    }

    fn recover(&self, session: &mut WorkflowSession) -> Result<CandidateReply, AbortReason> {
        if let Some(offered) = session.current_candidate().and_then(unused_fallback) {
            session.push_candidate(offered);
            if let Some(current) = session.current_candidate() {
                self.prompter.say("Another reading of the generated text:");
                self.show(current);
            }
            if is_yes(&self.prompter.ask(FALLBACK_PROMPT)) {
                info!("fallback approved");
                return session.approve_current().ok_or(AbortReason::Declined);
            }
        }

        let manual = self.prompter.ask(MANUAL_PROMPT);
        let manual = manual.trim();
        if manual.is_empty() {
            return Err(AbortReason::Declined);
        }

        let candidate = self.rewrite(manual).unwrap_or_else(|| {
            CandidateReply::new(CandidateOrigin::Manual, manual, manual, None, NETWORK_BUDGET)
        });
        session.push_candidate(candidate);
        if let Some(current) = session.current_candidate() {
            self.show(current);
        }
        if is_yes(&self.prompter.ask(FINAL_PROMPT)) {
            info!("recovered candidate approved");
            session.approve_current().ok_or(AbortReason::Declined)
        } else {
            Err(AbortReason::Declined)
        }
    }

    /// Strategist rewrite of manual text; `None` if the call or extraction fails.
    fn rewrite(&self, manual: &str) -> Option<CandidateReply> {
        let prompt = match self
            .prompts
            .render_rewrite(self.context_text, manual, NETWORK_BUDGET)
        {
            Ok(prompt) => prompt,
            Err(err) => {
                debug!(err = %format!("{err:#}"), "rewrite prompt failed to render");
                return None;
            }
        };
        let persona = Persona::Strategist;
        let raw = match Responder::new(persona, self.backend).generate(&prompt) {
            Ok(raw) => raw,
            Err(err) => {
                self.prompter
                    .say(&format!("Rewrite unavailable ({err}); using your text as written."));
                return None;
            }
        };
        let shaped = shape_output(
            CandidateOrigin::Rewrite(persona),
            &raw,
            REWRITE_PRIORITY_FIELDS,
            NETWORK_BUDGET,
        )
        .filter(|candidate| candidate.origin == CandidateOrigin::Rewrite(persona));
        if shaped.is_none() {
            self.prompter
                .say("Rewrite produced no usable text; using your text as written.");
        }
        shaped
    }

    fn show(&self, candidate: &CandidateReply) {
        self.prompter.say(&format!(
            "Proposed {} ({}/{} chars):",
            self.subject,
            candidate.normalized_text.chars().count(),
            candidate.budget
        ));
        self.prompter.say(&candidate.normalized_text);
    }
}

/// Candidate built from the unused fallback, if it differs from what was shown.
fn unused_fallback(current: &CandidateReply) -> Option<CandidateReply> {
    let fallback = current.fallback.as_deref()?.trim();
    if fallback.is_empty()
        || fallback == current.extracted_text
        || fallback == current.normalized_text
    {
        return None;
    }
    Some(CandidateReply::new(
        CandidateOrigin::Fallback,
        current.source_text.clone(),
        fallback,
        None,
        NETWORK_BUDGET,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::length::INTERIM_BUDGET;
    use crate::session::Workflow;
    use crate::test_support::{RecordingNetwork, ScriptedBackend, ScriptedPrompter};

    fn session_with(candidate: CandidateReply) -> WorkflowSession {
        let mut session = WorkflowSession::new(Workflow::Reply);
        session.push_candidate(candidate);
        session.tighten_current();
        session
    }

    fn drafted(text: &str, fallback: Option<&str>) -> CandidateReply {
        CandidateReply::new(
            CandidateOrigin::Drafted(Persona::Advocate),
            text,
            text,
            fallback.map(str::to_string),
            INTERIM_BUDGET,
        )
    }

    struct Harness {
        network: RecordingNetwork,
        backend: ScriptedBackend,
        prompter: ScriptedPrompter,
        prompts: PromptBuilder,
    }

    impl Harness {
        fn new(backend: ScriptedBackend, answers: &[&str]) -> Self {
            Self {
                network: RecordingNetwork::default(),
                backend,
                prompter: ScriptedPrompter::new(answers),
                prompts: PromptBuilder::new().expect("prompts"),
            }
        }

        fn collab(&self) -> Collaborators<'_, RecordingNetwork, ScriptedBackend, ScriptedPrompter> {
            Collaborators::new(&self.network, &self.backend, &self.prompter, &self.prompts)
        }
    }

    #[test]
    fn approve_returns_current_candidate() {
        let harness = Harness::new(ScriptedBackend::new(Vec::<&str>::new()), &["y"]);
        let collab = harness.collab();
        let mut session = session_with(drafted("Thanks for this thoughtful post", None));

        let approved = ApprovalGate::new(&collab, "reply", None)
            .run(&mut session, || None)
            .expect("approved");

        assert!(approved.is_approved());
        assert_eq!(approved.normalized_text, "Thanks for this thoughtful post");
        assert_eq!(approved.budget, NETWORK_BUDGET);
        assert!(harness.backend.calls().is_empty());
    }

    #[test]
    fn alternative_supersedes_and_is_offered_once() {
        let harness = Harness::new(
            ScriptedBackend::new(Vec::<&str>::new()),
            &["alt", "alt", "", ""],
        );
        let collab = harness.collab();
        let mut session = session_with(drafted("first draft of the reply", None));
        let mut made = 0;

        let result = ApprovalGate::new(&collab, "reply", None).run(&mut session, || {
            made += 1;
            Some(drafted("second draft of the reply", None))
        });

        assert_eq!(made, 1);
        assert_eq!(result, Err(AbortReason::Declined));
        let shown: Vec<&str> = session
            .candidates()
            .iter()
            .map(|c| c.normalized_text.as_str())
            .collect();
        assert!(shown.contains(&"second draft of the reply"));
        assert!(
            harness
                .prompter
                .output()
                .iter()
                .any(|line| line.contains("Only one alternative"))
        );
    }

    #[test]
    fn rejection_offers_unused_fallback_first() {
        let harness = Harness::new(ScriptedBackend::new(Vec::<&str>::new()), &["no", "yes"]);
        let collab = harness.collab();
        let mut session = session_with(drafted(
            "the chosen reply text",
            Some("the other plausible reply"),
        ));

        let approved = ApprovalGate::new(&collab, "reply", None)
            .run(&mut session, || None)
            .expect("approved");

        assert_eq!(approved.origin, CandidateOrigin::Fallback);
        assert_eq!(approved.normalized_text, "the other plausible reply");
    }

    #[test]
    fn declined_fallback_moves_on_to_manual_text() {
        let harness = Harness::new(
            ScriptedBackend::failing("backend down"),
            &["no", "no", "my manual words here", "yes"],
        );
        let collab = harness.collab();
        let mut session = session_with(drafted(
            "the chosen reply text",
            Some("the other plausible reply"),
        ));

        let approved = ApprovalGate::new(&collab, "reply", None)
            .run(&mut session, || None)
            .expect("approved");

        assert_eq!(approved.origin, CandidateOrigin::Manual);
        assert_eq!(approved.normalized_text, "my manual words here");
        assert_eq!(
            harness.prompter.prompts(),
            vec![APPROVE_PROMPT, FALLBACK_PROMPT, MANUAL_PROMPT, FINAL_PROMPT]
        );
        let fallback = session
            .candidates()
            .iter()
            .find(|c| c.origin == CandidateOrigin::Fallback)
            .expect("fallback was offered");
        assert!(!fallback.is_approved());
    }

    #[test]
    fn missing_alternative_goes_straight_to_recovery() {
        let harness = Harness::new(
            ScriptedBackend::failing("backend down"),
            &["alt", "typed reply text", "yes"],
        );
        let collab = harness.collab();
        let mut session = session_with(drafted("first draft of the reply", None));

        let approved = ApprovalGate::new(&collab, "reply", None)
            .run(&mut session, || None)
            .expect("approved");

        assert_eq!(approved.origin, CandidateOrigin::Manual);
        assert_eq!(approved.normalized_text, "typed reply text");
        assert_eq!(
            harness.prompter.prompts(),
            vec![APPROVE_PROMPT, MANUAL_PROMPT, FINAL_PROMPT]
        );
        assert!(
            harness
                .prompter
                .output()
                .iter()
                .any(|line| line == "No alternative could be generated.")
        );
    }

    #[test]
    fn manual_text_is_rewritten_by_strategist() {
        let harness = Harness::new(
            ScriptedBackend::new([r#"{"final_reply": "A tidier version of my reply"}"#]),
            &["no", "my reply, kinda messy", "yes"],
        );
        let collab = harness.collab();
        let mut session = session_with(drafted("generated text to reject", None));

        let approved = ApprovalGate::new(&collab, "reply", Some("original post"))
            .run(&mut session, || None)
            .expect("approved");

        assert_eq!(approved.origin, CandidateOrigin::Rewrite(Persona::Strategist));
        assert_eq!(approved.normalized_text, "A tidier version of my reply");
        let calls = harness.backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Persona::Strategist);
        assert!(calls[0].1.contains("my reply, kinda messy"));
        assert!(calls[0].1.contains("original post"));
    }

    #[test]
    fn failed_rewrite_uses_manual_text_verbatim() {
        let long_manual = "m".repeat(250);
        let harness = Harness::new(
            ScriptedBackend::failing("backend down"),
            &["no", long_manual.as_str(), "yes"],
        );
        let collab = harness.collab();
        let mut session = session_with(drafted("generated text to reject", None));

        let approved = ApprovalGate::new(&collab, "reply", None)
            .run(&mut session, || None)
            .expect("approved");

        assert_eq!(approved.origin, CandidateOrigin::Manual);
        assert_eq!(approved.normalized_text.chars().count(), NETWORK_BUDGET);
        assert!(approved.normalized_text.ends_with("..."));
        assert_eq!(harness.backend.calls().len(), 1);
    }

    #[test]
    fn blank_manual_text_aborts() {
        let harness = Harness::new(ScriptedBackend::new(Vec::<&str>::new()), &["no", "  "]);
        let collab = harness.collab();
        let mut session = session_with(drafted("generated text to reject", None));

        let result = ApprovalGate::new(&collab, "reply", None).run(&mut session, || None);
        assert_eq!(result, Err(AbortReason::Declined));
        assert!(harness.backend.calls().is_empty());
    }

    #[test]
    fn final_refusal_aborts() {
        let harness = Harness::new(
            ScriptedBackend::new([r#"{"final_reply": "A rewritten reply text"}"#]),
            &["no", "manual text here", "no"],
        );
        let collab = harness.collab();
        let mut session = session_with(drafted("generated text to reject", None));

        let result = ApprovalGate::new(&collab, "reply", None).run(&mut session, || None);
        assert_eq!(result, Err(AbortReason::Declined));
        assert!(session.candidates().iter().all(|c| !c.is_approved()));
    }
}
