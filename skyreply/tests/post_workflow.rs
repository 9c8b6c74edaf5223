//! Post workflow against fake collaborators.

use std::fs;

use skyreply::core::length::NETWORK_BUDGET;
use skyreply::core::router::Persona;
use skyreply::core::types::CandidateOrigin;
use skyreply::io::prompt::PromptBuilder;
use skyreply::post::{PostRequest, run_post};
use skyreply::session::{AbortReason, Collaborators, Outcome, WorkflowRun, WorkflowState};
use skyreply::test_support::{NetworkAction, RecordingNetwork, ScriptedBackend, ScriptedPrompter};

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

fn run(
    network: &RecordingNetwork,
    backend: &ScriptedBackend,
    prompter: &ScriptedPrompter,
    request: &PostRequest,
) -> WorkflowRun {
    let prompts = PromptBuilder::new().expect("prompts");
    let collab = Collaborators::new(network, backend, prompter, &prompts);
    run_post(&collab, request)
}

fn text_request(text: &str) -> PostRequest {
    PostRequest {
        text: Some(text.to_string()),
        ..PostRequest::default()
    }
}

#[test]
fn interactive_post_with_image() {
    let temp = tempfile::tempdir().expect("tempdir");
    let image = temp.path().join("photo");
    fs::write(&image, PNG_HEADER).expect("write image");
    let image_answer = image.to_string_lossy().into_owned();

    let network = RecordingNetwork::default();
    let backend =
        ScriptedBackend::new([r#"{"formatted_message": "Sunset over the bay tonight."}"#]);
    let prompter = ScriptedPrompter::new(&[
        "the sunset over the bay was amazing tonight",
        image_answer.as_str(),
        "yes",
    ]);
    let request = PostRequest {
        image_alt: "A sunset".to_string(),
        ..PostRequest::default()
    };

    let run = run(&network, &backend, &prompter, &request);

    assert_eq!(
        network.actions(),
        vec![NetworkAction::Post {
            text: "Sunset over the bay tonight.".to_string(),
            image_mime: Some("image/png".to_string()),
        }]
    );
    assert!(matches!(run.outcome, Outcome::Posted { .. }));
    assert_eq!(
        run.session.trail(),
        &[
            WorkflowState::Idle,
            WorkflowState::Drafted,
            WorkflowState::Normalized,
            WorkflowState::PendingApproval,
            WorkflowState::Posted,
        ]
    );
}

#[test]
fn text_from_caller_skips_image_question() {
    let network = RecordingNetwork::default();
    let backend = ScriptedBackend::new([r#"{"formatted_message": "Hello, world."}"#]);
    let prompter = ScriptedPrompter::new(&["yes"]);

    let run = run(&network, &backend, &prompter, &text_request("hello world"));

    assert!(matches!(run.outcome, Outcome::Posted { .. }));
    assert_eq!(prompter.prompts().len(), 1);
}

#[test]
fn long_rewrite_is_cut_to_network_budget() {
    let long = "word ".repeat(60);
    let response = serde_json::json!({ "formatted_message": long }).to_string();
    let network = RecordingNetwork::default();
    let backend = ScriptedBackend::new([response]);
    let prompter = ScriptedPrompter::new(&["yes"]);

    let run = run(&network, &backend, &prompter, &text_request("say a lot"));

    let Outcome::Posted { text, .. } = &run.outcome else {
        panic!("expected a post, got {:?}", run.outcome);
    };
    assert_eq!(text.chars().count(), NETWORK_BUDGET);
    assert!(text.ends_with("..."));
    assert!(
        run.session
            .candidates()
            .iter()
            .all(|candidate| candidate.normalized_text.chars().count() <= candidate.budget)
    );
}

#[test]
fn alternative_compose_is_posted() {
    let network = RecordingNetwork::default();
    let backend = ScriptedBackend::new([
        r#"{"formatted_message": "Version one of the news."}"#,
        r#"{"formatted_message": "Version two of the news."}"#,
    ]);
    let prompter = ScriptedPrompter::new(&["alt", "yes"]);

    let run = run(&network, &backend, &prompter, &text_request("some news"));

    assert_eq!(
        network.actions(),
        vec![NetworkAction::Post {
            text: "Version two of the news.".to_string(),
            image_mime: None,
        }]
    );
    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(persona, _)| *persona == Persona::Strategist));
    let last = run.session.candidates().last().expect("candidate");
    assert_eq!(last.origin, CandidateOrigin::Alternative(Persona::Strategist));
}

#[test]
fn rejected_post_is_not_sent() {
    let network = RecordingNetwork::default();
    let backend = ScriptedBackend::new([r#"{"formatted_message": "Draft text to reject."}"#]);
    let prompter = ScriptedPrompter::new(&["no", ""]);

    let run = run(&network, &backend, &prompter, &text_request("whatever"));

    assert_eq!(run.outcome, Outcome::Aborted(AbortReason::Declined));
    assert!(network.actions().is_empty());
    assert_eq!(run.session.state(), WorkflowState::Aborted);
}
