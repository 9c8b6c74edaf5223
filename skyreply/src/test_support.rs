//! Test-only fakes for the collaborator traits plus post fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};

use crate::core::router::Persona;
use crate::core::types::{PostRecord, RawPost};
use crate::io::backend::Backend;
use crate::io::console::Prompter;
use crate::io::media::ImageAttachment;
use crate::io::network::{ActionReport, SocialNetwork};

/// Backend returning queued outputs and capturing every call.
///
/// An exhausted queue answers with an error, so unexpected calls surface as
/// collaborator failures.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: RefCell<VecDeque<String>>,
    fail_always: Option<String>,
    calls: RefCell<Vec<(Persona, String)>>,
}

impl ScriptedBackend {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Backend whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_always: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(Persona, String)> {
        self.calls.borrow().clone()
    }
}

impl Backend for ScriptedBackend {
    fn complete(&self, persona: Persona, prompt: &str) -> Result<String> {
        self.calls.borrow_mut().push((persona, prompt.to_string()));
        if let Some(message) = &self.fail_always {
            return Err(anyhow!("{message}"));
        }
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted backend exhausted"))
    }
}

/// Network action captured by [`RecordingNetwork`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkAction {
    Post { text: String, image_mime: Option<String> },
    Reply { target: String, text: String },
    Like { target: String },
}

/// Network with a canned timeline that records every mutating call.
///
/// Failing actions are still recorded as attempts.
#[derive(Debug, Default)]
pub struct RecordingNetwork {
    timeline: Vec<RawPost>,
    fail_fetch: Option<String>,
    fail_post: Option<String>,
    fail_reply: Option<String>,
    fail_like: Option<String>,
    actions: RefCell<Vec<NetworkAction>>,
    timeline_limits: RefCell<Vec<u32>>,
}

impl RecordingNetwork {
    pub fn with_timeline(timeline: Vec<RawPost>) -> Self {
        Self {
            timeline,
            ..Self::default()
        }
    }

    pub fn with_fetch_failure(mut self, message: &str) -> Self {
        self.fail_fetch = Some(message.to_string());
        self
    }

    pub fn with_post_failure(mut self, message: &str) -> Self {
        self.fail_post = Some(message.to_string());
        self
    }

    pub fn with_reply_failure(mut self, message: &str) -> Self {
        self.fail_reply = Some(message.to_string());
        self
    }

    pub fn with_like_failure(mut self, message: &str) -> Self {
        self.fail_like = Some(message.to_string());
        self
    }

    pub fn actions(&self) -> Vec<NetworkAction> {
        self.actions.borrow().clone()
    }

    /// Limits passed to each `fetch_timeline` call.
    pub fn timeline_limits(&self) -> Vec<u32> {
        self.timeline_limits.borrow().clone()
    }

    fn record(
        &self,
        action: NetworkAction,
        failure: &Option<String>,
        message: &str,
    ) -> Result<ActionReport> {
        self.actions.borrow_mut().push(action);
        match failure {
            Some(err) => Err(anyhow!("{err}")),
            None => Ok(ActionReport::new(message)),
        }
    }
}

impl SocialNetwork for RecordingNetwork {
    fn fetch_timeline(&self, limit: u32) -> Result<Vec<RawPost>> {
        self.timeline_limits.borrow_mut().push(limit);
        if let Some(err) = &self.fail_fetch {
            return Err(anyhow!("{err}"));
        }
        Ok(self.timeline.iter().take(limit as usize).cloned().collect())
    }

    fn post(&self, text: &str, image: Option<&ImageAttachment>) -> Result<ActionReport> {
        let action = NetworkAction::Post {
            text: text.to_string(),
            image_mime: image.map(|image| image.mime.clone()),
        };
        self.record(action, &self.fail_post, "Posted successfully")
    }

    fn reply(&self, target: &str, text: &str) -> Result<ActionReport> {
        let action = NetworkAction::Reply {
            target: target.to_string(),
            text: text.to_string(),
        };
        self.record(action, &self.fail_reply, "Reply posted successfully")
    }

    fn like(&self, target: &str) -> Result<ActionReport> {
        let action = NetworkAction::Like {
            target: target.to_string(),
        };
        self.record(action, &self.fail_like, "Post liked successfully")
    }
}

/// Prompter answering from a queue and recording prompts and output.
///
/// An exhausted queue answers blank, like end of input.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
    output: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn output(&self) -> Vec<String> {
        self.output.borrow().clone()
    }

    /// Answers that were never asked for.
    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&self, prompt: &str) -> String {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers.borrow_mut().pop_front().unwrap_or_default()
    }

    fn say(&self, line: &str) {
        self.output.borrow_mut().push(line.to_string());
    }
}

/// Fixed observation time so fixtures are deterministic.
pub fn fixture_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Deterministic timeline item numbered `n`.
pub fn raw_post(n: u32, author: &str, text: &str) -> RawPost {
    RawPost {
        address: format!("at://did:plc:{author}/app.bsky.feed.post/{n}"),
        author: author.to_string(),
        text: text.to_string(),
        observed_at: fixture_time(),
    }
}

/// Uncategorized post record with sequence number `n`.
pub fn post(n: u32, author: &str, text: &str) -> PostRecord {
    PostRecord {
        sequence_number: n,
        address: format!("at://did:plc:{author}/app.bsky.feed.post/{n}"),
        author_label: author.to_string(),
        body_text: text.to_string(),
        observed_at: fixture_time(),
        category: None,
        analysis_note: None,
    }
}
