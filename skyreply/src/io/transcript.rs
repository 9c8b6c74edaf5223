//! Session transcripts written after each workflow.
//!
//! Transcripts are product artifacts, unlike tracing output: one JSON file
//! per finished workflow under the configured directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::types::{CandidateReply, PostRecord};
use crate::session::{Outcome, Workflow, WorkflowRun, WorkflowState};

#[derive(Debug, Serialize)]
struct Transcript<'a> {
    workflow: Workflow,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    selected: Option<&'a PostRecord>,
    candidates: &'a [CandidateReply],
    trail: &'a [WorkflowState],
    outcome: &'a Outcome,
}

#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<dir>/<UTC timestamp>-<workflow>.json` and return its path.
    pub fn write(&self, run: &WorkflowRun) -> Result<PathBuf> {
        let ended_at = Utc::now();
        let session = &run.session;
        let transcript = Transcript {
            workflow: session.workflow(),
            started_at: session.started_at(),
            ended_at,
            selected: session.selected(),
            candidates: session.candidates(),
            trail: session.trail(),
            outcome: &run.outcome,
        };

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create transcript dir {}", self.dir.display()))?;
        let path = self.dir.join(file_name(session.started_at(), session.workflow()));
        let mut buf = serde_json::to_string_pretty(&transcript).context("serialize transcript")?;
        buf.push('\n');
        fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Write the transcript if configured; failures are logged, never raised.
pub fn record_run(writer: Option<&TranscriptWriter>, run: &WorkflowRun) {
    let Some(writer) = writer else {
        return;
    };
    match writer.write(run) {
        Ok(path) => info!(path = %path.display(), "transcript written"),
        Err(err) => warn!(err = %format!("{err:#}"), "failed to write transcript"),
    }
}

fn file_name(started_at: DateTime<Utc>, workflow: Workflow) -> String {
    format!(
        "{}-{}.json",
        started_at.format("%Y%m%dT%H%M%S%.3fZ"),
        workflow.as_str()
    )
}
