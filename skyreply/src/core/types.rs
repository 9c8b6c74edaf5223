//! Shared deterministic types for the reply pipeline.
//!
//! These types carry no I/O. Collaborators produce [`RawPost`] values; the
//! pipeline turns them into [`PostRecord`]s and [`CandidateReply`] chains.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::length::enforce;
use crate::core::router::Persona;

/// Timeline item as returned by the network collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPost {
    /// Opaque identifier used for like/reply (an `at://` URI on Bluesky).
    pub address: String,
    pub author: String,
    pub text: String,
    pub observed_at: DateTime<Utc>,
}

/// Closed set of leaning labels plus the degradation sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "far-left")]
    FarLeft,
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "centrist")]
    Centrist,
    #[serde(rename = "right")]
    Right,
    #[serde(rename = "far-right")]
    FarRight,
    #[serde(rename = "Not Categorized")]
    NotCategorized,
}

impl Category {
    /// Labels the categorizer is allowed to assign.
    pub const LABELED: [Category; 5] = [
        Category::FarLeft,
        Category::Left,
        Category::Centrist,
        Category::Right,
        Category::FarRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::FarLeft => "far-left",
            Category::Left => "left",
            Category::Centrist => "centrist",
            Category::Right => "right",
            Category::FarRight => "far-right",
            Category::NotCategorized => "Not Categorized",
        }
    }

    /// Parse a label leniently (case, surrounding whitespace, `_`/space for `-`).
    ///
    /// Returns `None` for anything outside the closed set.
    pub fn parse(label: &str) -> Option<Category> {
        let normalized = label.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "far-left" => Some(Category::FarLeft),
            "left" => Some(Category::Left),
            "centrist" | "center" | "centre" => Some(Category::Centrist),
            "right" => Some(Category::Right),
            "far-right" => Some(Category::FarRight),
            "not-categorized" => Some(Category::NotCategorized),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized view of one fetched timeline item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    /// 1-based position in the fetched batch.
    pub sequence_number: u32,
    pub address: String,
    pub author_label: String,
    pub body_text: String,
    pub observed_at: DateTime<Utc>,
    pub category: Option<Category>,
    pub analysis_note: Option<String>,
}

impl PostRecord {
    /// Number a fetched batch starting at 1, preserving fetch order.
    pub fn batch_from(raw: Vec<RawPost>) -> Vec<PostRecord> {
        raw.into_iter()
            .zip(1u32..)
            .map(|(post, sequence_number)| PostRecord {
                sequence_number,
                address: post.address,
                author_label: post.author,
                body_text: post.text,
                observed_at: post.observed_at,
                category: None,
                analysis_note: None,
            })
            .collect()
    }

    /// Category with the sentinel substituted for a missing label.
    pub fn category_or_default(&self) -> Category {
        self.category.unwrap_or(Category::NotCategorized)
    }

    /// One-line listing used when presenting the batch.
    pub fn display_line(&self) -> String {
        format!(
            "{}. [{}] {}: {} (ref: {})",
            self.sequence_number,
            self.category_or_default(),
            self.author_label,
            self.body_text,
            self.address
        )
    }
}

/// Who authors a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    Human,
    Agent,
}

impl ReplyMode {
    pub fn parse(input: &str) -> Option<ReplyMode> {
        match input.trim().to_ascii_lowercase().as_str() {
            "human" => Some(ReplyMode::Human),
            "agent" => Some(ReplyMode::Agent),
            _ => None,
        }
    }
}

/// How a candidate came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "persona", rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Typed verbatim by the human as the draft.
    Human,
    /// First backend draft.
    Drafted(Persona),
    /// Backend alternative requested at the gate.
    Alternative(Persona),
    /// Unused extraction offered during recovery.
    Fallback,
    /// Manual text used verbatim after a failed rewrite.
    Manual,
    /// Backend rewrite of manual text.
    Rewrite(Persona),
}

/// One reply attempt. A new candidate supersedes the previous one; candidates
/// are never edited after construction except for the approval flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateReply {
    pub origin: CandidateOrigin,
    pub source_text: String,
    pub extracted_text: String,
    pub normalized_text: String,
    /// Character budget `normalized_text` was enforced against.
    pub budget: usize,
    /// Plausible-but-unused extraction, offered if the human rejects.
    pub fallback: Option<String>,
    approved: bool,
}

impl CandidateReply {
    pub fn new(
        origin: CandidateOrigin,
        source_text: impl Into<String>,
        extracted_text: impl Into<String>,
        fallback: Option<String>,
        budget: usize,
    ) -> Self {
        let extracted_text = extracted_text.into();
        let normalized_text = enforce(&extracted_text, budget);
        Self {
            origin,
            source_text: source_text.into(),
            extracted_text,
            normalized_text,
            budget,
            fallback,
            approved: false,
        }
    }

    /// Build the superseding candidate for a tighter budget.
    pub fn tightened(&self, budget: usize) -> Self {
        Self {
            origin: self.origin,
            source_text: self.source_text.clone(),
            extracted_text: self.extracted_text.clone(),
            normalized_text: enforce(&self.normalized_text, budget),
            budget,
            fallback: self.fallback.clone(),
            approved: false,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    pub(crate) fn mark_approved(&mut self) {
        self.approved = true;
    }
}
