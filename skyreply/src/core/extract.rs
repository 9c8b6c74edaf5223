//! Tiered salvage of reply text from unreliable generator output.
//!
//! Backends are asked for a specific JSON shape but are not trusted to return
//! it. Each tier is a pure function over the decoded output; tiers are tried
//! in order and the first finding wins. Later tiers accept looser evidence.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::length::INTERIM_BUDGET;
use crate::core::normalize::{Decoded, Normalized};
use crate::core::types::Category;

/// Field every responder is instructed to populate.
pub const PRIMARY_FIELD: &str = "formatted_message";
/// Nested object some backends wrap their answer in.
pub const NESTED_FIELD: &str = "structured_response";
/// Field looked up inside [`NESTED_FIELD`].
pub const NESTED_PRIMARY_FIELD: &str = "rewritten_reply";

/// Alternate fields for drafted replies, highest priority first.
pub const DRAFT_PRIORITY_FIELDS: &[&str] = &[
    "final_reply",
    "reply",
    "analyzed_reply",
    "message",
    "text",
    "content",
];
/// Alternate fields for rewrites and composed posts.
pub const REWRITE_PRIORITY_FIELDS: &[&str] =
    &["final_reply", "reply", "message", "text", "content"];

/// Bare labels that must never be mistaken for reply content.
const LABEL_DENYLIST: &[&str] = &[
    "progressive",
    "liberal",
    "centrist",
    "conservative",
    "strongly conservative",
    "left",
    "right",
    "far-left",
    "far-right",
    "not categorized",
];

/// Keys skipped by the structured heuristic scan.
const METADATA_KEYS: &[&str] = &[
    "categorized_message",
    "category",
    "feedback_instruction",
    "instruction",
    "result",
    "status",
];

/// Field names searched for `"<field>": "<value>"` in unstructured text.
const PATTERN_FIELDS: &[&str] = &["reply", "formatted_message", "message", "content", "text"];

/// Minimum length for a heuristic finding.
pub const MIN_HEURISTIC_CHARS: usize = 10;

static FIELD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    PATTERN_FIELDS
        .iter()
        .map(|field| {
            Regex::new(&format!(r#""{}"\s*:\s*"([^"]+)""#, regex::escape(field)))
                .expect("field pattern should be valid")
        })
        .collect()
});

static ANY_FIELD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""\s*:\s*"([^"]+)""#).expect("pattern should be valid"));

/// Which tier produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    DirectField,
    NestedField,
    AlternateField,
    HeuristicScan,
}

/// Reply text found by one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub tier: Tier,
    /// Field name, `line` or `pattern`, for diagnostics.
    pub source: String,
}

impl Extracted {
    fn new(text: &str, tier: Tier, source: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            tier,
            source: source.to_string(),
        }
    }
}

/// Every tier came up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no reply text could be extracted from generated output")]
pub struct ExtractionFailed;

type TierFn = fn(&Decoded, &[&str]) -> Option<Extracted>;

const TIERS: [TierFn; 4] = [direct_field, nested_field, alternate_fields, heuristic_scan];

/// Return the first finding across the tiers.
pub fn extract_reply_text(
    decoded: &Decoded,
    priority_fields: &[&str],
) -> Result<Extracted, ExtractionFailed> {
    TIERS
        .iter()
        .find_map(|tier| tier(decoded, priority_fields))
        .ok_or(ExtractionFailed)
}

/// Chosen text plus one plausible-but-unused fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salvage {
    pub chosen: Result<Extracted, ExtractionFailed>,
    /// When `chosen` failed, this is the raw-if-short text the caller may use
    /// directly. Otherwise it is a distinct alternative worth offering.
    pub fallback: Option<String>,
}

/// Run every tier and keep the first finding plus a distinct fallback.
pub fn salvage(normalized: &Normalized, priority_fields: &[&str]) -> Salvage {
    let mut findings = TIERS
        .iter()
        .filter_map(|tier| tier(&normalized.decoded, priority_fields));
    let chosen = findings.next();
    let chosen_text = chosen.as_ref().map(|found| found.text.clone());

    let later = findings
        .map(|found| found.text)
        .find(|text| Some(text) != chosen_text.as_ref());
    let fallback = match (&chosen_text, later) {
        (_, Some(text)) => Some(text),
        (None, None) => raw_if_short(&normalized.cleaned),
        (Some(chosen), None) if !normalized.is_structured() => {
            raw_if_short(&normalized.cleaned).filter(|raw| raw != chosen)
        }
        (Some(_), None) => None,
    };

    Salvage {
        chosen: chosen.ok_or(ExtractionFailed),
        fallback,
    }
}

/// Cleaned text usable as-is when it is non-empty and under the safety length.
pub fn raw_if_short(cleaned: &str) -> Option<String> {
    let trimmed = cleaned.trim();
    (!trimmed.is_empty() && trimmed.chars().count() < INTERIM_BUDGET).then(|| trimmed.to_string())
}

/// True when `value` is only a leaning label.
pub fn is_category_label(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    LABEL_DENYLIST.contains(&lowered.as_str()) || Category::parse(&lowered).is_some()
}

fn direct_field(decoded: &Decoded, _priority_fields: &[&str]) -> Option<Extracted> {
    let Decoded::Mapping(map) = decoded else {
        return None;
    };
    non_empty_str(map, PRIMARY_FIELD)
        .map(|text| Extracted::new(text, Tier::DirectField, PRIMARY_FIELD))
}

fn nested_field(decoded: &Decoded, _priority_fields: &[&str]) -> Option<Extracted> {
    let Decoded::Mapping(map) = decoded else {
        return None;
    };
    let Some(Value::Object(nested)) = map.get(NESTED_FIELD) else {
        return None;
    };
    non_empty_str(nested, NESTED_PRIMARY_FIELD)
        .map(|text| Extracted::new(text, Tier::NestedField, NESTED_PRIMARY_FIELD))
}

fn alternate_fields(decoded: &Decoded, priority_fields: &[&str]) -> Option<Extracted> {
    let Decoded::Mapping(map) = decoded else {
        return None;
    };
    priority_fields.iter().find_map(|field| {
        non_empty_str(map, field)
            .filter(|text| !is_category_label(text))
            .map(|text| Extracted::new(text, Tier::AlternateField, field))
    })
}

fn heuristic_scan(decoded: &Decoded, _priority_fields: &[&str]) -> Option<Extracted> {
    match decoded {
        Decoded::Mapping(map) => scan_mapping(map),
        Decoded::Malformed(text) => longest_line(text).or_else(|| pattern_capture(text)),
    }
}

fn scan_mapping(map: &Map<String, Value>) -> Option<Extracted> {
    map.iter().find_map(|(key, value)| {
        let text = value.as_str()?.trim();
        let usable = text.chars().count() >= MIN_HEURISTIC_CHARS
            && !METADATA_KEYS.contains(&key.to_lowercase().as_str())
            && !is_category_label(text);
        usable.then(|| Extracted::new(text, Tier::HeuristicScan, key))
    })
}

fn longest_line(text: &str) -> Option<Extracted> {
    let mut best: Option<&str> = None;
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if best.is_none_or(|current| line.chars().count() > current.chars().count()) {
            best = Some(line);
        }
    }
    best.filter(|line| line.chars().count() >= MIN_HEURISTIC_CHARS)
        .map(|line| Extracted::new(line, Tier::HeuristicScan, "line"))
}

fn pattern_capture(text: &str) -> Option<Extracted> {
    FIELD_PATTERNS
        .iter()
        .chain(std::iter::once(&*ANY_FIELD_PATTERN))
        .find_map(|pattern| pattern.captures(text)?.get(1))
        .map(|capture| Extracted::new(capture.as_str(), Tier::HeuristicScan, "pattern"))
        .filter(|found| !found.text.is_empty())
}

fn non_empty_str<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    map.get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}
