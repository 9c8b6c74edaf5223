//! Decoding of batch categorization output.
//!
//! The categorizer stage calls the backend once per batch; this module turns
//! whatever came back into per-post labels keyed by sequence number.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::core::normalize::strip_fences;
use crate::core::types::{Category, PostRecord};

/// Array keys accepted when the response is wrapped in an object.
const LIST_KEYS: &[&str] = &["messages", "posts", "categories"];
/// Keys carrying an optional free-text note per entry.
const NOTE_KEYS: &[&str] = &["analysis", "reason"];

/// Label and note for one sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub category: Category,
    pub note: Option<String>,
}

/// Categorization could not be used for the whole batch.
///
/// Never shown to the human; only the sentinel label is observable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategorizationDegraded {
    #[error("categorization backend failed: {0}")]
    Backend(String),
    #[error("categorization output is not valid JSON")]
    Undecodable,
    #[error("categorization output has no recognizable entries")]
    Unrecognized,
}

/// Decode backend output into assignments keyed by sequence number.
///
/// Accepted shapes: an array of `{number, category, analysis?}` objects, an
/// object wrapping such an array under `messages`/`posts`/`categories`, or an
/// object mapping numbers to labels. Unknown labels become `Not Categorized`.
pub fn decode_assignments(raw: &str) -> Result<BTreeMap<u32, Assignment>, CategorizationDegraded> {
    let cleaned = strip_fences(raw);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|_| CategorizationDegraded::Undecodable)?;

    let assignments = match &value {
        Value::Array(entries) => from_entries(entries),
        Value::Object(map) => match LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
        {
            Some(entries) => from_entries(entries),
            None => map
                .iter()
                .filter_map(|(key, label)| {
                    let number = key.trim().parse::<u32>().ok()?;
                    let category = label.as_str().map(category_or_sentinel)?;
                    Some((number, Assignment { category, note: None }))
                })
                .collect(),
        },
        _ => BTreeMap::new(),
    };

    if assignments.is_empty() {
        return Err(CategorizationDegraded::Unrecognized);
    }
    Ok(assignments)
}

/// Apply assignments in place; posts without one get the sentinel.
pub fn apply_assignments(posts: &mut [PostRecord], assignments: &BTreeMap<u32, Assignment>) {
    for post in posts.iter_mut() {
        match assignments.get(&post.sequence_number) {
            Some(assignment) => {
                post.category = Some(assignment.category);
                post.analysis_note = assignment.note.clone();
            }
            None => {
                post.category = Some(Category::NotCategorized);
                post.analysis_note = None;
            }
        }
    }
}

/// Label every post with the sentinel.
pub fn degrade_all(posts: &mut [PostRecord]) {
    apply_assignments(posts, &BTreeMap::new());
}

fn from_entries(entries: &[Value]) -> BTreeMap<u32, Assignment> {
    entries
        .iter()
        .filter_map(|entry| {
            let object = entry.as_object()?;
            let number = object.get("number").and_then(number_of)?;
            let category = object
                .get("category")
                .and_then(Value::as_str)
                .map(category_or_sentinel)
                .unwrap_or(Category::NotCategorized);
            let note = NOTE_KEYS
                .iter()
                .find_map(|key| object.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|note| !note.is_empty())
                .map(str::to_string);
            Some((number, Assignment { category, note }))
        })
        .collect()
}

fn number_of(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn category_or_sentinel(label: &str) -> Category {
    Category::parse(label).unwrap_or(Category::NotCategorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RawPost;
    use chrono::{DateTime, Utc};

    fn batch(n: usize) -> Vec<PostRecord> {
        PostRecord::batch_from(
            (1..=n)
                .map(|i| RawPost {
                    address: format!("at://post/{i}"),
                    author: "a".to_string(),
                    text: "t".to_string(),
                    observed_at: DateTime::<Utc>::UNIX_EPOCH,
                })
                .collect(),
        )
    }

    #[test]
    fn decodes_fenced_array_with_notes() {
        let raw = concat!(
            "```json\n",
            r#"[{"number": 1, "category": "left", "analysis": "pro-union"}, "#,
            r#"{"number": "2", "category": "Far Right"}]"#,
            "\n```",
        );
        let assignments = decode_assignments(raw).expect("decode");
        assert_eq!(assignments[&1].category, Category::Left);
        assert_eq!(assignments[&1].note.as_deref(), Some("pro-union"));
        assert_eq!(assignments[&2].category, Category::FarRight);
    }

    #[test]
    fn decodes_wrapped_messages_array() {
        let raw = r#"{"messages": [{"number": 3, "category": "centrist"}]}"#;
        let assignments = decode_assignments(raw).expect("decode");
        assert_eq!(assignments[&3].category, Category::Centrist);
    }

    #[test]
    fn decodes_number_to_label_object() {
        let raw = r#"{"1": "far-left", "2": "libertarian"}"#;
        let assignments = decode_assignments(raw).expect("decode");
        assert_eq!(assignments[&1].category, Category::FarLeft);
        assert_eq!(assignments[&2].category, Category::NotCategorized);
    }

    #[test]
    fn malformed_output_is_undecodable() {
        assert_eq!(
            decode_assignments("I think they are mostly centrist."),
            Err(CategorizationDegraded::Undecodable)
        );
    }

    #[test]
    fn entries_without_numbers_are_unrecognized() {
        assert_eq!(
            decode_assignments(r#"[{"category": "left"}, "right"]"#),
            Err(CategorizationDegraded::Unrecognized)
        );
    }

    #[test]
    fn missing_numbers_get_sentinel() {
        let mut posts = batch(3);
        let assignments =
            decode_assignments(r#"[{"number": 2, "category": "right"}]"#).expect("decode");
        apply_assignments(&mut posts, &assignments);
        let labels: Vec<Category> = posts.iter().map(PostRecord::category_or_default).collect();
        assert_eq!(
            labels,
            vec![Category::NotCategorized, Category::Right, Category::NotCategorized]
        );
        assert!(posts.iter().all(|p| p.category.is_some()));
    }

    #[test]
    fn degrade_all_labels_every_post() {
        let mut posts = batch(4);
        degrade_all(&mut posts);
        assert!(posts.iter().all(|p| p.category == Some(Category::NotCategorized)));
    }
}
