//! Cleanup and structured decode of raw generator output.

use serde_json::{Map, Value};

/// Fence markers stripped before decoding. Order matters: the language-tagged
/// fence must go before the bare one.
const FENCE_MARKERS: [&str; 2] = ["```json", "```"];

/// Outcome of a structured decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Cleaned text decoded to a JSON object.
    Mapping(Map<String, Value>),
    /// Not a JSON object; carries the cleaned text.
    Malformed(String),
}

/// Generator output after fence stripping and decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub cleaned: String,
    pub decoded: Decoded,
}

impl Normalized {
    pub fn is_structured(&self) -> bool {
        matches!(self.decoded, Decoded::Mapping(_))
    }
}

/// Strip fence markers and surrounding whitespace.
pub fn strip_fences(raw: &str) -> String {
    let mut cleaned = raw.to_string();
    for marker in FENCE_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }
    cleaned.trim().to_string()
}

/// Decode cleaned text as a field mapping.
///
/// Tries the whole text first, then the span between the first `{` and the
/// last `}` to tolerate prose around the object.
pub fn decode(cleaned: &str) -> Decoded {
    if let Some(map) = decode_object(cleaned) {
        return Decoded::Mapping(map);
    }
    if let Some(span) = object_span(cleaned)
        && let Some(map) = decode_object(span)
    {
        return Decoded::Mapping(map);
    }
    Decoded::Malformed(cleaned.to_string())
}

/// Strip fences, then decode.
pub fn normalize(raw: &str) -> Normalized {
    let cleaned = strip_fences(raw);
    let decoded = decode(&cleaned);
    Normalized { cleaned, decoded }
}

fn decode_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn object_span(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| &text[open..=close])
}
