//! Parsing of human answers at decision points.

/// Answer to "select a post".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Post(u32),
    Skip,
}

/// Parse the first whitespace-separated token (`"2"`, `"2 message"`, `"skip"`).
pub fn parse_selection(input: &str) -> Option<Selection> {
    let token = input.split_whitespace().next()?;
    if token.eq_ignore_ascii_case("skip") {
        return Some(Selection::Skip);
    }
    token.parse().ok().map(Selection::Post)
}

/// Answer at the approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Approve,
    Reject,
    Alternative,
}

impl GateDecision {
    /// Anything that is not an explicit approval or alternative request rejects.
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => GateDecision::Approve,
            "alt" | "alternative" | "another" => GateDecision::Alternative,
            _ => GateDecision::Reject,
        }
    }
}

pub fn is_yes(input: &str) -> bool {
    GateDecision::parse(input) == GateDecision::Approve
}

/// Explicit refusal to continue (`skip`/`no`).
pub fn is_decline(input: &str) -> bool {
    matches!(
        input.trim().to_ascii_lowercase().as_str(),
        "skip" | "no" | "n"
    )
}
