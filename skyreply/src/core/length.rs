//! Character budgets for text entering or leaving the pipeline.

/// Hard ceiling for any text sent to `post`/`reply`.
pub const NETWORK_BUDGET: usize = 180;
/// Safety ceiling applied right after drafting.
pub const INTERIM_BUDGET: usize = 200;
/// Marker appended when text is cut.
pub const ELLIPSIS: &str = "...";

/// Truncate `text` to at most `budget` characters.
///
/// Over-budget text keeps its first `budget - 3` characters followed by
/// [`ELLIPSIS`]; text within budget is returned unchanged. Counting is per
/// Unicode scalar value with no word-boundary handling. Budgets too small to
/// hold the ellipsis truncate without it.
pub fn enforce(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let marker_len = ELLIPSIS.chars().count();
    if budget <= marker_len {
        return text.chars().take(budget).collect();
    }
    let mut out: String = text.chars().take(budget - marker_len).collect();
    out.push_str(ELLIPSIS);
    out
}
