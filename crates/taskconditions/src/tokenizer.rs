use once_cell::sync::Lazy;
use regex::Regex;

static DOUBLE_BRACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("static pattern is valid"));

/// One `{{ ... }}` fragment found in a condition string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionFragment {
    /// Byte offset of the opening `{{`
    pub start: usize,
    /// Byte offset just past the closing `}}`
    pub end: usize,
    /// The expression with delimiters and surrounding whitespace removed
    pub expression: String,
}

/// Extract every delimited fragment, in source order.
///
/// Matching is lazy, so `{{ a }} == {{ b }}` yields two fragments and an
/// unmatched inner `{` stays part of its fragment.
pub fn extract_fragments(conditions: &str) -> Vec<ExpressionFragment> {
    DOUBLE_BRACES
        .captures_iter(conditions)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let inner = captures.get(1)?;
            Some(ExpressionFragment {
                start: whole.start(),
                end: whole.end(),
                expression: inner.as_str().trim().to_string(),
            })
        })
        .collect()
}
