use super::types::Update;

/// Longest payload prefix that may end up in a log line.
pub const SNIPPET_CHARS: usize = 512;

/// Decode a webhook body into an [`Update`].
///
/// Untrusted input never escapes as an error: malformed JSON and fields of
/// the wrong type both come back as `None`, with a bounded snippet of the
/// payload logged at debug level.
pub fn parse_update(raw: &str) -> Option<Update> {
    match serde_json::from_str::<Update>(raw) {
        Ok(update) => Some(update),
        Err(e) => {
            let what = if e.is_syntax() || e.is_eof() {
                "malformed JSON"
            } else {
                "unexpected update shape"
            };
            tracing::debug!(
                error = %e,
                snippet = %snippet(raw),
                "dropping webhook payload: {what}"
            );
            None
        }
    }
}

/// First [`SNIPPET_CHARS`] characters of `raw`, never splitting a code point.
pub fn snippet(raw: &str) -> &str {
    match raw.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
