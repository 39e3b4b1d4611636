//! Rich-text (HTML) payloads from the remote recognizer, flattened to one
//! plain line.

use std::sync::LazyLock;

use regex::Regex;

use super::remote::RemoteError;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
});

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|tr|h[1-6])\s*>").expect("valid regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("valid regex"));

/// Plain text of `markup` on a single line: block breaks become newlines,
/// tags are removed, entities decoded, then every newline is replaced by a
/// space and the result trimmed.
///
/// A `<` that never closes is reported as [`RemoteError::MalformedMarkup`].
/// Plain text without any tags passes through unchanged apart from the
/// newline and trim handling.
pub fn rich_text_to_line(markup: &str) -> Result<String, RemoteError> {
    let text = SCRIPT_OR_STYLE.replace_all(markup, "");
    let text = COMMENT.replace_all(&text, "");
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");

    if let Some(pos) = find_unterminated_tag(&text) {
        return Err(RemoteError::MalformedMarkup(format!(
            "unterminated tag at byte {pos}"
        )));
    }

    let decoded = html_escape::decode_html_entities(&text);
    let line = decoded.replace("\r\n", " ").replace(['\n', '\r'], " ");
    Ok(line.trim().to_string())
}

/// A leftover `<` followed by a tag-name character is an opening tag that
/// never closed. Bare `<` in text (`a < b`) is allowed.
fn find_unterminated_tag(text: &str) -> Option<usize> {
    text.match_indices('<').find_map(|(i, _)| {
        let next = text[i + 1..].chars().next()?;
        (next.is_ascii_alphabetic() || next == '/' || next == '!').then_some(i)
    })
}
