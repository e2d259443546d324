//! Helpers for pulling structured payloads out of model-authored text.
//!
//! Models honor output formats inconsistently, so these helpers look for a
//! triple-backtick block first and fall back to bracket scanning.

/// Inner text of the first triple-backtick block.
///
/// An unterminated fence yields everything after the opening backticks.
/// Returns `None` when the text contains no fence at all.
#[must_use]
pub fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let end = rest.find("```").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Strip a leading language tag such as `sql` or `json` from a block body.
///
/// The tag only counts when it is a bare word followed by whitespace, so a
/// statement like `sqlite_master` is left alone.
#[must_use]
pub fn strip_language_tag<'a>(body: &'a str, tag: &str) -> &'a str {
    let trimmed = body.trim_start();
    let tagged = trimmed
        .get(..tag.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(tag));
    if tagged {
        let after = &trimmed[tag.len()..];
        if after.is_empty() || after.starts_with(char::is_whitespace) {
            return after.trim_start();
        }
    }
    trimmed
}

/// Locate a JSON object or array in model output.
#[must_use]
pub fn json_payload(text: &str) -> Option<&str> {
    let candidate = match fenced_block(text) {
        Some(block) => strip_language_tag(block, "json"),
        None => text.trim(),
    };

    let open = candidate.find(|c| c == '{' || c == '[')?;
    let close_char = if candidate[open..].starts_with('{') {
        '}'
    } else {
        ']'
    };
    let close = candidate.rfind(close_char)?;
    if close < open {
        return None;
    }
    Some(&candidate[open..=close])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block() {
        assert_eq!(fenced_block("pre ```sql\nSELECT 1\n``` post"), Some("sql\nSELECT 1\n"));
        assert_eq!(fenced_block("```SELECT 2"), Some("SELECT 2"));
        assert_eq!(fenced_block("no fence"), None);
    }

    #[test]
    fn test_strip_language_tag() {
        assert_eq!(strip_language_tag("sql\nSELECT 1", "sql"), "SELECT 1");
        assert_eq!(strip_language_tag("  SQL SELECT 1", "sql"), "SELECT 1");
        assert_eq!(
            strip_language_tag("sqlite_master", "sql"),
            "sqlite_master"
        );
        assert_eq!(strip_language_tag("SELECT 1", "sql"), "SELECT 1");
    }

    #[test]
    fn test_strip_language_tag_multibyte() {
        assert_eq!(strip_language_tag("éé niente", "sql"), "éé niente");
        assert_eq!(strip_language_tag("jsé{}", "json"), "jsé{}");
        assert_eq!(strip_language_tag("é", "sql"), "é");
    }

    #[test]
    fn test_json_payload_non_ascii_fence() {
        assert_eq!(json_payload("```ñoño
```"), None);
        assert_eq!(
            json_payload(r#"```jsön
{"a": "ü"}
```"#),
            Some(r#"{"a": "ü"}"#)
        );
    }

    #[test]
    fn test_json_payload_fenced() {
        let text = "Here you go:\n```json\n{\"classification\": \"generate_sql\"}\n```";
        assert_eq!(json_payload(text), Some("{\"classification\": \"generate_sql\"}"));
    }

    #[test]
    fn test_json_payload_bare() {
        assert_eq!(json_payload("  [\"SALES\", \"TIMES\"] "), Some("[\"SALES\", \"TIMES\"]"));
        assert_eq!(json_payload("answer: {\"a\": 1} done"), Some("{\"a\": 1}"));
        assert_eq!(json_payload("nothing here"), None);
    }
}
