//! Parsing of reranking model output.
//!
//! The model is asked for a fenced JSON array of table names, but replies
//! drift: bare lists, quoted names, prose, or "Document N" references to
//! the numbered candidates. The parser accepts all of these and leaves it
//! to the caller to resolve picks against the candidates it actually sent.

use std::sync::OnceLock;

use nl2sql_core::normalize_table_id;
use nl2sql_core::text::{fenced_block, json_payload, strip_language_tag};
use regex::Regex;
use serde_json::Value;

const TOKEN_PATTERN: &str = r"(?i)\bdocument\s*#?\s*(\d+)\b|([A-Za-z_][A-Za-z0-9_$]*)";

fn token_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TOKEN_PATTERN).ok()).as_ref()
}

/// One table chosen by the reranker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    /// A table identifier, normalized to uppercase
    Table(String),
    /// A 1-based position in the candidate list
    Document(usize),
}

/// Extract the reranker's picks, in the order given.
///
/// A JSON array wins, then the body of a fenced block. In unfenced prose
/// only `Document N` references count when there are any, since the
/// surrounding words may name tables the model rejected. Bare words are
/// the last resort.
#[must_use]
pub fn parse_rerank_output(text: &str) -> Vec<Pick> {
    if let Some(picks) = parse_json_array(text) {
        return picks;
    }

    if let Some(block) = fenced_block(text) {
        return tokens(strip_language_tag(block, "json").trim());
    }

    let picks = tokens(text.trim());
    if picks.iter().any(|p| matches!(p, Pick::Document(_))) {
        return picks
            .into_iter()
            .filter(|p| matches!(p, Pick::Document(_)))
            .collect();
    }
    picks
}

fn tokens(body: &str) -> Vec<Pick> {
    let Some(re) = token_regex() else {
        return Vec::new();
    };
    re.captures_iter(body)
        .filter_map(|c| {
            if let Some(n) = c.get(1) {
                n.as_str().parse().ok().map(Pick::Document)
            } else {
                c.get(2).map(|m| Pick::Table(normalize_table_id(m.as_str())))
            }
        })
        .collect()
}

fn parse_json_array(text: &str) -> Option<Vec<Pick>> {
    let payload = json_payload(text)?;
    let values: Vec<Value> = serde_json::from_str(payload).ok()?;
    let picks = values
        .iter()
        .flat_map(|v| match v {
            Value::String(s) => parse_rerank_output(s),
            Value::Number(n) => n
                .as_u64()
                .map(|n| vec![Pick::Document(n as usize)])
                .unwrap_or_default(),
            Value::Object(map) => map
                .get("table")
                .or_else(|| map.get("table_name"))
                .and_then(Value::as_str)
                .map(|s| vec![Pick::Table(normalize_table_id(s))])
                .unwrap_or_default(),
            _ => Vec::new(),
        })
        .collect();
    Some(picks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(names: &[&str]) -> Vec<Pick> {
        names.iter().map(|n| Pick::Table((*n).to_string())).collect()
    }

    #[test]
    fn test_fenced_json_array() {
        let out = "```\n[\"sales\", \"times\"]\n```";
        assert_eq!(parse_rerank_output(out), tables(&["SALES", "TIMES"]));
    }

    #[test]
    fn test_fenced_json_with_tag_and_whitespace() {
        let out = "  Here they are:\n```json\n [ \"CUSTOMERS\" ]\n```  \n";
        assert_eq!(parse_rerank_output(out), tables(&["CUSTOMERS"]));
    }

    #[test]
    fn test_bare_list_without_json() {
        let out = "```\nSALES, TIMES\n```";
        assert_eq!(parse_rerank_output(out), tables(&["SALES", "TIMES"]));
    }

    #[test]
    fn test_single_quoted_list() {
        let out = "['sales', 'channels']";
        assert_eq!(parse_rerank_output(out), tables(&["SALES", "CHANNELS"]));
    }

    #[test]
    fn test_document_references() {
        let out = "The best are Document 2 and document 1.";
        assert_eq!(
            parse_rerank_output(out),
            vec![Pick::Document(2), Pick::Document(1)]
        );
    }

    #[test]
    fn test_prose_names_rejected_tables() {
        let out = "Document 3 answers it. SALES is not needed.";
        assert_eq!(parse_rerank_output(out), vec![Pick::Document(3)]);
    }

    #[test]
    fn test_fenced_block_preferred_over_prose() {
        let out = "SALES is not needed; use:\n```\nTIMES\n```";
        assert_eq!(parse_rerank_output(out), tables(&["TIMES"]));
    }

    #[test]
    fn test_bare_words_last_resort() {
        let picks = parse_rerank_output("use TIMES");
        assert!(picks.contains(&Pick::Table("TIMES".to_string())));
    }

    #[test]
    fn test_non_ascii_output() {
        assert!(parse_rerank_output("```éé\n```").is_empty());
        assert_eq!(
            parse_rerank_output("Tabelle più utili: Document 1"),
            vec![Pick::Document(1)]
        );
    }

    #[test]
    fn test_json_numbers_and_objects() {
        let out = r#"[2, {"table": "sales"}]"#;
        assert_eq!(
            parse_rerank_output(out),
            vec![Pick::Document(2), Pick::Table("SALES".to_string())]
        );
    }

    #[test]
    fn test_empty_output() {
        assert!(parse_rerank_output("").is_empty());
        assert!(parse_rerank_output("```\n[]\n```").is_empty());
    }
}
