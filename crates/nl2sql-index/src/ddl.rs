//! Splitting a schema dump into per-table chunks.

use std::sync::OnceLock;

use nl2sql_core::TableChunk;
use regex::Regex;
use tracing::{debug, warn};

const SPLIT_PATTERN: &str = r"(?i)\bCREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?";
const NAME_PATTERN: &str = r#"^\s*["`\[]?([A-Za-z_][\w$]*)["`\]]?\s*\("#;

fn split_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SPLIT_PATTERN).ok()).as_ref()
}

fn name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).ok()).as_ref()
}

/// Table name at the start of a fragment following `CREATE TABLE`.
///
/// Returns the uppercase identifier, or `None` if the fragment does not
/// start with `name (`.
#[must_use]
pub fn table_name(fragment: &str) -> Option<String> {
    name_regex()?
        .captures(fragment)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// Split a schema dump into one chunk per `CREATE TABLE` statement.
///
/// Each chunk runs until the next `CREATE TABLE` and keeps any trailing
/// comments (such as sample rows). Fragments without a recognizable table
/// name are logged and skipped. Later duplicates of a name replace earlier
/// ones.
#[must_use]
pub fn split_ddl(raw: &str) -> Vec<TableChunk> {
    let Some(split) = split_regex() else {
        return Vec::new();
    };

    let starts: Vec<(usize, usize)> = split.find_iter(raw).map(|m| (m.start(), m.end())).collect();
    let mut chunks: Vec<TableChunk> = Vec::with_capacity(starts.len());

    for (i, &(_, body_start)) in starts.iter().enumerate() {
        let body_end = starts.get(i + 1).map_or(raw.len(), |&(next, _)| next);
        let fragment = &raw[body_start..body_end];
        if fragment.trim().is_empty() {
            continue;
        }

        let Some(name) = table_name(fragment) else {
            warn!("Table name not found in fragment: {:.60}", fragment.trim());
            continue;
        };
        debug!(table = %name, "Found table");

        let ddl = format!("CREATE TABLE {}", fragment.trim());
        let chunk = TableChunk::new(&name, ddl);
        if let Some(existing) = chunks.iter_mut().find(|c| c.table == chunk.table) {
            *existing = chunk;
        } else {
            chunks.push(chunk);
        }
    }
    chunks
}
