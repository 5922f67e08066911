use serde::Serialize;

use crate::diff::result::{DiffEntry, DiffStats};

#[derive(Serialize)]
struct JsonDiff<'a> {
    stats: DiffStats,
    entries: Vec<&'a DiffEntry>,
}

/// Format changed entries plus counts as pretty JSON.
pub fn format_json(entries: &[DiffEntry]) -> String {
    let doc = JsonDiff {
        stats: DiffStats::from_entries(entries),
        entries: entries.iter().filter(|e| e.is_change()).collect(),
    };
    serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
}
