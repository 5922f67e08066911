use crate::diff::result::{DiffEntry, DiffStats};

/// Format diff entries as plain text, one line per entry.
pub fn format_text(entries: &[DiffEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            DiffEntry::Unchanged { text, .. } => lines.push(format!("  {text}")),
            DiffEntry::Removed { text, .. } => lines.push(format!("- {text}")),
            DiffEntry::Added { text, .. } => lines.push(format!("+ {text}")),
        }
    }
    lines.join("\n")
}

/// Format entries as a unified diff with `context` unchanged lines around each hunk.
pub fn format_unified(entries: &[DiffEntry], left_label: &str, right_label: &str, context: usize) -> String {
    let changed: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_change())
        .map(|(idx, _)| idx)
        .collect();
    if changed.is_empty() {
        return String::new();
    }

    let mut hunks: Vec<(usize, usize)> = Vec::new();
    for idx in changed {
        let start = idx.saturating_sub(context);
        let end = (idx + context + 1).min(entries.len());
        match hunks.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => hunks.push((start, end)),
        }
    }

    let mut out = vec![format!("--- {left_label}"), format!("+++ {right_label}")];
    for (start, end) in hunks {
        let slice = &entries[start..end];
        let (left_start, left_count) = side_range(entries, start, slice, Side::Left);
        let (right_start, right_count) = side_range(entries, start, slice, Side::Right);
        out.push(format!(
            "@@ -{left_start},{left_count} +{right_start},{right_count} @@"
        ));
        for entry in slice {
            match entry {
                DiffEntry::Unchanged { text, .. } => out.push(format!(" {text}")),
                DiffEntry::Removed { text, .. } => out.push(format!("-{text}")),
                DiffEntry::Added { text, .. } => out.push(format!("+{text}")),
            }
        }
    }
    out.join("\n")
}

/// Format a simple summary of diff counts.
pub fn format_summary(entries: &[DiffEntry]) -> String {
    let stats = DiffStats::from_entries(entries);
    format!(
        "unchanged={} added={} removed={}",
        stats.unchanged, stats.added, stats.removed
    )
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

fn line_on(entry: &DiffEntry, side: Side) -> Option<usize> {
    match (entry, side) {
        (DiffEntry::Unchanged { left_line, .. }, Side::Left)
        | (DiffEntry::Removed { left_line, .. }, Side::Left) => Some(*left_line),
        (DiffEntry::Unchanged { right_line, .. }, Side::Right)
        | (DiffEntry::Added { right_line, .. }, Side::Right) => Some(*right_line),
        _ => None,
    }
}

fn side_range(entries: &[DiffEntry], start: usize, slice: &[DiffEntry], side: Side) -> (usize, usize) {
    let count = slice.iter().filter(|e| line_on(e, side).is_some()).count();
    if let Some(first) = slice.iter().find_map(|e| line_on(e, side)) {
        return (first, count);
    }
    // Hunk has no lines on this side: anchor after the preceding line.
    let before = entries[..start]
        .iter()
        .rev()
        .find_map(|e| line_on(e, side))
        .unwrap_or(0);
    (before, 0)
}
