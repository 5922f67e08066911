use similar::{Algorithm, ChangeTag, TextDiff};

use crate::diff::result::DiffEntry;

/// Configures line diff behavior.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Include [`DiffEntry::Unchanged`] rows.
    pub include_unchanged: bool,
    /// Skip blank lines on both sides before comparing.
    pub ignore_blank_lines: bool,
    /// Lines whose trimmed text starts with any of these prefixes are skipped.
    pub ignore_prefixes: Vec<String>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            include_unchanged: true,
            ignore_blank_lines: false,
            ignore_prefixes: Vec::new(),
        }
    }
}

impl DiffOptions {
    /// Options that drop comment lines for the common network OS comment styles.
    pub fn ignoring_comments() -> Self {
        Self {
            ignore_blank_lines: true,
            ignore_prefixes: vec!["#".to_string(), "!".to_string()],
            ..Self::default()
        }
    }

    fn keeps(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if self.ignore_blank_lines && trimmed.is_empty() {
            return false;
        }
        !self
            .ignore_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && trimmed.starts_with(prefix.as_str()))
    }
}

/// Diff two configuration texts with default options.
pub fn diff(left: &str, right: &str) -> Vec<DiffEntry> {
    diff_with_options(left, right, &DiffOptions::default())
}

/// Diff two configuration texts with custom options.
pub fn diff_with_options(left: &str, right: &str, opts: &DiffOptions) -> Vec<DiffEntry> {
    let (left_numbers, left_lines) = filtered_lines(left, opts);
    let (right_numbers, right_lines) = filtered_lines(right, opts);

    let text_diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(&left_lines, &right_lines);

    let mut out = Vec::new();
    for change in text_diff.iter_all_changes() {
        let text = change.value().to_string();
        match change.tag() {
            ChangeTag::Equal => {
                if !opts.include_unchanged {
                    continue;
                }
                if let (Some(l), Some(r)) = (change.old_index(), change.new_index()) {
                    out.push(DiffEntry::Unchanged {
                        left_line: left_numbers[l],
                        right_line: right_numbers[r],
                        text,
                    });
                }
            }
            ChangeTag::Delete => {
                if let Some(l) = change.old_index() {
                    out.push(DiffEntry::Removed {
                        left_line: left_numbers[l],
                        text,
                    });
                }
            }
            ChangeTag::Insert => {
                if let Some(r) = change.new_index() {
                    out.push(DiffEntry::Added {
                        right_line: right_numbers[r],
                        text,
                    });
                }
            }
        }
    }
    out
}

fn filtered_lines<'a>(text: &'a str, opts: &DiffOptions) -> (Vec<usize>, Vec<&'a str>) {
    text.lines()
        .map(str::trim_end)
        .enumerate()
        .filter(|(_, line)| opts.keeps(line))
        .map(|(idx, line)| (idx + 1, line))
        .unzip()
}
