use serde::Serialize;

/// A single diff outcome for one line. Line numbers are 1-based and refer to
/// the original (unfiltered) input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiffEntry {
    /// Line present on both sides.
    Unchanged {
        left_line: usize,
        right_line: usize,
        text: String,
    },
    /// Line only in the left input.
    Removed { left_line: usize, text: String },
    /// Line only in the right input.
    Added { right_line: usize, text: String },
}

impl DiffEntry {
    pub fn text(&self) -> &str {
        match self {
            DiffEntry::Unchanged { text, .. }
            | DiffEntry::Removed { text, .. }
            | DiffEntry::Added { text, .. } => text,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, DiffEntry::Unchanged { .. })
    }
}

/// Counts per entry kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub unchanged: usize,
    pub added: usize,
    pub removed: usize,
}

impl DiffStats {
    pub fn from_entries(entries: &[DiffEntry]) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            match entry {
                DiffEntry::Unchanged { .. } => stats.unchanged += 1,
                DiffEntry::Added { .. } => stats.added += 1,
                DiffEntry::Removed { .. } => stats.removed += 1,
            }
        }
        stats
    }

    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}
