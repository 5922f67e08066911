//! Line-oriented reading and diffing primitives for device configuration text.

pub mod diff;
pub mod format;
pub mod reader;

pub use diff::{diff, diff_with_options, DiffEntry, DiffOptions, DiffStats};
pub use format::{format_json, format_summary, format_text, format_unified};
pub use reader::{read, read_file, ConfigText, ReadError};
