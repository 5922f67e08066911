use std::fs;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur while loading configuration text.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Failed to read input file.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration text split into lines with line endings normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigText {
    pub lines: Vec<String>,
}

impl ConfigText {
    /// Number of lines held.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Re-join lines with `\n`, ending with a trailing newline when non-empty.
    pub fn to_text(&self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Split text into lines. CRLF endings and trailing whitespace are dropped so
/// exports captured over different transports compare equal.
pub fn read(text: &str) -> ConfigText {
    ConfigText {
        lines: text.lines().map(|l| l.trim_end().to_string()).collect(),
    }
}

/// Read a file from disk. Invalid UTF-8 sequences are replaced rather than rejected.
pub fn read_file(path: &Path) -> Result<ConfigText, ReadError> {
    let bytes = fs::read(path).map_err(|source| ReadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(read(&String::from_utf8_lossy(&bytes)))
}
