//! Dotted/bracket path resolution over the serialized canonical config.
//!
//! Supported syntax: an optional leading `$`, `.key` segments, `[n]` indexes,
//! `[*]` wildcards and a trailing `.length` pseudo-property that applies to
//! arrays and strings. A wildcard collects the remaining resolution of every
//! element into an array.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("unterminated bracket at offset {offset} in `{path}`")]
    UnterminatedBracket { path: String, offset: usize },
    #[error("invalid index `{index}` in `{path}`")]
    InvalidIndex { path: String, index: String },
    #[error("empty segment at offset {offset} in `{path}`")]
    EmptySegment { path: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePath {
    segments: Vec<Segment>,
}

impl ValuePath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim();
        let body = trimmed.strip_prefix('$').unwrap_or(trimmed);
        if body.is_empty() && trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        let bytes = body.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    let start = i + 1;
                    let end = body[start..]
                        .find(['.', '['])
                        .map_or(body.len(), |n| start + n);
                    if end == start {
                        return Err(PathError::EmptySegment {
                            path: path.to_string(),
                            offset: i,
                        });
                    }
                    segments.push(Segment::Key(body[start..end].to_string()));
                    i = end;
                }
                b'[' => {
                    let Some(close) = body[i..].find(']').map(|n| i + n) else {
                        return Err(PathError::UnterminatedBracket {
                            path: path.to_string(),
                            offset: i,
                        });
                    };
                    let inner = body[i + 1..close].trim();
                    let segment = if inner == "*" {
                        Segment::Wildcard
                    } else if let Some(key) = quoted(inner) {
                        Segment::Key(key.to_string())
                    } else {
                        inner
                            .parse::<usize>()
                            .map(Segment::Index)
                            .map_err(|_| PathError::InvalidIndex {
                                path: path.to_string(),
                                index: inner.to_string(),
                            })?
                    };
                    segments.push(segment);
                    i = close + 1;
                }
                _ => {
                    let end = body[i..].find(['.', '[']).map_or(body.len(), |n| i + n);
                    segments.push(Segment::Key(body[i..end].to_string()));
                    i = end;
                }
            }
        }
        Ok(Self { segments })
    }

    /// Resolve against `root`. `None` means undefined; JSON `null` is
    /// reported as undefined too.
    pub fn resolve(&self, root: &Value) -> Option<Value> {
        resolve_from(root, &self.segments).filter(|v| !v.is_null())
    }
}

fn quoted(inner: &str) -> Option<&str> {
    inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

fn resolve_from(value: &Value, segments: &[Segment]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match head {
        Segment::Key(key) if key == "length" && rest.is_empty() => match value {
            Value::Array(items) => Some(Value::from(items.len())),
            Value::String(s) => Some(Value::from(s.chars().count())),
            _ => value.get(key.as_str()).cloned(),
        },
        Segment::Key(key) => value.get(key.as_str()).and_then(|v| resolve_from(v, rest)),
        Segment::Index(index) => value.get(*index).and_then(|v| resolve_from(v, rest)),
        Segment::Wildcard => {
            let items = value.as_array()?;
            Some(Value::Array(
                items
                    .iter()
                    .filter_map(|item| resolve_from(item, rest))
                    .collect(),
            ))
        }
    }
}

/// Parse and resolve in one step.
pub fn resolve(path: &str, root: &Value) -> Result<Option<Value>, PathError> {
    Ok(ValuePath::parse(path)?.resolve(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "mgmt": { "ssh": { "version": 2 }, "snmp": { "version": null } },
            "interfaces": [
                { "name": "ether1", "ips": [{ "address": "10.0.0.1" }] },
                { "name": "ether2", "ips": [] }
            ],
            "device": { "hostname": "edge" }
        })
    }

    #[test]
    fn resolves_keys_and_indexes() {
        let root = doc();
        assert_eq!(resolve("$.mgmt.ssh.version", &root).expect("path"), Some(json!(2)));
        assert_eq!(
            resolve("interfaces[1].name", &root).expect("path"),
            Some(json!("ether2"))
        );
        assert_eq!(
            resolve("$['device'].hostname", &root).expect("path"),
            Some(json!("edge"))
        );
    }

    #[test]
    fn length_applies_to_arrays_and_strings() {
        let root = doc();
        assert_eq!(resolve("$.interfaces.length", &root).expect("path"), Some(json!(2)));
        assert_eq!(
            resolve("$.device.hostname.length", &root).expect("path"),
            Some(json!(4))
        );
        assert_eq!(
            resolve("$.interfaces[1].ips.length", &root).expect("path"),
            Some(json!(0))
        );
    }

    #[test]
    fn wildcard_collects_elements() {
        let root = doc();
        assert_eq!(
            resolve("$.interfaces[*].name", &root).expect("path"),
            Some(json!(["ether1", "ether2"]))
        );
    }

    #[test]
    fn null_and_missing_are_undefined() {
        let root = doc();
        assert_eq!(resolve("$.mgmt.snmp.version", &root).expect("path"), None);
        assert_eq!(resolve("$.routing.bgp", &root).expect("path"), None);
        assert_eq!(resolve("$.interfaces[9]", &root).expect("path"), None);
    }

    #[test]
    fn malformed_paths_are_errors() {
        assert_eq!(ValuePath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            ValuePath::parse("$.interfaces[0"),
            Err(PathError::UnterminatedBracket { .. })
        ));
        assert!(matches!(
            ValuePath::parse("$.interfaces[x]"),
            Err(PathError::InvalidIndex { .. })
        ));
        assert!(matches!(
            ValuePath::parse("$.mgmt..ssh"),
            Err(PathError::EmptySegment { .. })
        ));
    }
}
