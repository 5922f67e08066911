use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::rule::LintRule;
use crate::model::Vendor;

/// A named, versioned set of lint rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rulepack {
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Empty means every vendor.
    #[serde(default)]
    pub vendor_scope: Vec<Vendor>,
    #[serde(default, alias = "rule")]
    pub rules: Vec<LintRule>,
}

impl Rulepack {
    pub fn applies_to(&self, vendor: Vendor) -> bool {
        self.vendor_scope.is_empty() || self.vendor_scope.contains(&vendor)
    }

    /// Rules of this pack relevant to `vendor`, in pack order.
    pub fn rules_for(&self, vendor: Vendor) -> Vec<LintRule> {
        if !self.applies_to(vendor) {
            return Vec::new();
        }
        self.rules
            .iter()
            .filter(|rule| rule.applies_to(vendor))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum RulepackError {
    #[error("failed to read rulepack {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse rulepack {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("failed to parse rulepack {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("unsupported rulepack format for {path} (expected .toml or .json)")]
    UnsupportedFormat { path: String },
    #[error("rulepack directory {path} holds no .toml or .json packs")]
    EmptyDirectory { path: String },
}

/// Load a rulepack, choosing the format from the file extension.
pub fn load_rulepack(path: &Path) -> Result<Rulepack, RulepackError> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| RulepackError::Io {
        path: display.clone(),
        source,
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_rulepack_toml(&raw, display),
        Some("json") => serde_json::from_str(&raw)
            .map_err(|source| RulepackError::Json { path: display, source }),
        _ => Err(RulepackError::UnsupportedFormat { path: display }),
    }
}

fn parse_rulepack_toml(raw: &str, path: String) -> Result<Rulepack, RulepackError> {
    toml::from_str(raw).map_err(|source| RulepackError::Toml { path, source })
}

/// Built-in baseline rulepack.
pub fn baseline_rulepack() -> Result<Rulepack, RulepackError> {
    let embedded = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/rulepacks/baseline.toml"));
    parse_rulepack_toml(embedded, "embedded baseline".to_string())
}

/// Supplies the active rules for a vendor.
pub trait RulepackSource: Send + Sync {
    fn load_active_rulepack(&self, vendor: Vendor) -> Result<Vec<LintRule>, RulepackError>;
}

impl RulepackSource for Rulepack {
    fn load_active_rulepack(&self, vendor: Vendor) -> Result<Vec<LintRule>, RulepackError> {
        Ok(self.rules_for(vendor))
    }
}

/// Directory of `.toml`/`.json` rulepacks, read in file-name order.
///
/// Loading fails when the directory cannot be read, holds no packs, or any
/// pack in it fails to load.
#[derive(Debug, Clone)]
pub struct RulepackDir {
    root: PathBuf,
}

impl RulepackDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn packs(&self) -> Result<Vec<Rulepack>, RulepackError> {
        let dir = self.root.display().to_string();
        let entries = fs::read_dir(&self.root).map_err(|source| RulepackError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("toml" | "json")
                )
            })
            .collect();
        if paths.is_empty() {
            return Err(RulepackError::EmptyDirectory { path: dir });
        }
        paths.sort();

        paths
            .iter()
            .map(|path| -> Result<Rulepack, RulepackError> {
                let pack = load_rulepack(path)?;
                debug!(pack = %pack.name, rules = pack.rules.len(), "loaded rulepack");
                Ok(pack)
            })
            .collect()
    }
}

impl RulepackSource for RulepackDir {
    fn load_active_rulepack(&self, vendor: Vendor) -> Result<Vec<LintRule>, RulepackError> {
        Ok(self
            .packs()?
            .iter()
            .flat_map(|pack| pack.rules_for(vendor))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn embedded_baseline_parses_and_uses_known_predicates() {
        let pack = baseline_rulepack().expect("embedded baseline should parse");
        assert_eq!(pack.name, "baseline");
        assert!(pack.rules.len() > 3);
        for rule in &pack.rules {
            if let crate::lint::RuleCheck::Custom { custom_predicate } = &rule.check {
                assert!(
                    crate::lint::predicates::lookup(custom_predicate).is_some(),
                    "{custom_predicate} is not registered"
                );
            }
        }
    }

    #[test]
    fn loads_toml_and_json_by_extension() {
        let dir = tempdir().expect("tempdir");
        let toml_path = dir.path().join("a.toml");
        fs::write(
            &toml_path,
            r#"
name = "edge"
version = "1"
vendorScope = ["mikrotik"]

[[rule]]
id = "hostname"
name = "Hostname set"
severity = "low"
type = "match"
path = "$.device.hostname"
condition = { operator = "exists" }
"#,
        )
        .expect("write");
        let json_path = dir.path().join("b.json");
        fs::write(
            &json_path,
            r#"{"name":"core","rules":[{"id":"ntp","name":"NTP","severity":"medium","type":"custom","customPredicate":"multipleNtpServers"}]}"#,
        )
        .expect("write");

        let toml_pack = load_rulepack(&toml_path).expect("toml");
        assert_eq!(toml_pack.rules.len(), 1);
        assert!(toml_pack.rules_for(Vendor::Cisco).is_empty());

        let source = RulepackDir::new(dir.path());
        let ids: Vec<String> = source
            .load_active_rulepack(Vendor::Mikrotik)
            .expect("rules")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["hostname", "ntp"]);
        let cisco: Vec<String> = source
            .load_active_rulepack(Vendor::Cisco)
            .expect("rules")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(cisco, vec!["ntp"]);
    }

    #[test]
    fn rejects_unknown_extension_and_reports_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("rules.yaml");
        fs::write(&path, "name: x").expect("write");
        let err = load_rulepack(&path).expect_err("yaml unsupported");
        assert!(matches!(err, RulepackError::UnsupportedFormat { .. }));

        let missing = load_rulepack(&dir.path().join("absent.toml")).expect_err("missing");
        assert!(missing.to_string().contains("absent.toml"));
    }

    #[test]
    fn empty_or_missing_directory_is_an_error() {
        let dir = tempdir().expect("tempdir");
        assert!(matches!(
            RulepackDir::new(dir.path()).load_active_rulepack(Vendor::Cisco),
            Err(RulepackError::EmptyDirectory { .. })
        ));
        assert!(matches!(
            RulepackDir::new(dir.path().join("absent")).load_active_rulepack(Vendor::Cisco),
            Err(RulepackError::Io { .. })
        ));
    }

    #[test]
    fn unparsable_pack_fails_the_whole_directory() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("org.toml"), "id = 1\n").expect("write");
        let err = RulepackDir::new(dir.path())
            .load_active_rulepack(Vendor::Mikrotik)
            .expect_err("broken pack");
        assert!(matches!(err, RulepackError::Toml { .. }));
        assert!(err.to_string().contains("org.toml"));
    }
}
