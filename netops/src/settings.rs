use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lint::GatePolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    pub rollback_on_failure: bool,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            rollback_on_failure: true,
        }
    }
}

/// Approval, gate and deployment policy for change requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub medium_risk_approvals: u32,
    pub high_risk_approvals: u32,
    /// Scopes larger than this are high risk regardless of intent.
    pub bulk_device_threshold: usize,
    pub gate: GatePolicy,
    pub deploy: DeploySettings,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            medium_risk_approvals: 2,
            high_risk_approvals: 2,
            bulk_device_threshold: 10,
            gate: GatePolicy::default(),
            deploy: DeploySettings::default(),
        }
    }
}

impl WorkflowSettings {
    fn normalized(mut self) -> Self {
        self.medium_risk_approvals = self.medium_risk_approvals.max(2);
        self.high_risk_approvals = self.high_risk_approvals.max(2);
        self
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Load settings from `path`, or the embedded defaults when no path is given.
/// Returns the settings and where they came from (`embedded` or `file:<path>`).
pub fn load_settings(path: Option<&Path>) -> Result<(WorkflowSettings, String), SettingsError> {
    let Some(path) = path else {
        return Ok((embedded_settings(), "embedded".to_string()));
    };
    let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let settings = parse_settings(&raw, path.display().to_string())?;
    Ok((settings, format!("file:{}", path.display())))
}

pub fn embedded_settings() -> WorkflowSettings {
    let embedded = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/settings/default.toml"));
    parse_settings(embedded, "embedded settings".to_string()).unwrap_or_default()
}

fn parse_settings(raw: &str, path: String) -> Result<WorkflowSettings, SettingsError> {
    toml::from_str::<WorkflowSettings>(raw)
        .map(WorkflowSettings::normalized)
        .map_err(|source| SettingsError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn embedded_defaults_match_code_defaults() {
        let (settings, source) = load_settings(None).expect("settings");
        assert_eq!(source, "embedded");
        assert_eq!(settings, WorkflowSettings::default());
    }

    #[test]
    fn file_overrides_and_clamps_high_risk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("policy.toml");
        fs::write(&path, "high_risk_approvals = 1\n[gate]\nescalate_medium = true\n").expect("write");
        let (settings, source) = load_settings(Some(&path)).expect("settings");
        assert!(source.starts_with("file:"));
        assert_eq!(settings.high_risk_approvals, 2);
        assert_eq!(settings.medium_risk_approvals, 2);
        assert!(settings.gate.escalate_medium);
        assert!(settings.deploy.rollback_on_failure);
    }

    #[test]
    fn medium_risk_never_drops_below_two_approvals() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("policy.toml");
        fs::write(&path, "medium_risk_approvals = 1\n").expect("write");
        let (settings, _) = load_settings(Some(&path)).expect("settings");
        assert_eq!(settings.medium_risk_approvals, 2);

        fs::write(&path, "medium_risk_approvals = 3\n").expect("write");
        let (settings, _) = load_settings(Some(&path)).expect("settings");
        assert_eq!(settings.medium_risk_approvals, 3);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "medium_risk_approvals = \"two\"").expect("write");
        assert!(matches!(
            load_settings(Some(&path)),
            Err(SettingsError::Parse { .. })
        ));
    }
}
