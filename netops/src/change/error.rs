use thiserror::Error;

use super::deploy::DeploymentReport;
use super::state::{ChangeStatus, Transition};
use crate::lint::{LintFinding, RulepackError};

/// One change set that failed the lint gate, with its blocking findings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateFailure {
    pub device_id: String,
    pub findings: Vec<LintFinding>,
}

/// Typed failures of change request transitions. Apart from a partial
/// deployment, whose report is attached, a failed transition leaves the
/// request unmodified.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("cannot {transition} a change request in state {from}")]
    InvalidTransition {
        from: ChangeStatus,
        transition: Transition,
    },
    #[error("approval conflict: {0}")]
    ApprovalConflict(String),
    #[error("lint gate failed for {} device(s)", failures.len())]
    LintGateFailed { failures: Vec<GateFailure> },
    #[error(
        "deployment failed on {} of {} device(s)",
        report.failed_devices().len(),
        report.devices.len()
    )]
    PartialDeploymentFailure { report: DeploymentReport },
    #[error("device scope is empty")]
    EmptyScope,
    #[error("unknown device '{0}'")]
    UnknownDevice(String),
    #[error("invalid intent: {0}")]
    InvalidIntent(String),
    #[error("cannot generate change set for {device_id}: {reason}")]
    Generation { device_id: String, reason: String },
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },
    #[error("cannot load the active rulepack: {0}")]
    Rulepack(#[from] RulepackError),
    #[error("change request '{0}' not found")]
    NotFound(String),
}
