//! Per-device deployment of generated change sets.
//!
//! Devices are applied concurrently. Once every apply has finished, a single
//! failure rolls back every device that was touched, using the rollback list
//! computed at generation time. Nothing in flight is cancelled.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::collab::CommandTransport;
use super::render::ChangeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceOutcome {
    pub device_id: String,
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rolled_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_output: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentReport {
    pub devices: Vec<DeviceOutcome>,
    /// Devices whose rollback sequence was executed.
    pub rollbacks_triggered: Vec<String>,
}

impl DeploymentReport {
    pub fn failed_devices(&self) -> Vec<&str> {
        self.devices
            .iter()
            .filter(|d| !d.success)
            .map(|d| d.device_id.as_str())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.devices.is_empty() && self.devices.iter().all(|d| d.success)
    }
}

fn apply_one(set: &ChangeSet, transport: &dyn CommandTransport) -> DeviceOutcome {
    match transport.apply_commands(&set.device_id, &set.apply) {
        Ok(result) => DeviceOutcome {
            device_id: set.device_id.clone(),
            success: result.success,
            error: (!result.success).then(|| "device rejected the apply sequence".to_string()),
            output: result.output,
            rolled_back: false,
            rollback_output: None,
        },
        Err(err) => DeviceOutcome {
            device_id: set.device_id.clone(),
            success: false,
            output: String::new(),
            error: Some(err.to_string()),
            rolled_back: false,
            rollback_output: None,
        },
    }
}

fn roll_back(set: &ChangeSet, outcome: &mut DeviceOutcome, transport: &dyn CommandTransport) {
    let output = match transport.apply_commands(&set.device_id, &set.rollback) {
        Ok(result) if result.success => {
            outcome.rolled_back = true;
            result.output
        }
        Ok(result) => {
            warn!(device_id = %set.device_id, "rollback reported failure");
            format!("rollback failed: {}", result.output)
        }
        Err(err) => {
            warn!(device_id = %set.device_id, error = %err, "rollback could not be delivered");
            format!("rollback failed: {err}")
        }
    };
    outcome.rollback_output = Some(output);
}

/// Apply every change set and collect a per-device outcome.
///
/// When any device fails and `rollback_on_failure` is set, every device
/// (failed ones included, their apply may have been partial) is rolled back.
pub fn execute(
    change_sets: &[ChangeSet],
    transport: &dyn CommandTransport,
    rollback_on_failure: bool,
) -> DeploymentReport {
    let mut devices: Vec<DeviceOutcome> = change_sets
        .par_iter()
        .map(|set| apply_one(set, transport))
        .collect();

    let failed = devices.iter().filter(|d| !d.success).count();
    let mut rollbacks_triggered = Vec::new();
    if failed > 0 && rollback_on_failure {
        devices
            .par_iter_mut()
            .zip(change_sets.par_iter())
            .for_each(|(outcome, set)| roll_back(set, outcome, transport));
        rollbacks_triggered = devices.iter().map(|d| d.device_id.clone()).collect();
    }

    info!(
        devices = devices.len(),
        failed,
        rollbacks = rollbacks_triggered.len(),
        "deployment finished"
    );
    DeploymentReport {
        devices,
        rollbacks_triggered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::collab::DryRunTransport;
    use crate::model::Vendor;
    use config_diff_core::DiffStats;
    use pretty_assertions::assert_eq;

    fn change_set(device_id: &str) -> ChangeSet {
        ChangeSet {
            device_id: device_id.to_string(),
            vendor: Vendor::Mikrotik,
            candidate_text: String::new(),
            candidate: crate::parser::parser_for(Vendor::Mikrotik).parse("").normalized,
            diff: String::new(),
            diff_stats: DiffStats::default(),
            precheck: Vec::new(),
            apply: vec![format!("/ip route add dst-address=10.9.0.0/16 gateway=10.0.0.2 comment={device_id}")],
            postcheck: Vec::new(),
            rollback: vec![format!("/ip route remove [find comment={device_id}]")],
            lint_run_id: None,
        }
    }

    #[test]
    fn all_devices_succeed_without_rollback() {
        let transport = DryRunTransport::new();
        let report = execute(&[change_set("r1"), change_set("r2")], &transport, true);
        assert!(report.all_succeeded());
        assert!(report.rollbacks_triggered.is_empty());
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn one_failure_rolls_back_every_device() {
        let transport = DryRunTransport::failing_on(["r2"]);
        let sets = [change_set("r1"), change_set("r2"), change_set("r3")];
        let report = execute(&sets, &transport, true);
        assert_eq!(report.failed_devices(), vec!["r2"]);
        assert_eq!(report.rollbacks_triggered, vec!["r1", "r2", "r3"]);
        assert!(report.devices.iter().all(|d| d.rolled_back));

        let sent = transport.sent();
        let r1: Vec<&Vec<String>> = sent.iter().filter(|(id, _)| id == "r1").map(|(_, c)| c).collect();
        assert_eq!(r1.len(), 2);
        assert_eq!(r1[1], &sets[0].rollback);
    }

    #[test]
    fn rollback_can_be_disabled() {
        let transport = DryRunTransport::failing_on(["r1"]);
        let report = execute(&[change_set("r1"), change_set("r2")], &transport, false);
        assert_eq!(report.failed_devices(), vec!["r1"]);
        assert!(report.rollbacks_triggered.is_empty());
        assert!(!report.all_succeeded());
    }
}
