//! The change request aggregate.
//!
//! A [`ChangeRequest`] is only ever mutated through its transition methods.
//! Each transition bumps `version` and appends a [`ChangeEvent`] to
//! `history`. A failed one returns a [`WorkflowError`] and leaves the request
//! as it was; a partial deployment is the exception and records its report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::collab::{CommandTransport, DeviceInventory, RulepackSource};
use super::deploy::{self, DeploymentReport};
use super::error::{GateFailure, WorkflowError};
use super::intent::{assess_risk, required_approvals, Intent, RiskTier};
use super::plan::{plan_change, ChangePlan};
use super::render::{generate_change_set, ChangeSet};
use super::state::{ChangeStatus, Transition};
use crate::lint::{evaluate_with_gate, LintContext, LintRunResult, RulepackError, TargetType};
use crate::settings::WorkflowSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Approval {
    pub actor: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub actor: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// One entry of the append-only transition log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub version: u64,
    pub actor: String,
    pub at: DateTime<Utc>,
    pub transition: Transition,
    pub from: ChangeStatus,
    pub to: ChangeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceVerification {
    pub device_id: String,
    pub lint_run_id: String,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub per_device: Vec<DeviceVerification>,
    /// Some run failed the gate. Only reachable in an `Ok` when the request
    /// is not lint-blocking.
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub id: String,
    pub title: String,
    pub requested_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    pub intent: Intent,
    pub device_scope: Vec<String>,
    pub risk_tier: RiskTier,
    pub required_approvals: u32,
    pub lint_blocking: bool,
    pub status: ChangeStatus,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ChangePlan>,
    pub change_sets: Vec<ChangeSet>,
    /// Lint runs keyed by lint run id.
    pub lint_runs: BTreeMap<String, LintRunResult>,
    pub approvals: Vec<Approval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<ChangeEvent>,
}

impl ChangeRequest {
    pub fn new(
        title: impl Into<String>,
        requested_by: impl Into<String>,
        intent: Intent,
        device_scope: Vec<String>,
        lint_blocking: bool,
        settings: &WorkflowSettings,
    ) -> Self {
        let risk_tier = assess_risk(&intent, device_scope.len(), settings);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            requested_by: requested_by.into(),
            submitted_by: None,
            intent,
            device_scope,
            risk_tier,
            required_approvals: required_approvals(risk_tier, settings),
            lint_blocking,
            status: ChangeStatus::Draft,
            version: 0,
            plan: None,
            change_sets: Vec::new(),
            lint_runs: BTreeMap::new(),
            approvals: Vec::new(),
            rejection: None,
            deployment: None,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    /// Tag stamped on objects this request creates on devices.
    pub fn tag(&self) -> String {
        format!("netops-{}", self.id.chars().take(8).collect::<String>())
    }

    fn record(&mut self, actor: &str, transition: Transition, to: ChangeStatus, detail: Option<String>) {
        let from = self.status;
        let at = Utc::now();
        self.status = to;
        self.version += 1;
        self.updated_at = at;
        info!(
            change_id = %self.id,
            transition = %transition,
            from = %from,
            to = %to,
            actor,
            version = self.version,
            "change request transition"
        );
        self.history.push(ChangeEvent {
            version: self.version,
            actor: actor.to_string(),
            at,
            transition,
            from,
            to,
            detail,
        });
    }

    pub fn plan(&mut self, actor: &str, inventory: &dyn DeviceInventory) -> Result<&ChangePlan, WorkflowError> {
        Transition::Plan.check(self.status)?;
        let plan = plan_change(&self.intent, &self.device_scope, inventory)?;
        let detail = (!plan.missing_info.is_empty()).then(|| format!("{} missing fact(s)", plan.missing_info.len()));
        self.record(actor, Transition::Plan, ChangeStatus::Planned, detail);
        Ok(self.plan.insert(plan))
    }

    /// Render a change set per device against fresh inventory data.
    ///
    /// Planning is rerun first; any fact still missing fails the transition.
    pub fn generate(
        &mut self,
        actor: &str,
        inventory: &dyn DeviceInventory,
    ) -> Result<&[ChangeSet], WorkflowError> {
        Transition::Generate.check(self.status)?;
        let plan = plan_change(&self.intent, &self.device_scope, inventory)?;
        if let Some(missing) = plan.missing_info.first() {
            return Err(WorkflowError::Generation {
                device_id: missing.device_id.clone(),
                reason: format!("{}: {}", missing.field, missing.detail),
            });
        }

        let mut devices = Vec::with_capacity(self.device_scope.len());
        for device_id in &self.device_scope {
            let device = inventory
                .resolve_device(device_id)
                .ok_or_else(|| WorkflowError::UnknownDevice(device_id.clone()))?;
            devices.push(device);
        }
        let tag = self.tag();
        let intent = &self.intent;
        let change_sets = devices
            .par_iter()
            .map(|device| {
                generate_change_set(intent, device, &tag).map_err(|reason| WorkflowError::Generation {
                    device_id: device.id.clone(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let detail = format!("{} change set(s)", change_sets.len());
        self.plan = Some(plan);
        self.change_sets = change_sets;
        self.lint_runs.clear();
        self.record(actor, Transition::Generate, ChangeStatus::Generated, Some(detail));
        Ok(&self.change_sets)
    }

    /// Lint every candidate against the active rulepack for its vendor.
    pub fn verify(
        &mut self,
        actor: &str,
        rulepacks: &dyn RulepackSource,
        settings: &WorkflowSettings,
    ) -> Result<VerifyReport, WorkflowError> {
        Transition::Verify.check(self.status)?;
        let gate = &settings.gate;
        let request_id = &self.id;
        let runs: Vec<(String, LintRunResult)> = self
            .change_sets
            .par_iter()
            .map(|set| -> Result<(String, LintRunResult), RulepackError> {
                let rules = rulepacks.load_active_rulepack(set.vendor)?;
                let ctx = LintContext::new(
                    &set.candidate,
                    format!("{request_id}:{}", set.device_id),
                    TargetType::ChangeSet,
                );
                Ok((Uuid::new_v4().to_string(), evaluate_with_gate(&rules, &ctx, gate)))
            })
            .collect::<Result<_, _>>()?;

        let failures: Vec<GateFailure> = self
            .change_sets
            .iter()
            .zip(&runs)
            .filter(|(_, (_, run))| !run.passed())
            .map(|(set, (_, run))| GateFailure {
                device_id: set.device_id.clone(),
                findings: run.blocking_findings(gate).into_iter().cloned().collect(),
            })
            .collect();
        if self.lint_blocking && !failures.is_empty() {
            warn!(change_id = %self.id, devices = failures.len(), "lint gate failed");
            return Err(WorkflowError::LintGateFailed { failures });
        }

        let mut per_device = Vec::with_capacity(runs.len());
        for (set, (run_id, run)) in self.change_sets.iter_mut().zip(runs) {
            set.lint_run_id = Some(run_id.clone());
            per_device.push(DeviceVerification {
                device_id: set.device_id.clone(),
                lint_run_id: run_id.clone(),
                passed: run.passed(),
            });
            self.lint_runs.insert(run_id, run);
        }
        let blocked = !failures.is_empty();
        let detail = blocked.then(|| format!("{} advisory gate failure(s)", failures.len()));
        self.record(actor, Transition::Verify, ChangeStatus::Verified, detail);
        Ok(VerifyReport { per_device, blocked })
    }

    /// The submitting actor becomes the requester who may not approve.
    pub fn submit_approval(&mut self, actor: &str) -> Result<(), WorkflowError> {
        Transition::SubmitApproval.check(self.status)?;
        self.submitted_by = Some(actor.to_string());
        let detail = format!("{} risk, {} approval(s) required", self.risk_tier, self.required_approvals);
        self.record(actor, Transition::SubmitApproval, ChangeStatus::PendingApproval, Some(detail));
        Ok(())
    }

    /// Record an approval; the request becomes `approved` once enough
    /// distinct approvers have signed.
    pub fn approve(&mut self, actor: &str) -> Result<ChangeStatus, WorkflowError> {
        Transition::Approve.check(self.status)?;
        if self.submitted_by.as_deref() == Some(actor) {
            return Err(WorkflowError::ApprovalConflict(format!(
                "{actor} submitted this change and cannot approve it"
            )));
        }
        if self.approvals.iter().any(|a| a.actor == actor) {
            return Err(WorkflowError::ApprovalConflict(format!("{actor} has already approved")));
        }
        self.approvals.push(Approval {
            actor: actor.to_string(),
            at: Utc::now(),
        });
        let count = self.approvals.len();
        let to = if count >= self.required_approvals as usize {
            ChangeStatus::Approved
        } else {
            ChangeStatus::PendingApproval
        };
        let detail = format!("approval {count} of {}", self.required_approvals);
        self.record(actor, Transition::Approve, to, Some(detail));
        Ok(self.status)
    }

    pub fn reject(&mut self, actor: &str, reason: &str) -> Result<(), WorkflowError> {
        Transition::Reject.check(self.status)?;
        self.rejection = Some(Rejection {
            actor: actor.to_string(),
            reason: reason.to_string(),
            at: Utc::now(),
        });
        self.record(actor, Transition::Reject, ChangeStatus::Rejected, Some(reason.to_string()));
        Ok(())
    }

    /// Apply every change set through `transport`.
    ///
    /// Only full success reaches `deployed`. On partial failure the report is
    /// attached, an event is logged and the request stays `approved`.
    pub fn deploy(
        &mut self,
        actor: &str,
        transport: &dyn CommandTransport,
        settings: &WorkflowSettings,
    ) -> Result<&DeploymentReport, WorkflowError> {
        Transition::Deploy.check(self.status)?;
        let report = deploy::execute(&self.change_sets, transport, settings.deploy.rollback_on_failure);
        if report.all_succeeded() {
            self.record(actor, Transition::Deploy, ChangeStatus::Deployed, None);
            return Ok(self.deployment.insert(report));
        }

        let failed = report.failed_devices().join(", ");
        let detail = format!(
            "failed on {failed}; {} rollback(s) triggered",
            report.rollbacks_triggered.len()
        );
        warn!(change_id = %self.id, failed = %failed, "partial deployment failure");
        self.deployment = Some(report.clone());
        self.record(actor, Transition::Deploy, ChangeStatus::Approved, Some(detail));
        Err(WorkflowError::PartialDeploymentFailure { report })
    }

    pub fn close(&mut self, actor: &str) -> Result<(), WorkflowError> {
        Transition::Close.check(self.status)?;
        self.record(actor, Transition::Close, ChangeStatus::Closed, None);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::change::collab::{DeviceRecord, DryRunTransport, StaticInventory};
    use crate::lint::{baseline_rulepack, Rulepack};
    use crate::model::{PolicyAction, Vendor};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    pub(crate) const EDGE: &str = "/system identity\nset name=edge\n/interface bridge\nadd name=bridge1\n\
                                   /interface vlan\nadd interface=bridge1 name=vlan10 vlan-id=10\n\
                                   /ip address\nadd address=10.0.10.1/24 interface=vlan10\n";

    pub(crate) fn inventory() -> StaticInventory {
        StaticInventory::new([
            DeviceRecord::from_text("edge-1", Vendor::Mikrotik, EDGE),
            DeviceRecord::from_text("edge-2", Vendor::Mikrotik, EDGE),
        ])
    }

    pub(crate) fn add_vlan() -> Intent {
        Intent::AddVlan {
            id: 40,
            name: Some("guests".to_string()),
            gateway: Some("10.0.40.1/24".to_string()),
            parent_interface: Some("bridge1".to_string()),
        }
    }

    pub(crate) fn firewall_rule() -> Intent {
        Intent::AddFirewallRule {
            action: PolicyAction::Drop,
            source: Some("10.0.40.0/24".to_string()),
            destination: None,
            protocol: Some("tcp".to_string()),
            port: Some(22),
            comment: None,
        }
    }

    /// A pack with a single critical rule no generated candidate satisfies.
    pub(crate) fn strict_pack() -> Rulepack {
        serde_json::from_value(json!({
            "name": "strict",
            "version": "1",
            "rules": [{
                "id": "hostname-prod",
                "name": "hostname-prod",
                "severity": "critical",
                "type": "match",
                "path": "$.device.hostname",
                "condition": { "operator": "equals", "value": "prod-edge" }
            }]
        }))
        .expect("rulepack")
    }

    fn scope() -> Vec<String> {
        vec!["edge-1".to_string(), "edge-2".to_string()]
    }

    fn verified(intent: Intent, settings: &WorkflowSettings) -> ChangeRequest {
        let inventory = inventory();
        let mut request = ChangeRequest::new("guest vlan", "alice", intent, scope(), true, settings);
        request.plan("alice", &inventory).expect("plan");
        request.generate("alice", &inventory).expect("generate");
        let pack = Rulepack {
            rules: Vec::new(),
            ..strict_pack()
        };
        request.verify("alice", &pack, settings).expect("verify");
        request
    }

    #[test]
    fn full_lifecycle_reaches_closed() {
        let settings = WorkflowSettings::default();
        let mut request = verified(add_vlan(), &settings);
        assert_eq!(request.risk_tier, RiskTier::Low);
        assert_eq!(request.change_sets.len(), 2);
        assert!(request.change_sets.iter().all(|s| s.lint_run_id.is_some()));

        request.submit_approval("alice").expect("submit");
        assert_eq!(request.approve("bob").expect("approve"), ChangeStatus::Approved);
        request
            .deploy("ops", &DryRunTransport::new(), &settings)
            .expect("deploy");
        request.close("ops").expect("close");

        assert_eq!(request.status, ChangeStatus::Closed);
        assert_eq!(request.version, 7);
        let path: Vec<ChangeStatus> = request.history.iter().map(|e| e.to).collect();
        assert_eq!(
            path,
            vec![
                ChangeStatus::Planned,
                ChangeStatus::Generated,
                ChangeStatus::Verified,
                ChangeStatus::PendingApproval,
                ChangeStatus::Approved,
                ChangeStatus::Deployed,
                ChangeStatus::Closed,
            ]
        );
    }

    #[test]
    fn transitions_from_wrong_state_leave_request_untouched() {
        let settings = WorkflowSettings::default();
        let mut request = ChangeRequest::new("t", "alice", add_vlan(), scope(), true, &settings);
        let err = request.approve("bob").expect_err("draft cannot be approved");
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition {
                from: ChangeStatus::Draft,
                transition: Transition::Approve
            }
        ));
        assert!(request.deploy("ops", &DryRunTransport::new(), &settings).is_err());
        assert!(request.close("ops").is_err());
        assert_eq!(request.status, ChangeStatus::Draft);
        assert_eq!(request.version, 0);
        assert!(request.history.is_empty());
    }

    #[test]
    fn medium_risk_needs_two_distinct_approvers() {
        let settings = WorkflowSettings::default();
        let mut request = verified(firewall_rule(), &settings);
        assert_eq!(request.risk_tier, RiskTier::Medium);
        assert_eq!(request.required_approvals, 2);
        request.submit_approval("alice").expect("submit");

        assert!(matches!(request.approve("alice"), Err(WorkflowError::ApprovalConflict(_))));
        assert_eq!(request.approve("bob").expect("first"), ChangeStatus::PendingApproval);
        assert!(matches!(request.approve("bob"), Err(WorkflowError::ApprovalConflict(_))));
        assert_eq!(request.approve("carol").expect("second"), ChangeStatus::Approved);
    }

    #[test]
    fn reject_wins_over_prior_approvals() {
        let settings = WorkflowSettings::default();
        let mut request = verified(firewall_rule(), &settings);
        request.submit_approval("alice").expect("submit");
        request.approve("bob").expect("approve");
        request.reject("carol", "maintenance freeze").expect("reject");
        assert_eq!(request.status, ChangeStatus::Rejected);
        assert!(request.approve("dave").is_err());
        assert_eq!(request.rejection.as_ref().map(|r| r.reason.as_str()), Some("maintenance freeze"));
    }

    #[test]
    fn lint_gate_blocks_without_mutation() {
        let settings = WorkflowSettings::default();
        let inventory = inventory();
        let mut request = ChangeRequest::new("t", "alice", add_vlan(), scope(), true, &settings);
        request.plan("alice", &inventory).expect("plan");
        request.generate("alice", &inventory).expect("generate");
        let version = request.version;

        let err = request
            .verify("alice", &strict_pack(), &settings)
            .expect_err("gate must block");
        let failures = match err {
            WorkflowError::LintGateFailed { failures } => failures,
            other => panic!("unexpected error {other}"),
        };
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].findings[0].rule_id, "hostname-prod");
        assert_eq!(request.status, ChangeStatus::Generated);
        assert_eq!(request.version, version);
        assert!(request.lint_runs.is_empty());
        assert!(request.change_sets.iter().all(|s| s.lint_run_id.is_none()));
    }

    #[test]
    fn broken_rulepack_directory_fails_verification_closed() {
        let settings = WorkflowSettings::default();
        let inventory = inventory();
        let mut request = ChangeRequest::new("t", "alice", add_vlan(), scope(), false, &settings);
        request.plan("alice", &inventory).expect("plan");
        request.generate("alice", &inventory).expect("generate");
        let version = request.version;

        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("org.toml"), "id = 1\n").expect("write");
        let err = request
            .verify("alice", &crate::lint::RulepackDir::new(dir.path()), &settings)
            .expect_err("unparsable pack");
        assert!(matches!(err, WorkflowError::Rulepack(_)));
        assert_eq!(request.status, ChangeStatus::Generated);
        assert_eq!(request.version, version);
        assert!(request.lint_runs.is_empty());
    }

    #[test]
    fn advisory_gate_failure_still_verifies() {
        let settings = WorkflowSettings::default();
        let inventory = inventory();
        let mut request = ChangeRequest::new("t", "alice", add_vlan(), scope(), false, &settings);
        request.plan("alice", &inventory).expect("plan");
        request.generate("alice", &inventory).expect("generate");
        let report = request.verify("alice", &strict_pack(), &settings).expect("verify");
        assert!(report.blocked);
        assert_eq!(request.status, ChangeStatus::Verified);
        assert_eq!(request.lint_runs.len(), 2);
    }

    #[test]
    fn baseline_pack_runs_against_candidates() {
        let settings = WorkflowSettings::default();
        let inventory = inventory();
        let mut request = ChangeRequest::new("t", "alice", add_vlan(), scope(), false, &settings);
        request.plan("alice", &inventory).expect("plan");
        request.generate("alice", &inventory).expect("generate");
        let report = request
            .verify("alice", &baseline_rulepack().expect("baseline"), &settings)
            .expect("verify");
        assert_eq!(report.per_device.len(), 2);
        let run = &request.lint_runs[&report.per_device[0].lint_run_id];
        assert_eq!(run.target_type, TargetType::ChangeSet);
        assert!(run.target_id.ends_with(":edge-1"));
    }

    #[test]
    fn partial_deployment_stays_approved_with_report() {
        let settings = WorkflowSettings::default();
        let mut request = verified(add_vlan(), &settings);
        request.submit_approval("alice").expect("submit");
        request.approve("bob").expect("approve");

        let transport = DryRunTransport::failing_on(["edge-2"]);
        let err = request
            .deploy("ops", &transport, &settings)
            .expect_err("edge-2 fails");
        let report = match err {
            WorkflowError::PartialDeploymentFailure { report } => report,
            other => panic!("unexpected error {other}"),
        };
        assert_eq!(report.failed_devices(), vec!["edge-2"]);
        assert_eq!(report.rollbacks_triggered.len(), 2);
        assert_eq!(request.status, ChangeStatus::Approved);
        assert_eq!(request.deployment.as_ref(), Some(&report));
        let last = request.history.last().expect("event");
        assert_eq!(last.transition, Transition::Deploy);
        assert!(last.detail.as_deref().is_some_and(|d| d.contains("edge-2")));
    }

    #[test]
    fn missing_facts_block_generation() {
        let settings = WorkflowSettings::default();
        let inventory = inventory();
        let intent = Intent::RemoveVlan { id: 99 };
        let mut request = ChangeRequest::new("t", "alice", intent, scope(), true, &settings);
        let plan = request.plan("alice", &inventory).expect("plan");
        assert_eq!(plan.missing_info.len(), 2);
        let err = request.generate("alice", &inventory).expect_err("vlan 99 absent");
        assert!(matches!(err, WorkflowError::Generation { .. }));
        assert_eq!(request.status, ChangeStatus::Planned);
    }

    #[test]
    fn bulk_scope_escalates_risk() {
        let settings = WorkflowSettings {
            bulk_device_threshold: 1,
            ..WorkflowSettings::default()
        };
        let request = ChangeRequest::new("t", "alice", add_vlan(), scope(), true, &settings);
        assert_eq!(request.risk_tier, RiskTier::High);
        assert_eq!(request.required_approvals, 2);
        assert_eq!(request.tag().len(), "netops-".len() + 8);
    }
}
