//! Concurrent store of change requests.
//!
//! Each request sits behind its own mutex so transitions on one request are
//! linearized while different requests proceed independently. Every call
//! may carry the version the caller last saw; a stale version is refused
//! with [`WorkflowError::VersionConflict`].

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::debug;

use super::collab::{CommandTransport, DeviceInventory, RulepackSource};
use super::error::WorkflowError;
use super::intent::Intent;
use super::plan::ChangePlan;
use super::render::ChangeSet;
use super::request::{ChangeRequest, VerifyReport};
use crate::settings::WorkflowSettings;

pub struct ChangeBoard {
    requests: DashMap<String, Arc<Mutex<ChangeRequest>>>,
    inventory: Arc<dyn DeviceInventory>,
    rulepacks: Arc<dyn RulepackSource>,
    settings: WorkflowSettings,
}

impl ChangeBoard {
    pub fn new(
        inventory: Arc<dyn DeviceInventory>,
        rulepacks: Arc<dyn RulepackSource>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            requests: DashMap::new(),
            inventory,
            rulepacks,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Open a draft request and return a snapshot of it.
    pub fn create(
        &self,
        title: &str,
        requested_by: &str,
        intent: Intent,
        device_scope: Vec<String>,
        lint_blocking: bool,
    ) -> ChangeRequest {
        let request = ChangeRequest::new(title, requested_by, intent, device_scope, lint_blocking, &self.settings);
        debug!(change_id = %request.id, risk = %request.risk_tier, "change request created");
        self.requests
            .insert(request.id.clone(), Arc::new(Mutex::new(request.clone())));
        request
    }

    pub fn get(&self, id: &str) -> Option<ChangeRequest> {
        let entry = self.requests.get(id).map(|e| Arc::clone(e.value()))?;
        let request = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Some(request.clone())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Run `f` with exclusive access to one request.
    fn with_request<T>(
        &self,
        id: &str,
        expected_version: Option<u64>,
        f: impl FnOnce(&mut ChangeRequest) -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        // Clone the Arc so the map shard is not held while the transition runs.
        let entry = self
            .requests
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
        let mut request = entry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(expected) = expected_version {
            if request.version != expected {
                return Err(WorkflowError::VersionConflict {
                    expected,
                    actual: request.version,
                });
            }
        }
        f(&mut request)
    }

    pub fn plan(&self, id: &str, actor: &str, expected_version: Option<u64>) -> Result<ChangePlan, WorkflowError> {
        self.with_request(id, expected_version, |r| {
            r.plan(actor, self.inventory.as_ref()).cloned()
        })
    }

    pub fn generate(
        &self,
        id: &str,
        actor: &str,
        expected_version: Option<u64>,
    ) -> Result<Vec<ChangeSet>, WorkflowError> {
        self.with_request(id, expected_version, |r| {
            r.generate(actor, self.inventory.as_ref()).map(<[ChangeSet]>::to_vec)
        })
    }

    pub fn verify(&self, id: &str, actor: &str, expected_version: Option<u64>) -> Result<VerifyReport, WorkflowError> {
        self.with_request(id, expected_version, |r| {
            r.verify(actor, self.rulepacks.as_ref(), &self.settings)
        })
    }

    pub fn submit_approval(
        &self,
        id: &str,
        actor: &str,
        expected_version: Option<u64>,
    ) -> Result<ChangeRequest, WorkflowError> {
        self.with_request(id, expected_version, |r| {
            r.submit_approval(actor)?;
            Ok(r.clone())
        })
    }

    pub fn approve(&self, id: &str, actor: &str, expected_version: Option<u64>) -> Result<ChangeRequest, WorkflowError> {
        self.with_request(id, expected_version, |r| {
            r.approve(actor)?;
            Ok(r.clone())
        })
    }

    pub fn reject(
        &self,
        id: &str,
        actor: &str,
        reason: &str,
        expected_version: Option<u64>,
    ) -> Result<ChangeRequest, WorkflowError> {
        self.with_request(id, expected_version, |r| {
            r.reject(actor, reason)?;
            Ok(r.clone())
        })
    }

    pub fn deploy(
        &self,
        id: &str,
        actor: &str,
        transport: &dyn CommandTransport,
        expected_version: Option<u64>,
    ) -> Result<ChangeRequest, WorkflowError> {
        self.with_request(id, expected_version, |r| {
            r.deploy(actor, transport, &self.settings)?;
            Ok(r.clone())
        })
    }

    pub fn close(&self, id: &str, actor: &str, expected_version: Option<u64>) -> Result<ChangeRequest, WorkflowError> {
        self.with_request(id, expected_version, |r| {
            r.close(actor)?;
            Ok(r.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::request::tests::{firewall_rule, inventory};
    use crate::change::state::ChangeStatus;
    use crate::lint::baseline_rulepack;
    use pretty_assertions::assert_eq;

    fn board() -> ChangeBoard {
        ChangeBoard::new(
            Arc::new(inventory()),
            Arc::new(baseline_rulepack().expect("baseline")),
            WorkflowSettings::default(),
        )
    }

    fn pending(board: &ChangeBoard) -> String {
        let request = board.create(
            "block ssh from guests",
            "alice",
            firewall_rule(),
            vec!["edge-1".to_string()],
            false,
        );
        board.plan(&request.id, "alice", Some(0)).expect("plan");
        board.generate(&request.id, "alice", Some(1)).expect("generate");
        board.verify(&request.id, "alice", Some(2)).expect("verify");
        board.submit_approval(&request.id, "alice", Some(3)).expect("submit");
        request.id
    }

    #[test]
    fn stale_version_is_refused() {
        let board = board();
        let request = board.create("t", "alice", firewall_rule(), vec!["edge-1".to_string()], false);
        board.plan(&request.id, "alice", Some(0)).expect("plan");
        let err = board
            .generate(&request.id, "alice", Some(0))
            .expect_err("version moved on");
        assert!(matches!(err, WorkflowError::VersionConflict { expected: 0, actual: 1 }));
        assert_eq!(board.get(&request.id).map(|r| r.status), Some(ChangeStatus::Planned));
    }

    #[test]
    fn unknown_request_is_not_found() {
        let board = board();
        assert!(matches!(
            board.close("nope", "ops", None),
            Err(WorkflowError::NotFound(_))
        ));
        assert!(board.is_empty());
    }

    #[test]
    fn concurrent_distinct_approvals_are_linearized() {
        let board = board();
        let id = pending(&board);
        std::thread::scope(|s| {
            for actor in ["bob", "carol"] {
                let board = &board;
                let id = &id;
                s.spawn(move || board.approve(id, actor, None).expect("approve"));
            }
        });
        let request = board.get(&id).expect("request");
        assert_eq!(request.status, ChangeStatus::Approved);
        assert_eq!(request.approvals.len(), 2);
        assert_eq!(request.version, 6);
    }

    #[test]
    fn concurrent_duplicate_approver_counts_once() {
        let board = board();
        let id = pending(&board);
        let results: Vec<Result<ChangeRequest, WorkflowError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| board.approve(&id, "bob", None)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread"))
                .collect()
        });
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, WorkflowError::ApprovalConflict(_))));
        let request = board.get(&id).expect("request");
        assert_eq!(request.status, ChangeStatus::PendingApproval);
        assert_eq!(request.approvals.len(), 1);
    }
}
