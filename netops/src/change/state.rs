use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Draft,
    Planned,
    Generated,
    Verified,
    PendingApproval,
    Approved,
    Rejected,
    Deployed,
    Closed,
}

impl ChangeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeStatus::Draft => "draft",
            ChangeStatus::Planned => "planned",
            ChangeStatus::Generated => "generated",
            ChangeStatus::Verified => "verified",
            ChangeStatus::PendingApproval => "pending_approval",
            ChangeStatus::Approved => "approved",
            ChangeStatus::Rejected => "rejected",
            ChangeStatus::Deployed => "deployed",
            ChangeStatus::Closed => "closed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ChangeStatus::Closed | ChangeStatus::Rejected)
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Plan,
    Generate,
    Verify,
    SubmitApproval,
    Approve,
    Reject,
    Deploy,
    Close,
}

impl Transition {
    pub const ALL: [Transition; 8] = [
        Transition::Plan,
        Transition::Generate,
        Transition::Verify,
        Transition::SubmitApproval,
        Transition::Approve,
        Transition::Reject,
        Transition::Deploy,
        Transition::Close,
    ];

    /// States this transition may be attempted from. `generate` may rerun
    /// after a failed gate; `approve` records approvals until the threshold.
    pub fn allowed_from(self) -> &'static [ChangeStatus] {
        match self {
            Transition::Plan => &[ChangeStatus::Draft],
            Transition::Generate => &[ChangeStatus::Planned, ChangeStatus::Generated],
            Transition::Verify => &[ChangeStatus::Generated],
            Transition::SubmitApproval => &[ChangeStatus::Verified],
            Transition::Approve | Transition::Reject => &[ChangeStatus::PendingApproval],
            Transition::Deploy => &[ChangeStatus::Approved],
            Transition::Close => &[ChangeStatus::Deployed],
        }
    }

    /// State reached on success. `approve` only reaches it once enough
    /// distinct approvers have signed.
    pub fn target(self) -> ChangeStatus {
        match self {
            Transition::Plan => ChangeStatus::Planned,
            Transition::Generate => ChangeStatus::Generated,
            Transition::Verify => ChangeStatus::Verified,
            Transition::SubmitApproval => ChangeStatus::PendingApproval,
            Transition::Approve => ChangeStatus::Approved,
            Transition::Reject => ChangeStatus::Rejected,
            Transition::Deploy => ChangeStatus::Deployed,
            Transition::Close => ChangeStatus::Closed,
        }
    }

    pub fn check(self, from: ChangeStatus) -> Result<(), WorkflowError> {
        if self.allowed_from().contains(&from) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                from,
                transition: self,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Plan => "plan",
            Transition::Generate => "generate",
            Transition::Verify => "verify",
            Transition::SubmitApproval => "submit for approval",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Deploy => "deploy",
            Transition::Close => "close",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_allow_nothing() {
        for transition in Transition::ALL {
            assert!(transition.check(ChangeStatus::Closed).is_err());
            assert!(transition.check(ChangeStatus::Rejected).is_err());
        }
    }

    #[test]
    fn approve_on_draft_is_invalid() {
        let err = Transition::Approve
            .check(ChangeStatus::Draft)
            .expect_err("draft cannot be approved");
        assert_eq!(err.to_string(), "cannot approve a change request in state draft");
    }
}
