//! Change requests: intent, planning, per-device rendering, verification,
//! approval and deployment.

pub mod board;
pub mod collab;
pub mod deploy;
pub mod error;
pub mod intent;
pub mod plan;
pub mod render;
pub mod request;
pub mod state;

pub use board::ChangeBoard;
pub use collab::{
    ApplyOutput, CommandTransport, DeviceInventory, DeviceRecord, DryRunTransport, StaticInventory,
    TransportError,
};
pub use deploy::{DeploymentReport, DeviceOutcome};
pub use error::{GateFailure, WorkflowError};
pub use intent::{assess_risk, required_approvals, Intent, RiskTier};
pub use plan::{plan_change, ChangePlan, MissingInfo, PlannedTask, TaskAction, TaskGraph};
pub use render::{generate_change_set, render_change, ChangeSet, CommandStep, RenderedChange};
pub use request::{ChangeEvent, ChangeRequest, DeviceVerification, VerifyReport};
pub use state::{ChangeStatus, Transition};
