//! Declarative configuration lint.
//!
//! Rules are either path matches against the serialized canonical config or
//! named custom predicates registered at compile time. Evaluation is total:
//! a broken rule becomes a failed finding, never an error.

pub mod engine;
pub mod path;
pub mod predicates;
pub mod rule;
pub mod rulepack;

pub use engine::{
    evaluate, evaluate_with_gate, GatePolicy, LintContext, LintFinding, LintRunResult, LintSummary,
    TargetType,
};
pub use path::PathError;
pub use rule::{Condition, LintRule, Operator, RuleCheck, Severity};
pub use rulepack::{baseline_rulepack, load_rulepack, Rulepack, RulepackDir, RulepackError, RulepackSource};
