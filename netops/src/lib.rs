//! Parse, lint and change-manage MikroTik RouterOS, Cisco IOS and FortiGate
//! configurations.
//!
//! # Architecture
//!
//! - [`parser`] turns raw vendor text into the vendor-neutral
//!   [`model::CanonicalConfig`]; [`detect`] sniffs which dialect a text is.
//! - [`lint`] evaluates declarative rulepacks against a canonical config.
//! - [`change`] carries a change request from intent through planning,
//!   per-device rendering, lint verification, approval and deployment.
//! - [`settings`] holds approval and gate policy; [`report`] renders results
//!   for the terminal.
//!
//! Parsing and linting are total: problems come back inside their results.
//! Change request transitions fail closed with a typed
//! [`change::WorkflowError`].
//!
//! # Examples
//!
//! ```ignore
//! use netops::lint::{baseline_rulepack, evaluate, LintContext, TargetType};
//! use netops::model::Vendor;
//! use netops::parser::parse_config;
//!
//! let parsed = parse_config(Vendor::Mikrotik, "/system identity\nset name=edge\n")?;
//! let rules = baseline_rulepack()?.rules_for(Vendor::Mikrotik);
//! let ctx = LintContext::new(&parsed.normalized, "edge", TargetType::Device);
//! let run = evaluate(&rules, &ctx);
//! println!("passed={}", run.passed());
//! ```

pub mod change;
pub mod detect;
pub mod lint;
pub mod model;
pub mod parser;
pub mod report;
pub mod settings;
