use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::path::ValuePath;
use super::predicates;
use super::rule::{Condition, LintRule, Operator, RuleCheck, Severity};
use crate::model::CanonicalConfig;

/// What a lint run was evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Device,
    ConfigVersion,
    ChangeSet,
}

pub struct LintContext<'a> {
    pub config: &'a CanonicalConfig,
    pub target_id: String,
    pub target_type: TargetType,
}

impl<'a> LintContext<'a> {
    pub fn new(config: &'a CanonicalConfig, target_id: impl Into<String>, target_type: TargetType) -> Self {
        Self {
            config,
            target_id: target_id.into(),
            target_type,
        }
    }
}

/// Which failed severities block. Critical and high always do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePolicy {
    pub escalate_medium: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintFinding {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintSummary {
    /// Rules evaluated.
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub passed: bool,
}

impl LintSummary {
    fn from_findings(findings: &[LintFinding], total: usize, gate: &GatePolicy) -> Self {
        let mut summary = Self {
            total,
            ..Self::default()
        };
        for finding in findings {
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary.passed = summary.passes(gate);
        summary
    }

    /// The single blocking decision used by reports and the change gate.
    pub fn passes(&self, gate: &GatePolicy) -> bool {
        self.critical == 0 && self.high == 0 && !(gate.escalate_medium && self.medium > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintRunResult {
    pub target_id: String,
    pub target_type: TargetType,
    pub rules_evaluated: usize,
    pub rules_passed: usize,
    pub rules_failed: usize,
    pub rules_skipped: usize,
    pub summary: LintSummary,
    pub findings: Vec<LintFinding>,
    pub duration_ms: u64,
}

impl LintRunResult {
    pub fn passed(&self) -> bool {
        self.summary.passed
    }

    /// Findings that block under the gate used for this run.
    pub fn blocking_findings(&self, gate: &GatePolicy) -> Vec<&LintFinding> {
        self.findings
            .iter()
            .filter(|f| match f.severity {
                Severity::Critical | Severity::High => true,
                Severity::Medium => gate.escalate_medium,
                Severity::Low => false,
            })
            .collect()
    }
}

struct Outcome {
    passed: bool,
    detail: String,
    path: Option<String>,
    value: Option<Value>,
}

impl Outcome {
    fn pass() -> Self {
        Self {
            passed: true,
            detail: String::new(),
            path: None,
            value: None,
        }
    }

    fn config_error(detail: String) -> Self {
        Self {
            passed: false,
            detail,
            path: None,
            value: None,
        }
    }
}

/// Evaluate `rules` in order using the default gate.
pub fn evaluate(rules: &[LintRule], ctx: &LintContext<'_>) -> LintRunResult {
    evaluate_with_gate(rules, ctx, &GatePolicy::default())
}

pub fn evaluate_with_gate(rules: &[LintRule], ctx: &LintContext<'_>, gate: &GatePolicy) -> LintRunResult {
    let started = Instant::now();
    let vendor = ctx.config.device.vendor;
    let document = serde_json::to_value(ctx.config).unwrap_or(Value::Null);

    let mut evaluated = 0;
    let mut skipped = 0;
    let mut findings = Vec::new();
    for rule in rules {
        if !rule.enabled || !rule.applies_to(vendor) {
            skipped += 1;
            continue;
        }
        evaluated += 1;
        let outcome = match &rule.check {
            RuleCheck::Match { path, condition } => evaluate_match(rule, path, condition, &document),
            RuleCheck::Custom { custom_predicate } => evaluate_custom(rule, custom_predicate, ctx.config),
        };
        if outcome.passed {
            continue;
        }
        findings.push(LintFinding {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            severity: rule.severity,
            message: format!("{}: {}", rule.name, outcome.detail),
            path: outcome.path,
            value: outcome.value,
            remediation: rule.remediation.clone(),
        });
    }

    let summary = LintSummary::from_findings(&findings, evaluated, gate);
    debug!(
        target_id = %ctx.target_id,
        evaluated,
        failed = findings.len(),
        skipped,
        passed = summary.passed,
        "lint run complete"
    );
    LintRunResult {
        target_id: ctx.target_id.clone(),
        target_type: ctx.target_type,
        rules_evaluated: evaluated,
        rules_passed: evaluated - findings.len(),
        rules_failed: findings.len(),
        rules_skipped: skipped,
        summary,
        findings,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

fn evaluate_custom(rule: &LintRule, name: &str, config: &CanonicalConfig) -> Outcome {
    let Some(predicate) = predicates::lookup(name) else {
        warn!(rule_id = %rule.id, predicate = name, "unknown custom predicate");
        return Outcome::config_error(format!("unknown custom predicate '{name}'"));
    };
    let result = (predicate.check)(config);
    if result.passed {
        return Outcome::pass();
    }
    Outcome {
        passed: false,
        detail: result
            .message
            .unwrap_or_else(|| predicate.description.to_string()),
        path: result.path,
        value: result.value,
    }
}

fn evaluate_match(rule: &LintRule, path: &str, condition: &Condition, document: &Value) -> Outcome {
    let compiled = match ValuePath::parse(path) {
        Ok(compiled) => compiled,
        Err(err) => {
            warn!(rule_id = %rule.id, error = %err, "invalid rule path");
            return Outcome::config_error(format!("invalid path: {err}"));
        }
    };
    let actual = compiled.resolve(document);
    let expected = condition.value.as_ref();

    let passed = match condition.operator {
        Operator::Exists => actual.is_some(),
        Operator::NotExists => actual.is_none(),
        Operator::NotEmpty => actual.as_ref().is_some_and(not_empty),
        Operator::Equals => same_option(actual.as_ref(), expected),
        Operator::NotEquals => actual.is_none() || !same_option(actual.as_ref(), expected),
        Operator::GreaterThan => match (actual.as_ref().and_then(Value::as_f64), expected.and_then(Value::as_f64)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        Operator::Contains => contains(actual.as_ref(), expected),
        Operator::NotContains => !contains(actual.as_ref(), expected),
        Operator::Matches => {
            let Some(pattern) = expected.and_then(Value::as_str) else {
                return Outcome::config_error("matches requires a string pattern".to_string());
            };
            match Regex::new(pattern) {
                Ok(re) => actual.as_ref().and_then(Value::as_str).is_some_and(|s| re.is_match(s)),
                Err(err) => {
                    warn!(rule_id = %rule.id, error = %err, "invalid rule pattern");
                    return Outcome::config_error(format!("invalid pattern: {err}"));
                }
            }
        }
    };
    if passed {
        return Outcome::pass();
    }
    Outcome {
        passed: false,
        detail: describe(path, condition.operator, expected, actual.as_ref()),
        path: Some(path.to_string()),
        value: actual,
    }
}

fn not_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

/// Value equality where numbers compare by magnitude, so `2` equals `2.0`.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn same_option(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_value(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn contains(actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match (actual, expected) {
        (Some(Value::String(haystack)), Some(Value::String(needle))) => haystack.contains(needle.as_str()),
        (Some(Value::Array(items)), Some(needle)) => items.iter().any(|item| same_value(item, needle)),
        _ => false,
    }
}

fn describe(path: &str, operator: Operator, expected: Option<&Value>, actual: Option<&Value>) -> String {
    let found = actual.map_or_else(|| "undefined".to_string(), Value::to_string);
    let want = expected.map(Value::to_string);
    match (operator, want) {
        (Operator::Exists, _) => format!("expected {path} to exist"),
        (Operator::NotExists, _) => format!("expected {path} to not exist, found {found}"),
        (Operator::NotEmpty, _) => format!("expected {path} to not be empty, found {found}"),
        (Operator::GreaterThan, Some(want)) if actual.and_then(Value::as_f64).is_none() => {
            format!("expected {path} > {want}, found non-numeric {found}")
        }
        (op, Some(want)) => format!("expected {path} {} {want}, found {found}", symbol(op)),
        (op, None) => format!("expected {path} {} <none>, found {found}", symbol(op)),
    }
}

fn symbol(operator: Operator) -> &'static str {
    match operator {
        Operator::Equals => "==",
        Operator::NotEquals => "!=",
        Operator::GreaterThan => ">",
        Operator::Contains => "contains",
        Operator::NotContains => "does not contain",
        Operator::Matches => "matches",
        Operator::Exists => "exists",
        Operator::NotExists => "not exists",
        Operator::NotEmpty => "not empty",
    }
}
