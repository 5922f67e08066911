use colored::Colorize;
use config_diff_core::{format_summary, format_unified, DiffEntry};

use crate::change::{ChangeRequest, ChangeSet, ChangeStatus};
use crate::detect::DialectDetection;
use crate::lint::predicates::CustomPredicate;
use crate::lint::{LintRunResult, Severity};
use crate::parser::ParseResult;

fn severity_label(severity: Severity) -> String {
    let label = severity.as_str().to_uppercase();
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.blue().to_string(),
    }
}

fn pass_label(passed: bool) -> String {
    if passed {
        "PASS".green().bold().to_string()
    } else {
        "FAIL".red().bold().to_string()
    }
}

pub fn render_detection(detection: &DialectDetection) -> String {
    let vendor = detection
        .vendor
        .map_or_else(|| "unknown".to_string(), |v| v.to_string());
    let candidates: Vec<String> = detection.candidates.iter().map(ToString::to_string).collect();
    format!(
        "vendor={vendor} confidence={} candidates=[{}]",
        detection.confidence,
        candidates.join(", ")
    )
}

/// Inventory-style overview of a parse: what was found and what went wrong.
pub fn render_parse(result: &ParseResult) -> String {
    let config = &result.normalized;
    let mut out = Vec::new();
    out.push(format!(
        "{} {}",
        config.device.vendor.to_string().cyan(),
        config.device.hostname.as_deref().unwrap_or("(no hostname)").bold()
    ));
    if let Some(version) = &config.device.os_version {
        out.push(format!("- os_version: {version}"));
    }
    out.push(format!("- lines: {}", result.raw_line_count));
    out.push(format!("- interfaces: {}", config.interfaces.len()));
    out.push(format!("- vlans: {}", config.vlans.len()));
    out.push(format!("- static_routes: {}", config.routing.static_routes.len()));
    out.push(format!("- firewall_policies: {}", config.security.firewall_policies.len()));
    out.push(format!("- nat_rules: {}", config.security.nat_rules.len()));
    out.push(format!("- acls: {}", config.security.acls.len()));
    out.push(format!("- vpn_tunnels: {}", config.security.vpn_tunnels.len()));

    out.push(String::new());
    out.push("interfaces".to_string());
    if config.interfaces.is_empty() {
        out.push("- none".to_string());
    }
    for iface in &config.interfaces {
        let ips: Vec<String> = iface.ips.iter().map(|ip| ip.cidr()).collect();
        let state = if iface.admin_up { "up".green() } else { "down".red() };
        out.push(format!("- {} [{:?}] {} {}", iface.name, iface.kind, state, ips.join(" ")));
    }

    if !result.errors.is_empty() {
        out.push(String::new());
        out.push(format!("errors ({})", result.errors.len()).red().to_string());
        for err in &result.errors {
            out.push(format!("- line {}: {}", err.line, err.message));
        }
    }
    if !result.warnings.is_empty() {
        out.push(String::new());
        out.push(format!("warnings ({})", result.warnings.len()).yellow().to_string());
        for warning in &result.warnings {
            out.push(format!("- {warning}"));
        }
    }
    out.join("\n")
}

pub fn render_lint(run: &LintRunResult) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "{} {} evaluated={} passed={} failed={} skipped={}",
        pass_label(run.passed()),
        run.target_id.bold(),
        run.rules_evaluated,
        run.rules_passed,
        run.rules_failed,
        run.rules_skipped
    ));
    for finding in &run.findings {
        out.push(format!("- {} {} {}", severity_label(finding.severity), finding.rule_id, finding.message));
        if let Some(remediation) = &finding.remediation {
            out.push(format!("  fix: {remediation}"));
        }
    }
    let s = &run.summary;
    out.push(
        format!(
            "critical={} high={} medium={} low={}",
            s.critical, s.high, s.medium, s.low
        )
        .cyan()
        .to_string(),
    );
    out.join("\n")
}

/// Unified diff with added lines green and removed lines red.
pub fn render_diff(entries: &[DiffEntry], left_label: &str, right_label: &str, context: usize) -> String {
    let raw = format_unified(entries, left_label, right_label, context);
    let mut out = Vec::new();
    for line in raw.lines() {
        let colored = if line.starts_with("+++") || line.starts_with("---") {
            line.bold().to_string()
        } else if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with("@@") {
            line.cyan().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }
    out.join("\n")
}

pub fn render_diff_summary(entries: &[DiffEntry]) -> String {
    format_summary(entries).cyan().to_string()
}

pub fn render_predicates<'a>(predicates: impl IntoIterator<Item = &'a CustomPredicate>) -> String {
    predicates
        .into_iter()
        .map(|p| format!("{:<32} {}", p.name.bold(), p.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_change_set(set: &ChangeSet, out: &mut Vec<String>) {
    out.push(format!(
        "device {} ({}) added={} removed={}",
        set.device_id.bold(),
        set.vendor,
        set.diff_stats.added,
        set.diff_stats.removed
    ));
    for (title, commands) in [
        ("precheck", &set.precheck),
        ("apply", &set.apply),
        ("postcheck", &set.postcheck),
        ("rollback", &set.rollback),
    ] {
        out.push(format!("  {title}"));
        for command in commands {
            for (idx, line) in command.lines().enumerate() {
                let marker = if idx == 0 { "-" } else { " " };
                out.push(format!("    {marker} {line}"));
            }
        }
    }
}

pub fn render_change(request: &ChangeRequest, show_diff: bool) -> String {
    let status = match request.status {
        ChangeStatus::Deployed | ChangeStatus::Closed => request.status.to_string().green(),
        ChangeStatus::Rejected => request.status.to_string().red(),
        _ => request.status.to_string().yellow(),
    };
    let mut out = vec![
        format!("change {} {}", request.id.bold(), request.title),
        format!(
            "- status: {status} (version {}) intent: {}",
            request.version, request.intent
        ),
        format!(
            "- risk: {} approvals: {}/{}",
            request.risk_tier,
            request.approvals.len(),
            request.required_approvals
        ),
    ];

    if let Some(plan) = &request.plan {
        out.push(format!("- tasks: {}", plan.task_graph.order.join(" -> ")));
        for missing in &plan.missing_info {
            out.push(format!("  missing {} {}: {}", missing.device_id, missing.field, missing.detail).yellow().to_string());
        }
    }

    for set in &request.change_sets {
        out.push(String::new());
        render_change_set(set, &mut out);
        if let Some(run) = set.lint_run_id.as_ref().and_then(|id| request.lint_runs.get(id)) {
            out.push(format!("  lint {}", pass_label(run.passed())));
        }
        if show_diff {
            for line in set.diff.lines() {
                out.push(format!("  {line}"));
            }
        }
    }

    if let Some(report) = &request.deployment {
        out.push(String::new());
        out.push("deployment".to_string());
        for device in &report.devices {
            let rolled = if device.rolled_back { " (rolled back)" } else { "" };
            out.push(format!("- {} {}{rolled}", device.device_id, pass_label(device.success)));
            if let Some(error) = &device.error {
                out.push(format!("  error: {error}"));
            }
        }
    }

    out.push(String::new());
    out.push("history".to_string());
    for event in &request.history {
        let detail = event.detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default();
        out.push(format!(
            "- v{} {} {}: {} -> {}{detail}",
            event.version, event.actor, event.transition, event.from, event.to
        ));
    }
    out.join("\n")
}
