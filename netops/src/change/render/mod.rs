//! Vendor command rendering and candidate configuration splicing.
//!
//! Every apply command is paired with exactly one rollback command at the
//! point it is rendered, so the rollback list is always the reversed inverse
//! of the apply list.

mod cisco;
mod fortigate;
mod mikrotik;

use config_diff_core::{diff, format_unified, DiffStats};
use serde::Serialize;
use tracing::debug;

use super::collab::DeviceRecord;
use super::intent::Intent;
use crate::model::{CanonicalConfig, IpBinding, Vendor};
use crate::parser::common::{network_of, parse_cidr};
use crate::parser::{parser_for, ParseError};

/// One mutating command and the command that undoes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandStep {
    pub apply: String,
    pub rollback: String,
}

impl CommandStep {
    fn new(apply: impl Into<String>, rollback: impl Into<String>) -> Self {
        Self {
            apply: apply.into(),
            rollback: rollback.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedChange {
    pub prechecks: Vec<String>,
    pub steps: Vec<CommandStep>,
    pub postchecks: Vec<String>,
    pub candidate_text: String,
}

impl RenderedChange {
    pub fn apply_commands(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.apply.clone()).collect()
    }

    pub fn rollback_commands(&self) -> Vec<String> {
        self.steps.iter().rev().map(|s| s.rollback.clone()).collect()
    }
}

/// Per-device artifact of a change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub device_id: String,
    pub vendor: Vendor,
    pub candidate_text: String,
    /// The candidate as the vendor parser reads it.
    pub candidate: CanonicalConfig,
    pub diff: String,
    pub diff_stats: DiffStats,
    pub precheck: Vec<String>,
    pub apply: Vec<String>,
    pub postcheck: Vec<String>,
    pub rollback: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint_run_id: Option<String>,
}

/// Render `intent` for one device.
///
/// `tag` names objects the change creates (comments, address objects) so
/// that rollback can find them again.
pub fn render_change(intent: &Intent, device: &DeviceRecord, tag: &str) -> Result<RenderedChange, String> {
    let parsed;
    let config = match device.last_known_normalized.as_ref() {
        Some(config) => config,
        None => {
            parsed = parser_for(device.vendor).parse(&device.last_known_config_text).normalized;
            &parsed
        }
    };
    let raw = device.last_known_config_text.as_str();
    match device.vendor {
        Vendor::Mikrotik => mikrotik::render(intent, config, raw, tag),
        Vendor::Cisco => cisco::render(intent, config, raw),
        Vendor::Fortigate => fortigate::render(intent, config, raw, tag),
    }
}

/// Render, re-parse the candidate and diff it against the last known text.
pub fn generate_change_set(intent: &Intent, device: &DeviceRecord, tag: &str) -> Result<ChangeSet, String> {
    let rendered = render_change(intent, device, tag)?;
    let parser = parser_for(device.vendor);
    let before = parser.parse(&device.last_known_config_text);
    let after = parser.parse(&rendered.candidate_text);
    let introduced: Vec<&ParseError> = after
        .errors
        .iter()
        .filter(|e| !before.errors.iter().any(|b| b.message == e.message))
        .collect();
    if let Some(first) = introduced.first() {
        return Err(format!(
            "candidate configuration does not parse: line {}: {}",
            first.line, first.message
        ));
    }

    let entries = diff(&device.last_known_config_text, &rendered.candidate_text);
    let diff_text = format_unified(
        &entries,
        &format!("{} (last known)", device.id),
        &format!("{} (candidate)", device.id),
        3,
    );
    debug!(
        device_id = %device.id,
        steps = rendered.steps.len(),
        "rendered change set"
    );
    Ok(ChangeSet {
        device_id: device.id.clone(),
        vendor: device.vendor,
        apply: rendered.apply_commands(),
        rollback: rendered.rollback_commands(),
        precheck: rendered.prechecks,
        postcheck: rendered.postchecks,
        candidate_text: rendered.candidate_text,
        candidate: after.normalized,
        diff: diff_text,
        diff_stats: DiffStats::from_entries(&entries),
        lint_run_id: None,
    })
}

/// IPv4 `addr/prefix` with the address reduced to its network.
fn network(cidr: &str) -> Result<IpBinding, String> {
    let mut binding = parse_cidr(cidr).ok_or_else(|| format!("invalid prefix '{cidr}'"))?;
    let net = network_of(&binding.address, binding.prefix)
        .ok_or_else(|| format!("'{cidr}' is not IPv4"))?;
    binding.address = net.to_string();
    Ok(binding)
}

fn host(cidr: &str) -> Result<IpBinding, String> {
    parse_cidr(cidr).ok_or_else(|| format!("invalid address '{cidr}'"))
}

/// Append lines to a configuration text, keeping a trailing newline.
fn append_lines(raw: &str, lines: &[String]) -> String {
    let mut out = raw.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Drop the given 1-based inclusive line ranges.
fn drop_ranges(raw: &str, ranges: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(raw.len());
    for (idx, line) in raw.lines().enumerate() {
        let line_no = idx + 1;
        if ranges.iter().any(|(start, end)| (*start..=*end).contains(&line_no)) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
