use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use netops::change::{ChangeBoard, ChangeRequest, DeviceRecord, DryRunTransport, Intent, StaticInventory, WorkflowError};
use netops::detect::detect_vendor;
use netops::lint::{baseline_rulepack, RulepackDir, RulepackSource};
use netops::model::Vendor;
use netops::report::render_change;
use netops::settings::load_settings;
use serde::Deserialize;
use tracing::info;

use crate::cli::{ChangeArgs, OutputFormat};
use crate::parse_cmd::read_text;

/// A change request described on disk.
#[derive(Debug, Deserialize)]
struct ChangeFile {
    title: String,
    requested_by: String,
    #[serde(default = "default_lint_blocking")]
    lint_blocking: bool,
    intent: Intent,
    #[serde(default, rename = "device")]
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    id: String,
    #[serde(default)]
    vendor: Option<Vendor>,
    /// Path of the last known running config, relative to the change file.
    config: PathBuf,
}

fn default_lint_blocking() -> bool {
    true
}

fn load_change_file(path: &Path) -> Result<ChangeFile> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn build_inventory(change: &ChangeFile, base: &Path) -> Result<StaticInventory> {
    let mut inventory = StaticInventory::default();
    for device in &change.devices {
        let path = base.join(&device.config);
        let text = read_text(&path)?;
        let vendor = match device.vendor.or_else(|| detect_vendor(&text)) {
            Some(vendor) => vendor,
            None => bail!("could not detect the dialect of device '{}' ({})", device.id, path.display()),
        };
        inventory.insert(DeviceRecord::from_text(&device.id, vendor, text));
    }
    Ok(inventory)
}

fn print_request(request: &ChangeRequest, args: &ChangeArgs) -> Result<()> {
    match args.format {
        OutputFormat::Text => println!("{}", render_change(request, args.show_diff)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(request)?),
    }
    Ok(())
}

/// Drive one change request through the workflow with a dry-run transport.
pub fn run_change(args: ChangeArgs) -> Result<()> {
    let change = load_change_file(&args.file)?;
    let base = args.file.parent().unwrap_or_else(|| Path::new("."));
    let inventory = build_inventory(&change, base)?;
    let (settings, source) =
        load_settings(args.settings.as_deref()).with_context(|| "failed to load settings")?;
    info!(settings = %source, devices = inventory.len(), "change workflow");

    let rulepacks: Arc<dyn RulepackSource> = match &args.rulepack_dir {
        Some(dir) => Arc::new(RulepackDir::new(dir)),
        None => Arc::new(baseline_rulepack().context("embedded baseline rulepack is invalid")?),
    };
    let board = ChangeBoard::new(Arc::new(inventory), rulepacks, settings);

    let scope = change.devices.iter().map(|d| d.id.clone()).collect();
    let request = board.create(
        &change.title,
        &change.requested_by,
        change.intent.clone(),
        scope,
        change.lint_blocking,
    );
    let id = request.id.clone();
    let author = change.requested_by.as_str();

    let outcome = drive(&board, &id, author, &args);
    let Some(snapshot) = board.get(&id) else {
        bail!("change request {id} vanished");
    };
    print_request(&snapshot, &args)?;
    outcome.with_context(|| format!("change request {id} stopped in state {}", snapshot.status))
}

fn drive(board: &ChangeBoard, id: &str, author: &str, args: &ChangeArgs) -> Result<(), WorkflowError> {
    board.plan(id, author, None)?;
    board.generate(id, author, None)?;
    board.verify(id, author, None)?;
    board.submit_approval(id, author, None)?;
    for approver in &args.approvers {
        board.approve(id, approver, None)?;
    }

    if args.deploy {
        let transport = DryRunTransport::failing_on(args.fail_on.iter().cloned());
        board.deploy(id, author, &transport, None)?;
        if args.close {
            board.close(id, author, None)?;
        }
    }
    Ok(())
}
