use anyhow::{bail, Context, Result};
use netops::lint::{
    baseline_rulepack, evaluate_with_gate, load_rulepack, LintContext, RulepackDir, RulepackSource,
    TargetType,
};
use netops::report::render_lint;
use netops::settings::load_settings;
use tracing::info;

use crate::cli::{LintArgs, OutputFormat};
use crate::parse_cmd::load_config;

pub fn run_lint(args: LintArgs) -> Result<()> {
    let (vendor, parsed) = load_config(&args.file, args.vendor)?;
    let (settings, source) =
        load_settings(args.settings.as_deref()).with_context(|| "failed to load settings")?;
    let mut gate = settings.gate;
    if args.strict {
        gate.escalate_medium = true;
    }

    let rules = if let Some(path) = &args.rulepack {
        load_rulepack(path)
            .with_context(|| format!("failed to load rulepack {}", path.display()))?
            .rules_for(vendor)
    } else if let Some(dir) = &args.rulepack_dir {
        RulepackDir::new(dir)
            .load_active_rulepack(vendor)
            .with_context(|| format!("failed to load rulepacks from {}", dir.display()))?
    } else {
        baseline_rulepack()
            .context("embedded baseline rulepack is invalid")?
            .rules_for(vendor)
    };
    info!(rules = rules.len(), settings = %source, "linting");

    let target_id = parsed
        .normalized
        .device
        .hostname
        .clone()
        .unwrap_or_else(|| args.file.display().to_string());
    let ctx = LintContext::new(&parsed.normalized, target_id, TargetType::Device);
    let run = evaluate_with_gate(&rules, &ctx, &gate);

    match args.format {
        OutputFormat::Text => println!("{}", render_lint(&run)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
    }

    if !run.passed() {
        bail!(
            "lint failed: {} critical, {} high, {} medium",
            run.summary.critical,
            run.summary.high,
            run.summary.medium
        );
    }
    Ok(())
}
