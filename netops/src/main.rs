use anyhow::{Context, Result};
use clap::Parser;
use netops::detect::detect_dialect;
use netops::lint::{baseline_rulepack, load_rulepack, predicates};
use netops::report::{render_detection, render_predicates};

mod change_cmd;
mod cli;
mod diff_cmd;
mod lint_cmd;
mod logging;
mod parse_cmd;

use cli::{Cli, Command, DetectArgs, OutputFormat, RulesArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Detect(args) => run_detect(args),
        Command::Parse(args) => parse_cmd::run_parse(args),
        Command::Lint(args) => lint_cmd::run_lint(args),
        Command::Diff(args) => diff_cmd::run_diff(args),
        Command::Rules(args) => run_rules(args),
        Command::Change(args) => change_cmd::run_change(args),
    }
}

fn run_detect(args: DetectArgs) -> Result<()> {
    let text = parse_cmd::read_text(&args.file)?;
    let detection = detect_dialect(&text);
    match args.format {
        OutputFormat::Text => println!("{}", render_detection(&detection)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&detection)?),
    }
    if detection.vendor.is_none() {
        anyhow::bail!("no supported dialect detected in {}", args.file.display());
    }
    Ok(())
}

fn run_rules(args: RulesArgs) -> Result<()> {
    let pack = match &args.rulepack {
        Some(path) => load_rulepack(path)
            .with_context(|| format!("failed to load rulepack {}", path.display()))?,
        None => baseline_rulepack().context("embedded baseline rulepack is invalid")?,
    };

    match args.format {
        OutputFormat::Text => {
            println!("predicates");
            println!("{}", render_predicates(predicates::registered()));
            println!();
            println!("rulepack {} {}", pack.name, pack.version);
            for rule in &pack.rules {
                let state = if rule.enabled { "" } else { " (disabled)" };
                println!("- {} [{}] {}{state}", rule.id, rule.severity, rule.name);
            }
        }
        OutputFormat::Json => {
            let names: Vec<&str> = predicates::registered().map(|p| p.name).collect();
            let doc = serde_json::json!({ "predicates": names, "rulepack": pack });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}
