use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use netops::model::Vendor;

#[derive(Parser, Debug)]
#[command(name = "netops")]
#[command(about = "Parse, lint and change-manage MikroTik, Cisco IOS and FortiGate configurations")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Detect which dialect a configuration file is written in.
    Detect(DetectArgs),
    /// Parse a configuration into the canonical model.
    Parse(ParseArgs),
    /// Lint a configuration against a rulepack.
    Lint(LintArgs),
    /// Line diff of two configuration files.
    Diff(DiffArgs),
    /// List registered custom predicates and rulepack rules.
    Rules(RulesArgs),
    /// Run a change file through plan, generate and verify, optionally
    /// approving and deploying it with a dry-run transport.
    Change(ChangeArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum VendorArg {
    Mikrotik,
    Cisco,
    Fortigate,
}

impl From<VendorArg> for Vendor {
    fn from(value: VendorArg) -> Self {
        match value {
            VendorArg::Mikrotik => Vendor::Mikrotik,
            VendorArg::Cisco => Vendor::Cisco,
            VendorArg::Fortigate => Vendor::Fortigate,
        }
    }
}

#[derive(Parser, Debug)]
pub struct DetectArgs {
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ParseArgs {
    pub file: PathBuf,
    /// Dialect to parse as. Detected from the content when omitted.
    #[arg(long, value_enum)]
    pub vendor: Option<VendorArg>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Exit non-zero when any line failed to parse.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct LintArgs {
    pub file: PathBuf,
    #[arg(long, value_enum)]
    pub vendor: Option<VendorArg>,
    /// Rulepack file (.toml or .json). Defaults to the built-in baseline.
    #[arg(long, conflicts_with = "rulepack_dir")]
    pub rulepack: Option<PathBuf>,
    /// Directory of rulepack files; every pack scoped to the vendor applies.
    #[arg(long, conflicts_with = "rulepack")]
    pub rulepack_dir: Option<PathBuf>,
    /// Workflow settings TOML (gate policy). Defaults to the embedded settings.
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Treat medium findings as blocking.
    #[arg(long)]
    pub strict: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    pub file1: PathBuf,
    pub file2: PathBuf,
    /// Skip blank lines and `#`/`!` comment lines.
    #[arg(long)]
    pub ignore_comments: bool,
    /// Lines of context around each hunk.
    #[arg(long, default_value_t = 3)]
    pub context: usize,
    /// Print only the change counts.
    #[arg(long)]
    pub summary: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct RulesArgs {
    /// Rulepack to list instead of the built-in baseline.
    #[arg(long)]
    pub rulepack: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ChangeArgs {
    /// Change file (TOML) naming the intent and device scope.
    pub file: PathBuf,
    #[arg(long)]
    pub rulepack_dir: Option<PathBuf>,
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Approve as this actor after submitting; repeat for more approvers.
    #[arg(long = "approve", value_name = "ACTOR")]
    pub approvers: Vec<String>,
    /// Deploy through the dry-run transport once approved.
    #[arg(long)]
    pub deploy: bool,
    /// Make the dry-run transport fail on this device.
    #[arg(long = "fail-on", value_name = "DEVICE", requires = "deploy")]
    pub fail_on: Vec<String>,
    /// Close the request after a successful deployment.
    #[arg(long, requires = "deploy")]
    pub close: bool,
    /// Include each change set's unified diff in text output.
    #[arg(long)]
    pub show_diff: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
