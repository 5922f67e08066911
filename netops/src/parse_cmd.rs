use std::path::Path;

use anyhow::{bail, Context, Result};
use config_diff_core::read_file;
use netops::detect::detect_vendor;
use netops::model::Vendor;
use netops::parser::{parse_config, ParseResult};
use netops::report::render_parse;

use crate::cli::{OutputFormat, ParseArgs, VendorArg};

pub fn read_text(path: &Path) -> Result<String> {
    let text = read_file(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(text.to_text())
}

/// Read and parse `path`, detecting the dialect unless one was given.
pub fn load_config(path: &Path, vendor: Option<VendorArg>) -> Result<(Vendor, ParseResult)> {
    let text = read_text(path)?;
    let vendor = match vendor {
        Some(vendor) => Vendor::from(vendor),
        None => match detect_vendor(&text) {
            Some(vendor) => vendor,
            None => bail!(
                "could not detect the dialect of {}; pass --vendor",
                path.display()
            ),
        },
    };
    let parsed = parse_config(vendor, &text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok((vendor, parsed))
}

pub fn run_parse(args: ParseArgs) -> Result<()> {
    let (_, parsed) = load_config(&args.file, args.vendor)?;

    match args.format {
        OutputFormat::Text => println!("{}", render_parse(&parsed)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&parsed)?),
    }

    if args.strict && !parsed.errors.is_empty() {
        bail!("parse failed in strict mode: {} errors", parsed.errors.len());
    }
    Ok(())
}
