use anyhow::{Context, Result};
use config_diff_core::{diff_with_options, format_json, read_file, DiffOptions};
use netops::report::{render_diff, render_diff_summary};

use crate::cli::{DiffArgs, OutputFormat};

pub fn run_diff(args: DiffArgs) -> Result<()> {
    let left = read_file(&args.file1)
        .with_context(|| format!("failed to read {}", args.file1.display()))?;
    let right = read_file(&args.file2)
        .with_context(|| format!("failed to read {}", args.file2.display()))?;

    let opts = if args.ignore_comments {
        DiffOptions::ignoring_comments()
    } else {
        DiffOptions::default()
    };
    let entries = diff_with_options(&left.to_text(), &right.to_text(), &opts);

    if args.summary {
        println!("{}", render_diff_summary(&entries));
        return Ok(());
    }

    match args.format {
        OutputFormat::Text => {
            let left_label = args.file1.display().to_string();
            let right_label = args.file2.display().to_string();
            let rendered = render_diff(&entries, &left_label, &right_label, args.context);
            if !rendered.is_empty() {
                println!("{rendered}");
            }
            println!("{}", render_diff_summary(&entries));
        }
        OutputFormat::Json => println!("{}", format_json(&entries)),
    }
    Ok(())
}
