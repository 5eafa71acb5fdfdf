//! Command-line PDF merger.
//!
//! Usage:
//!
//! ```text
//! mergepdf <output.pdf> <input.pdf[@START-END]>...
//! ```
//!
//! Each input may carry an optional 1-based inclusive page range after
//! `@`, e.g. `report.pdf@2-5`. Inputs that fail to parse are skipped
//! with an error message; the merge fails only if no pages could be
//! taken at all.

use mergepdf::merge::{MergeSource, PageRange, merge_sources};
use mergepdf::writer::save_document;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("Usage: mergepdf <output.pdf> <input.pdf[@START-END]>...");
        return ExitCode::from(2);
    }

    let output_path = &args[0];

    let mut sources = Vec::new();
    for arg in &args[1..] {
        let (path, range) = match parse_input_arg(arg) {
            Ok(parts) => parts,
            Err(msg) => {
                eprintln!("Invalid argument '{}': {}", arg, msg);
                return ExitCode::from(2);
            },
        };

        match std::fs::read(path) {
            Ok(data) => sources.push(MergeSource { data, range }),
            Err(e) => {
                eprintln!("Skipping {}: {}", path, e);
            },
        }
    }

    let merged = match merge_sources(sources) {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Merge failed: {}", e);
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = save_document(&merged, output_path) {
        eprintln!("Failed to write {}: {}", output_path, e);
        return ExitCode::FAILURE;
    }

    println!("Wrote {} pages to {}", merged.page_count, output_path);
    ExitCode::SUCCESS
}

/// Split `path[@START-END]` into a path and an optional page range.
fn parse_input_arg(arg: &str) -> Result<(&str, Option<PageRange>), String> {
    let Some((path, range_spec)) = arg.rsplit_once('@') else {
        return Ok((arg, None));
    };

    let (start, end) = range_spec
        .split_once('-')
        .ok_or_else(|| format!("page range '{}' must be START-END", range_spec))?;
    let start: usize = start
        .parse()
        .map_err(|_| format!("invalid start page '{}'", start))?;
    let end: usize = end
        .parse()
        .map_err(|_| format!("invalid end page '{}'", end))?;

    let range = PageRange::new(start, end).map_err(|e| e.to_string())?;
    Ok((path, Some(range)))
}
