//! `gather`: a thin CLI that replays a directory of numbered code fragments
//! through [`ExecutionLogSlicer`] and prints the backward slice retained for
//! a user-supplied seed location.
//!
//! Usage: `cellslice gather <dir> --seed <file>:<line>`
//!
//! Fragments are read in filename order; each file becomes one logged cell,
//! keyed by its own filename as both `execution_event_id` and
//! `persistent_id` (this CLI never models re-execution of the same cell, so
//! the two never need to diverge here).

use cellslice_core::{Cell, ExecutionLogSlicer, SourceLocation, printer};
use std::{env, fs, path::Path, process::ExitCode};

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let (dir, seed_arg) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!("usage: cellslice gather <dir> --seed <file>:<line>");
            return ExitCode::FAILURE;
        }
    };

    let fragments = match read_fragments(dir) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if fragments.is_empty() {
        eprintln!("error: no fragments found in {dir}");
        return ExitCode::FAILURE;
    }

    let (seed_file, seed_line) = match parse_seed(&seed_arg) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let Some(seed_fragment) = fragments.iter().find(|f| f.name == seed_file) else {
        eprintln!("error: no fragment named {seed_file} in {dir}");
        return ExitCode::FAILURE;
    };
    let persistent_id = seed_fragment.name.clone();

    let mut log = ExecutionLogSlicer::new();
    for (i, fragment) in fragments.iter().enumerate() {
        log.log_execution(Cell::new(fragment.text.clone(), i as u64 + 1, fragment.name.clone(), fragment.name.clone()));
    }

    let seed = SourceLocation::new(seed_line, 0, seed_line, u32::MAX);
    let sliced = match log.slice_latest_execution(&persistent_id, Some(&[seed])) {
        Ok(Some(s)) => s,
        Ok(None) => {
            eprintln!("error: {persistent_id} was never logged");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    for cell_slice in &sliced.cell_slices {
        let Some(fragment) = fragments.iter().find(|f| f.name.as_str() == cell_slice.execution_event_id.as_ref()) else { continue };
        println!("--- {} ---", fragment.name);
        for location in &cell_slice.locations {
            println!("{}", printer::print_location(&fragment.text, location));
        }
    }

    ExitCode::SUCCESS
}

struct Fragment {
    name: String,
    text: String,
}

fn parse_args(args: &[String]) -> Result<(&str, String), String> {
    let dir = args.get(1).ok_or("missing <dir> argument")?;
    let mut seed = None;
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--seed" {
            seed = args.get(i + 1).cloned();
            i += 2;
        } else {
            i += 1;
        }
    }
    Ok((dir.as_str(), seed.ok_or("missing --seed <file>:<line>")?))
}

fn parse_seed(seed: &str) -> Result<(String, u32), String> {
    let (file, line) = seed.rsplit_once(':').ok_or_else(|| format!("malformed seed {seed}, expected file:line"))?;
    let line: u32 = line.parse().map_err(|_| format!("malformed line number in seed {seed}"))?;
    Ok((file.to_string(), line))
}

/// Reads every regular file directly under `dir`, sorted by filename so
/// fragments numbered `0001_*.py`, `0002_*.py`, ... replay in order.
fn read_fragments(dir: &str) -> Result<Vec<Fragment>, String> {
    let entries = fs::read_dir(Path::new(dir)).map_err(|err| format!("reading {dir}: {err}"))?;
    let mut fragments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| format!("reading {dir}: {err}"))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        let text = fs::read_to_string(&path).map_err(|err| format!("reading {}: {err}", path.display()))?;
        fragments.push(Fragment { name, text });
    }
    fragments.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(fragments)
}
