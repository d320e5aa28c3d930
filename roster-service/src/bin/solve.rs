//! `roster-solve`: run a solve from the command line.
//!
//! Reads the request document, routes it to the matching engine entry
//! point, writes the output JSON, and exits 0 on success or 1 on any
//! validation or solve error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use roster_engine::domain::{EmptySlotsRequest, IncrementalRequest, SolveRequest};
use roster_engine::engine::{
    SolveOptions, solve_empty_slots_with_options, solve_incremental_with_options,
    solve_with_options,
};

#[derive(Parser)]
#[command(name = "roster-solve", about = "Workforce rostering solver")]
struct Args {
    /// Input request JSON.
    #[arg(long = "in")]
    input: PathBuf,

    /// Output path; defaults to `<input>.out.json`.
    #[arg(long = "out")]
    output: Option<PathBuf>,

    /// Solver time limit in seconds.
    #[arg(long, default_value_t = 15)]
    time: u64,
}

fn main() -> ExitCode {
    shared::telemetry::init_telemetry("roster-solve");
    let args = Args::parse();

    match run(&args) {
        Ok(path) => {
            tracing::info!(output = %path.display(), "solve completed");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<PathBuf, String> {
    let raw = std::fs::read_to_string(&args.input)
        .map_err(|e| format!("cannot read {}: {e}", args.input.display()))?;
    let mut input: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| format!("input is not valid JSON: {e}"))?;

    // the --time flag overrides whatever the document carries
    if let Some(map) = input.as_object_mut() {
        map.insert(
            "solverRunTime".to_string(),
            serde_json::json!({ "maxSeconds": args.time }),
        );
    }

    let options = SolveOptions {
        max_time_seconds: args.time.max(1),
        ..SolveOptions::default()
    };

    let output = if input.get("temporalWindow").is_some() {
        let request: IncrementalRequest =
            serde_json::from_value(input).map_err(|e| format!("unparseable input: {e}"))?;
        solve_incremental_with_options(&request, &options)
    } else if input.get("emptySlots").is_some() {
        let request: EmptySlotsRequest =
            serde_json::from_value(input).map_err(|e| format!("unparseable input: {e}"))?;
        solve_empty_slots_with_options(&request, &options)
    } else {
        let request: SolveRequest =
            serde_json::from_value(input).map_err(|e| format!("unparseable input: {e}"))?;
        solve_with_options(&request, &options)
    }
    .map_err(|e| match e.validation_report() {
        Some(report) => {
            let details: Vec<String> = report
                .errors
                .iter()
                .map(|issue| format!("  {} [{}]: {}", issue.field, issue.code, issue.message))
                .collect();
            format!("validation failed:\n{}", details.join("\n"))
        }
        None => e.to_string(),
    })?;

    let out_path = args.output.clone().unwrap_or_else(|| {
        let mut path = args.input.clone();
        path.set_extension("out.json");
        path
    });
    let body = serde_json::to_string_pretty(&output)
        .map_err(|e| format!("output serialisation failed: {e}"))?;
    std::fs::write(&out_path, body)
        .map_err(|e| format!("cannot write {}: {e}", out_path.display()))?;

    println!(
        "status: {:?} | assignments: {} | coverage: {:.1}%",
        output.solver_run.status,
        output.assignments.len(),
        output.solution_quality.coverage_rate
    );
    Ok(out_path)
}
