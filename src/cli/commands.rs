//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::env;
use std::fmt::Write as _;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fixtures::builtin::SCRIPTS_ROOT;
use crate::fixtures::{FixtureStore, Selection, TestCase};
use crate::oracle::ExitPolicy;
use crate::process::TargetExecutable;
use crate::runner::{ConsoleReporter, DEFAULT_TIMEOUT, JsonReporter, RunOptions, run_suite};

use super::{CliError, CliResult, ExitCode, ReportFormat, RunArgs, SourceArgs};

/// Built-in suite, or goldens discovered under `--golden-dir`.
fn load_store(source: &SourceArgs) -> CliResult<FixtureStore> {
    match &source.golden_dir {
        Some(dir) => FixtureStore::load_dir(dir).map_err(CliError::diagnostic),
        None => Ok(FixtureStore::builtin()),
    }
}

/// Translate `--timeout` seconds; zero disables the deadline.
fn timeout_from_secs(secs: Option<u64>) -> Option<Duration> {
    match secs {
        None => Some(DEFAULT_TIMEOUT),
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
    }
}

/// Build run options from CLI flags.
pub fn run_options(args: &RunArgs) -> RunOptions {
    let scripts_root = args
        .scripts
        .clone()
        .or_else(|| args.source.golden_dir.clone())
        .unwrap_or_else(|| PathBuf::from(SCRIPTS_ROOT));

    RunOptions::new()
        .with_scripts_root(scripts_root)
        .with_timeout(timeout_from_secs(args.timeout))
        .with_jobs(args.jobs.unwrap_or(1))
        .with_stop_on_fail(args.stop_on_fail)
        .with_exit_policy(if args.strict_exit {
            ExitPolicy::Expected
        } else {
            ExitPolicy::Ignore
        })
}

/// Run the selected fixtures against the target interpreter.
pub fn run_fixtures(lox: Option<&Path>, args: &RunArgs) -> CliResult<ExitCode> {
    let Some(lox) = lox else {
        return Err(CliError::failure("Error: run requires --lox <PATH>"));
    };

    let store = load_store(&args.source)?;
    let selection = Selection {
        group: args.group.clone(),
        keyword: args.filter.clone(),
    };
    let cases = store.select(&selection).map_err(CliError::diagnostic)?;

    if cases.is_empty() {
        eprintln!("No cases collected");
        return Ok(ExitCode::SUCCESS); // "no cases collected" is not a failure
    }

    let target = TargetExecutable::resolve(lox);
    let options = run_options(args);
    tracing::info!(
        target = %target.path().display(),
        scripts_root = %options.scripts_root.display(),
        cases = cases.len(),
        "running fixtures"
    );

    let stdout = io::stdout();
    let summary = match args.format {
        ReportFormat::Console => {
            let color = stdout.is_terminal() && env::var_os("NO_COLOR").is_none();
            let mut reporter = ConsoleReporter::new(stdout.lock(), args.verbose, color);
            run_suite(&cases, &target, &options, &mut reporter)
        }
        ReportFormat::Json => {
            let mut reporter = JsonReporter::new(stdout.lock());
            run_suite(&cases, &target, &options, &mut reporter)
        }
    };

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        // Summary already printed
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

/// List groups and their cases.
pub fn list_fixtures(source: &SourceArgs, group: Option<&str>) -> CliResult<ExitCode> {
    let store = load_store(source)?;
    print!("{}", render_list(&store, group)?);
    Ok(ExitCode::SUCCESS)
}

pub fn render_list(store: &FixtureStore, group: Option<&str>) -> CliResult<String> {
    let groups = match group {
        Some(name) => vec![store.group(name).map_err(CliError::diagnostic)?],
        None => store.groups().iter().collect(),
    };

    let mut out = String::new();
    for g in groups {
        let _ = writeln!(out, "{} ({})", g.name, g.cases.len());
        for case in &g.cases {
            match &case.skip {
                Some(reason) => {
                    let _ = writeln!(out, "  {} [skipped: {}]", case.name, reason);
                }
                None => {
                    let _ = writeln!(out, "  {}", case.name);
                }
            }
        }
    }
    Ok(out)
}

/// Print one case's goldens.
pub fn show_fixture(source: &SourceArgs, group: &str, name: &str) -> CliResult<ExitCode> {
    let store = load_store(source)?;
    let case = store.get(group, name).map_err(CliError::diagnostic)?;
    print!("{}", render_case(case));
    Ok(ExitCode::SUCCESS)
}

pub fn render_case(case: &TestCase) -> String {
    let exit = case.expected_exit.map_or_else(|| "-".to_string(), |c| c.to_string());
    let mut out = String::new();
    let _ = writeln!(out, "case:   {}", case.id());
    let _ = writeln!(out, "script: {}", case.script_path.display());
    let _ = writeln!(out, "exit:   {exit}");
    if let Some(reason) = &case.skip {
        let _ = writeln!(out, "skip:   {reason}");
    }
    let _ = writeln!(out, "stdout: {:?}", case.expected_stdout);
    let _ = writeln!(out, "stderr: {:?}", case.expected_stderr);
    out
}
