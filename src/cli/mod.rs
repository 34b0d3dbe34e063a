//! CLI module for the Lox conformance harness
//!
//! ## Commands
//!
//! - `run` - Run fixtures against the target interpreter (`--lox <PATH>`)
//! - `list` - List fixture groups and cases
//! - `show <GROUP> <NAME>` - Print one case's goldens
//!
//! `loxharness --lox <PATH>` with no subcommand runs the whole built-in suite.
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::version::HARNESS_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Render a library diagnostic (code, help, cause chain) into a failure.
    pub fn diagnostic<E>(err: E) -> Self
    where
        E: miette::Diagnostic + Send + Sync + 'static,
    {
        Self::failure(format!("{:?}", miette::Report::new(err)))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Golden-output conformance harness for Lox interpreters
#[derive(Parser, Debug)]
#[command(name = "loxharness")]
#[command(version = HARNESS_VERSION)]
#[command(about = "Golden-output conformance harness for Lox interpreters", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the Lox interpreter under test
    #[arg(long = "lox", value_name = "PATH", global = true)]
    pub lox: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run fixtures against the interpreter
    Run(RunArgs),

    /// List fixture groups and cases
    List {
        #[command(flatten)]
        source: SourceArgs,
        /// Only this group
        #[arg(short = 'g', long = "group", value_name = "GROUP")]
        group: Option<String>,
    },

    /// Print the goldens of one case
    Show {
        /// Feature group (`root` for top-level scripts)
        #[arg(value_name = "GROUP")]
        group: String,
        /// Case name
        #[arg(value_name = "NAME")]
        name: String,
        #[command(flatten)]
        source: SourceArgs,
    },
}

/// Where goldens come from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Load goldens from sibling `.out`/`.err` files under DIR instead of the built-in suite
    #[arg(long = "golden-dir", value_name = "DIR")]
    pub golden_dir: Option<PathBuf>,
}

/// Report format for `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Console,
    Json,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Scripts root (default: the golden dir, or `lox_scripts`)
    #[arg(long = "scripts", value_name = "DIR")]
    pub scripts: Option<PathBuf>,

    /// Only this group
    #[arg(short = 'g', long = "group", value_name = "GROUP")]
    pub group: Option<String>,

    /// Filter cases by keyword (substring of `group::name`)
    #[arg(short = 'k', value_name = "EXPR")]
    pub filter: Option<String>,

    /// Stop on first failure
    #[arg(short = 'x', long = "exitfirst")]
    pub stop_on_fail: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Cases to run at once (default: 1)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Per-case deadline in seconds, 0 to wait forever (default: 30)
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Also require the recorded exit code of each case
    #[arg(long = "strict-exit")]
    pub strict_exit: bool,

    /// Report format
    #[arg(long = "format", value_enum, default_value_t = ReportFormat::Console)]
    pub format: ReportFormat,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Some(Command::Run(args)) => commands::run_fixtures(cli.lox.as_deref(), &args),
        Some(Command::List { source, group }) => commands::list_fixtures(&source, group.as_deref()),
        Some(Command::Show { group, name, source }) => commands::show_fixture(&source, &group, &name),
        None => match cli.lox {
            Some(lox) => commands::run_fixtures(Some(&lox), &RunArgs::default()),
            None => Err(CliError::failure(
                "Error: pass --lox <PATH> to run the suite (see --help)",
            )),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
