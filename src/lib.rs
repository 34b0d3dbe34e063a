#![forbid(unsafe_code)]
//! Golden-output conformance harness for Lox interpreters
//!
//! Runs an externally built interpreter against fixed Lox scripts and compares what it prints, byte for byte,
//! with recorded expectations. The interpreter itself is never linked; it is only ever a child process.
//!
//! ## Layout
//!
//! - [`fixtures`]: golden test cases grouped by language feature
//! - [`process`]: launching the target and capturing its output
//! - [`oracle`]: exact-match judgement of one captured result
//! - [`runner`]: driving a selection of cases and reporting on them
//! - [`cli`]: the `loxharness` command line
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli`, `fixtures`,
//!   `process` and `runner` modules enforce `#![deny(clippy::unwrap_used)]`.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod fixtures;
pub mod oracle;
pub mod process;
pub mod runner;
pub mod version;

pub use fixtures::{FixtureError, FixtureStore, Selection, TestCase};
pub use oracle::{AssertionOutcome, ExitPolicy, MismatchDetail, check};
pub use process::{ExecutionResult, InvokeError, LineEndings, ScriptRunner, TargetExecutable};
pub use runner::{CaseOutcome, CaseReport, RunOptions, RunSummary, run_suite};
