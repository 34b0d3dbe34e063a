//! Process invocation layer.
//!
//! Runs the target interpreter as `<target> <script>` and hands back everything it emitted. The
//! [`ScriptRunner`] trait is the seam between the suite runner and real processes so the runner can be driven by
//! canned results in tests.
//!
//! ## Contract
//!
//! - Exactly one positional argument, the script path. Stdin is closed.
//! - The caller blocks until the child exits or the deadline passes. On expiry the child is killed and reaped.
//! - Both streams are captured in full, concurrently, so a chatty child cannot stall on a full pipe.
//! - Output is not trimmed. The only rewrite is optional `\r\n` → `\n` normalization ([`LineEndings`]).
//! - A non-zero exit is a result, not an error. Errors are reserved for cases where no result exists.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod target;

pub use target::TargetExecutable;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Everything observable from one run of the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was terminated by a signal
    pub exit_status: Option<i32>,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

/// Reasons an invocation produced no [`ExecutionResult`].
#[derive(Debug, Error, Diagnostic)]
pub enum InvokeError {
    #[error("script '{}' does not exist or is not readable", .0.display())]
    #[diagnostic(
        code(loxharness::invoke::script_missing),
        help("check that --scripts points at the fixture root")
    )]
    ScriptMissing(PathBuf),

    #[error("failed to launch '{}'", .target.display())]
    #[diagnostic(
        code(loxharness::invoke::launch),
        help("check that --lox points at an executable interpreter")
    )]
    Launch {
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to capture output of the target")]
    #[diagnostic(code(loxharness::invoke::capture))]
    Capture(#[source] io::Error),

    #[error("'{}' did not finish within {limit:?}", .script.display())]
    #[diagnostic(code(loxharness::invoke::timeout))]
    TimedOut { script: PathBuf, limit: Duration },
}

impl InvokeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, InvokeError::TimedOut { .. })
    }
}

/// Line-ending handling for captured text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEndings {
    /// Keep bytes as emitted
    Preserve,
    /// Rewrite `\r\n` to `\n`
    Normalize,
}

impl Default for LineEndings {
    fn default() -> Self {
        if cfg!(windows) {
            LineEndings::Normalize
        } else {
            LineEndings::Preserve
        }
    }
}

impl LineEndings {
    pub fn apply(self, text: String) -> String {
        match self {
            LineEndings::Preserve => text,
            LineEndings::Normalize if text.contains("\r\n") => text.replace("\r\n", "\n"),
            LineEndings::Normalize => text,
        }
    }
}

/// Runs one script and captures the result.
pub trait ScriptRunner {
    /// Run `script` to completion, or until `limit` elapses when one is given.
    fn run(&self, script: &Path, limit: Option<Duration>) -> Result<ExecutionResult, InvokeError>;
}
