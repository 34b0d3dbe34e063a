//! Assertion oracle: exact comparison of captured output against goldens.
//!
//! A case passes only when stdout and stderr are both byte-for-byte equal to the expected text. Nothing is
//! normalized here, so goldens must carry the interpreter's exact trailing-newline conventions. The exit status is
//! always recorded in the outcome; it only affects the verdict under [`ExitPolicy::Expected`].

use std::fmt;

use crate::fixtures::TestCase;
use crate::process::ExecutionResult;

/// How the exit status takes part in the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Judge on output text alone
    #[default]
    Ignore,
    /// Also require the recorded exit code, for cases that have one
    Expected,
}

/// Which output stream a mismatch refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Expected and actual text for one differing stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMismatch {
    pub stream: Stream,
    pub expected: String,
    pub actual: String,
}

/// Expected and actual exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitMismatch {
    pub expected: i32,
    pub actual: Option<i32>,
}

/// Everything that differed for a failed case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MismatchDetail {
    pub stdout: Option<StreamMismatch>,
    pub stderr: Option<StreamMismatch>,
    pub exit: Option<ExitMismatch>,
}

impl MismatchDetail {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none() && self.exit.is_none()
    }

    pub fn streams(&self) -> impl Iterator<Item = &StreamMismatch> {
        self.stdout.iter().chain(self.stderr.iter())
    }
}

impl fmt::Display for MismatchDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for mismatch in self.streams() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            writeln!(f, "{} differs", mismatch.stream)?;
            writeln!(f, "  expected: {:?}", mismatch.expected)?;
            write!(f, "  actual:   {:?}", mismatch.actual)?;
        }
        if let Some(exit) = &self.exit {
            if !first {
                writeln!(f)?;
            }
            let actual = exit.actual.map_or_else(|| "killed by signal".to_string(), |c| c.to_string());
            write!(f, "exit status differs: expected {}, got {}", exit.expected, actual)?;
        }
        Ok(())
    }
}

/// Verdict for one executed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOutcome {
    pub test_name: String,
    pub passed: bool,
    pub mismatch: Option<MismatchDetail>,
    pub exit_status: Option<i32>,
}

/// Judge `result` against the goldens of `case`.
pub fn check(case: &TestCase, result: &ExecutionResult, policy: ExitPolicy) -> AssertionOutcome {
    let detail = MismatchDetail {
        stdout: compare(Stream::Stdout, &case.expected_stdout, &result.stdout),
        stderr: compare(Stream::Stderr, &case.expected_stderr, &result.stderr),
        exit: match (policy, case.expected_exit) {
            (ExitPolicy::Expected, Some(expected)) if result.exit_status != Some(expected) => Some(ExitMismatch {
                expected,
                actual: result.exit_status,
            }),
            _ => None,
        },
    };

    let passed = detail.is_empty();
    AssertionOutcome {
        test_name: case.id(),
        passed,
        mismatch: (!passed).then_some(detail),
        exit_status: result.exit_status,
    }
}

fn compare(stream: Stream, expected: &str, actual: &str) -> Option<StreamMismatch> {
    (expected != actual).then(|| StreamMismatch {
        stream,
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================
