//! Run reporting.
//!
//! The runner calls a [`Reporter`] as results come in; formats are separate implementations of the trait.
//! [`ConsoleReporter`] prints a pytest-style session and [`JsonReporter`] emits one JSON object per line.

use std::io::{self, Write};
use std::time::Duration;

use serde_json::{Value, json};

use super::{CaseOutcome, CaseReport, RunSummary};
use crate::oracle::MismatchDetail;
use crate::version::HARNESS_VERSION;

/// Receives run events in fixture order.
pub trait Reporter {
    /// Called once, before the first case runs
    fn on_collection_complete(&mut self, _count: usize) {}

    /// Called once per selected case
    fn on_case_complete(&mut self, report: &CaseReport);

    /// Called when all cases have completed
    fn on_run_complete(&mut self, summary: &RunSummary);
}

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const BOLD_RED: &str = "\x1b[1;31m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

/// Pytest-style console output.
pub struct ConsoleReporter<W: Write> {
    out: W,
    pub verbose: bool,
    pub color: bool,
    dots_pending: bool,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool, color: bool) -> Self {
        Self {
            out,
            verbose,
            color,
            dots_pending: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn status(&self, report: &CaseReport) -> String {
        let ms = report.duration.as_millis();
        match (&report.outcome, self.verbose) {
            (CaseOutcome::Checked(o), true) if o.passed => format!("{} ({ms}ms)", self.paint(GREEN, "PASSED")),
            (CaseOutcome::Checked(o), false) if o.passed => self.paint(GREEN, "."),
            (CaseOutcome::Checked(_), true) => format!("{} ({ms}ms)", self.paint(RED, "FAILED")),
            (CaseOutcome::Checked(_), false) => self.paint(RED, "F"),
            (CaseOutcome::LaunchFailure(_), true) => self.paint(RED, "ERROR"),
            (CaseOutcome::LaunchFailure(_), false) => self.paint(RED, "E"),
            (CaseOutcome::TimedOut(limit), true) => format!("{} ({limit:?})", self.paint(RED, "TIMEOUT")),
            (CaseOutcome::TimedOut(_), false) => self.paint(RED, "T"),
            (CaseOutcome::Skipped(reason), true) if reason.is_empty() => self.paint(YELLOW, "SKIPPED"),
            (CaseOutcome::Skipped(reason), true) => format!("{} ({reason})", self.paint(YELLOW, "SKIPPED")),
            (CaseOutcome::Skipped(_), false) => self.paint(YELLOW, "s"),
        }
    }

    fn write_case(&mut self, report: &CaseReport) -> io::Result<()> {
        let status = self.status(report);
        if self.verbose {
            writeln!(self.out, "{} {}", report.id, status)
        } else {
            self.dots_pending = true;
            write!(self.out, "{status}")
        }
    }

    fn write_failure(&mut self, report: &CaseReport) -> io::Result<()> {
        writeln!(self.out)?;
        let header = format!("___________ {} ___________", report.id);
        writeln!(self.out, "{}", self.paint(BOLD, &header))?;
        let body = match &report.outcome {
            CaseOutcome::Checked(o) => o.mismatch.as_ref().map(MismatchDetail::to_string).unwrap_or_default(),
            CaseOutcome::LaunchFailure(msg) => format!("launch failure: {msg}"),
            CaseOutcome::TimedOut(limit) => format!("timed out after {limit:?}; target killed"),
            CaseOutcome::Skipped(_) => String::new(),
        };
        for line in body.lines() {
            writeln!(self.out, "    {line}")?;
        }
        Ok(())
    }

    fn write_summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        if self.dots_pending {
            writeln!(self.out)?;
        }

        let failures: Vec<&CaseReport> = summary.failures().collect();
        if !failures.is_empty() {
            writeln!(self.out)?;
            let banner = "=================== FAILURES ===================";
            writeln!(self.out, "{}", self.paint(BOLD_RED, banner))?;
            for report in failures {
                self.write_failure(report)?;
            }
        }

        let mut parts = Vec::new();
        for (count, label) in [
            (summary.passed, "passed"),
            (summary.failed, "failed"),
            (summary.launch_failures, "errors"),
            (summary.timed_out, "timed out"),
            (summary.skipped, "skipped"),
        ] {
            if count > 0 {
                parts.push(format!("{count} {label}"));
            }
        }
        if parts.is_empty() {
            parts.push("no cases ran".to_string());
        }

        let line = format!(
            "=================== {} in {:.2}s ===================",
            parts.join(", "),
            summary.duration.as_secs_f64()
        );
        let color = if summary.is_success() { BOLD_GREEN } else { BOLD_RED };
        writeln!(self.out)?;
        writeln!(self.out, "{}", self.paint(color, &line))?;
        self.out.flush()
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn on_collection_complete(&mut self, count: usize) {
        let banner = self.paint(BOLD, "=================== lox conformance session starts ===================");
        let result = writeln!(self.out, "{banner}")
            .and_then(|_| writeln!(self.out, "collected {count} item(s)"))
            .and_then(|_| writeln!(self.out));
        if let Err(e) = result {
            tracing::debug!("console report write failed: {e}");
        }
    }

    fn on_case_complete(&mut self, report: &CaseReport) {
        if let Err(e) = self.write_case(report) {
            tracing::debug!("console report write failed: {e}");
        }
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        if let Err(e) = self.write_summary(summary) {
            tracing::debug!("console report write failed: {e}");
        }
    }
}

/// JSON lines: one `case` object per case and a closing `summary` object.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, value: &Value) {
        if let Err(e) = writeln!(self.out, "{value}").and_then(|_| self.out.flush()) {
            tracing::debug!("json report write failed: {e}");
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// JSON form of one case report.
pub fn case_json(report: &CaseReport) -> Value {
    let mut value = json!({
        "event": "case",
        "id": report.id,
        "duration_ms": millis(report.duration),
    });

    let fields = match &report.outcome {
        CaseOutcome::Checked(o) => json!({
            "status": if o.passed { "passed" } else { "failed" },
            "exit_status": o.exit_status,
            "mismatch": o.mismatch.as_ref().map(mismatch_json),
        }),
        CaseOutcome::LaunchFailure(msg) => json!({ "status": "launch_failure", "reason": msg }),
        CaseOutcome::TimedOut(limit) => json!({ "status": "timed_out", "limit_ms": millis(*limit) }),
        CaseOutcome::Skipped(reason) => json!({ "status": "skipped", "reason": reason }),
    };

    if let (Some(target), Value::Object(extra)) = (value.as_object_mut(), fields) {
        target.extend(extra);
    }
    value
}

fn mismatch_json(detail: &MismatchDetail) -> Value {
    let stream = |m: &crate::oracle::StreamMismatch| json!({ "expected": m.expected, "actual": m.actual });
    json!({
        "stdout": detail.stdout.as_ref().map(stream),
        "stderr": detail.stderr.as_ref().map(stream),
        "exit": detail.exit.map(|e| json!({ "expected": e.expected, "actual": e.actual })),
    })
}

/// JSON form of the run summary.
pub fn summary_json(summary: &RunSummary) -> Value {
    json!({
        "event": "summary",
        "harness_version": HARNESS_VERSION,
        "success": summary.is_success(),
        "total": summary.total,
        "passed": summary.passed,
        "failed": summary.failed,
        "launch_failures": summary.launch_failures,
        "timed_out": summary.timed_out,
        "skipped": summary.skipped,
        "duration_ms": millis(summary.duration),
    })
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn on_case_complete(&mut self, report: &CaseReport) {
        self.emit(&case_json(report));
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        self.emit(&summary_json(summary));
    }
}

// ============================================================================
// Tests
// ============================================================================
