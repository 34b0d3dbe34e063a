//! Suite runner: drives selected cases through the target and the oracle.
//!
//! ## Execution
//!
//! With one job, cases run strictly in order on the calling thread. With more, a bounded set of scoped workers
//! pull cases from a shared cursor; every case still gets its own child process, and reports are re-sequenced so
//! the reporter sees them in fixture order either way.
//!
//! ## Failure handling
//!
//! Skipped cases are never executed. A launch failure or a timeout ends only its own case. No retries. With
//! `stop_on_fail`, no new case starts after the first one that did not pass.
//!
//! Reporting is separated from execution via the [`Reporter`] trait in [`report`].

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod report;

pub use report::{ConsoleReporter, JsonReporter, Reporter};

use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::fixtures::TestCase;
use crate::fixtures::builtin::SCRIPTS_ROOT;
use crate::oracle::{self, AssertionOutcome, ExitPolicy};
use crate::process::{InvokeError, ScriptRunner};

/// Default per-case deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory that fixture script paths are relative to
    pub scripts_root: PathBuf,
    /// Per-case deadline; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Number of cases in flight at once
    pub jobs: usize,
    pub stop_on_fail: bool,
    pub exit_policy: ExitPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            scripts_root: PathBuf::from(SCRIPTS_ROOT),
            timeout: Some(DEFAULT_TIMEOUT),
            jobs: 1,
            stop_on_fail: false,
            exit_policy: ExitPolicy::Ignore,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scripts_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scripts_root = root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the worker count; zero is treated as one.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_stop_on_fail(mut self, stop: bool) -> Self {
        self.stop_on_fail = stop;
        self
    }

    pub fn with_exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.exit_policy = policy;
        self
    }
}

/// What happened to one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    /// The target ran; the oracle judged its output
    Checked(AssertionOutcome),
    /// No result could be produced
    LaunchFailure(String),
    /// The deadline passed and the target was killed
    TimedOut(Duration),
    /// Statically excluded
    Skipped(String),
}

/// Per-case entry in the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    pub id: String,
    pub outcome: CaseOutcome,
    pub duration: Duration,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        matches!(&self.outcome, CaseOutcome::Checked(o) if o.passed)
    }

    /// Counts against the run: a mismatch, a launch failure or a timeout.
    pub fn is_failure(&self) -> bool {
        !self.passed() && !matches!(self.outcome, CaseOutcome::Skipped(_))
    }
}

/// Aggregate of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub launch_failures: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub duration: Duration,
    pub reports: Vec<CaseReport>,
}

impl RunSummary {
    fn record(&mut self, report: CaseReport) {
        self.total += 1;
        match &report.outcome {
            CaseOutcome::Checked(o) if o.passed => self.passed += 1,
            CaseOutcome::Checked(_) => self.failed += 1,
            CaseOutcome::LaunchFailure(_) => self.launch_failures += 1,
            CaseOutcome::TimedOut(_) => self.timed_out += 1,
            CaseOutcome::Skipped(_) => self.skipped += 1,
        }
        self.reports.push(report);
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.launch_failures == 0 && self.timed_out == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.reports.iter().filter(|r| r.is_failure())
    }
}

/// Run `cases` through `runner` and report each result.
pub fn run_suite<R>(
    cases: &[&TestCase],
    runner: &R,
    options: &RunOptions,
    reporter: &mut dyn Reporter,
) -> RunSummary
where
    R: ScriptRunner + Sync,
{
    let start = Instant::now();
    reporter.on_collection_complete(cases.len());
    tracing::debug!(cases = cases.len(), jobs = options.jobs, "starting run");

    let mut summary = RunSummary::default();
    let mut emit = |report: CaseReport| {
        reporter.on_case_complete(&report);
        summary.record(report);
    };

    if options.jobs <= 1 || cases.len() <= 1 {
        for case in cases {
            let report = run_case(case, runner, options);
            let stop = options.stop_on_fail && report.is_failure();
            emit(report);
            if stop {
                break;
            }
        }
    } else {
        run_parallel(cases, runner, options, &mut emit);
    }

    summary.duration = start.elapsed();
    reporter.on_run_complete(&summary);
    summary
}

fn run_parallel<R>(cases: &[&TestCase], runner: &R, options: &RunOptions, emit: &mut dyn FnMut(CaseReport))
where
    R: ScriptRunner + Sync,
{
    let cursor = AtomicUsize::new(0);
    let stopped = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<(usize, CaseReport)>();

    thread::scope(|scope| {
        for _ in 0..options.jobs.min(cases.len()) {
            let tx = tx.clone();
            let cursor = &cursor;
            let stopped = &stopped;
            scope.spawn(move || {
                loop {
                    if stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(case) = cases.get(index) else {
                        break;
                    };
                    let report = run_case(case, runner, options);
                    if options.stop_on_fail && report.is_failure() {
                        stopped.store(true, Ordering::SeqCst);
                    }
                    if tx.send((index, report)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        // Claimed indices form a prefix, so re-sequencing never waits on a case that will not run.
        let mut pending = BTreeMap::new();
        let mut next = 0;
        for (index, report) in rx {
            pending.insert(index, report);
            while let Some(report) = pending.remove(&next) {
                emit(report);
                next += 1;
            }
        }
    });
}

/// Execute and judge a single case.
pub fn run_case<R: ScriptRunner + ?Sized>(case: &TestCase, runner: &R, options: &RunOptions) -> CaseReport {
    let id = case.id();
    if let Some(reason) = &case.skip {
        return CaseReport {
            id,
            outcome: CaseOutcome::Skipped(reason.clone()),
            duration: Duration::ZERO,
        };
    }

    let start = Instant::now();
    let script = options.scripts_root.join(&case.script_path);
    let outcome = match runner.run(&script, options.timeout) {
        Ok(result) => CaseOutcome::Checked(oracle::check(case, &result, options.exit_policy)),
        Err(InvokeError::TimedOut { limit, .. }) => CaseOutcome::TimedOut(limit),
        Err(err) => {
            tracing::warn!(case = %id, "launch failure: {}", describe(&err));
            CaseOutcome::LaunchFailure(describe(&err))
        }
    };

    CaseReport {
        id,
        outcome,
        duration: start.elapsed(),
    }
}

/// Error message followed by its source chain.
fn describe(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureStore, Selection};
    use crate::process::ExecutionResult;
    use std::collections::HashMap;
    use std::io;
    use std::path::Path;
    use std::sync::Mutex;

    /// Canned results keyed by script path, recording every invocation.
    #[derive(Default)]
    struct FakeTarget {
        results: HashMap<PathBuf, (String, String, i32)>,
        delays: HashMap<PathBuf, Duration>,
        calls: Mutex<Vec<PathBuf>>,
    }

    impl FakeTarget {
        /// Answers every builtin case with its own goldens.
        fn conforming(store: &FixtureStore, root: &Path) -> Self {
            let results = store
                .iter()
                .map(|c| {
                    (
                        root.join(&c.script_path),
                        (
                            c.expected_stdout.clone(),
                            c.expected_stderr.clone(),
                            c.expected_exit.unwrap_or(0),
                        ),
                    )
                })
                .collect();
            Self {
                results,
                delays: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn slow(mut self, script: PathBuf, delay: Duration) -> Self {
            self.delays.insert(script, delay);
            self
        }

        fn answer(mut self, root: &Path, script: &str, stdout: &str, stderr: &str, exit: i32) -> Self {
            self.results
                .insert(root.join(script), (stdout.to_string(), stderr.to_string(), exit));
            self
        }

        fn calls(&self) -> Vec<PathBuf> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ScriptRunner for FakeTarget {
        fn run(&self, script: &Path, limit: Option<Duration>) -> Result<ExecutionResult, InvokeError> {
            self.calls.lock().unwrap().push(script.to_path_buf());
            if let Some(delay) = self.delays.get(script) {
                std::thread::sleep(*delay);
            }
            if script.ends_with("hang.lox") {
                return Err(InvokeError::TimedOut {
                    script: script.to_path_buf(),
                    limit: limit.unwrap_or_default(),
                });
            }
            let Some((stdout, stderr, exit)) = self.results.get(script) else {
                return Err(InvokeError::Launch {
                    target: PathBuf::from("fake"),
                    source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
                });
            };
            Ok(ExecutionResult {
                stdout: stdout.clone(),
                stderr: stderr.clone(),
                exit_status: Some(*exit),
                duration: Duration::from_millis(1),
            })
        }
    }

    /// Collects reports in the order the runner emits them.
    #[derive(Default)]
    struct Recording {
        collected: usize,
        ids: Vec<String>,
        finished: bool,
    }

    impl Reporter for Recording {
        fn on_collection_complete(&mut self, count: usize) {
            self.collected = count;
        }

        fn on_case_complete(&mut self, report: &CaseReport) {
            self.ids.push(report.id.clone());
        }

        fn on_run_complete(&mut self, _summary: &RunSummary) {
            self.finished = true;
        }
    }

    fn root() -> PathBuf {
        PathBuf::from("lox_scripts")
    }

    #[test]
    fn test_conforming_target_passes_everything() {
        let store = FixtureStore::builtin();
        let target = FakeTarget::conforming(&store, &root());
        let cases: Vec<&TestCase> = store.iter().collect();
        let mut reporter = Recording::default();

        let summary = run_suite(&cases, &target, &RunOptions::new(), &mut reporter);
        assert!(summary.is_success());
        assert_eq!(summary.total, 23);
        assert_eq!(summary.passed, 22);
        assert_eq!(summary.skipped, 1);
        assert_eq!(reporter.collected, 23);
        assert!(reporter.finished);
        // one invocation per executed case, none for the skipped one
        assert_eq!(target.calls().len(), 22);
        assert!(!target.calls().contains(&root().join("call/object.lox")));
    }

    #[test]
    fn test_mismatch_does_not_abort_suite() {
        let store = FixtureStore::builtin();
        let target = FakeTarget::conforming(&store, &root()).answer(&root(), "bool/not.lox", "true\n", "", 0);
        let cases = store.select(&Selection::default()).unwrap();

        let summary = run_suite(&cases, &target, &RunOptions::new(), &mut Recording::default());
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.passed, 21);
        let failed: Vec<&str> = summary.failures().map(|r| r.id.as_str()).collect();
        assert_eq!(failed, ["bool::not"]);
    }

    #[test]
    fn test_launch_failure_is_per_case() {
        let store = FixtureStore::builtin();
        let mut target = FakeTarget::conforming(&store, &root());
        target.results.remove(&root().join("precedence.lox"));
        let cases: Vec<&TestCase> = store.iter().take(3).collect();

        let summary = run_suite(&cases, &target, &RunOptions::new(), &mut Recording::default());
        assert_eq!(summary.launch_failures, 1);
        assert_eq!(summary.passed, 2);
        let CaseOutcome::LaunchFailure(msg) = &summary.reports[1].outcome else {
            panic!("expected launch failure");
        };
        assert_eq!(msg, "failed to launch 'fake': no such file");
    }

    #[test]
    fn test_timeout_reported_with_limit() {
        let case = TestCase {
            group: "root".to_string(),
            name: "hang".to_string(),
            script_path: PathBuf::from("hang.lox"),
            expected_stdout: String::new(),
            expected_stderr: String::new(),
            expected_exit: None,
            skip: None,
        };
        let options = RunOptions::new().with_timeout(Some(Duration::from_millis(250)));
        let report = run_case(&case, &FakeTarget::default(), &options);
        assert_eq!(report.outcome, CaseOutcome::TimedOut(Duration::from_millis(250)));
        assert!(report.is_failure());
    }

    #[test]
    fn test_stop_on_fail_sequential() {
        let store = FixtureStore::builtin();
        let target = FakeTarget::conforming(&store, &root()).answer(&root(), "precedence.lox", "", "", 0);
        let cases: Vec<&TestCase> = store.iter().collect();
        let options = RunOptions::new().with_stop_on_fail(true);

        let summary = run_suite(&cases, &target, &options, &mut Recording::default());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(target.calls().len(), 2);
    }

    #[test]
    fn test_parallel_reports_in_fixture_order() {
        let store = FixtureStore::builtin();
        let target = FakeTarget::conforming(&store, &root());
        let cases: Vec<&TestCase> = store.iter().collect();
        let mut reporter = Recording::default();

        let summary = run_suite(&cases, &target, &RunOptions::new().with_jobs(4), &mut reporter);
        let expected: Vec<String> = store.iter().map(|c| c.id()).collect();
        assert_eq!(reporter.ids, expected);
        assert_eq!(summary.passed, 22);
        assert_eq!(target.calls().len(), 22);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let store = FixtureStore::builtin();
        let target = FakeTarget::conforming(&store, &root()).answer(&root(), "call/nil.lox", "nil\n", "", 0);
        let cases: Vec<&TestCase> = store.iter().collect();

        let sequential = run_suite(&cases, &target, &RunOptions::new(), &mut Recording::default());
        let parallel = run_suite(&cases, &target, &RunOptions::new().with_jobs(8), &mut Recording::default());
        let outcomes = |s: &RunSummary| s.reports.iter().map(|r| r.outcome.clone()).collect::<Vec<_>>();
        assert_eq!(outcomes(&sequential), outcomes(&parallel));
    }

    #[test]
    fn test_stop_on_fail_parallel_reports_in_order_prefix() {
        let store = FixtureStore::builtin();
        let cases: Vec<&TestCase> = store.iter().collect();
        // First case fails at once; every other case is still running when the failure lands.
        let mut target = FakeTarget::conforming(&store, &root()).answer(&root(), "empty_file.lox", "oops\n", "", 0);
        for case in &cases[1..] {
            target = target.slow(root().join(&case.script_path), Duration::from_millis(100));
        }
        let options = RunOptions::new().with_jobs(4).with_stop_on_fail(true);
        let mut reporter = Recording::default();

        let summary = run_suite(&cases, &target, &options, &mut reporter);
        let expected: Vec<String> = cases.iter().take(summary.total).map(|c| c.id()).collect();
        assert_eq!(reporter.ids, expected);
        assert_eq!(summary.reports[0].id, "empty_file");
        assert_eq!(summary.failed, 1);
        // Only the cases already claimed by the four workers ran, and every one of them was reported.
        assert!(summary.total <= 4, "ran {} cases", summary.total);
        assert_eq!(target.calls().len(), summary.total);
    }

    #[test]
    fn test_zero_jobs_means_one() {
        assert_eq!(RunOptions::new().with_jobs(0).jobs, 1);
    }

    #[test]
    fn test_scripts_root_is_prefixed() {
        let store = FixtureStore::builtin();
        let elsewhere = PathBuf::from("/srv/suite");
        let target = FakeTarget::conforming(&store, &elsewhere);
        let case = store.get("comments", "unicode").unwrap();

        let report = run_case(case, &target, &RunOptions::new().with_scripts_root(&elsewhere));
        assert!(report.passed());
        assert_eq!(target.calls(), [elsewhere.join("comments/unicode.lox")]);
    }
}
