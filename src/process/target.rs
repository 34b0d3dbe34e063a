//! The external interpreter under test.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::{ExecutionResult, InvokeError, LineEndings, ScriptRunner};

/// Path to the target interpreter plus capture settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetExecutable {
    path: PathBuf,
    line_endings: LineEndings,
}

impl TargetExecutable {
    /// Resolve a user-supplied target path.
    ///
    /// A bare command name that does not exist relative to the working directory is looked up on `PATH`.
    /// Everything else is made absolute. A missing target is not rejected here; each case reports it as a
    /// launch failure.
    pub fn resolve(raw: impl AsRef<Path>) -> Self {
        let raw = raw.as_ref();
        let is_bare = raw.parent().is_none_or(|p| p.as_os_str().is_empty());

        let path = if is_bare && !raw.exists() {
            which::which(raw).unwrap_or_else(|_| absolute(raw))
        } else {
            absolute(raw)
        };

        if !path.is_file() {
            warn!("target '{}' not found; every case will fail to launch", path.display());
        }

        Self {
            path,
            line_endings: LineEndings::default(),
        }
    }

    pub fn with_line_endings(mut self, line_endings: LineEndings) -> Self {
        self.line_endings = line_endings;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScriptRunner for TargetExecutable {
    #[tracing::instrument(skip_all, fields(script = %script.display()))]
    fn run(&self, script: &Path, limit: Option<Duration>) -> Result<ExecutionResult, InvokeError> {
        ensure_readable(script)?;

        let start = Instant::now();
        let mut child = Command::new(&self.path)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| InvokeError::Launch {
                target: self.path.clone(),
                source,
            })?;
        debug!(pid = child.id(), "spawned target");

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let deadline = limit.map(|limit| start + limit);
        let timed_out = |limit: Duration| {
            warn!("target timed out after {:?}", limit);
            InvokeError::TimedOut {
                script: script.to_path_buf(),
                limit,
            }
        };

        let status = match limit {
            Some(limit) => match child.wait_timeout(limit).map_err(InvokeError::Capture)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Readers are left to finish on their own: a grandchild may still hold the pipes open.
                    return Err(timed_out(limit));
                }
            },
            None => child.wait().map_err(InvokeError::Capture)?,
        };

        // A grandchild that inherited the pipes keeps them open after the target exits; the deadline covers it too.
        let (Some(stdout), Some(stderr)) = (collect(&stdout, deadline)?, collect(&stderr, deadline)?) else {
            return Err(timed_out(limit.unwrap_or_default()));
        };
        let duration = start.elapsed();
        let elapsed_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        debug!(code = ?status.code(), elapsed_ms, "target exited");

        Ok(ExecutionResult {
            stdout: self.line_endings.apply(stdout),
            stderr: self.line_endings.apply(stderr),
            exit_status: status.code(),
            duration,
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn ensure_readable(script: &Path) -> Result<(), InvokeError> {
    let missing = || InvokeError::ScriptMissing(script.to_path_buf());
    let meta = fs::metadata(script).map_err(|_| missing())?;
    if !meta.is_file() {
        return Err(missing());
    }
    fs::File::open(script).map_err(|_| missing())?;
    Ok(())
}

type Drained = io::Result<Vec<u8>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Drained> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = match pipe {
            Some(mut pipe) => pipe.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send(result);
    });
    rx
}

/// Wait for a reader to hit EOF; `None` once `deadline` has passed first.
fn collect(reader: &Receiver<Drained>, deadline: Option<Instant>) -> Result<Option<String>, InvokeError> {
    let lost = || InvokeError::Capture(io::Error::other("output reader panicked"));
    let drained = match deadline {
        Some(deadline) => match reader.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(drained) => drained,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => return Err(lost()),
        },
        None => reader.recv().map_err(|_| lost())?,
    };
    let bytes = drained.map_err(InvokeError::Capture)?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

// ============================================================================
// Tests
// ============================================================================
