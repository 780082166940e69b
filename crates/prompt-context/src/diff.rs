//! Diff runner and default argument policy
//!
//! `DiffRunner` is the seam between rendering and version control. The
//! default-argument revision check goes through the same trait so tests can replace
//! both with one mock.

use crate::error::{ContextError, ContextResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Git's well-known empty tree object
pub const EMPTY_TREE_HASH: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Preferred comparison base when the current revision has a parent
pub const PARENT_REVISION: &str = "HEAD~1";

/// How often a running child is checked for exit, cancellation and timeout
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `git diff` and answers revision-existence checks.
///
/// Implementations never panic; every failure is a `DiffExecution` error
/// carrying a human-readable message. Cancellation is owned by the caller.
#[cfg_attr(test, mockall::automock)]
pub trait DiffRunner {
    /// Run `diff` with `args`, returning stdout verbatim
    fn run(&self, cancel: &CancellationToken, args: &[String]) -> ContextResult<String>;

    /// Whether `rev` resolves to an object in the repository
    fn revision_exists(&self, cancel: &CancellationToken, rev: &str) -> bool;
}

impl<T: DiffRunner + ?Sized> DiffRunner for &T {
    fn run(&self, cancel: &CancellationToken, args: &[String]) -> ContextResult<String> {
        (**self).run(cancel, args)
    }

    fn revision_exists(&self, cancel: &CancellationToken, rev: &str) -> bool {
        (**self).revision_exists(cancel, rev)
    }
}

impl<T: DiffRunner + ?Sized> DiffRunner for Rc<T> {
    fn run(&self, cancel: &CancellationToken, args: &[String]) -> ContextResult<String> {
        (**self).run(cancel, args)
    }

    fn revision_exists(&self, cancel: &CancellationToken, rev: &str) -> bool {
        (**self).revision_exists(cancel, rev)
    }
}

// ============================================================================
// Default argument policy
// ============================================================================

/// Arguments used when the caller supplies none: the parent revision if it
/// exists, otherwise the empty tree against `HEAD` (the whole history as one
/// diff).
pub fn default_diff_args<R: DiffRunner + ?Sized>(runner: &R, cancel: &CancellationToken) -> Vec<String> {
    if runner.revision_exists(cancel, PARENT_REVISION) {
        vec![PARENT_REVISION.to_string()]
    } else {
        vec![EMPTY_TREE_HASH.to_string(), "HEAD".to_string()]
    }
}

/// Final argument vector for a lazy diff.
///
/// `None` and empty vectors fall back to [`default_diff_args`]. A lone
/// `HEAD~1` is upgraded to the empty-tree form when there is no parent
/// revision, since single-commit repositories would otherwise fail.
pub fn resolve_diff_args<R: DiffRunner + ?Sized>(
    runner: &R,
    cancel: &CancellationToken,
    coerced: Option<Vec<String>>,
) -> Vec<String> {
    let Some(mut args) = coerced else {
        return default_diff_args(runner, cancel);
    };

    if args.len() == 1 && args[0].trim() == PARENT_REVISION {
        let defaults = default_diff_args(runner, cancel);
        if defaults.len() == 2 && defaults[0] != PARENT_REVISION {
            debug!(?defaults, "no parent revision, escalating HEAD~1 to empty tree");
            args = defaults;
        }
    }

    if args.is_empty() {
        args = default_diff_args(runner, cancel);
    }
    args
}

// ============================================================================
// Git subprocess runner
// ============================================================================

/// Process-level failures, before stderr is folded in
#[derive(Error, Debug)]
enum ProcessError {
    #[error("{command} cancelled")]
    Cancelled { command: String },

    #[error("{command} timed out after {seconds}s")]
    TimedOut { command: String, seconds: u64 },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

struct Captured {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// `DiffRunner` backed by the git executable
#[derive(Debug, Clone)]
pub struct GitDiffRunner {
    git_binary: PathBuf,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Default for GitDiffRunner {
    fn default() -> Self {
        Self {
            git_binary: PathBuf::from("git"),
            working_dir: None,
            timeout: None,
        }
    }
}

impl GitDiffRunner {
    /// Runner using `git` from `PATH` in the current directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git inside this directory
    pub fn with_working_dir(mut self, working_dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(working_dir.as_ref().to_path_buf());
        self
    }

    /// Use a different git executable
    pub fn with_git_binary(mut self, git_binary: impl Into<PathBuf>) -> Self {
        self.git_binary = git_binary.into();
        self
    }

    /// Kill git if it runs longer than this
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.git_binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run git to completion, honouring cancellation and the timeout
    fn execute(&self, cancel: &CancellationToken, args: &[&str]) -> Result<Captured, ProcessError> {
        let command = format!("git {}", args.first().copied().unwrap_or_default());
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled { command });
        }

        let mut child = self.command(args).spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                terminate(&mut child);
                return Err(ProcessError::Cancelled { command });
            }
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    terminate(&mut child);
                    return Err(ProcessError::TimedOut {
                        command,
                        seconds: limit.as_secs(),
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(Captured {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

impl DiffRunner for GitDiffRunner {
    fn run(&self, cancel: &CancellationToken, args: &[String]) -> ContextResult<String> {
        let mut argv: Vec<&str> = Vec::with_capacity(args.len() + 1);
        argv.push("diff");
        argv.extend(args.iter().map(String::as_str));
        debug!(args = ?args, "running git diff");

        match self.execute(cancel, &argv) {
            Ok(out) if out.status.success() => Ok(String::from_utf8_lossy(&out.stdout).into_owned()),
            Ok(out) => Err(ContextError::diff_execution(failure_message(
                &String::from_utf8_lossy(&out.stderr),
                &exit_description(out.status),
            ))),
            Err(e) => Err(ContextError::diff_execution(failure_message("", &e.to_string()))),
        }
    }

    fn revision_exists(&self, cancel: &CancellationToken, rev: &str) -> bool {
        match self.execute(cancel, &["rev-parse", "-q", "--verify", rev]) {
            Ok(out) => out.status.success(),
            Err(e) => {
                debug!(rev, error = %e, "revision check failed");
                false
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn exit_description(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// stderr and the process-level error joined by a space, trimmed
fn failure_message(stderr: &str, process_error: &str) -> String {
    format!("{} {}", stderr, process_error).trim().to_string()
}
