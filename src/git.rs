//! Git command execution.
//!
//! Branch mutations run through the `git` executable with the working
//! directory pinned to the repository root. A failed command comes back as a
//! [`GitError`] holding the raw stdout and stderr; this layer never reads
//! stderr to decide what a failure means. Callers do that.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::{swlog_debug, swlog_trace, Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long to keep reading pipes once the child has exited or been killed.
const DRAIN_GRACE: Duration = Duration::from_millis(50);

/// Captured output of a successful git command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Why a git invocation did not succeed.
#[derive(Debug)]
pub enum GitFailure {
    /// The process ran and exited nonzero (`None` if killed by a signal).
    Exit { code: Option<i32> },
    /// The process could not be started.
    Spawn(std::io::Error),
    /// The process was killed after exceeding its deadline.
    TimedOut(Duration),
}

impl fmt::Display for GitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitFailure::Exit { code: Some(code) } => write!(f, "exit status {}", code),
            GitFailure::Exit { code: None } => write!(f, "terminated by signal"),
            GitFailure::Spawn(e) => write!(f, "failed to start git: {}", e),
            GitFailure::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
        }
    }
}

/// A failed git command with its raw output, uninterpreted.
#[derive(Debug)]
pub struct GitError {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub failure: GitFailure,
}

impl GitError {
    pub fn new(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        failure: GitFailure,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            failure,
        }
    }
}

impl fmt::Display for GitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stderr.is_empty() {
            write!(f, "{}: {}", self.command, self.failure)
        } else {
            write!(f, "{}: {}", self.command, self.stderr)
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.failure {
            GitFailure::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Name a git invocation by its first non-flag argument.
pub fn command_name(args: &[&str]) -> String {
    args.iter()
        .find(|arg| !arg.starts_with('-'))
        .or_else(|| args.first())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Something that can run git commands against one repository.
///
/// [`GitCli`] is the real implementation. The provided methods are the
/// read-only queries the lifecycle controller needs.
pub trait GitRunner: Send + Sync {
    fn run(&self, args: &[&str]) -> std::result::Result<GitOutput, GitError>;

    /// Whether a local branch exists. Any failure counts as "no".
    fn branch_exists(&self, branch: &str) -> bool {
        let refname = format!("refs/heads/{}", branch);
        self.run(&["show-ref", "--verify", "--quiet", &refname])
            .is_ok()
    }

    fn current_branch(&self) -> std::result::Result<String, GitError> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
            .map(|out| out.stdout)
    }

    /// Paths in the unmerged state, from porcelain output rather than stderr.
    fn conflicting_files(&self) -> std::result::Result<Vec<String>, GitError> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

/// Runs the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
    program: PathBuf,
    timeout: Option<Duration>,
}

impl GitCli {
    pub fn new(repo_root: &Path) -> Result<Self> {
        let program = which::which("git").map_err(|e| Error::GitNotInstalled(e.to_string()))?;
        swlog_debug!(
            "GitCli::new repo={} git={}",
            repo_root.display(),
            program.display()
        );
        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            program,
            timeout: None,
        })
    }

    /// Kill any command still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(&self.repo_root)
            // Never block on a credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl GitRunner for GitCli {
    fn run(&self, args: &[&str]) -> std::result::Result<GitOutput, GitError> {
        swlog_trace!("git {}", args.join(" "));
        let command = command_name(args);
        let cmd = self.command(args);

        let captured = match self.timeout {
            Some(limit) => wait_with_deadline(cmd, limit),
            None => wait(cmd),
        }
        .map_err(|e| GitError::new(&command, "", "", GitFailure::Spawn(e)))?;

        let stdout = String::from_utf8_lossy(&captured.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&captured.stderr).trim().to_string();

        match captured.status {
            Some(status) if status.success() => Ok(GitOutput { stdout, stderr }),
            Some(status) => {
                swlog_debug!("git {} failed: {}", command, stderr);
                Err(GitError::new(
                    command,
                    stdout,
                    stderr,
                    GitFailure::Exit {
                        code: status.code(),
                    },
                ))
            }
            None => Err(GitError::new(
                command,
                stdout,
                stderr,
                GitFailure::TimedOut(self.timeout.unwrap_or_default()),
            )),
        }
    }
}

struct Captured {
    /// `None` when the process was killed at its deadline.
    status: Option<ExitStatus>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn wait(mut cmd: Command) -> std::io::Result<Captured> {
    let output = cmd.output()?;
    Ok(Captured {
        status: Some(output.status),
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

fn wait_with_deadline(mut cmd: Command, limit: Duration) -> std::io::Result<Captured> {
    let started = Instant::now();
    let deadline = started + limit;
    let mut child = cmd.spawn()?;

    let stdout = PipeReader::spawn(child.stdout.take());
    let stderr = PipeReader::spawn(child.stderr.take());

    loop {
        if let Some(status) = child.try_wait()? {
            // A grandchild (ssh, credential helper) may keep the pipes open
            // after git exits; stop reading at the deadline either way.
            let drain_until = deadline.max(Instant::now() + DRAIN_GRACE);
            return Ok(Captured {
                status: Some(status),
                stdout: stdout.collect(drain_until),
                stderr: stderr.collect(drain_until),
            });
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            let drain_until = Instant::now() + DRAIN_GRACE;
            return Ok(Captured {
                status: None,
                stdout: stdout.collect(drain_until),
                stderr: stderr.collect(drain_until),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Reads one child pipe on its own thread into a shared buffer, so partial
/// output is available even if the pipe never reaches EOF.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&buf);
        thread::spawn(move || {
            if let Some(mut pipe) = pipe {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => sink
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            }
            let _ = tx.send(());
        });
        Self { buf, done }
    }

    /// Wait for EOF until `until`, then take whatever has been read.
    fn collect(self, until: Instant) -> Vec<u8> {
        if self
            .done
            .recv_timeout(until.saturating_duration_since(Instant::now()))
            .is_err()
        {
            swlog_debug!("pipe still open at deadline, keeping partial output");
        }
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buf)
    }
}
