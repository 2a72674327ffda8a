//! Bounded retry and fetch failure classification.
//!
//! The three concerns stay separate: [`RetryPolicy`] owns how many attempts
//! and how long to wait, the operation closure owns how one attempt runs,
//! and [`is_transient_fetch_error`] owns what counts as worth retrying.

use std::thread;
use std::time::{Duration, Instant};

use crate::git::{GitError, GitRunner};
use crate::{swlog_debug, Error};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Lowercase stderr fragments that mean another fetch would fail the same way.
const PERMANENT_FETCH_PATTERNS: &[&str] = &[
    "couldn't find remote ref",
    "not found",
    "does not appear to be a git repository",
    "permission denied",
    "authentication failed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchVerdict {
    Transient,
    Permanent,
}

/// Map raw fetch stderr to a verdict.
pub fn classify_stderr(stderr: &str) -> FetchVerdict {
    let stderr = stderr.to_lowercase();
    if PERMANENT_FETCH_PATTERNS
        .iter()
        .any(|pattern| stderr.contains(pattern))
    {
        FetchVerdict::Permanent
    } else {
        FetchVerdict::Transient
    }
}

/// Whether a fetch failure is worth retrying.
///
/// No error means nothing to retry. Errors that carry no git output are
/// assumed transient.
pub fn is_transient_fetch_error(err: Option<&(dyn std::error::Error + 'static)>) -> bool {
    let Some(err) = err else {
        return false;
    };
    match find_git_error(err) {
        Some(git) => classify_stderr(&git.stderr) == FetchVerdict::Transient,
        None => true,
    }
}

fn find_git_error<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a GitError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(git) = e.downcast_ref::<GitError>() {
            return Some(git);
        }
        // `Error::Git` is transparent, so its source chain skips the GitError.
        if let Some(git) = e.downcast_ref::<Error>().and_then(Error::git_error) {
            return Some(git);
        }
        current = e.source();
    }
    None
}

/// Attempt bound plus a linearly growing delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    /// Upper bound on time spent across all attempts and sleeps.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            deadline: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Delay after the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    pub fn run<T, E, F, P>(&self, op: F, is_retryable: P) -> std::result::Result<T, E>
    where
        F: FnMut(u32) -> std::result::Result<T, E>,
        P: Fn(&E) -> bool,
    {
        self.run_with_sleeper(op, is_retryable, thread::sleep)
    }

    /// Like [`RetryPolicy::run`] with the sleep supplied by the caller.
    ///
    /// `op` receives the 1-based attempt number. Returns the first success,
    /// the first non-retryable error, or the last error once attempts or the
    /// deadline run out.
    pub fn run_with_sleeper<T, E, F, P, S>(
        &self,
        mut op: F,
        is_retryable: P,
        mut sleep: S,
    ) -> std::result::Result<T, E>
    where
        F: FnMut(u32) -> std::result::Result<T, E>,
        P: Fn(&E) -> bool,
        S: FnMut(Duration),
    {
        let attempts = self.attempts.max(1);
        let started = Instant::now();
        let mut slept = Duration::ZERO;
        let mut attempt = 1;

        loop {
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt >= attempts || !is_retryable(&err) {
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            if let Some(deadline) = self.deadline {
                let used = started.elapsed().max(slept);
                if used + delay > deadline {
                    swlog_debug!(
                        "retry deadline {:?} reached after attempt {}",
                        deadline,
                        attempt
                    );
                    return Err(err);
                }
            }
            sleep(delay);
            slept += delay;
            attempt += 1;
        }
    }
}

/// `git fetch <remote> <refname>`, retried while failures look transient.
pub fn fetch_with_retry<G: GitRunner + ?Sized>(
    git: &G,
    policy: &RetryPolicy,
    remote: &str,
    refname: &str,
) -> std::result::Result<(), GitError> {
    fetch_with_retry_sleeping(git, policy, remote, refname, thread::sleep)
}

pub fn fetch_with_retry_sleeping<G, S>(
    git: &G,
    policy: &RetryPolicy,
    remote: &str,
    refname: &str,
    sleep: S,
) -> std::result::Result<(), GitError>
where
    G: GitRunner + ?Sized,
    S: FnMut(Duration),
{
    policy.run_with_sleeper(
        |attempt| {
            swlog_debug!("fetch {} {} (attempt {})", remote, refname, attempt);
            git.run(&["fetch", remote, refname]).map(|_| ())
        },
        |err: &GitError| is_transient_fetch_error(Some(err)),
        sleep,
    )
}
