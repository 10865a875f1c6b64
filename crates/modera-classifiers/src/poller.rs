//! Job Poller
//!
//! Waits on a pollable job with scheduled wakeups until it reaches a terminal
//! status, the poll timeout elapses, or the workflow cancels it.

use modera_core::Outcome;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::adapter::{JobStatus, PollableJob};
use crate::backend::BackendError;
use crate::retry::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Clone)]
pub struct JobPoller {
    interval: Duration,
    timeout: Duration,
    /// Consecutive transient status-check failures tolerated
    max_status_errors: u32,
}

impl JobPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            max_status_errors: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_status_errors(mut self, max_status_errors: u32) -> Self {
        self.max_status_errors = max_status_errors.max(1);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `job` until it is terminal.
    ///
    /// Cancellation is checked before every status query; once cancelled no
    /// further queries are issued and the outcome is `TimedOut`.
    #[tracing::instrument(skip(self, job, cancel), fields(branch = %job.branch, job_id = %job.job_id))]
    pub async fn poll(&self, job: PollableJob, cancel: CancellationToken) -> Outcome {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut ticker = interval_at(started + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut status_errors = 0;
        let mut checks: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(checks = checks, "Polling cancelled");
                    return Outcome::TimedOut;
                }
                _ = sleep_until(deadline) => {
                    tracing::warn!(
                        checks = checks,
                        timeout_secs = self.timeout.as_secs(),
                        "Job did not finish before poll timeout"
                    );
                    return Outcome::TimedOut;
                }
                _ = ticker.tick() => {}
            }

            if cancel.is_cancelled() {
                return Outcome::TimedOut;
            }

            checks += 1;
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Outcome::TimedOut,
                _ = sleep_until(deadline) => return Outcome::TimedOut,
                status = job.source.status(&job.job_id) => status,
            };

            match status {
                Ok(JobStatus::InProgress) => {
                    status_errors = 0;
                    tracing::debug!(checks = checks, "Job still in progress");
                }
                Ok(JobStatus::Succeeded(findings)) => {
                    tracing::info!(
                        checks = checks,
                        findings = findings.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Job succeeded"
                    );
                    return Outcome::success(findings);
                }
                Ok(JobStatus::Failed(message)) => {
                    tracing::warn!(checks = checks, error = %message, "Job failed");
                    return Outcome::backend_error(message);
                }
                Err(err @ BackendError::Transient(_)) => {
                    status_errors += 1;
                    tracing::warn!(
                        attempt = status_errors,
                        error = %err,
                        "Job status check failed"
                    );
                    if status_errors >= self.max_status_errors {
                        return err.into_outcome();
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Job status check failed permanently");
                    return err.into_outcome();
                }
            }
        }
    }
}
