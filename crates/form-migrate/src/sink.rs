//! Submission sink.
//!
//! Payloads are submitted on spawned tasks, with at most `concurrency` of
//! them in flight. [`SubmissionSink::send`] waits for a free slot, which is
//! what pushes back on the source when the destination is slow.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::warn;

use crate::client::{FormApi, SubmitResponse};
use crate::connectors::Record;
use crate::error::{Error, Result};

/// Per-record submission result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// 2xx response.
    Accepted,
    /// Non-2xx response.
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The request did not complete.
    TransportError(String),
}

impl SubmissionOutcome {
    /// Classifies the result of a submit call.
    #[must_use]
    pub fn classify(result: Result<SubmitResponse>) -> Self {
        match result {
            Ok(response) if response.is_success() => Self::Accepted,
            Ok(response) => Self::Rejected {
                status: response.status,
                body: response.body,
            },
            Err(e) => Self::TransportError(e.to_string()),
        }
    }
}

/// Migration statistics for one form.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MigrationStats {
    /// Records read from the source.
    pub read: u64,
    /// Records dropped by the transformer.
    pub skipped: u64,
    /// Payloads handed to the destination.
    pub submitted: u64,
    /// 2xx responses.
    pub accepted: u64,
    /// Non-2xx responses.
    pub rejected: u64,
    /// Submissions that never got a response.
    pub transport_errors: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl MigrationStats {
    /// Submissions that did not succeed.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.rejected + self.transport_errors
    }

    /// Calculate throughput (accepted records per second).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.accepted as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    /// Adds another form's counters to these.
    pub fn absorb(&mut self, other: &Self) {
        self.read += other.read;
        self.skipped += other.skipped;
        self.submitted += other.submitted;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.transport_errors += other.transport_errors;
        self.duration_secs += other.duration_secs;
    }

    fn count(&mut self, outcome: &SubmissionOutcome) {
        match outcome {
            SubmissionOutcome::Accepted => self.accepted += 1,
            SubmissionOutcome::Rejected { .. } => self.rejected += 1,
            SubmissionOutcome::TransportError(_) => self.transport_errors += 1,
        }
    }
}

/// Bounded concurrent submitter for one destination form.
pub struct SubmissionSink {
    api: Arc<dyn FormApi>,
    form: Arc<str>,
    slots: Arc<Semaphore>,
    tasks: JoinSet<SubmissionOutcome>,
    progress: ProgressBar,
    stats: MigrationStats,
}

impl SubmissionSink {
    /// Creates a sink submitting to `form` with at most `concurrency`
    /// requests in flight.
    #[must_use]
    pub fn new(api: Arc<dyn FormApi>, form: &str, concurrency: usize) -> Self {
        Self {
            api,
            form: Arc::from(form),
            slots: Arc::new(Semaphore::new(concurrency.max(1))),
            tasks: JoinSet::new(),
            progress: ProgressBar::hidden(),
            stats: MigrationStats::default(),
        }
    }

    /// Draws a spinner that ticks once per accepted submission.
    #[must_use]
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = if enabled {
            create_progress_bar(&self.form)
        } else {
            ProgressBar::hidden()
        };
        self
    }

    /// Queues one payload, waiting while all slots are busy.
    ///
    /// # Errors
    ///
    /// Returns an error only if the slot semaphore was closed.
    pub async fn send(&mut self, payload: Record) -> Result<()> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| Error::Internal(format!("submission slots closed: {e}")))?;

        self.reap();
        self.stats.submitted += 1;

        let api = Arc::clone(&self.api);
        let form = Arc::clone(&self.form);
        let progress = self.progress.clone();

        self.tasks.spawn(async move {
            let outcome = SubmissionOutcome::classify(api.submit(&form, &payload).await);
            drop(permit);
            report(&outcome, &payload, &progress);
            outcome
        });

        Ok(())
    }

    /// Waits for every queued submission and returns the counters.
    pub async fn finish(mut self) -> MigrationStats {
        while let Some(joined) = self.tasks.join_next().await {
            self.record(joined);
        }
        self.progress.finish_and_clear();
        self.stats
    }

    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.record(joined);
        }
    }

    fn record(&mut self, joined: std::result::Result<SubmissionOutcome, JoinError>) {
        let outcome = joined.unwrap_or_else(|e| {
            warn!("Submission task failed: {}", e);
            SubmissionOutcome::TransportError(e.to_string())
        });
        self.stats.count(&outcome);
    }
}

fn report(outcome: &SubmissionOutcome, payload: &Record, progress: &ProgressBar) {
    match outcome {
        SubmissionOutcome::Accepted => progress.inc(1),
        SubmissionOutcome::Rejected { status, body } => {
            warn!(status = *status, payload = ?payload, "Submission rejected: {}", body);
        }
        SubmissionOutcome::TransportError(e) => {
            warn!(payload = ?payload, "Submission failed: {}", e);
        }
    }
}

fn create_progress_bar(form: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} submitted to {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(form.to_string());

    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_outcomes() {
        let ok = SubmissionOutcome::classify(Ok(SubmitResponse {
            status: 201,
            body: "{}".into(),
        }));
        assert_eq!(ok, SubmissionOutcome::Accepted);

        let rejected = SubmissionOutcome::classify(Ok(SubmitResponse {
            status: 422,
            body: "invalid".into(),
        }));
        assert_eq!(
            rejected,
            SubmissionOutcome::Rejected {
                status: 422,
                body: "invalid".into()
            }
        );

        let transport = SubmissionOutcome::classify(Err(Error::SourceStream("reset".into())));
        assert!(matches!(transport, SubmissionOutcome::TransportError(_)));
    }

    #[test]
    fn test_migration_stats_throughput() {
        let stats = MigrationStats {
            accepted: 1000,
            duration_secs: 2.0,
            ..Default::default()
        };

        assert!((stats.throughput() - 500.0).abs() < 0.001);
    }

    #[test]
    fn test_migration_stats_zero_duration() {
        let stats = MigrationStats::default();
        assert_eq!(stats.throughput(), 0.0);
    }

    #[test]
    fn test_migration_stats_absorb() {
        let mut total = MigrationStats {
            read: 2,
            accepted: 1,
            rejected: 1,
            ..Default::default()
        };
        total.absorb(&MigrationStats {
            read: 3,
            accepted: 2,
            transport_errors: 1,
            ..Default::default()
        });
        assert_eq!(total.read, 5);
        assert_eq!(total.accepted, 3);
        assert_eq!(total.failed(), 2);
    }
}
