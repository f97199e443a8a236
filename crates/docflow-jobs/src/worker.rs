//! Queue workers: claim loop, per-job timeout, retry with backoff.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use docflow_core::{defaults, CancelFlag, Job, JobRepository, QueueName};

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::queue::SchedulerConfig;

/// Event emitted by workers as jobs move through their lifecycle.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Started {
        job_id: Uuid,
        queue: QueueName,
    },
    Progress {
        job_id: Uuid,
        percent: i32,
    },
    Completed {
        job_id: Uuid,
        queue: QueueName,
    },
    /// Transient failure re-queued with backoff.
    Retried {
        job_id: Uuid,
        queue: QueueName,
        attempt: i32,
    },
    /// Permanent failure (fatal error or attempts exhausted).
    Failed {
        job_id: Uuid,
        queue: QueueName,
        error: String,
    },
}

/// Exponential backoff with jitter for the given attempt count.
pub fn backoff_delay(attempts: i32) -> Duration {
    let exponent = attempts.clamp(0, 16) as u32;
    let base = defaults::RETRY_BASE_MS.saturating_mul(2u64.saturating_pow(exponent));
    let jitter = rand::thread_rng().gen_range(0..defaults::RETRY_JITTER_MS);
    Duration::from_millis(base + jitter)
}

/// One worker in a queue's pool. Processes one job fully before claiming the
/// next.
pub(crate) struct Worker {
    pub repo: Arc<dyn JobRepository>,
    pub queue: QueueName,
    pub handler: Arc<dyn JobHandler>,
    pub config: SchedulerConfig,
    pub event_tx: broadcast::Sender<JobEvent>,
    pub paused: Arc<RwLock<HashSet<QueueName>>>,
    pub active: Arc<RwLock<HashMap<Uuid, CancelFlag>>>,
    pub shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub async fn run(mut self) {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        debug!(queue = %self.queue, "Worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            if self.paused.read().await.contains(&self.queue) {
                tokio::select! {
                    _ = self.shutdown.changed() => {}
                    _ = sleep(poll) => {}
                }
                continue;
            }

            match self.repo.claim_next(self.queue).await {
                Ok(Some(job)) => self.execute(job).await,
                Ok(None) => {
                    // Queue empty, sleep before polling again.
                    tokio::select! {
                        _ = self.shutdown.changed() => {}
                        _ = sleep(poll) => {}
                    }
                }
                Err(e) => {
                    error!(queue = %self.queue, error = %e, "Failed to claim job");
                    sleep(poll).await;
                }
            }
        }

        debug!(queue = %self.queue, "Worker stopped");
    }

    async fn execute(&self, job: Job) {
        let start = Instant::now();
        let job_id = job.id;
        let queue = job.queue;
        let attempts = job.attempts;

        info!(%job_id, %queue, attempt = attempts, "Processing job");
        let _ = self.event_tx.send(JobEvent::Started { job_id, queue });

        let cancel = CancelFlag::new();
        self.active.write().await.insert(job_id, cancel.clone());

        // Progress reports flow through a channel so the sync callback can
        // feed the async repository (which also feeds stall detection).
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(i32, Option<String>)>();
        let repo = self.repo.clone();
        let event_tx = self.event_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some((percent, message)) = progress_rx.recv().await {
                if let Err(e) = repo.update_progress(job_id, percent, message.as_deref()).await {
                    debug!(%job_id, error = %e, "Progress update dropped");
                }
                let _ = event_tx.send(JobEvent::Progress { job_id, percent });
            }
        });

        let ctx = JobContext::new(job)
            .with_cancel_flag(cancel)
            .with_progress_callback(move |percent, message| {
                let _ = progress_tx.send((percent, message.map(String::from)));
            });

        let job_timeout = Duration::from_secs(self.config.job_timeout_secs);
        let result = match tokio::time::timeout(job_timeout, self.handler.execute(ctx)).await {
            Ok(result) => result,
            Err(_) => JobResult::Retry(format!(
                "Job exceeded timeout of {}s",
                self.config.job_timeout_secs
            )),
        };

        // The context (and its sender) is gone by now; drain the last
        // progress updates before writing the terminal state.
        let _ = forwarder.await;

        match result {
            JobResult::Success(data) => {
                if let Err(e) = self.repo.complete(job_id, data).await {
                    error!(%job_id, error = %e, "Failed to mark job as completed");
                } else {
                    info!(
                        %job_id,
                        %queue,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job completed"
                    );
                    let _ = self.event_tx.send(JobEvent::Completed { job_id, queue });
                }
            }
            JobResult::Failed(err) => {
                if let Err(e) = self.repo.fail(job_id, &err).await {
                    error!(%job_id, error = %e, "Failed to mark job as failed");
                } else {
                    warn!(%job_id, %queue, error = %err, "Job failed permanently");
                    let _ = self.event_tx.send(JobEvent::Failed {
                        job_id,
                        queue,
                        error: err,
                    });
                }
            }
            JobResult::Retry(err) => {
                let delay = backoff_delay(attempts);
                match self.repo.retry(job_id, &err, delay).await {
                    Ok(true) => {
                        warn!(
                            %job_id,
                            %queue,
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Job re-queued with backoff"
                        );
                        let _ = self.event_tx.send(JobEvent::Retried {
                            job_id,
                            queue,
                            attempt: attempts,
                        });
                    }
                    Ok(false) => {
                        warn!(%job_id, %queue, error = %err, "Job retries exhausted");
                        let _ = self.event_tx.send(JobEvent::Failed {
                            job_id,
                            queue,
                            error: err,
                        });
                    }
                    Err(e) => {
                        error!(%job_id, error = %e, "Failed to re-queue job");
                    }
                }
            }
        }

        self.active.write().await.remove(&job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_exponentially() {
        // Strip jitter by comparing against the bounds.
        for attempts in 0..6 {
            let delay = backoff_delay(attempts).as_millis() as u64;
            let floor = defaults::RETRY_BASE_MS * 2u64.pow(attempts as u32);
            assert!(delay >= floor, "attempt {}: {} < {}", attempts, delay, floor);
            assert!(delay < floor + defaults::RETRY_JITTER_MS);
        }
    }

    #[test]
    fn test_backoff_is_bounded_for_large_attempts() {
        // Saturation instead of overflow for absurd attempt counts.
        let delay = backoff_delay(i32::MAX);
        assert!(delay.as_millis() > 0);
    }
}
