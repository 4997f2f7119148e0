//! Bounded-concurrency job controller.
//!
//! Every request goes through the same steps:
//!
//! 1. wait for a slot on the [`AdmissionGate`] (bounded by the queue timeout),
//! 2. run the crawl under its own deadline (the execution timeout, which
//!    starts fresh at admission),
//! 3. classify the result and hand back the slot.
//!
//! The slot is an RAII guard held across the whole admitted span, so it is
//! returned whether the crawl succeeds, errors, times out or panics.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::AppError;
use crate::gate::AdmissionGate;
use crate::models::{CrawlOptions, CrawlOutput, Job, JobState};
use crate::timer::run_with_deadline;
use crate::traits::Crawler;

/// Lifecycle events emitted by the controller for monitoring/logging.
#[derive(Debug, Clone)]
pub enum JobEvent<'a> {
    Queued {
        job_id: Uuid,
        url: &'a str,
    },
    Admitted {
        job_id: Uuid,
        waited: Duration,
    },
    Completed {
        job_id: Uuid,
        elapsed: Duration,
        markdown_len: usize,
    },
    QueueTimedOut {
        job_id: Uuid,
        waited: Duration,
    },
    ExecutionTimedOut {
        job_id: Uuid,
        limit: Duration,
    },
    Failed {
        job_id: Uuid,
        error: &'a str,
    },
}

/// Trait for receiving job events (decoupled logging).
pub trait JobReporter: Send + Sync {
    fn report(&self, event: JobEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJobReporter;

impl JobReporter for TracingJobReporter {
    fn report(&self, event: JobEvent<'_>) {
        match event {
            JobEvent::Queued { job_id, url } => {
                tracing::debug!(%job_id, %url, "Crawl queued");
            }
            JobEvent::Admitted { job_id, waited } => {
                tracing::info!(%job_id, waited_ms = waited.as_millis() as u64, "Crawl slot acquired");
            }
            JobEvent::Completed {
                job_id,
                elapsed,
                markdown_len,
            } => {
                tracing::info!(
                    %job_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    markdown_len,
                    "Crawl completed"
                );
            }
            JobEvent::QueueTimedOut { job_id, waited } => {
                tracing::warn!(%job_id, waited_ms = waited.as_millis() as u64, "No crawl slot available");
            }
            JobEvent::ExecutionTimedOut { job_id, limit } => {
                tracing::error!(%job_id, limit_secs = limit.as_secs_f64(), "Crawl timed out");
            }
            JobEvent::Failed { job_id, error } => {
                tracing::error!(%job_id, %error, "Crawl failed");
            }
        }
    }
}

/// Runs crawls with at most `capacity` in flight at once.
pub struct JobController<C: Crawler> {
    crawler: C,
    gate: AdmissionGate,
    config: GatewayConfig,
    reporter: Arc<dyn JobReporter>,
}

impl<C: Crawler> Clone for JobController<C> {
    fn clone(&self) -> Self {
        Self {
            crawler: self.crawler.clone(),
            gate: self.gate.clone(),
            config: self.config.clone(),
            reporter: Arc::clone(&self.reporter),
        }
    }
}

impl<C: Crawler> JobController<C> {
    pub fn new(crawler: C, config: GatewayConfig) -> Self {
        Self {
            crawler,
            gate: AdmissionGate::new(config.capacity()),
            config,
            reporter: Arc::new(TracingJobReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: impl JobReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.gate.capacity()
    }

    pub fn available_slots(&self) -> usize {
        self.gate.available()
    }

    /// Crawl `url` once a slot frees up.
    pub async fn submit(&self, url: &str, options: CrawlOptions) -> Result<CrawlOutput, AppError> {
        let mut job = Job::new(url, options);
        self.run(&mut job).await
    }

    /// Drive `job` from `Queued` to a terminal state.
    ///
    /// On return `job.state` is terminal and no slot is held on its behalf.
    pub async fn run(&self, job: &mut Job) -> Result<CrawlOutput, AppError> {
        self.reporter.report(JobEvent::Queued {
            job_id: job.id,
            url: &job.url,
        });

        let queued_at = Instant::now();
        let slot = match self.gate.acquire(self.config.queue_timeout()).await {
            Ok(slot) => slot,
            Err(e) => {
                let state = match &e {
                    AppError::QueueTimeout(_) => JobState::QueueTimedOut,
                    _ => JobState::Failed,
                };
                job.finish(state);
                if state == JobState::QueueTimedOut {
                    self.reporter.report(JobEvent::QueueTimedOut {
                        job_id: job.id,
                        waited: queued_at.elapsed(),
                    });
                } else {
                    let error = e.to_string();
                    self.reporter.report(JobEvent::Failed {
                        job_id: job.id,
                        error: &error,
                    });
                }
                return Err(e);
            }
        };

        job.admit();
        self.reporter.report(JobEvent::Admitted {
            job_id: job.id,
            waited: queued_at.elapsed(),
        });

        let started = Instant::now();
        let result = self.execute(job).await;

        match &result {
            Ok(output) => {
                job.finish(JobState::Completed);
                self.reporter.report(JobEvent::Completed {
                    job_id: job.id,
                    elapsed: started.elapsed(),
                    markdown_len: output.markdown.len(),
                });
            }
            Err(AppError::ExecutionTimeout(limit)) => {
                job.finish(JobState::ExecutionTimedOut);
                self.reporter.report(JobEvent::ExecutionTimedOut {
                    job_id: job.id,
                    limit: *limit,
                });
            }
            Err(e) => {
                job.finish(JobState::Failed);
                let error = e.to_string();
                self.reporter.report(JobEvent::Failed {
                    job_id: job.id,
                    error: &error,
                });
            }
        }

        drop(slot);
        result
    }

    async fn execute(&self, job: &mut Job) -> Result<CrawlOutput, AppError> {
        job.state = JobState::Executing;

        // `crawl()` itself runs inside the guarded future so a panic while
        // building the crawl future is caught too.
        let crawl =
            AssertUnwindSafe(async { self.crawler.crawl(&job.url, &job.options).await }).catch_unwind();
        match run_with_deadline(self.config.exec_timeout(), crawl).await? {
            Ok(outcome) => outcome,
            Err(panic) => Err(AppError::BackendPanic(panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
