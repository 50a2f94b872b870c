use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::{CycleOutcome, SourceProcessor};
use crate::config::{SourceSpec, DEFAULT_WORKER_COUNT};
use crate::error::SourceError;

/// Fixed-size pool of workers draining a bounded job queue.
///
/// Every cycle returns exactly one outcome per input source, in input order.
/// At most `concurrency` sources are processed at any instant, and a failing
/// or panicking source only affects its own outcome.
pub struct SourceWorkerPool {
    processor: Arc<SourceProcessor>,
    concurrency: usize,
}

impl SourceWorkerPool {
    /// A concurrency of zero falls back to the default worker count.
    pub fn new(processor: Arc<SourceProcessor>, concurrency: usize) -> Self {
        let concurrency = if concurrency == 0 {
            DEFAULT_WORKER_COUNT
        } else {
            concurrency
        };
        Self {
            processor,
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run_cycle(&self, sources: &[SourceSpec]) -> Vec<CycleOutcome> {
        let mut slots: Vec<Option<CycleOutcome>> = vec![None; sources.len()];
        let mut jobs = Vec::with_capacity(sources.len());
        for (index, spec) in sources.iter().enumerate() {
            if spec.enabled {
                jobs.push((index, spec.clone()));
            } else {
                debug!(source = %spec.name, "source disabled, not queued");
                slots[index] = Some(CycleOutcome::disabled(&spec.name));
            }
        }

        if !jobs.is_empty() {
            self.drain(jobs, &mut slots).await;
        }

        slots
            .into_iter()
            .zip(sources)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| {
                    CycleOutcome::failed(
                        &spec.name,
                        SourceError::Panicked("worker exited before reporting".to_string()),
                        Duration::ZERO,
                    )
                })
            })
            .collect()
    }

    async fn drain(&self, jobs: Vec<(usize, SourceSpec)>, slots: &mut [Option<CycleOutcome>]) {
        let (job_tx, job_rx) = mpsc::channel::<(usize, SourceSpec)>(jobs.len());
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, CycleOutcome)>(jobs.len());

        // dropping the set aborts the workers
        let mut workers = JoinSet::new();
        for worker in 0..self.concurrency.min(jobs.len()) {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let processor = self.processor.clone();
            workers.spawn(async move {
                loop {
                    let job = job_rx.lock().await.recv().await;
                    let Some((index, spec)) = job else {
                        break;
                    };
                    let outcome = process_isolated(&processor, &spec).await;
                    if result_tx.send((index, outcome)).await.is_err() {
                        break;
                    }
                }
                debug!(worker, "worker finished");
            });
        }
        drop(result_tx);

        for job in jobs {
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        while let Some((index, outcome)) = result_rx.recv().await {
            slots[index] = Some(outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "source worker task failed");
            }
        }
    }
}

async fn process_isolated(processor: &SourceProcessor, spec: &SourceSpec) -> CycleOutcome {
    let started = Instant::now();
    match AssertUnwindSafe(processor.process(spec)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(source = %spec.name, panic = %message, "source processing panicked");
            CycleOutcome::failed(
                &spec.name,
                SourceError::Panicked(message),
                started.elapsed(),
            )
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
