//! Bounded task pool
//!
//! Runs a list of independent async jobs with at most `concurrency` of them in
//! flight. Workers are plain futures joined on the caller's task, so all jobs
//! interleave cooperatively instead of running on separate threads. Each worker
//! claims the next unclaimed index from a shared counter until none remain.

use futures::future::join_all;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error};

/// How a job failed to produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("task failed: {0}")]
    Errored(String),
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Run every job, at most `concurrency` at a time
///
/// The returned vector has one entry per job, at the job's original index. A
/// job that errors or panics is logged and recorded as a [`TaskFailure`];
/// it never stops the other workers.
pub async fn run_bounded<T, F, Fut>(jobs: Vec<F>, concurrency: usize) -> Vec<Result<T, TaskFailure>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let total = jobs.len();
    let workers = concurrency.max(1).min(total);

    let queue: Mutex<Vec<Option<F>>> = Mutex::new(jobs.into_iter().map(Some).collect());
    let settled: Mutex<Vec<Option<Result<T, TaskFailure>>>> =
        Mutex::new((0..total).map(|_| None).collect());
    let next = AtomicUsize::new(0);

    debug!("Running {} jobs on {} workers", total, workers);

    let (queue, settled, next) = (&queue, &settled, &next);
    join_all((0..workers).map(|worker| async move {
        loop {
            let index = next.fetch_add(1, Ordering::SeqCst);
            if index >= total {
                break;
            }

            let Some(job) = lock(queue)[index].take() else {
                continue;
            };

            let result = match AssertUnwindSafe(async move { job().await }).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    error!("Job {} failed on worker {}: {:#}", index, worker, e);
                    Err(TaskFailure::Errored(format!("{:#}", e)))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("Job {} panicked on worker {}: {}", index, worker, message);
                    Err(TaskFailure::Panicked(message))
                }
            };

            lock(settled)[index] = Some(result);
        }
    }))
    .await;

    let settled = std::mem::take(&mut *lock(settled));
    settled
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(TaskFailure::Errored("job never ran".to_string()))))
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
