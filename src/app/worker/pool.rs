//! Fixed-size pool of download tasks
//!
//! `ImagePool` runs a list of jobs on at most `size` spawned tokio tasks.
//! Each task pulls the next job from a shared queue until the queue is empty
//! or the batch is cancelled, so the number of in-flight downloads never
//! exceeds the pool size no matter how long the job list is. Outputs are
//! returned in job order regardless of completion order.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn, Instrument, Span};

/// Bounded pool of concurrent job runners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePool {
    size: usize,
}

impl ImagePool {
    /// Create a pool with `size` slots; zero is treated as one
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    /// Number of concurrent slots
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `job` over every item with at most `size` jobs in flight
    ///
    /// Returns one slot per item in input order. A slot is `None` when its
    /// job never ran because of cancellation or when the job panicked.
    /// Cancellation stops runners from taking new jobs; jobs already running
    /// are expected to observe the token themselves.
    pub async fn run<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        cancel: &CancellationToken,
        job: F,
    ) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        if total == 0 {
            return slots;
        }

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        for entry in items.into_iter().enumerate() {
            // The receiver is alive until the runners are spawned below
            let _ = job_tx.send(entry);
        }
        drop(job_tx);

        let queue = Arc::new(Mutex::new(job_rx));
        let job = Arc::new(job);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let runner_count = self.size.min(total);
        let mut runners = JoinSet::new();

        for runner_id in 0..runner_count {
            let queue = queue.clone();
            let job = job.clone();
            let cancel = cancel.clone();
            let done_tx = done_tx.clone();

            runners.spawn(
                async move {
                    let mut completed = 0_usize;
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }

                        let next = queue.lock().await.recv().await;
                        let Some((index, item)) = next else {
                            break;
                        };

                        let output = job(item).await;
                        if done_tx.send((index, output)).is_err() {
                            break;
                        }
                        completed += 1;
                    }
                    trace!("Pool runner {} finished after {} jobs", runner_id, completed);
                }
                .instrument(Span::current()),
            );
        }
        drop(done_tx);

        while let Some(joined) = runners.join_next().await {
            if let Err(e) = joined {
                warn!("Image pool runner failed: {}", e);
            }
        }

        while let Ok((index, output)) = done_rx.try_recv() {
            slots[index] = Some(output);
        }

        slots
    }
}
