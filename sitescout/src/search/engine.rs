use futures::{FutureExt, Stream, StreamExt};
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::processor::TargetProcessor;
use crate::errors::{ScoutError, ScoutResult, SearchError};
use crate::fetch::Fetch;
use crate::metrics::DispatchMetrics;
use crate::results::{SearchOutcome, Target};

/// Schedules fetch+match tasks with at most `limit` in flight
#[derive(Debug)]
pub struct Dispatcher<F> {
    processor: TargetProcessor<F>,
    limit: NonZeroUsize,
}

impl<F: Fetch + 'static> Dispatcher<F> {
    pub fn new(processor: TargetProcessor<F>, limit: NonZeroUsize) -> Self {
        Self { processor, limit }
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        self.processor.metrics()
    }

    /// Starts processing `targets` and returns the stream of their outcomes.
    ///
    /// The source is drained once, in order, on a blocking thread, since
    /// reading it may touch the filesystem. A single producer task takes the
    /// targets from there. Each target waits for one of `limit` semaphore
    /// permits before its task is spawned, so a full dispatcher stops pulling
    /// from the source. A task keeps its permit until its outcome is in the
    /// channel; the permit is released by drop on every path.
    ///
    /// The returned stream yields outcomes in completion order and ends once
    /// the source is exhausted and every spawned task has reported. Dropping
    /// the [`Dispatch`] early aborts the producer and every task it spawned.
    pub fn dispatch<I>(&self, targets: I) -> Dispatch
    where
        I: IntoIterator<Item = ScoutResult<Target>> + Send + 'static,
        I::IntoIter: Send,
    {
        let limit = self.limit.get();
        let (tx, rx) = mpsc::channel(limit);
        let semaphore = Arc::new(Semaphore::new(limit));
        let processor = self.processor.clone();

        let (source_tx, mut source_rx) = mpsc::channel::<ScoutResult<Target>>(limit);
        let reader = tokio::task::spawn_blocking(move || {
            for item in targets {
                let failed = item.is_err();
                if source_tx.blocking_send(item).is_err() || failed {
                    break;
                }
            }
        });

        let producer = tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            let mut dispatched = 0usize;
            let mut source_error = None;

            while let Some(item) = source_rx.recv().await {
                let target = match item {
                    Ok(target) => target,
                    // A source failure stops the intake; tasks already
                    // spawned still run to completion and report.
                    Err(e) => {
                        source_error = Some(e);
                        break;
                    }
                };

                // Reap finished tasks so the set never outgrows the limit
                while tasks.len() >= limit {
                    if let Some(Err(e)) = tasks.join_next().await {
                        warn!("Task ended abnormally: {}", e);
                    }
                }

                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        source_error = Some(ScoutError::Dispatch(e.to_string()));
                        break;
                    }
                };

                processor.metrics().record_dispatch();
                dispatched += 1;
                debug!("Dispatching target #{}: {}", dispatched, target);

                let processor = processor.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    let outcome = run_task(&processor, target).await;
                    let (matched, failed) = (outcome.matched, outcome.is_error());
                    if let Err(e) = tx.send(outcome).await {
                        warn!("Outcome for {} dropped: receiver closed", e.0.target);
                    }
                    processor.metrics().record_completion(matched, failed);
                    drop(permit);
                });
            }
            drop(source_rx);
            drop(tx);

            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!("Task ended abnormally: {}", e);
                }
            }
            if let Err(e) = reader.await {
                warn!("Target reader ended abnormally: {}", e);
            }

            match source_error {
                Some(e) => Err(e),
                None => {
                    debug!("Target source exhausted after {} targets", dispatched);
                    Ok(dispatched)
                }
            }
        });

        Dispatch {
            outcomes: ReceiverStream::new(rx),
            producer,
            metrics: self.processor.metrics().clone(),
        }
    }
}

/// Runs one task, turning a panic into an outcome so the target is still accounted for
async fn run_task<F: Fetch>(processor: &TargetProcessor<F>, target: Target) -> SearchOutcome {
    match AssertUnwindSafe(processor.process(target.clone()))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!("Task for {} panicked: {}", target, message);
            SearchOutcome::failed(target, SearchError::TaskPanicked(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A running dispatch: a stream of outcomes plus the producer that feeds it
#[derive(Debug)]
pub struct Dispatch {
    outcomes: ReceiverStream<SearchOutcome>,
    producer: JoinHandle<ScoutResult<usize>>,
    metrics: DispatchMetrics,
}

impl Dispatch {
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Waits for the producer and returns how many targets were dispatched.
    ///
    /// Meant to be called once the stream has ended. Outcomes still pending
    /// at this point are discarded rather than waited on, so this never blocks
    /// on tasks that cannot deliver.
    pub async fn finish(mut self) -> ScoutResult<usize> {
        self.outcomes.close();
        match (&mut self.producer).await {
            Ok(result) => result,
            Err(e) => Err(ScoutError::Dispatch(e.to_string())),
        }
    }

    /// Drains every outcome, then reports the producer's result
    pub async fn collect_all(mut self) -> ScoutResult<Vec<SearchOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next().await {
            outcomes.push(outcome);
        }
        self.finish().await?;
        Ok(outcomes)
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        // Aborting the producer drops its JoinSet, which aborts every task
        self.producer.abort();
    }
}

impl Stream for Dispatch {
    type Item = SearchOutcome;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.outcomes).poll_next(cx)
    }
}
