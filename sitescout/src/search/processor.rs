use std::sync::Arc;
use tracing::trace;

use super::matcher::PatternMatcher;
use crate::fetch::Fetch;
use crate::metrics::{DispatchMetrics, TaskState};
use crate::results::{SearchOutcome, Target};

/// Runs one target through fetch and match
#[derive(Debug)]
pub struct TargetProcessor<F> {
    fetcher: Arc<F>,
    matcher: Arc<PatternMatcher>,
    metrics: DispatchMetrics,
}

impl<F> Clone for TargetProcessor<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            matcher: Arc::clone(&self.matcher),
            metrics: self.metrics.clone(),
        }
    }
}

impl<F: Fetch> TargetProcessor<F> {
    /// Creates a new TargetProcessor sharing the given fetcher and matcher
    pub fn new(fetcher: Arc<F>, matcher: Arc<PatternMatcher>) -> Self {
        Self {
            fetcher,
            matcher,
            metrics: DispatchMetrics::new(),
        }
    }

    /// Gets the metrics shared by every clone of this processor
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Fetches and searches one target.
    ///
    /// Never fails: fetch errors skip the match step and decoding errors
    /// from the match step are both recorded on the returned outcome.
    pub async fn process(&self, target: Target) -> SearchOutcome {
        let mut stage = Stage::start(&self.metrics);
        trace!("Fetching: {}", target);
        let fetched = self.fetcher.fetch(&target).await;

        let payload = match fetched.payload {
            Ok(payload) => payload,
            Err(e) => return SearchOutcome::failed(target, e),
        };

        stage.advance(TaskState::Matching);
        trace!("Searching: {} ({} bytes)", target, payload.len());
        match self.matcher.is_match(&payload) {
            Ok(matched) => SearchOutcome::matched(target, matched),
            Err(e) => SearchOutcome::failed(target, e),
        }
    }
}

/// The state one task is in; leaving scope moves it to `Completed`, also
/// when the task unwinds or is aborted
struct Stage<'a> {
    metrics: &'a DispatchMetrics,
    state: TaskState,
}

impl<'a> Stage<'a> {
    fn start(metrics: &'a DispatchMetrics) -> Self {
        metrics.record_transition(TaskState::Queued, TaskState::Fetching);
        Self {
            metrics,
            state: TaskState::Fetching,
        }
    }

    fn advance(&mut self, to: TaskState) {
        self.metrics.record_transition(self.state, to);
        self.state = to;
    }
}

impl Drop for Stage<'_> {
    fn drop(&mut self) {
        if self.state != TaskState::Completed {
            self.advance(TaskState::Completed);
        }
    }
}
