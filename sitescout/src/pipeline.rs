use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::ScoutConfig;
use crate::errors::{ScoutError, ScoutResult};
use crate::fetch::{Fetch, FetchOptions, HttpFetcher};
use crate::metrics::DispatchMetrics;
use crate::results::{RunSummary, Target};
use crate::search::{Dispatcher, MatchOptions, PatternMatcher, TargetProcessor};
use crate::sink::{CsvSink, ResultSink};
use crate::source::CsvTargetSource;

/// Dispatcher plus sink plumbing for one run
pub struct Pipeline<F> {
    dispatcher: Dispatcher<F>,
    progress: ProgressBar,
}

impl<F: Fetch + 'static> Pipeline<F> {
    pub fn new(processor: TargetProcessor<F>, limit: NonZeroUsize) -> Self {
        Self {
            dispatcher: Dispatcher::new(processor, limit),
            progress: ProgressBar::hidden(),
        }
    }

    /// Shows a spinner on stderr while the run is in progress
    pub fn with_progress(mut self, show: bool) -> Self {
        if show {
            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} [{elapsed_precise}] {pos} targets checked {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            progress.enable_steady_tick(Duration::from_millis(120));
            self.progress = progress;
        }
        self
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        self.dispatcher.metrics()
    }

    /// Processes every target and records each outcome in `sink`.
    ///
    /// Returns once the source is exhausted, every task has completed and
    /// every outcome has been recorded. A sink failure aborts the run and
    /// every task still in flight.
    pub async fn run<I, S>(&self, targets: I, sink: &S) -> ScoutResult<RunSummary>
    where
        I: IntoIterator<Item = ScoutResult<Target>> + Send + 'static,
        I::IntoIter: Send,
        S: ResultSink + ?Sized,
    {
        let start = Instant::now();
        let mut dispatch = self.dispatcher.dispatch(targets);
        let mut summary = RunSummary::new();

        while let Some(outcome) = dispatch.next().await {
            debug!(
                "Recording {}: matched={} error={:?}",
                outcome.target,
                outcome.matched,
                outcome.error_text()
            );
            sink.record(&outcome).await?;
            summary.add_outcome(&outcome);
            self.progress.inc(1);
            self.progress.set_message(format!(
                "({} matched, {} errors, {} in flight)",
                summary.matched,
                summary.errors,
                dispatch.metrics().get_stats().in_flight
            ));
        }

        let dispatched = dispatch.finish().await?;
        self.progress.finish_and_clear();
        if dispatched != summary.targets {
            return Err(ScoutError::Dispatch(format!(
                "{} targets dispatched but {} outcomes recorded",
                dispatched, summary.targets
            )));
        }

        summary.elapsed = start.elapsed();
        self.metrics().log_stats();
        Ok(summary)
    }
}

/// Runs `targets` through `processor` with at most `limit` tasks in flight,
/// recording every outcome in `sink`
pub async fn run_pipeline<F, I, S>(
    targets: I,
    processor: TargetProcessor<F>,
    limit: NonZeroUsize,
    sink: &S,
    progress: bool,
) -> ScoutResult<RunSummary>
where
    F: Fetch + 'static,
    I: IntoIterator<Item = ScoutResult<Target>> + Send + 'static,
    I::IntoIter: Send,
    S: ResultSink + ?Sized,
{
    Pipeline::new(processor, limit)
        .with_progress(progress)
        .run(targets, sink)
        .await
}

/// Runs a complete audit as described by `config`.
///
/// Every startup step (pattern, input, output, HTTP client) is checked
/// before the first request goes out. The results file only appears once
/// the run has finished.
pub async fn scout(config: &ScoutConfig) -> ScoutResult<RunSummary> {
    config.validate()?;

    let matcher = PatternMatcher::new(&config.pattern, MatchOptions::from_config(config))?;
    let source = CsvTargetSource::open(&config.input_path, config.target_column)?;
    let sink = CsvSink::create(&config.output_path)?;
    let fetcher = HttpFetcher::new(FetchOptions::from_config(config))?;

    info!(
        "Searching targets from {} for '{}' (concurrency {}, timeout {}s)",
        config.input_path.display(),
        config.pattern,
        config.concurrency,
        config.timeout_secs
    );

    let processor = TargetProcessor::new(Arc::new(fetcher), Arc::new(matcher));
    let summary = run_pipeline(
        source,
        processor,
        config.concurrency,
        &sink,
        config.show_progress,
    )
    .await?;

    let recorded = sink.recorded();
    let path = sink.commit().await?;
    info!(
        "Search complete. {} of {} targets matched, {} errors; {} rows in {}",
        summary.matched,
        summary.targets,
        summary.errors,
        recorded,
        path.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FetchError, SearchError};
    use crate::results::{FetchOutcome, SearchOutcome};
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<&'static str, Result<&'static str, FetchError>>);

    #[async_trait]
    impl Fetch for MapFetcher {
        async fn fetch(&self, target: &Target) -> FetchOutcome {
            match self.0.get(target.as_str()) {
                Some(Ok(body)) => FetchOutcome::ok(target.clone(), body.as_bytes().to_vec()),
                Some(Err(e)) => FetchOutcome::err(target.clone(), e.clone()),
                None => FetchOutcome::err(target.clone(), FetchError::Connect("unknown host".into())),
            }
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ResultSink for FailingSink {
        async fn record(&self, _outcome: &SearchOutcome) -> ScoutResult<()> {
            Err(ScoutError::sink_write("disk full"))
        }
    }

    fn pipeline(limit: usize) -> Pipeline<MapFetcher> {
        let fetcher = MapFetcher(HashMap::from([
            ("a.test", Ok("<p>Treasure</p>")),
            ("b.test", Err(FetchError::Timeout(Duration::from_secs(10)))),
            ("c.test", Ok("<p>nothing</p>")),
        ]));
        let matcher = PatternMatcher::new("Treasure", MatchOptions::default()).unwrap();
        let processor = TargetProcessor::new(Arc::new(fetcher), Arc::new(matcher));
        Pipeline::new(processor, NonZeroUsize::new(limit).unwrap())
    }

    fn source(names: &[&str]) -> Vec<ScoutResult<Target>> {
        names.iter().map(|n| Ok(Target::new(*n))).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_records_every_target() {
        let sink = MemorySink::new();
        let summary = pipeline(2)
            .run(source(&["a.test", "b.test", "c.test", "d.test"]), &sink)
            .await
            .unwrap();

        assert_eq!(summary.targets, 4);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.not_matched, 1);
        assert_eq!(summary.errors, 2);

        let mut outcomes = sink.into_outcomes();
        outcomes.sort_by(|a, b| a.target.cmp(&b.target));
        assert_eq!(outcomes[0], SearchOutcome::matched(Target::new("a.test"), true));
        assert!(matches!(
            outcomes[1].error,
            Some(SearchError::Fetch(FetchError::Timeout(_)))
        ));
        assert_eq!(outcomes[2], SearchOutcome::matched(Target::new("c.test"), false));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sink_failure_is_fatal() {
        let err = pipeline(2)
            .run(source(&["a.test", "c.test"]), &FailingSink)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::SinkWrite(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_source_failure_is_fatal() {
        let targets = vec![
            Ok(Target::new("a.test")),
            Err(ScoutError::invalid_input(3, "found record with 1 field")),
        ];
        let sink = MemorySink::new();
        let err = pipeline(2).run(targets, &sink).await.unwrap_err();
        assert!(matches!(err, ScoutError::InvalidInput { line: 3, .. }));
        // The task that was already running still reported
        assert_eq!(sink.outcomes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_scout_rejects_bad_pattern_before_touching_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScoutConfig {
            input_path: dir.path().join("missing.csv"),
            output_path: dir.path().join("results.txt"),
            pattern: "(unclosed".to_string(),
            ..ScoutConfig::default()
        };

        let err = scout(&config).await.unwrap_err();
        assert!(matches!(err, ScoutError::InvalidPattern(_)));
        assert!(!config.output_path.exists());
    }
}
