//! Durable recording of search outcomes.
//!
//! A [`ResultSink`] may be called from many tasks at once. Implementations
//! serialize writes behind a mutex, so records never interleave and are kept
//! in the order they were accepted. File writes run on the blocking pool,
//! never on a runtime worker.
use async_trait::async_trait;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{ScoutError, ScoutResult};
use crate::results::SearchOutcome;

/// Header row of the results file
pub const HEADERS: [&str; 3] = ["url", "result", "error"];

/// Records each outcome exactly once
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persists one outcome before returning; failure is fatal for the run
    async fn record(&self, outcome: &SearchOutcome) -> ScoutResult<()>;
}

/// Writes outcomes as CSV rows: `url,result,error`
#[derive(Debug)]
pub struct CsvSink<W: Write> {
    writer: Arc<Mutex<csv::Writer<W>>>,
    recorded: AtomicUsize,
}

impl<W: Write + Send + 'static> CsvSink<W> {
    /// Wraps `inner` and writes the header row
    pub fn from_writer(inner: W) -> ScoutResult<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer
            .write_record(HEADERS)
            .map_err(|e| ScoutError::sink_write(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| ScoutError::sink_write(e.to_string()))?;
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            recorded: AtomicUsize::new(0),
        })
    }

    /// Number of outcome rows written so far
    pub fn recorded(&self) -> usize {
        self.recorded.load(Ordering::SeqCst)
    }

    /// Flushes and returns the underlying writer
    pub fn into_inner(self) -> ScoutResult<W> {
        let writer = Arc::try_unwrap(self.writer)
            .map_err(|_| ScoutError::sink_write("a write is still in progress"))?;
        writer
            .into_inner()
            .into_inner()
            .map_err(|e| ScoutError::sink_write(e.error().to_string()))
    }
}

#[async_trait]
impl<W: Write + Send + 'static> ResultSink for CsvSink<W> {
    async fn record(&self, outcome: &SearchOutcome) -> ScoutResult<()> {
        let row = [
            outcome.target.to_string(),
            outcome.matched.to_string(),
            outcome.error_text(),
        ];

        let mut writer = Arc::clone(&self.writer).lock_owned().await;
        tokio::task::spawn_blocking(move || -> ScoutResult<()> {
            writer
                .write_record(&row)
                .map_err(|e| ScoutError::sink_write(e.to_string()))?;
            writer
                .flush()
                .map_err(|e| ScoutError::sink_write(e.to_string()))
        })
        .await
        .map_err(|e| ScoutError::sink_write(e.to_string()))??;

        self.recorded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Results file that only appears at its destination once committed
#[derive(Debug)]
pub struct PendingFile {
    file: NamedTempFile,
    destination: PathBuf,
}

impl Write for PendingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl CsvSink<PendingFile> {
    /// Prepares the results file at `path`.
    ///
    /// Rows are written to a temporary file in the same directory, so an
    /// uncreatable output is detected here, before any target is fetched,
    /// and an aborted run never leaves a partial results file behind.
    pub fn create(path: &Path) -> ScoutResult<Self> {
        if path.is_dir() {
            return Err(ScoutError::output_create(
                path,
                io::Error::new(io::ErrorKind::Other, "is a directory"),
            ));
        }

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file = tempfile::Builder::new()
            .prefix(".sitescout-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| ScoutError::output_create(path, e))?;
        debug!(
            "Writing results to {} via {}",
            path.display(),
            file.path().display()
        );

        Self::from_writer(PendingFile {
            file,
            destination: path.to_path_buf(),
        })
    }

    /// Syncs the rows to disk and moves the file onto its destination
    pub async fn commit(self) -> ScoutResult<PathBuf> {
        let pending = self.into_inner()?;
        tokio::task::spawn_blocking(move || -> ScoutResult<PathBuf> {
            pending.file.as_file().sync_all()?;
            let destination = pending.destination;
            pending
                .file
                .persist(&destination)
                .map_err(|e| ScoutError::output_create(&destination, e.error))?;
            Ok(destination)
        })
        .await
        .map_err(|e| ScoutError::sink_write(e.to_string()))?
    }
}

/// Keeps outcomes in memory, in the order they were recorded
#[derive(Debug, Default)]
pub struct MemorySink {
    outcomes: Mutex<Vec<SearchOutcome>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn outcomes(&self) -> Vec<SearchOutcome> {
        self.outcomes.lock().await.clone()
    }

    pub fn into_outcomes(self) -> Vec<SearchOutcome> {
        self.outcomes.into_inner()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn record(&self, outcome: &SearchOutcome) -> ScoutResult<()> {
        self.outcomes.lock().await.push(outcome.clone());
        Ok(())
    }
}
