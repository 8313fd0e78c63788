//! Error types for sitescout.
//!
//! There are two very different kinds of failure in a run, and they are kept
//! in separate types so they can never be confused:
//!
//! * [`ScoutError`] is fatal. It means the run cannot start or cannot
//!   meaningfully continue (unreadable input, uncreatable output, a pattern
//!   that does not compile, a results row that could not be persisted).
//!   It propagates with `?` up to the CLI, which exits non-zero.
//!
//! * [`FetchError`] and [`SearchError`] are per-target. They never travel up
//!   the call stack; they are stored on the target's
//!   [`SearchOutcome`](crate::results::SearchOutcome) and written to the
//!   results file like any other row.
//!
//! ```rust,ignore
//! match scout(&config).await {
//!     Ok(summary) => println!("{} of {} matched", summary.matched, summary.targets),
//!     Err(ScoutError::InvalidPattern(msg)) => eprintln!("bad pattern: {msg}"),
//!     Err(e) => eprintln!("run aborted: {e}"),
//! }
//! ```
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for operations that can abort a run
pub type ScoutResult<T> = Result<T, ScoutError>;

/// Errors that abort the whole run
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Cannot open input file {path}: {source}")]
    InputOpen {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid input at line {line}: {message}")]
    InvalidInput { line: u64, message: String },
    #[error("Cannot create output file {path}: {source}")]
    OutputCreate {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot write into output file: {0}")]
    SinkWrite(String),
    #[error("Cannot build HTTP client: {0}")]
    Client(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Dispatcher failed: {0}")]
    Dispatch(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScoutError {
    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    pub fn input_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InputOpen {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_input(line: u64, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            line,
            message: message.into(),
        }
    }

    pub fn output_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputCreate {
            path: path.into(),
            source,
        }
    }

    pub fn sink_write(msg: impl Into<String>) -> Self {
        Self::SinkWrite(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<config::ConfigError> for ScoutError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Why a single target could not be fetched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Request(String),
    #[error("cannot read response body: {0}")]
    Read(String),
}

impl FetchError {
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Terminal per-target error recorded on a search outcome
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid UTF-8 in response body: {0}")]
    Encoding(String),
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}
