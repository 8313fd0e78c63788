//! Per-target records and the run-level summary.
//!
//! A [`Target`] is read once from the source and moved into exactly one task.
//! The task produces a [`FetchOutcome`], folds it into a [`SearchOutcome`],
//! and hands that to the sink. Only the [`RunSummary`] outlives the run.
use reqwest::Url;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::errors::{FetchError, SearchError};

/// Identifier of one network resource (a hostname or a URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target(String);

impl Target {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves the identifier into a fetchable URL.
    ///
    /// Bare hostnames (`example.com`, `example.com/path`) are prefixed with
    /// `default_scheme`; anything that already names a scheme is used as-is.
    pub fn url(&self, default_scheme: &str) -> Result<Url, FetchError> {
        let id = self.0.trim();
        if id.is_empty() {
            return Err(FetchError::invalid_url(id, "empty target"));
        }

        let raw = if id.contains("://") {
            id.to_string()
        } else {
            format!("{}://{}", default_scheme, id)
        };
        Url::parse(&raw).map_err(|e| FetchError::invalid_url(raw.as_str(), e))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Target {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Result of attempting to retrieve one target's content
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub target: Target,
    /// The full response body, or why it could not be obtained
    pub payload: Result<Vec<u8>, FetchError>,
}

impl FetchOutcome {
    pub fn ok(target: Target, payload: Vec<u8>) -> Self {
        Self {
            target,
            payload: Ok(payload),
        }
    }

    pub fn err(target: Target, error: FetchError) -> Self {
        Self {
            target,
            payload: Err(error),
        }
    }
}

/// Terminal record for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub target: Target,
    pub matched: bool,
    pub error: Option<SearchError>,
}

impl SearchOutcome {
    pub fn matched(target: Target, matched: bool) -> Self {
        Self {
            target,
            matched,
            error: None,
        }
    }

    /// A failed outcome never reports a match
    pub fn failed(target: Target, error: impl Into<SearchError>) -> Self {
        Self {
            target,
            matched: false,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Error text as written to the results file (empty when there is none)
    pub fn error_text(&self) -> String {
        self.error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

/// Aggregate counts for a completed run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Targets read from the source (one outcome was recorded for each)
    pub targets: usize,
    pub matched: usize,
    pub not_matched: usize,
    pub errors: usize,
    /// Wall-clock duration of the run
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed: Duration,
}

fn serialize_elapsed<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*elapsed).to_string())
}

impl RunSummary {
    pub fn new() -> Self {
        Default::default()
    }

    /// Folds one recorded outcome into the counts
    pub fn add_outcome(&mut self, outcome: &SearchOutcome) {
        self.targets += 1;
        if outcome.is_error() {
            self.errors += 1;
        } else if outcome.matched {
            self.matched += 1;
        } else {
            self.not_matched += 1;
        }
    }
}
