//! Fetching target content over HTTP.
//!
//! [`Fetch`] is the seam between the dispatcher and the network. The
//! production implementation, [`HttpFetcher`], wraps one `reqwest::Client`
//! that is built once and shared read-only by every task; the client pools
//! connections internally and is safe for concurrent use.
//!
//! A fetch never fails the run. Every failure (bad URL, timeout, refused
//! connection, truncated body) comes back as a [`FetchOutcome`] carrying a
//! [`FetchError`].
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::{ScoutConfig, DEFAULT_TIMEOUT_SECS};
use crate::errors::{FetchError, ScoutError, ScoutResult};
use crate::results::{FetchOutcome, Target};

/// Retrieves the content of one target
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, target: &Target) -> FetchOutcome;
}

/// Settings for [`HttpFetcher`]
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Bound on the whole request, body included
    pub timeout: Duration,
    /// Scheme used for targets given as bare hostnames
    pub default_scheme: String,
    /// Treat non-2xx responses as errors instead of searching their body
    pub fail_on_status: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_scheme: "http".to_string(),
            fail_on_status: false,
        }
    }
}

impl FetchOptions {
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self {
            timeout: config.timeout(),
            default_scheme: config.default_scheme.clone(),
            fail_on_status: config.fail_on_status,
        }
    }
}

/// Issues one GET per target through a shared client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    options: FetchOptions,
}

impl HttpFetcher {
    /// Builds the shared client; failure here is a startup error
    pub fn new(options: FetchOptions) -> ScoutResult<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("sitescout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScoutError::Client(e.to_string()))?;
        Ok(Self { client, options })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.options.timeout)
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            FetchError::Read(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }

    async fn get(&self, target: &Target) -> Result<Vec<u8>, FetchError> {
        let url = target.url(&self.options.default_scheme)?;

        // The response is owned here and dropped on every return path,
        // which hands the connection back to the pool or closes it.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if self.options.fail_on_status && !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| match self.classify(e) {
            FetchError::Timeout(t) => FetchError::Timeout(t),
            other => FetchError::Read(other.to_string()),
        })?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, target: &Target) -> FetchOutcome {
        match self.get(target).await {
            Ok(body) => FetchOutcome::ok(target.clone(), body),
            Err(e) => FetchOutcome::err(target.clone(), e),
        }
    }
}
