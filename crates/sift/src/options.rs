// ABOUTME: Pipeline configuration: transport settings, worker-pool bounds, retries, and overall deadline.
// ABOUTME: PipelineBuilder provides a fluent API for constructing Pipeline instances with custom settings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::fetch::{Fetch, HttpFetcher};
use crate::pipeline::Pipeline;

/// Default number of concurrent in-flight fetches.
pub const DEFAULT_CONCURRENCY: usize = 5;
/// Upper bound on concurrent in-flight fetches.
pub const MAX_CONCURRENCY: usize = 10;
/// Upper bound on attempts per URL (one retry).
pub const MAX_ATTEMPTS: u8 = 2;

/// Configuration options for a pipeline.
#[derive(Clone)]
pub struct Options {
    pub timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub headers: HashMap<String, String>,
    pub concurrency: usize,
    pub max_attempts: u8,
    pub batch_timeout: Option<Duration>,
    pub http_client: Option<reqwest::Client>,
    pub fetcher: Option<Arc<dyn Fetch>>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("allow_private_networks", &self.allow_private_networks)
            .field("headers", &self.headers)
            .field("concurrency", &self.concurrency)
            .field("max_attempts", &self.max_attempts)
            .field("batch_timeout", &self.batch_timeout)
            .field("http_client", &self.http_client.is_some())
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!("sift/", env!("CARGO_PKG_VERSION")).to_string(),
            allow_private_networks: false,
            headers: HashMap::new(),
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: 1,
            batch_timeout: None,
            http_client: None,
            fetcher: None,
        }
    }
}

/// Builder for constructing Pipeline instances with custom configuration.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    opts: Options,
}

impl PipelineBuilder {
    /// Create a new PipelineBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Set the number of concurrent fetches, clamped to 1..=MAX_CONCURRENCY.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.opts.concurrency = n.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Set attempts per URL, clamped to 1..=MAX_ATTEMPTS.
    pub fn max_attempts(mut self, n: u8) -> Self {
        self.opts.max_attempts = n.clamp(1, MAX_ATTEMPTS);
        self
    }

    /// Set an overall deadline for the batch.
    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.opts.batch_timeout = Some(timeout);
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Use a custom fetch implementation instead of HTTP.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.opts.fetcher = Some(fetcher);
        self
    }

    /// Build the Pipeline with the configured options.
    pub fn build(self) -> Result<Pipeline, Error> {
        let fetcher: Arc<dyn Fetch> = match self.opts.fetcher.clone() {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&self.opts)?),
        };
        Ok(Pipeline::new(self.opts, fetcher))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Options::default();
        assert_eq!(opts.timeout, Duration::from_secs(10));
        assert_eq!(opts.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(opts.max_attempts, 1);
        assert!(opts.user_agent.starts_with("sift/"));
        assert!(opts.batch_timeout.is_none());
    }

    #[test]
    fn builder_clamps_bounds() {
        let b = PipelineBuilder::new().concurrency(0).max_attempts(9);
        assert_eq!(b.opts.concurrency, 1);
        assert_eq!(b.opts.max_attempts, MAX_ATTEMPTS);

        let b = PipelineBuilder::new().concurrency(64).max_attempts(0);
        assert_eq!(b.opts.concurrency, MAX_CONCURRENCY);
        assert_eq!(b.opts.max_attempts, 1);
    }
}
