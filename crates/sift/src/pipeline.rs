// ABOUTME: Batch orchestrator: validates the batch, resolves configuration once, then runs
// ABOUTME: fetch -> extract -> filter per URL on a bounded worker pool and reassembles input order.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FailureKind, FetchError, ValidationError};
use crate::extract::{extract, ExtractionConfig};
use crate::fetch::{Fetch, RawMarkup};
use crate::filter::{FilterSpec, FilterVerdict};
use crate::options::{Options, PipelineBuilder};
use crate::report::{ExtractionReport, ExtractionResult, ReportEntry};
use crate::selectors::{CssSelector, SelectorSpec};

/// Largest batch accepted by [`Pipeline::run`].
pub const MAX_BATCH_SIZE: usize = 50;

/// Caller-supplied extraction parameters, before validation.
///
/// Deserializes from JSON so a whole request can live in a config file:
///
/// ```json
/// {
///   "content_selector": ["h1", "custom"],
///   "custom_selector": ".post-body",
///   "exclude_selector": ".ads",
///   "filters": { "min_length": 200 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractRequest {
    pub content_selector: Option<SelectorSpec>,
    pub custom_selector: Option<String>,
    pub code_selector: Option<String>,
    pub exclude_selector: Option<String>,
    pub filters: FilterSpec,
}

impl ExtractRequest {
    /// Resolve selectors and validate filters into an immutable config.
    ///
    /// A custom selector given without any content selector is used on its own.
    pub fn build_config(&self) -> Result<ExtractionConfig, ValidationError> {
        let custom = self
            .custom_selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let content_selectors = match (&self.content_selector, custom) {
            (Some(spec), _) => spec.resolve(custom)?,
            (None, Some(custom)) => SelectorSpec::Custom {
                custom: custom.to_string(),
            }
            .resolve(None)?,
            (None, None) => Vec::new(),
        };

        self.filters.validate()?;

        Ok(ExtractionConfig {
            content_selectors,
            code_selector: CssSelector::compile_optional(self.code_selector.as_deref())?,
            exclude_selector: CssSelector::compile_optional(self.exclude_selector.as_deref())?,
            filters: self.filters.clone(),
        })
    }
}

/// Reject batches over [`MAX_BATCH_SIZE`].
pub fn check_batch_size(len: usize) -> Result<(), ValidationError> {
    if len > MAX_BATCH_SIZE {
        return Err(ValidationError::BatchTooLarge {
            len,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

/// Extract and filter already-fetched markup. Pure in `markup` and `config`.
pub fn process_markup(markup: &RawMarkup, config: &ExtractionConfig) -> ExtractionResult {
    let content = match extract(markup, config) {
        Ok(content) => content,
        Err(err) => {
            return ExtractionResult::Failed {
                kind: FailureKind::Parse,
                message: err.to_string(),
            }
        }
    };
    match config.filters.evaluate(&content.text()) {
        FilterVerdict::Pass => ExtractionResult::Success { content },
        FilterVerdict::Reject(reason) => ExtractionResult::Filtered { reason },
    }
}

fn failed(err: &FetchError) -> ExtractionResult {
    ExtractionResult::Failed {
        kind: err.kind,
        message: err.message(),
    }
}

fn cancelled() -> ExtractionResult {
    ExtractionResult::Failed {
        kind: FailureKind::Cancelled,
        message: FailureKind::Cancelled.to_string(),
    }
}

/// Runs extraction batches against a [`Fetch`] implementation.
#[derive(Clone)]
pub struct Pipeline {
    opts: Options,
    fetcher: Arc<dyn Fetch>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("opts", &self.opts).finish()
    }
}

impl Pipeline {
    pub fn new(opts: Options, fetcher: Arc<dyn Fetch>) -> Self {
        Self { opts, fetcher }
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Run a batch, bounded by the configured batch timeout if any.
    pub async fn run(
        &self,
        urls: &[String],
        request: &ExtractRequest,
    ) -> Result<ExtractionReport, ValidationError> {
        match self.opts.batch_timeout {
            Some(deadline) => {
                self.run_until(urls, request, tokio::time::sleep(deadline))
                    .await
            }
            None => {
                self.run_until(urls, request, std::future::pending::<()>())
                    .await
            }
        }
    }

    /// Run a batch until `cancel` resolves.
    ///
    /// Once `cancel` fires no new fetches start, in-flight fetches are dropped,
    /// and every URL without an outcome is recorded as `Failed{Cancelled}`.
    pub async fn run_until<C>(
        &self,
        urls: &[String],
        request: &ExtractRequest,
        cancel: C,
    ) -> Result<ExtractionReport, ValidationError>
    where
        C: Future<Output = ()>,
    {
        check_batch_size(urls.len())?;
        let config = request.build_config()?;
        let config = &config;

        let started = Instant::now();
        info!(
            urls = urls.len(),
            concurrency = self.opts.concurrency,
            "starting extraction batch"
        );

        let mut slots: Vec<Option<ExtractionResult>> = vec![None; urls.len()];
        {
            let results = stream::iter(urls.iter().enumerate())
                .map(|(index, url)| async move { (index, self.process(url, config).await) })
                .buffer_unordered(self.opts.concurrency.max(1));
            tokio::pin!(results);
            tokio::pin!(cancel);

            loop {
                tokio::select! {
                    next = results.next() => match next {
                        Some((index, result)) => slots[index] = Some(result),
                        None => break,
                    },
                    _ = &mut cancel => {
                        let pending = slots.iter().filter(|s| s.is_none()).count();
                        warn!(pending, "batch cancelled");
                        break;
                    }
                }
            }
        }

        let entries: Vec<ReportEntry> = urls
            .iter()
            .zip(slots)
            .map(|(url, slot)| ReportEntry {
                url: url.clone(),
                result: slot.unwrap_or_else(cancelled),
            })
            .collect();
        let report = ExtractionReport::new(entries);

        let summary = report.summary();
        info!(
            success = summary.success,
            filtered = summary.filtered,
            failed = summary.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction batch finished"
        );
        Ok(report)
    }

    async fn process(&self, url: &str, config: &ExtractionConfig) -> ExtractionResult {
        let markup = match self.fetch_with_retry(url).await {
            Ok(markup) => markup,
            Err(err) => {
                warn!(url, kind = err.kind.as_str(), error = %err, "fetch failed");
                return failed(&err);
            }
        };

        let result = process_markup(&markup, config);
        match &result {
            ExtractionResult::Failed { message, .. } => {
                warn!(url, error = %message, "extraction failed");
            }
            other => debug!(url, status = other.status().as_str(), "processed"),
        }
        result
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<RawMarkup, FetchError> {
        let mut attempt: u8 = 1;
        loop {
            match self.fetcher.fetch(url).await {
                Ok(markup) => return Ok(markup),
                Err(err) if attempt < self.opts.max_attempts && err.kind.is_transient() => {
                    debug!(url, attempt, error = %err, "retrying after transient failure");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterReason;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory fetcher: known pages succeed, unknown ones 404.
    #[derive(Default)]
    struct StaticFetch {
        pages: HashMap<String, String>,
        delays: HashMap<String, Duration>,
        // remaining transient failures per url
        flaky: Mutex<HashMap<String, u32>>,
        calls: AtomicUsize,
    }

    impl StaticFetch {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn delay(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }

        fn flaky(self, url: &str, failures: u32) -> Self {
            self.flaky
                .lock()
                .unwrap()
                .insert(url.to_string(), failures);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetch for StaticFetch {
        async fn fetch(&self, url: &str) -> Result<RawMarkup, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            {
                let mut flaky = self.flaky.lock().unwrap();
                if let Some(remaining) = flaky.get_mut(url) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(FetchError::timeout(url, "Fetch", None));
                    }
                }
            }
            match self.pages.get(url) {
                Some(html) => Ok(RawMarkup::from_html(url, html.clone())),
                None => Err(FetchError::http_status(url, "Fetch", 404)),
            }
        }
    }

    fn pipeline(fetch: &Arc<StaticFetch>, builder: PipelineBuilder) -> Pipeline {
        builder.fetcher(fetch.clone()).build().unwrap()
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn article_request() -> ExtractRequest {
        ExtractRequest {
            content_selector: Some(SelectorSpec::Single("article".to_string())),
            exclude_selector: Some(".ads".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn extracts_article_and_drops_excluded_region() {
        let fetch = Arc::new(StaticFetch::default().page(
            "https://a.test/x",
            r#"<html><body><article>Hello <b>world</b></article><div class="ads">Buy now</div></body></html>"#,
        ));
        let report = pipeline(&fetch, Pipeline::builder())
            .run(&urls(&["https://a.test/x"]), &article_request())
            .await
            .unwrap();

        let content = report.get("https://a.test/x").unwrap().content().unwrap();
        assert_eq!(content.text(), "Hello world");
    }

    #[tokio::test]
    async fn report_keeps_input_order_under_concurrency() {
        let fetch = Arc::new(
            StaticFetch::default()
                .page("https://a.test/slow", "<article>slow</article>")
                .page("https://a.test/fast", "<article>fast</article>")
                .delay("https://a.test/slow", Duration::from_millis(80)),
        );
        let input = urls(&["https://a.test/slow", "https://a.test/missing", "https://a.test/fast"]);
        let report = pipeline(&fetch, Pipeline::builder().concurrency(3))
            .run(&input, &article_request())
            .await
            .unwrap();

        let got: Vec<&str> = report.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(got, vec!["https://a.test/slow", "https://a.test/missing", "https://a.test/fast"]);
        assert_eq!(
            report.get("https://a.test/missing").unwrap().failure_kind(),
            Some(FailureKind::HttpStatus(404))
        );
    }

    #[tokio::test]
    async fn batch_of_fifty_is_accepted() {
        let input: Vec<String> = (0..50).map(|i| format!("https://a.test/{}", i)).collect();
        let fetch = Arc::new(StaticFetch::default());
        let report = pipeline(&fetch, Pipeline::builder())
            .run(&input, &ExtractRequest::default())
            .await
            .unwrap();
        assert_eq!(report.len(), 50);
        assert_eq!(fetch.calls(), 50);
    }

    #[tokio::test]
    async fn batch_of_fifty_one_fails_before_fetching() {
        let input: Vec<String> = (0..51).map(|i| format!("https://a.test/{}", i)).collect();
        let fetch = Arc::new(StaticFetch::default());
        let err = pipeline(&fetch, Pipeline::builder())
            .run(&input, &ExtractRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::BatchTooLarge { len: 51, max: 50 });
        assert_eq!(fetch.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_fetching() {
        let fetch = Arc::new(StaticFetch::default());
        let p = pipeline(&fetch, Pipeline::builder());

        let bad_bounds = ExtractRequest {
            filters: FilterSpec {
                min_length: Some(10),
                max_length: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            p.run(&urls(&["https://a.test/x"]), &bad_bounds).await,
            Err(ValidationError::InvalidLengthBounds { .. })
        ));

        let bad_token = ExtractRequest {
            content_selector: Some(SelectorSpec::Single("table".to_string())),
            ..Default::default()
        };
        assert!(matches!(
            p.run(&urls(&["https://a.test/x"]), &bad_token).await,
            Err(ValidationError::UnknownSelectorToken(_))
        ));
        assert_eq!(fetch.calls(), 0);
    }

    #[tokio::test]
    async fn short_content_is_filtered_not_failed() {
        let fetch = Arc::new(StaticFetch::default().page("https://a.test/x", "<article>tiny</article>"));
        let request = ExtractRequest {
            filters: FilterSpec {
                min_length: Some(1000),
                ..Default::default()
            },
            ..article_request()
        };
        let report = pipeline(&fetch, Pipeline::builder())
            .run(&urls(&["https://a.test/x"]), &request)
            .await
            .unwrap();
        assert_eq!(
            report.get("https://a.test/x"),
            Some(&ExtractionResult::Filtered {
                reason: FilterReason::TooShort {
                    min: 1000,
                    actual: 4
                }
            })
        );
    }

    #[tokio::test]
    async fn transient_failures_retry_once_when_enabled() {
        let fetch = Arc::new(
            StaticFetch::default()
                .page("https://a.test/x", "<article>ok</article>")
                .flaky("https://a.test/x", 1),
        );
        let report = pipeline(&fetch, Pipeline::builder().max_attempts(2))
            .run(&urls(&["https://a.test/x"]), &article_request())
            .await
            .unwrap();
        assert!(report.get("https://a.test/x").unwrap().is_success());
        assert_eq!(fetch.calls(), 2);
    }

    #[tokio::test]
    async fn no_retry_by_default_or_for_client_errors() {
        let fetch = Arc::new(
            StaticFetch::default()
                .page("https://a.test/x", "<article>ok</article>")
                .flaky("https://a.test/x", 1),
        );
        let report = pipeline(&fetch, Pipeline::builder())
            .run(&urls(&["https://a.test/x"]), &article_request())
            .await
            .unwrap();
        assert_eq!(
            report.get("https://a.test/x").unwrap().failure_kind(),
            Some(FailureKind::Timeout)
        );

        let fetch = Arc::new(StaticFetch::default());
        pipeline(&fetch, Pipeline::builder().max_attempts(2))
            .run(&urls(&["https://a.test/404"]), &article_request())
            .await
            .unwrap();
        assert_eq!(fetch.calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_marks_unfinished_urls() {
        let fetch = Arc::new(
            StaticFetch::default()
                .page("https://a.test/fast", "<article>fast</article>")
                .page("https://a.test/stuck", "<article>stuck</article>")
                .delay("https://a.test/stuck", Duration::from_secs(30)),
        );
        let report = pipeline(&fetch, Pipeline::builder().concurrency(2))
            .run_until(
                &urls(&["https://a.test/stuck", "https://a.test/fast"]),
                &article_request(),
                tokio::time::sleep(Duration::from_millis(100)),
            )
            .await
            .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(
            report.get("https://a.test/stuck").unwrap().failure_kind(),
            Some(FailureKind::Cancelled)
        );
        assert!(report.get("https://a.test/fast").unwrap().is_success());
    }

    #[tokio::test]
    async fn batch_timeout_bounds_the_run() {
        let fetch = Arc::new(
            StaticFetch::default()
                .page("https://a.test/stuck", "<article>stuck</article>")
                .delay("https://a.test/stuck", Duration::from_secs(30)),
        );
        let started = Instant::now();
        let report = pipeline(
            &fetch,
            Pipeline::builder().batch_timeout(Duration::from_millis(100)),
        )
        .run(&urls(&["https://a.test/stuck"]), &article_request())
        .await
        .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            report.get("https://a.test/stuck").unwrap().failure_kind(),
            Some(FailureKind::Cancelled)
        );
    }

    #[tokio::test]
    async fn runs_are_idempotent_and_duplicates_kept() {
        let fetch = Arc::new(StaticFetch::default().page(
            "https://a.test/x",
            "<article><p>One</p><pre>code()</pre></article>",
        ));
        let request = ExtractRequest {
            code_selector: Some("pre".to_string()),
            content_selector: Some(SelectorSpec::Single("p".to_string())),
            ..Default::default()
        };
        let p = pipeline(&fetch, Pipeline::builder());
        let input = urls(&["https://a.test/x", "https://a.test/x"]);
        let first = p.run(&input, &request).await.unwrap();
        let second = p.run(&input, &request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(
            first.entries()[0].result.content().unwrap().text(),
            "One\n\ncode()"
        );
    }

    #[test]
    fn custom_selector_alone_is_used_as_content() {
        let request = ExtractRequest {
            custom_selector: Some(".post, .lede".to_string()),
            ..Default::default()
        };
        let config = request.build_config().unwrap();
        let sources: Vec<&str> = config.content_selectors.iter().map(|s| s.as_str()).collect();
        assert_eq!(sources, vec![".post", ".lede"]);
    }

    #[test]
    fn request_deserializes_from_json() {
        let request: ExtractRequest = serde_json::from_str(
            r#"{"content_selector": ["h1", "custom"], "custom_selector": ".body",
                "exclude_selector": ".ads", "filters": {"min_length": 10}}"#,
        )
        .unwrap();
        assert_eq!(
            request.content_selector,
            Some(SelectorSpec::Multiple(vec!["h1".to_string(), "custom".to_string()]))
        );
        assert_eq!(request.filters.min_length, Some(10));
        assert_eq!(request.build_config().unwrap().content_selectors.len(), 2);
    }

    #[test]
    fn parse_errors_become_failed_entries() {
        let mut markup = RawMarkup::from_html("https://a.test/pdf", "%PDF-1.7");
        markup.content_type = Some("application/pdf".to_string());
        let result = process_markup(&markup, &ExtractionConfig::default());
        assert_eq!(result.failure_kind(), Some(FailureKind::Parse));
    }
}
