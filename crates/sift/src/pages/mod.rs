// ABOUTME: Page generation: the PagePublisher seam, its error type, and batched publishing of reports.
// ABOUTME: Publishers receive a URL -> text mapping plus an optional template and return a page URL.

//! Page generation.
//!
//! Successful report entries can be turned into pages inside an external
//! document. The document system itself sits behind [`PagePublisher`];
//! [`publish_report`] only decides how entries are grouped and named.

mod directory;
pub mod templates;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::report::{ExtractionReport, PageMapping};

pub use directory::DirectoryPublisher;
pub use templates::{
    compose_page, detect_template, generate_toc, render_template, TemplateKind, UnknownTemplate,
};

/// Default number of URLs per generated page.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Failure to create one page.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("no content to publish for page {0:?}")]
    EmptyPage(String),

    #[error("failed to publish page {page:?}: {source}")]
    Backend {
        page: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PublishError {
    pub fn backend(page: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        PublishError::Backend {
            page: page.into(),
            source: source.into(),
        }
    }
}

/// Creates a page inside a document and returns a URL identifying it.
#[async_trait]
pub trait PagePublisher: Send + Sync {
    async fn publish(
        &self,
        doc_id: &str,
        page_name: &str,
        mapping: &PageMapping,
        template: Option<TemplateKind>,
    ) -> Result<String, PublishError>;
}

/// Name of the `n`th page (1-based) of a batched publish.
pub fn batch_page_name(base_name: &str, n: usize) -> String {
    format!("{} - Batch {}", base_name, n)
}

/// Publish the successful entries of `report`, `batch_size` input URLs per page.
///
/// Batches are cut over the whole report, so page `n` always covers input
/// positions `(n-1)*batch_size..n*batch_size`; only its successful entries are
/// published, and a batch without any is skipped. Pages are published one
/// after another. A failed page is recorded and the rest are still attempted.
pub async fn publish_report<P>(
    publisher: &P,
    doc_id: &str,
    base_name: &str,
    report: &ExtractionReport,
    template: Option<TemplateKind>,
    batch_size: usize,
) -> Vec<Result<String, PublishError>>
where
    P: PagePublisher + ?Sized,
{
    let mut results = Vec::new();

    for (i, batch) in report.entries().chunks(batch_size.max(1)).enumerate() {
        let mapping: PageMapping = batch
            .iter()
            .filter_map(|e| e.result.content().map(|c| (e.url.clone(), c.text())))
            .collect();
        if mapping.is_empty() {
            debug!(batch = i + 1, "no successful entries in batch, skipping page");
            continue;
        }
        let page_name = batch_page_name(base_name, i + 1);
        let result = publisher
            .publish(doc_id, &page_name, &mapping, template)
            .await;
        match &result {
            Ok(url) => info!(page = %page_name, urls = mapping.len(), %url, "published page"),
            Err(err) => warn!(page = %page_name, error = %err, "failed to publish page"),
        }
        results.push(result);
    }

    results
}
