// ABOUTME: Main library entry point for sift, a batch URL content extractor.
// ABOUTME: Re-exports the public API: Pipeline, PipelineBuilder, ExtractRequest, reports, formats and errors.

//! Sift - batch content extraction from web pages.
//!
//! Fetch up to [`MAX_BATCH_SIZE`] URLs concurrently, select regions with CSS
//! selectors, drop excluded regions, filter on length and text, and serialize
//! the per-URL outcomes as txt, json, jsonl, Markdown or HTML.
//!
//! # Example
//!
//! ```no_run
//! use sift::{format, ExtractRequest, OutputFormat, Pipeline, SelectorSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sift::Error> {
//!     let pipeline = Pipeline::builder().concurrency(5).build()?;
//!     let request = ExtractRequest {
//!         content_selector: Some(SelectorSpec::Single("article".into())),
//!         exclude_selector: Some(".ads".into()),
//!         ..Default::default()
//!     };
//!     let urls = vec!["https://example.com/post".to_string()];
//!     let report = pipeline.run(&urls, &request).await?;
//!     println!("{}", format(&report, OutputFormat::Markdown)?);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod formats;
pub mod options;
pub mod pages;
pub mod pipeline;
pub mod report;
pub mod selectors;

pub use crate::error::{
    Error, ExtractionError, FailureKind, FetchError, FormatError, ValidationError,
};
pub use crate::extract::{extract, extract_html, ExtractionConfig};
pub use crate::fetch::{Fetch, HttpFetcher, RawMarkup};
pub use crate::filter::{FilterReason, FilterSpec, FilterVerdict};
pub use crate::formats::{format, OutputFormat};
pub use crate::options::{Options, PipelineBuilder};
pub use crate::pages::{publish_report, DirectoryPublisher, PagePublisher, PublishError, TemplateKind};
pub use crate::pipeline::{process_markup, ExtractRequest, Pipeline, MAX_BATCH_SIZE};
pub use crate::report::{
    Block, Extracted, ExtractionReport, ExtractionResult, PageMapping, Preview, ReportEntry,
    Status, Summary,
};
pub use crate::selectors::{resolve, CssSelector, SelectorSpec};
