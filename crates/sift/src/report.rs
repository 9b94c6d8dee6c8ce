// ABOUTME: Per-URL extraction outcomes and the ordered report assembled from them.
// ABOUTME: Includes the typed text/code block model, status helpers, previews, and the page mapping.

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;
use crate::filter::FilterReason;

/// One unit of extracted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Block {
    /// Whitespace-normalized prose.
    Text(String),
    /// Verbatim code, line breaks preserved.
    Code(String),
}

impl Block {
    pub fn as_str(&self) -> &str {
        match self {
            Block::Text(s) | Block::Code(s) => s,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Block::Code(_))
    }
}

/// Extracted content for one page: text blocks in selector order, then code blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Extracted {
    blocks: Vec<Block>,
}

impl Extracted {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The plain text: every block joined by a blank line.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::as_str)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn has_code(&self) -> bool {
        self.blocks.iter().any(Block::is_code)
    }
}

/// Coarse outcome of a report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Filtered,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Filtered => "filtered",
            Status::Failed => "failed",
        }
    }
}

/// Outcome for a single URL. Created once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    Success { content: Extracted },
    Filtered { reason: FilterReason },
    Failed { kind: FailureKind, message: String },
}

impl ExtractionResult {
    pub fn status(&self) -> Status {
        match self {
            ExtractionResult::Success { .. } => Status::Success,
            ExtractionResult::Filtered { .. } => Status::Filtered,
            ExtractionResult::Failed { .. } => Status::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Success
    }

    /// Extracted content for successes.
    pub fn content(&self) -> Option<&Extracted> {
        match self {
            ExtractionResult::Success { content } => Some(content),
            _ => None,
        }
    }

    /// Human-readable reason for filtered or failed entries.
    pub fn reason(&self) -> Option<String> {
        match self {
            ExtractionResult::Success { .. } => None,
            ExtractionResult::Filtered { reason } => Some(reason.to_string()),
            ExtractionResult::Failed { message, .. } => Some(message.clone()),
        }
    }

    /// Failure category for failed entries.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ExtractionResult::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// A URL paired with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub url: String,
    pub result: ExtractionResult,
}

/// URL → text for successful entries, in report order. Handed to page publishers.
pub type PageMapping = Vec<(String, String)>;

/// Counts of each status in a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub success: usize,
    pub filtered: usize,
    pub failed: usize,
}

/// Ordered per-URL outcomes of one pipeline run; order matches the input URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    entries: Vec<ReportEntry>,
}

impl ExtractionReport {
    pub fn new(entries: Vec<ReportEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReportEntry> {
        self.entries.iter()
    }

    /// First entry recorded for `url`.
    pub fn get(&self, url: &str) -> Option<&ExtractionResult> {
        self.entries
            .iter()
            .find(|e| e.url == url)
            .map(|e| &e.result)
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for entry in &self.entries {
            match entry.result.status() {
                Status::Success => summary.success += 1,
                Status::Filtered => summary.filtered += 1,
                Status::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// URL → text for successful entries only.
    pub fn text_map(&self) -> PageMapping {
        self.entries
            .iter()
            .filter_map(|e| e.result.content().map(|c| (e.url.clone(), c.text())))
            .collect()
    }

    /// Short previews of every entry, truncated to `max_chars` characters.
    pub fn previews(&self, max_chars: usize) -> Vec<(String, Preview)> {
        self.entries
            .iter()
            .map(|e| (e.url.clone(), Preview::of(&e.result, max_chars)))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ExtractionReport {
    type Item = &'a ReportEntry;
    type IntoIter = std::slice::Iter<'a, ReportEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Truncated view of an entry for quick inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub status: Status,
    pub preview: String,
    pub content_length: usize,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Preview {
    fn of(result: &ExtractionResult, max_chars: usize) -> Self {
        match result.content() {
            Some(content) => {
                let text = content.text();
                let content_length = text.chars().count();
                let has_more = content_length > max_chars;
                let mut preview: String = text.chars().take(max_chars).collect();
                if has_more {
                    preview.push_str("...");
                }
                Preview {
                    status: Status::Success,
                    preview,
                    content_length,
                    has_more,
                    reason: None,
                }
            }
            None => Preview {
                status: result.status(),
                preview: String::new(),
                content_length: 0,
                has_more: false,
                reason: result.reason(),
            },
        }
    }
}
