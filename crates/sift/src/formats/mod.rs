// ABOUTME: Output format serializers for extraction reports: txt, json, jsonl, md and html.
// ABOUTME: Pure projections over an ExtractionReport; the report is never mutated.

//! Output format conversion module.
//!
//! Every format walks the report in input order. Successful entries render
//! their blocks (text blocks as prose, code blocks verbatim); filtered and
//! failed entries render a short status line in place of content.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::error::FormatError;
use crate::report::{Block, ExtractionReport, ExtractionResult, ReportEntry};

static BACKTICK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`+").expect("valid regex"));
static BLOCK_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\s*)([#>+*=-])").expect("valid regex"));

/// Serialization strategy for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
    Jsonl,
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            "jsonl" => Ok(OutputFormat::Jsonl),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            _ => Err(FormatError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialize `report` in the requested format.
pub fn format(report: &ExtractionReport, format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Txt => Ok(to_txt(report)),
        OutputFormat::Json => to_json(report),
        OutputFormat::Jsonl => to_jsonl(report),
        OutputFormat::Markdown => Ok(to_markdown(report)),
        OutputFormat::Html => Ok(to_html(report)),
    }
}

/// `filtered: <reason>` or `failed: <reason>` for non-success entries.
fn status_line(result: &ExtractionResult) -> Option<String> {
    match result {
        ExtractionResult::Success { .. } => None,
        other => Some(format!(
            "{}: {}",
            other.status().as_str(),
            other.reason().unwrap_or_default()
        )),
    }
}

/// Plain text: `URL: <url>` header, then the text or a bracketed status line.
pub fn to_txt(report: &ExtractionReport) -> String {
    let mut out = String::new();
    for entry in report {
        out.push_str("URL: ");
        out.push_str(&entry.url);
        out.push('\n');
        match (&entry.result, status_line(&entry.result)) {
            (ExtractionResult::Success { content }, _) => out.push_str(&content.text()),
            (_, Some(line)) => {
                out.push('[');
                out.push_str(&line);
                out.push(']');
            }
            _ => {}
        }
        out.push_str("\n\n---\n\n");
    }
    out
}

fn status_object(result: &ExtractionResult) -> Value {
    match result {
        ExtractionResult::Success { content } => Value::String(content.text()),
        ExtractionResult::Filtered { reason } => json!({
            "status": "filtered",
            "reason": reason.to_string(),
        }),
        ExtractionResult::Failed { kind, message } => json!({
            "status": "failed",
            "kind": kind.as_str(),
            "reason": message,
        }),
    }
}

/// One object keyed by URL, in report order. Successes map to a string,
/// everything else to a `{status, reason}` object.
pub fn to_json(report: &ExtractionReport) -> Result<String, FormatError> {
    let mut map = Map::new();
    for entry in report {
        map.insert(entry.url.clone(), status_object(&entry.result));
    }
    Ok(serde_json::to_string_pretty(&Value::Object(map))?)
}

fn jsonl_line(entry: &ReportEntry) -> Value {
    let status = entry.result.status().as_str();
    match &entry.result {
        ExtractionResult::Success { content } => json!({
            "url": entry.url,
            "status": status,
            "content": content.text(),
        }),
        ExtractionResult::Filtered { reason } => json!({
            "url": entry.url,
            "status": status,
            "reason": reason.to_string(),
        }),
        ExtractionResult::Failed { kind, message } => json!({
            "url": entry.url,
            "status": status,
            "kind": kind.as_str(),
            "reason": message,
        }),
    }
}

/// One JSON object per line.
pub fn to_jsonl(report: &ExtractionReport) -> Result<String, FormatError> {
    let mut out = String::new();
    for entry in report {
        out.push_str(&serde_json::to_string(&jsonl_line(entry))?);
        out.push('\n');
    }
    Ok(out)
}

/// A backtick fence longer than any backtick run inside `code`.
fn fence_for(code: &str) -> String {
    let longest = BACKTICK_RUN
        .find_iter(code)
        .map(|m| m.as_str().len())
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

/// Prose that cannot open a heading, quote, list or code span.
fn escape_markdown(text: &str) -> String {
    let text = text.replace('`', "\\`");
    BLOCK_MARKER.replace_all(&text, "${1}\\${2}").into_owned()
}

fn markdown_section(entry: &ReportEntry) -> String {
    let mut parts = vec![format!("## {}", entry.url)];
    match &entry.result {
        ExtractionResult::Success { content } => {
            for block in content.blocks() {
                match block {
                    Block::Text(text) => parts.push(escape_markdown(text)),
                    Block::Code(code) => {
                        let fence = fence_for(code);
                        parts.push(format!("{fence}\n{code}\n{fence}"));
                    }
                }
            }
        }
        other => {
            if let Some(line) = status_line(other) {
                parts.push(format!("> {}", line));
            }
        }
    }
    parts.join("\n\n") + "\n"
}

/// Markdown: a level-2 heading per URL, entries separated by a rule.
pub fn to_markdown(report: &ExtractionReport) -> String {
    report
        .iter()
        .map(markdown_section)
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

fn escape(s: &str) -> String {
    htmlescape::encode_minimal(s)
}

/// Standalone HTML document with one `<h2>` + `<div>` per URL.
pub fn to_html(report: &ExtractionReport) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Extracted content</title>\n</head>\n<body>\n",
    );
    for entry in report {
        out.push_str(&format!("<h2>{}</h2>\n<div>\n", escape(&entry.url)));
        match &entry.result {
            ExtractionResult::Success { content } => {
                for block in content.blocks() {
                    match block {
                        Block::Text(text) => {
                            out.push_str(&format!("<p>{}</p>\n", escape(text)));
                        }
                        Block::Code(code) => {
                            out.push_str(&format!("<pre><code>{}</code></pre>\n", escape(code)));
                        }
                    }
                }
            }
            other => {
                if let Some(line) = status_line(other) {
                    out.push_str(&format!("<p class=\"status\">{}</p>\n", escape(&line)));
                }
            }
        }
        out.push_str("</div>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}
