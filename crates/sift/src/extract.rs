// ABOUTME: Turns fetched markup into extracted text blocks using resolved selectors.
// ABOUTME: Exclusion runs first, then content selectors in order, then verbatim code blocks.

//! Extraction.
//!
//! Given markup and an [`ExtractionConfig`], produce an [`Extracted`] value:
//!
//! 1. Every node matching the exclude selector is detached with its subtree,
//!    so exclusion always wins over inclusion.
//! 2. Each content selector, in order, contributes one text block per matching
//!    node (whitespace collapsed). Without content selectors the document's
//!    visible body text is used.
//! 3. The code selector contributes verbatim code blocks in document order.

use ego_tree::iter::Edge;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::ExtractionError;
use crate::fetch::RawMarkup;
use crate::filter::FilterSpec;
use crate::report::{Block, Extracted};
use crate::selectors::CssSelector;

/// Resolved, immutable settings for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    pub content_selectors: Vec<CssSelector>,
    pub code_selector: Option<CssSelector>,
    pub exclude_selector: Option<CssSelector>,
    pub filters: FilterSpec,
}

/// Media types that are never markup.
const BINARY_MEDIA_TYPES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "font/",
    "application/pdf",
    "application/zip",
    "application/octet-stream",
];

/// Elements whose boundaries separate words.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Elements that never contribute visible text.
const HIDDEN_SELECTOR: &str = "script, style, noscript, template";

/// Collapses runs of whitespace into single spaces and trims.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops leading and trailing whitespace-only lines, keeping indentation inside.
fn strip_blank_edges(code: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

fn is_block(node: &Node) -> bool {
    matches!(node, Node::Element(e) if BLOCK_TAGS.contains(&e.name()))
}

/// Text of an element with block boundaries treated as spaces, then normalized.
fn element_text(el: ElementRef) -> String {
    let mut out = String::new();
    for edge in el.traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Text(text) => out.push_str(text),
                other if is_block(other) => out.push(' '),
                _ => {}
            },
            Edge::Close(node) => {
                if is_block(node.value()) {
                    out.push(' ');
                }
            }
        }
    }
    normalize_whitespace(&out)
}

/// Attached elements matching `selector`, in document order, `<html>` included.
///
/// Walks from the tree root instead of `Html::select`, which also visits
/// detached nodes, or `ElementRef::select`, which skips its own scope element.
fn select_attached<'a: 's, 's>(
    doc: &'a Html,
    selector: &'s Selector,
) -> impl Iterator<Item = ElementRef<'a>> + 's {
    doc.tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |el| selector.matches(el))
}

/// Detach every node matching `selector`, with its subtree.
fn remove_matching(doc: &mut Html, selector: &Selector) {
    let ids: Vec<NodeId> = select_attached(doc, selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// The top-level element, if exclusion left one.
fn top_element(doc: &Html) -> Option<ElementRef<'_>> {
    doc.tree.root().children().find_map(ElementRef::wrap)
}

fn visible_text(doc: &mut Html) -> String {
    if let Ok(hidden) = Selector::parse(HIDDEN_SELECTOR) {
        remove_matching(doc, &hidden);
    }
    let doc: &Html = doc;
    let body_selector = Selector::parse("body").ok();
    let body = body_selector
        .as_ref()
        .and_then(|sel| select_attached(doc, sel).next());
    body.or_else(|| top_element(doc))
        .map(element_text)
        .unwrap_or_default()
}

/// Reject payloads that are not markup at all.
fn ensure_markup(markup: &RawMarkup) -> Result<(), ExtractionError> {
    if let Some(ct) = markup.content_type.as_deref() {
        let ct = ct.trim().to_lowercase();
        if BINARY_MEDIA_TYPES.iter().any(|t| ct.starts_with(t)) {
            return Err(ExtractionError::Parse(format!("content type {}", ct)));
        }
    }
    let head = &markup.body[..markup.body.len().min(1024)];
    if head.contains(&0) {
        return Err(ExtractionError::Parse("binary body".to_string()));
    }
    Ok(())
}

/// Extract content from fetched markup.
pub fn extract(markup: &RawMarkup, config: &ExtractionConfig) -> Result<Extracted, ExtractionError> {
    ensure_markup(markup)?;
    Ok(extract_html(&markup.text(), config))
}

/// Extract content from an HTML string. HTML parsing itself cannot fail.
pub fn extract_html(html: &str, config: &ExtractionConfig) -> Extracted {
    let mut doc = Html::parse_document(html);

    if let Some(exclude) = &config.exclude_selector {
        remove_matching(&mut doc, exclude.selector());
    }

    // Code is read before hidden elements are stripped for the fallback text.
    let code_blocks: Vec<Block> = match &config.code_selector {
        Some(code) => select_attached(&doc, code.selector())
            .map(|el| strip_blank_edges(&el.text().collect::<String>()))
            .filter(|code| !code.is_empty())
            .map(Block::Code)
            .collect(),
        None => Vec::new(),
    };

    let mut blocks = Vec::new();
    if config.content_selectors.is_empty() {
        let text = visible_text(&mut doc);
        if !text.is_empty() {
            blocks.push(Block::Text(text));
        }
    } else {
        for sel in &config.content_selectors {
            for el in select_attached(&doc, sel.selector()) {
                let text = element_text(el);
                if !text.is_empty() {
                    blocks.push(Block::Text(text));
                }
            }
        }
    }

    blocks.extend(code_blocks);
    Extracted::new(blocks)
}
