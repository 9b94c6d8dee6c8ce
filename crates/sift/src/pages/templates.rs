// ABOUTME: Markdown page templates (article, code, documentation, blog) with table-of-contents generation.
// ABOUTME: Also scores content against indicator sets to pick a template automatically.

use std::fmt;
use std::str::FromStr;

use aho_corasick::AhoCorasick;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::report::PageMapping;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading regex"));

static CODE_INDICATORS: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(["```", "def ", "class ", "function", "return"]).expect("valid patterns")
});
static DOC_INDICATORS: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(["## ", "### ", "Table of Contents", "Installation", "Usage"])
        .expect("valid patterns")
});
static BLOG_INDICATORS: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(["Posted on", "Author:", "Comments", "Tags:"]).expect("valid patterns")
});

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const WORDS_PER_MINUTE: usize = 200;

/// Page layout used when rendering extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Article,
    Code,
    Documentation,
    Blog,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Article => "article",
            TemplateKind::Code => "code",
            TemplateKind::Documentation => "documentation",
            TemplateKind::Blog => "blog",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown template {0:?} (expected article, code, documentation or blog)")]
pub struct UnknownTemplate(pub String);

impl FromStr for TemplateKind {
    type Err = UnknownTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "article" => Ok(TemplateKind::Article),
            "code" => Ok(TemplateKind::Code),
            "documentation" | "docs" => Ok(TemplateKind::Documentation),
            "blog" => Ok(TemplateKind::Blog),
            _ => Err(UnknownTemplate(s.to_string())),
        }
    }
}

/// Table of contents links plus the content with heading anchors inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toc {
    pub links: String,
    pub content: String,
}

impl Toc {
    /// The links under a `## Table of Contents` heading, or empty when there are none.
    pub fn section(&self) -> String {
        if self.links.is_empty() {
            String::new()
        } else {
            format!("## Table of Contents\n{}\n\n", self.links)
        }
    }
}

/// Scan Markdown headings, anchor each one as `heading-N`, and list them.
pub fn generate_toc(content: &str) -> Toc {
    let mut links = Vec::new();
    let mut lines = Vec::new();

    for line in content.split('\n') {
        match HEADING.captures(line) {
            Some(caps) => {
                let hashes = &caps[1];
                let text = caps[2].trim();
                let id = format!("heading-{}", links.len());
                let indent = "  ".repeat(hashes.len() - 1);
                links.push(format!("{}- [{}](#{})", indent, text, id));
                lines.push(format!("{} {} <a id=\"{}\"></a>", hashes, text, id));
            }
            None => lines.push(line.to_string()),
        }
    }

    Toc {
        links: links.join("\n"),
        content: lines.join("\n"),
    }
}

/// Estimated minutes to read `content`, never less than one.
pub fn reading_time(content: &str) -> usize {
    (content.split_whitespace().count() / WORDS_PER_MINUTE).max(1)
}

/// Render one page of `content` taken from `url`. The title defaults to the URL.
pub fn render_template(
    kind: TemplateKind,
    content: &str,
    url: &str,
    title: Option<&str>,
    now: NaiveDateTime,
) -> String {
    let title = title.filter(|t| !t.trim().is_empty()).unwrap_or(url);
    let timestamp = now.format(TIMESTAMP_FORMAT);
    let toc = generate_toc(content);

    match kind {
        TemplateKind::Article => format!(
            "# {title}\n\n{toc}{content}\n\n---\nSource: {url}\nExtracted: {timestamp}\n",
            toc = toc.section(),
            content = toc.content,
        ),
        TemplateKind::Code => format!(
            "# {title}\n\n{toc}## Code Blocks\n\n{content}\n\n---\nSource: {url}\nExtracted: {timestamp}\n",
            toc = toc.section(),
            content = toc.content,
        ),
        TemplateKind::Documentation => format!(
            "# {title}\n\n## Table of Contents\n{links}\n\n## Content\n{content}\n\n---\nSource: {url}\nLast Updated: {timestamp}\n",
            links = toc.links,
            content = toc.content,
        ),
        TemplateKind::Blog => format!(
            "# {title}\n\n{toc}{content}\n\n## Metadata\n- Source: {url}\n- Published: {timestamp}\n- Reading Time: {minutes} min\n",
            toc = toc.section(),
            content = toc.content,
            minutes = reading_time(content),
        ),
    }
}

fn score(indicators: &AhoCorasick, content: &str) -> usize {
    indicators.find_overlapping_iter(content).count()
}

/// Pick the template whose indicators occur most often; `Article` when none occur.
pub fn detect_template(content: &str) -> TemplateKind {
    let scores = [
        (TemplateKind::Code, score(&CODE_INDICATORS, content)),
        (TemplateKind::Documentation, score(&DOC_INDICATORS, content)),
        (TemplateKind::Blog, score(&BLOG_INDICATORS, content)),
    ];
    // first maximum wins ties
    let mut best = (TemplateKind::Article, 0);
    for (kind, n) in scores {
        if n > best.1 {
            best = (kind, n);
        }
    }
    best.0
}

/// Render every entry of `mapping` and join them into a single page body.
pub fn compose_page(
    mapping: &PageMapping,
    template: Option<TemplateKind>,
    now: NaiveDateTime,
) -> String {
    mapping
        .iter()
        .map(|(url, content)| {
            let kind = template.unwrap_or_else(|| detect_template(content));
            render_template(kind, content, url, None, now)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn toc_anchors_headings_in_order() {
        let toc = generate_toc("# Intro\ntext\n## Setup  \n###NotAHeading\n### Deep");
        assert_eq!(
            toc.links,
            "- [Intro](#heading-0)\n  - [Setup](#heading-1)\n    - [Deep](#heading-2)"
        );
        assert_eq!(
            toc.content,
            "# Intro <a id=\"heading-0\"></a>\ntext\n## Setup <a id=\"heading-1\"></a>\n###NotAHeading\n### Deep <a id=\"heading-2\"></a>"
        );
    }

    #[test]
    fn article_without_headings_has_no_toc() {
        let page = render_template(
            TemplateKind::Article,
            "Plain body",
            "https://a.test/x",
            None,
            now(),
        );
        assert_eq!(
            page,
            "# https://a.test/x\n\nPlain body\n\n---\nSource: https://a.test/x\nExtracted: 2024-03-05 09:30:00\n"
        );
    }

    #[test]
    fn code_template_has_code_section() {
        let page = render_template(TemplateKind::Code, "x = 1", "https://a.test/c", Some("Snippets"), now());
        assert!(page.starts_with("# Snippets\n\n## Code Blocks\n\nx = 1\n"));
    }

    #[test]
    fn documentation_template_always_lists_contents() {
        let page = render_template(
            TemplateKind::Documentation,
            "## Usage\nrun it",
            "https://a.test/d",
            None,
            now(),
        );
        assert!(page.contains("## Table of Contents\n  - [Usage](#heading-0)\n\n## Content\n"));
        assert!(page.ends_with("Last Updated: 2024-03-05 09:30:00\n"));
    }

    #[test]
    fn blog_reports_reading_time() {
        let words = vec!["word"; 450].join(" ");
        let page = render_template(TemplateKind::Blog, &words, "https://a.test/b", None, now());
        assert!(page.ends_with("- Reading Time: 2 min\n"));
        assert_eq!(reading_time("short"), 1);
    }

    #[test]
    fn detects_template_from_indicators() {
        assert_eq!(detect_template("def main():\n    return 1"), TemplateKind::Code);
        assert_eq!(
            detect_template("## Installation\n### Usage\nsteps"),
            TemplateKind::Documentation
        );
        assert_eq!(
            detect_template("Posted on Monday. Author: Sam. Tags: rust"),
            TemplateKind::Blog
        );
        assert_eq!(detect_template("just words here"), TemplateKind::Article);
    }

    #[test]
    fn parses_template_names() {
        assert_eq!("Blog".parse::<TemplateKind>().unwrap(), TemplateKind::Blog);
        assert_eq!(
            "docs".parse::<TemplateKind>().unwrap(),
            TemplateKind::Documentation
        );
        assert!("wiki".parse::<TemplateKind>().is_err());
    }

    #[test]
    fn compose_joins_rendered_entries() {
        let mapping = vec![
            ("https://a.test/1".to_string(), "one".to_string()),
            ("https://a.test/2".to_string(), "two".to_string()),
        ];
        let page = compose_page(&mapping, Some(TemplateKind::Article), now());
        let parts: Vec<&str> = page.split("\n\n---\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("# https://a.test/1"));
        assert!(page.contains("# https://a.test/2\n\ntwo"));
    }
}
