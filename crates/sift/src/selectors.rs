// ABOUTME: Selector specification model and resolution into compiled CSS selectors.
// ABOUTME: Maps semantic tokens (h1..h6, p, article, ...) to tag selectors and expands "custom" strings.

//! Selector resolution.
//!
//! Callers describe what to extract with a [`SelectorSpec`]: one token, a list
//! of tokens, or a raw custom selector string. Resolution turns that into an
//! ordered list of compiled [`CssSelector`]s, preserving the order tokens were
//! given in, since that order decides how extracted blocks are concatenated.

use std::fmt;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Token that stands in for the caller's custom selector string.
pub const CUSTOM_TOKEN: &str = "custom";

/// Tokens that map 1:1 onto a tag-name selector.
pub const KNOWN_TOKENS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "title", "p", "article", "main", "div", "span",
];

/// What to select, as supplied by the caller.
///
/// Deserializes from a string (`"article"`), an array (`["h1", "p"]`),
/// or an object holding a raw selector (`{"custom": ".post, .entry"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorSpec {
    Single(String),
    Multiple(Vec<String>),
    Custom { custom: String },
}

impl SelectorSpec {
    /// Resolve into concrete selectors. `custom_selector` fills in any `custom` token.
    pub fn resolve(&self, custom_selector: Option<&str>) -> Result<Vec<CssSelector>, ValidationError> {
        match self {
            SelectorSpec::Single(token) => resolve([token.as_str()], custom_selector),
            SelectorSpec::Multiple(tokens) => resolve(tokens, custom_selector),
            SelectorSpec::Custom { custom } => resolve([CUSTOM_TOKEN], Some(custom)),
        }
    }
}

/// A compiled CSS selector that remembers its source text.
#[derive(Clone)]
pub struct CssSelector {
    source: String,
    selector: Selector,
}

impl CssSelector {
    /// Compile a selector, rejecting empty or malformed input.
    pub fn compile(css: &str) -> Result<Self, ValidationError> {
        let css = css.trim();
        if css.is_empty() {
            return Err(ValidationError::InvalidSelector {
                selector: String::new(),
                reason: "empty selector".to_string(),
            });
        }
        let selector = Selector::parse(css).map_err(|e| ValidationError::InvalidSelector {
            selector: css.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: css.to_string(),
            selector,
        })
    }

    /// Compile an optional selector; blank strings count as absent.
    pub fn compile_optional(css: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match css.map(str::trim) {
            Some(s) if !s.is_empty() => Self::compile(s).map(Some),
            _ => Ok(None),
        }
    }

    /// The selector text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn selector(&self) -> &Selector {
        &self.selector
    }
}

impl fmt::Debug for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CssSelector").field(&self.source).finish()
    }
}

impl fmt::Display for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for CssSelector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Split a custom selector string on commas, trimming and dropping empties.
pub fn split_custom(custom: &str) -> Vec<&str> {
    custom
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolve selector tokens into compiled selectors, in the order supplied.
///
/// Known tokens become tag selectors; `custom` expands to the pieces of
/// `custom_selector`. Blank tokens are skipped and repeated tokens keep their
/// first position.
pub fn resolve<I, S>(tokens: I, custom_selector: Option<&str>) -> Result<Vec<CssSelector>, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut resolved = Vec::new();

    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() || seen.iter().any(|t| t == token) {
            continue;
        }
        seen.push(token.to_string());

        if token == CUSTOM_TOKEN {
            let pieces = custom_selector.map(split_custom).unwrap_or_default();
            if pieces.is_empty() {
                return Err(ValidationError::MissingCustomSelector);
            }
            for piece in pieces {
                resolved.push(CssSelector::compile(piece)?);
            }
        } else if KNOWN_TOKENS.contains(&token) {
            resolved.push(CssSelector::compile(token)?);
        } else {
            return Err(ValidationError::UnknownSelectorToken(token.to_string()));
        }
    }

    Ok(resolved)
}
