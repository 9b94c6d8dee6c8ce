// ABOUTME: Content filter engine: length bounds and substring include/exclude/search predicates.
// ABOUTME: Rules run in a fixed order and the first failing rule names the rejection reason.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Optional constraints on extracted text. Absent fields never reject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub search_query: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub contains_text: Option<String>,
    pub excludes_text: Option<String>,
}

/// Why a text was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FilterReason {
    TooShort { min: usize, actual: usize },
    TooLong { max: usize, actual: usize },
    MissingRequiredText { text: String },
    ContainsExcludedText { text: String },
    NoSearchMatch { query: String },
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::TooShort { min, actual } => {
                write!(f, "too short (min {}, got {})", min, actual)
            }
            FilterReason::TooLong { max, actual } => {
                write!(f, "too long (max {}, got {})", max, actual)
            }
            FilterReason::MissingRequiredText { text } => {
                write!(f, "does not contain {:?}", text)
            }
            FilterReason::ContainsExcludedText { text } => {
                write!(f, "contains excluded text {:?}", text)
            }
            FilterReason::NoSearchMatch { query } => {
                write!(f, "does not match search query {:?}", query)
            }
        }
    }
}

/// Result of evaluating a text against a filter spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Pass,
    Reject(FilterReason),
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

impl FilterSpec {
    /// Check internal consistency: min must not exceed max.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(ValidationError::InvalidLengthBounds { min, max });
            }
        }
        Ok(())
    }

    /// True when no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.min_length.is_none()
            && self.max_length.is_none()
            && non_empty(&self.search_query).is_none()
            && non_empty(&self.contains_text).is_none()
            && non_empty(&self.excludes_text).is_none()
    }

    /// Evaluate `text` against every rule, in order.
    pub fn evaluate(&self, text: &str) -> FilterVerdict {
        evaluate(text, self)
    }
}

/// Evaluate `text` against `spec`.
///
/// Order: min length, max length, contains (case-sensitive), excludes
/// (case-sensitive), search query (case-insensitive). Lengths count characters.
pub fn evaluate(text: &str, spec: &FilterSpec) -> FilterVerdict {
    let length = text.chars().count();

    if let Some(min) = spec.min_length {
        if length < min {
            return FilterVerdict::Reject(FilterReason::TooShort {
                min,
                actual: length,
            });
        }
    }

    if let Some(max) = spec.max_length {
        if length > max {
            return FilterVerdict::Reject(FilterReason::TooLong {
                max,
                actual: length,
            });
        }
    }

    if let Some(needle) = non_empty(&spec.contains_text) {
        if !text.contains(needle) {
            return FilterVerdict::Reject(FilterReason::MissingRequiredText {
                text: needle.to_string(),
            });
        }
    }

    if let Some(needle) = non_empty(&spec.excludes_text) {
        if text.contains(needle) {
            return FilterVerdict::Reject(FilterReason::ContainsExcludedText {
                text: needle.to_string(),
            });
        }
    }

    if let Some(query) = non_empty(&spec.search_query) {
        if !text.to_lowercase().contains(&query.to_lowercase()) {
            return FilterVerdict::Reject(FilterReason::NoSearchMatch {
                query: query.to_string(),
            });
        }
    }

    FilterVerdict::Pass
}
