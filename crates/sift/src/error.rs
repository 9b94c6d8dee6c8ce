// ABOUTME: Error types for sift: pre-flight validation, per-URL fetch/extraction failures, and formatting.
// ABOUTME: FetchError mirrors a kind + url + op + source shape with convenience constructors and helpers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Categories of per-URL failures recorded in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "code")]
pub enum FailureKind {
    InvalidUrl,
    Blocked,
    Timeout,
    Connection,
    HttpStatus(u16),
    Parse,
    Cancelled,
}

impl FailureKind {
    /// Stable snake_case name used by the JSON encodings.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidUrl => "invalid_url",
            FailureKind::Blocked => "blocked",
            FailureKind::Timeout => "timeout",
            FailureKind::Connection => "connection",
            FailureKind::HttpStatus(_) => "http_status",
            FailureKind::Parse => "parse",
            FailureKind::Cancelled => "cancelled",
        }
    }

    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Connection => true,
            FailureKind::HttpStatus(code) => *code >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid URL"),
            FailureKind::Blocked => write!(f, "private network blocked"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connection => write!(f, "connection error"),
            FailureKind::HttpStatus(code) => write!(f, "HTTP status {}", code),
            FailureKind::Parse => write!(f, "parse error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure to retrieve markup for a single URL.
#[derive(Debug, thiserror::Error)]
pub struct FetchError {
    pub kind: FailureKind,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sift: {} {}: {}", self.op, self.url, self.kind)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl FetchError {
    fn new(
        kind: FailureKind,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            kind,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(FailureKind::InvalidUrl, url, op, source)
    }

    /// Create a Blocked error (private network target).
    pub fn blocked(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(FailureKind::Blocked, url, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(FailureKind::Timeout, url, op, source)
    }

    /// Create a Connection error.
    pub fn connection(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(FailureKind::Connection, url, op, source)
    }

    /// Create an HttpStatus error.
    pub fn http_status(url: impl Into<String>, op: impl Into<String>, code: u16) -> Self {
        Self::new(FailureKind::HttpStatus(code), url, op, None)
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.kind == FailureKind::InvalidUrl
    }

    /// Returns true if this is a Blocked error.
    pub fn is_blocked(&self) -> bool {
        self.kind == FailureKind::Blocked
    }

    /// Returns true if this is a Connection error.
    pub fn is_connection(&self) -> bool {
        self.kind == FailureKind::Connection
    }

    /// Returns the HTTP status code for HttpStatus errors.
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            FailureKind::HttpStatus(code) => Some(code),
            _ => None,
        }
    }

    /// Message recorded in the report: the kind plus the underlying cause, without the url.
    pub fn message(&self) -> String {
        match self.source {
            Some(ref src) => format!("{}: {}", self.kind, src),
            None => self.kind.to_string(),
        }
    }
}

/// Failure to turn fetched bytes into a document.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The payload is not markup (binary media type or binary body).
    #[error("not parseable as markup: {0}")]
    Parse(String),
}

/// Fatal configuration problems detected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("batch of {len} URLs exceeds the maximum of {max}")]
    BatchTooLarge { len: usize, max: usize },

    #[error("unknown selector token {0:?}")]
    UnknownSelectorToken(String),

    #[error("selector token \"custom\" requires a non-empty custom selector")]
    MissingCustomSelector,

    #[error("invalid CSS selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("min length {min} is greater than max length {max}")]
    InvalidLengthBounds { min: usize, max: usize },
}

/// Failures while serializing a report.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("unsupported output format {0:?} (expected txt, json, jsonl, md or html)")]
    UnsupportedFormat(String),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Umbrella error for callers that validate, run and format in one go.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
