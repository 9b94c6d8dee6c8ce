// ABOUTME: HTTP retrieval of raw markup with per-request timeouts and failure classification.
// ABOUTME: Handles private-network guarding, content-length limits, and charset decoding.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use encoding_rs::Encoding;
use ipnet::IpNet;
use once_cell::sync::Lazy;
use reqwest::redirect;
use url::{Host, Url};

use crate::error::FetchError;
use crate::options::Options;

/// Maximum allowed body size (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

const MAX_REDIRECTS: usize = 10;

/// Raw markup returned by a successful fetch.
#[derive(Debug, Clone)]
pub struct RawMarkup {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RawMarkup {
    /// Build markup from an in-memory HTML string (used for local files and tests).
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: Bytes::from(html.into()),
        }
    }

    /// Decode the body as UTF-8 text, using the charset from the content-type header or detection.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Source of raw markup for a URL.
///
/// The pipeline only talks to this trait, so tests and embedders can substitute
/// their own transport.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawMarkup, FetchError>;
}

/// Options that shape a single request.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            headers: HashMap::new(),
            allow_private_networks: false,
        }
    }
}

impl From<&Options> for FetchOptions {
    fn from(opts: &Options) -> Self {
        Self {
            timeout: opts.timeout,
            headers: opts.headers.clone(),
            allow_private_networks: opts.allow_private_networks,
        }
    }
}

/// reqwest-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    opts: FetchOptions,
}

impl HttpFetcher {
    /// Build a fetcher from pipeline options, creating an HTTP client unless one was injected.
    pub fn new(opts: &Options) -> reqwest::Result<Self> {
        let client = match opts.http_client.clone() {
            Some(client) => client,
            None => reqwest::Client::builder()
                .user_agent(&opts.user_agent)
                .timeout(opts.timeout)
                .redirect(redirect_policy(opts.allow_private_networks))
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()?,
        };
        Ok(Self::with_client(client, FetchOptions::from(opts)))
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client, opts: FetchOptions) -> Self {
        Self { client, opts }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawMarkup, FetchError> {
        fetch(&self.client, url, &self.opts).await
    }
}

static PRIVATE_NETS: Lazy<Vec<IpNet>> = Lazy::new(|| {
    [
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "::1/128",
        "fc00::/7",
        "fe80::/10",
    ]
    .iter()
    .filter_map(|net| net.parse().ok())
    .collect()
});

/// Loopback, RFC 1918, link-local and unique-local addresses.
pub(crate) fn is_private_ip(addr: &IpAddr) -> bool {
    PRIVATE_NETS.iter().any(|net| net.contains(addr))
}

/// Hosts written as a private IP address. Hostnames are not resolved here.
fn is_private_ip_literal(target: &Url) -> bool {
    match target.host() {
        Some(Host::Ipv4(ip)) => is_private_ip(&IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_private_ip(&IpAddr::V6(ip)),
        _ => false,
    }
}

/// Redirect hop refused because it targets a private address.
#[derive(Debug, thiserror::Error)]
#[error("redirect to private address {0} refused")]
struct PrivateRedirect(String);

/// Follows up to ten redirects, refusing private IP-literal hops unless allowed.
pub(crate) fn redirect_policy(allow_private_networks: bool) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !allow_private_networks && is_private_ip_literal(attempt.url()) {
            let target = attempt.url().to_string();
            attempt.error(PrivateRedirect(target))
        } else {
            attempt.follow()
        }
    })
}

fn refused_private_redirect(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if e.is::<PrivateRedirect>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Encoding named by the `charset` parameter of a content type.
fn declared_encoding(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, label)| {
            let label = label.trim().trim_matches(|c: char| c == '"' || c == '\'');
            Encoding::for_label(label.as_bytes())
        })
}

/// Decode with the declared charset, falling back to detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type.and_then(declared_encoding).unwrap_or_else(|| {
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(body, true);
        detector.guess(None, true)
    });
    encoding.decode(body).0.into_owned()
}

/// Validate a URL string: must parse, use http(s), and name a host.
pub fn validate_url(url: &str) -> Result<Url, FetchError> {
    if url.trim().is_empty() {
        return Err(FetchError::invalid_url(
            url,
            "Fetch",
            Some(anyhow::anyhow!("empty URL")),
        ));
    }

    let parsed = Url::parse(url.trim()).map_err(|e| {
        FetchError::invalid_url(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(FetchError::invalid_url(
            url,
            "Fetch",
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::invalid_url(
            url,
            "Fetch",
            Some(anyhow::anyhow!("URL has no host")),
        ));
    }

    Ok(parsed)
}

/// Reject targets that are, or resolve to, private addresses.
async fn guard_private_host(url: &str, target: &Url, what: &str) -> Result<(), FetchError> {
    let Some(host) = target.host_str() else {
        return Ok(());
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(FetchError::blocked(
                url,
                "Fetch",
                Some(anyhow::anyhow!("{} private IP addresses are not allowed", what)),
            ));
        }
        return Ok(());
    }

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        FetchError::connection(url, "Fetch", Some(anyhow::anyhow!("DNS lookup failed: {}", e)))
    })?;

    for socket_addr in addrs {
        if is_private_ip(&socket_addr.ip()) {
            return Err(FetchError::blocked(
                url,
                "Fetch",
                Some(anyhow::anyhow!("{} private IP addresses are not allowed", what)),
            ));
        }
    }
    Ok(())
}

fn classify_reqwest(url: &str, err: reqwest::Error, what: &str) -> FetchError {
    if refused_private_redirect(&err) {
        FetchError::blocked(url, "Fetch", Some(anyhow::anyhow!("{}: {}", what, err)))
    } else if err.is_timeout() {
        FetchError::timeout(url, "Fetch", Some(anyhow::anyhow!("{}: {}", what, err)))
    } else {
        FetchError::connection(url, "Fetch", Some(anyhow::anyhow!("{}: {}", what, err)))
    }
}

/// Fetch raw markup from the given URL.
///
/// Does not retry; retry policy belongs to the pipeline.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<RawMarkup, FetchError> {
    let parsed = validate_url(url)?;

    if !opts.allow_private_networks {
        guard_private_host(url, &parsed, "requests to").await?;
    }

    let mut request = client.get(parsed.as_str()).timeout(opts.timeout);
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| classify_reqwest(url, e, "request failed"))?;

    if !opts.allow_private_networks {
        let final_url = response.url().clone();
        guard_private_host(url, &final_url, "redirects to").await?;
    }

    let status = response.status().as_u16();
    if !response.status().is_success() {
        return Err(FetchError::http_status(url, "Fetch", status));
    }

    if let Some(len) = response.content_length() {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(FetchError::connection(
                url,
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    let body = response
        .bytes()
        .await
        .map_err(|e| classify_reqwest(url, e, "failed to read body"))?;

    if body.len() > MAX_CONTENT_LENGTH {
        return Err(FetchError::connection(
            url,
            "Fetch",
            Some(anyhow::anyhow!("content too large")),
        ));
    }

    Ok(RawMarkup {
        url: url.to_string(),
        final_url,
        status,
        content_type,
        body,
    })
}
