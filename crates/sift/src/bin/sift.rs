// ABOUTME: CLI binary for sift: extracts content from a batch of URLs or a local HTML file.
// ABOUTME: Writes the report in the chosen format and can publish Markdown pages to a directory.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use sift::{
    format, process_markup, publish_report, DirectoryPublisher, ExtractRequest, ExtractionReport,
    OutputFormat, Pipeline, RawMarkup, ReportEntry, SelectorSpec, TemplateKind,
};

#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(version)]
#[command(about = "Extract content from a batch of web pages")]
struct Args {
    /// URLs to extract (at most 50 per run)
    #[arg()]
    urls: Vec<String>,

    /// Read URLs from a file, one per line ("-" for stdin)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Output format: txt (default), json, jsonl, md/markdown, html
    #[arg(short = 'f', long = "format", default_value = "txt")]
    format: String,

    /// Content selector token: h1-h6, title, p, article, main, div, span or custom (repeatable)
    #[arg(short = 's', long = "selector")]
    selectors: Vec<String>,

    /// CSS selectors (comma separated) used for the "custom" token
    #[arg(long = "custom-selector")]
    custom_selector: Option<String>,

    /// CSS selector for code blocks, kept verbatim
    #[arg(long = "code-selector")]
    code_selector: Option<String>,

    /// CSS selector for regions to drop before extraction
    #[arg(long = "exclude-selector")]
    exclude_selector: Option<String>,

    /// Keep only pages containing this text (case-insensitive)
    #[arg(long = "search")]
    search: Option<String>,

    /// Minimum extracted length in characters
    #[arg(long = "min-length")]
    min_length: Option<usize>,

    /// Maximum extracted length in characters
    #[arg(long = "max-length")]
    max_length: Option<usize>,

    /// Keep only pages containing this exact text
    #[arg(long = "contains")]
    contains: Option<String>,

    /// Drop pages containing this exact text
    #[arg(long = "excludes")]
    excludes: Option<String>,

    /// JSON extraction request; flags override its fields
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Print JSON previews of N characters instead of the formatted report
    #[arg(long = "preview", value_name = "N")]
    preview: Option<usize>,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = 10)]
    timeout: u64,

    /// Overall deadline for the batch in seconds
    #[arg(long = "batch-timeout")]
    batch_timeout: Option<u64>,

    /// Concurrent fetches (1-10)
    #[arg(long = "concurrency", default_value_t = 5)]
    concurrency: usize,

    /// Retry timeouts, connection errors and 5xx responses once
    #[arg(long = "retry")]
    retry: bool,

    /// HTML file to extract instead of fetching (requires --url)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// URL recorded for the --html file
    #[arg(long = "url")]
    url: Option<String>,

    /// Allow fetching from private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    /// Render successful entries into Markdown pages under this directory
    #[arg(long = "publish-dir")]
    publish_dir: Option<PathBuf>,

    /// Document id (subdirectory) for published pages
    #[arg(long = "doc-id", default_value = "sift")]
    doc_id: String,

    /// Base name for published pages
    #[arg(long = "page-name", default_value = "URL Content")]
    page_name: String,

    /// Page template: article, code, documentation, blog (default: detect per URL)
    #[arg(long = "template")]
    template: Option<String>,

    /// URLs per published page
    #[arg(long = "page-size", default_value_t = 5)]
    page_size: usize,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "sift=debug" } else { "sift=warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Newline-delimited URLs; blank lines and `#` comments are skipped.
fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn read_url_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading URLs from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    Ok(parse_url_list(&text))
}

/// Start from the --config file, if any, and let flags override it.
fn build_request(args: &Args) -> anyhow::Result<ExtractRequest> {
    let mut request: ExtractRequest = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ExtractRequest::default(),
    };

    if !args.selectors.is_empty() {
        request.content_selector = Some(SelectorSpec::Multiple(args.selectors.clone()));
    }
    if args.custom_selector.is_some() {
        request.custom_selector = args.custom_selector.clone();
    }
    if args.code_selector.is_some() {
        request.code_selector = args.code_selector.clone();
    }
    if args.exclude_selector.is_some() {
        request.exclude_selector = args.exclude_selector.clone();
    }

    let filters = &mut request.filters;
    if args.search.is_some() {
        filters.search_query = args.search.clone();
    }
    if args.min_length.is_some() {
        filters.min_length = args.min_length;
    }
    if args.max_length.is_some() {
        filters.max_length = args.max_length;
    }
    if args.contains.is_some() {
        filters.contains_text = args.contains.clone();
    }
    if args.excludes.is_some() {
        filters.excludes_text = args.excludes.clone();
    }

    Ok(request)
}

fn previews_json(report: &ExtractionReport, max_chars: usize) -> anyhow::Result<String> {
    let mut map = Map::new();
    for (url, preview) in report.previews(max_chars) {
        map.insert(url, serde_json::to_value(preview)?);
    }
    Ok(serde_json::to_string_pretty(&Value::Object(map))?)
}

async fn extract_report(args: &Args, request: &ExtractRequest) -> anyhow::Result<ExtractionReport> {
    if let Some(html_path) = &args.html {
        let url = args
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("--url is required when using --html"))?;
        if !args.urls.is_empty() || args.input.is_some() {
            bail!("cannot use --html together with URLs or --input");
        }
        let html = fs::read_to_string(html_path)
            .with_context(|| format!("reading {}", html_path.display()))?;
        let config = request.build_config()?;
        let result = process_markup(&RawMarkup::from_html(url, html), &config);
        return Ok(ExtractionReport::new(vec![ReportEntry {
            url: url.to_string(),
            result,
        }]));
    }

    let mut urls = args.urls.clone();
    if let Some(input) = &args.input {
        urls.extend(read_url_list(input)?);
    }
    if urls.is_empty() {
        bail!("at least one URL is required, or use --html with --url");
    }

    let mut builder = Pipeline::builder()
        .timeout(Duration::from_secs(args.timeout))
        .concurrency(args.concurrency)
        .max_attempts(if args.retry { 2 } else { 1 })
        .allow_private_networks(args.allow_private_networks);
    if let Some(secs) = args.batch_timeout {
        builder = builder.batch_timeout(Duration::from_secs(secs));
    }

    let pipeline = builder.build()?;
    Ok(pipeline.run(&urls, request).await?)
}

fn write_output(path: Option<&Path>, output: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("writing {}", path.display()))?
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            if !output.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

/// Returns true when every URL and every page succeeded or was filtered.
async fn run(args: Args) -> anyhow::Result<bool> {
    let output_format: OutputFormat = args.format.parse()?;
    let template = args
        .template
        .as_deref()
        .map(str::parse::<TemplateKind>)
        .transpose()?;
    let request = build_request(&args)?;

    let start = Instant::now();
    let report = extract_report(&args, &request).await?;
    let elapsed = start.elapsed();

    let output = match args.preview {
        Some(n) => previews_json(&report, n)?,
        None => format(&report, output_format)?,
    };
    write_output(args.output.as_deref(), &output)?;

    let mut ok = report.summary().failed == 0;

    if let Some(dir) = &args.publish_dir {
        let publisher = DirectoryPublisher::new(dir);
        let pages = publish_report(
            &publisher,
            &args.doc_id,
            &args.page_name,
            &report,
            template,
            args.page_size,
        )
        .await;
        for page in pages {
            match page {
                Ok(location) => eprintln!("published {}", location),
                Err(e) => {
                    eprintln!("error: {}", e);
                    ok = false;
                }
            }
        }
    }

    if args.timing {
        eprintln!("elapsed: {}ms", elapsed.as_millis());
    }

    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_list_skips_blanks_and_comments() {
        let urls = parse_url_list("https://a.test/1\n\n  # skip me\n  https://a.test/2  \n");
        assert_eq!(urls, vec!["https://a.test/1", "https://a.test/2"]);
    }

    #[test]
    fn flags_override_config_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.json");
        fs::write(
            &path,
            r#"{"content_selector": "article", "exclude_selector": ".ads", "filters": {"min_length": 5}}"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "sift",
            "--config",
            path.to_str().unwrap(),
            "-s",
            "h1",
            "-s",
            "p",
            "--max-length",
            "100",
            "https://a.test/x",
        ]);
        let request = build_request(&args).unwrap();
        assert_eq!(
            request.content_selector,
            Some(SelectorSpec::Multiple(vec!["h1".to_string(), "p".to_string()]))
        );
        assert_eq!(request.exclude_selector.as_deref(), Some(".ads"));
        assert_eq!(request.filters.min_length, Some(5));
        assert_eq!(request.filters.max_length, Some(100));
    }
}
