// ABOUTME: End-to-end pipeline tests over HTTP using httpmock.
// ABOUTME: Exercises fetch, extraction, filtering, retries and formatting through the public API.

use std::time::Duration;

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use sift::{
    format, ExtractRequest, ExtractionResult, FailureKind, FilterSpec, OutputFormat, Pipeline,
    SelectorSpec, Status,
};

fn local_pipeline() -> Pipeline {
    Pipeline::builder()
        .allow_private_networks(true)
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

#[tokio::test]
async fn mixed_batch_yields_one_entry_per_url_in_order() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/article");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(
                r#"<html><body>
                <article>Hello <b>world</b><aside class="ads">Buy now</aside></article>
                <pre><code>fn main() {}</code></pre>
                </body></html>"#,
            );
    });
    server.mock(|when, then| {
        when.method(GET).path("/short");
        then.status(200)
            .header("content-type", "text/html")
            .body("<article>hi</article>");
    });
    server.mock(|when, then| {
        when.method(GET).path("/error");
        then.status(500);
    });
    server.mock(|when, then| {
        when.method(GET).path("/image");
        then.status(200)
            .header("content-type", "image/png")
            .body("\u{89}PNG");
    });

    let urls = vec![
        server.url("/article"),
        server.url("/short"),
        server.url("/error"),
        "not a url".to_string(),
        server.url("/image"),
    ];
    let request = ExtractRequest {
        content_selector: Some(SelectorSpec::Single("article".to_string())),
        code_selector: Some("pre code".to_string()),
        exclude_selector: Some(".ads".to_string()),
        filters: FilterSpec {
            min_length: Some(5),
            ..Default::default()
        },
        ..Default::default()
    };

    let report = local_pipeline().run(&urls, &request).await.unwrap();
    assert_eq!(report.len(), urls.len());

    let statuses: Vec<Status> = report.iter().map(|e| e.result.status()).collect();
    assert_eq!(
        statuses,
        vec![
            Status::Success,
            Status::Filtered,
            Status::Failed,
            Status::Failed,
            Status::Failed
        ]
    );

    let article = report.get(&urls[0]).unwrap().content().unwrap();
    assert_eq!(article.text(), "Hello world\n\nfn main() {}");
    assert_eq!(
        report.get(&urls[2]).unwrap().failure_kind(),
        Some(FailureKind::HttpStatus(500))
    );
    assert_eq!(
        report.get("not a url").unwrap().failure_kind(),
        Some(FailureKind::InvalidUrl)
    );
    assert_eq!(
        report.get(&urls[4]).unwrap().failure_kind(),
        Some(FailureKind::Parse)
    );
}

#[tokio::test]
async fn private_targets_are_blocked_by_default() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/x");
        then.status(200).body("<p>x</p>");
    });

    let pipeline = Pipeline::builder().build().unwrap();
    let report = pipeline
        .run(&[server.url("/x")], &ExtractRequest::default())
        .await
        .unwrap();

    assert_eq!(
        report.entries()[0].result.failure_kind(),
        Some(FailureKind::Blocked)
    );
    mock.assert_calls(0);
}

#[tokio::test]
async fn server_errors_are_retried_when_enabled() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/flaky");
        then.status(503);
    });

    let pipeline = Pipeline::builder()
        .allow_private_networks(true)
        .max_attempts(2)
        .build()
        .unwrap();
    let report = pipeline
        .run(&[server.url("/flaky")], &ExtractRequest::default())
        .await
        .unwrap();

    assert!(matches!(
        report.entries()[0].result,
        ExtractionResult::Failed {
            kind: FailureKind::HttpStatus(503),
            ..
        }
    ));
    mock.assert_calls(2);
}

#[tokio::test]
async fn json_round_trip_matches_report() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/a");
        then.status(200)
            .header("content-type", "text/html")
            .body("<main><p>Alpha</p></main>");
    });
    server.mock(|when, then| {
        when.method(GET).path("/b");
        then.status(200)
            .header("content-type", "text/html")
            .body("<main><p>Beta</p></main>");
    });

    let urls = vec![server.url("/a"), server.url("/b")];
    let request = ExtractRequest {
        content_selector: Some(SelectorSpec::Single("main".to_string())),
        filters: FilterSpec {
            excludes_text: Some("Beta".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let report = local_pipeline().run(&urls, &request).await.unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&format(&report, OutputFormat::Json).unwrap()).unwrap();
    let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec![&urls[0], &urls[1]]);
    assert_eq!(json[&urls[0]], "Alpha");
    assert_eq!(json[&urls[1]]["status"], "filtered");

    let jsonl = format(&report, OutputFormat::Jsonl).unwrap();
    for (line, entry) in jsonl.lines().zip(report.iter()) {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["url"], entry.url.as_str());
        assert_eq!(value["status"], entry.result.status().as_str());
        assert_eq!(
            value.get("content").and_then(|v| v.as_str()),
            entry.result.content().map(|c| c.text()).as_deref()
        );
        assert_eq!(
            value.get("reason").and_then(|v| v.as_str()),
            entry.result.reason().as_deref()
        );
    }
    assert_eq!(jsonl.lines().count(), report.len());
}
