#![allow(clippy::unwrap_used)]

use std::time::Duration;

use revtether_core::ThroughputProbe;
use revtether_host::{HostError, HttpThroughputProbe};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

async fn probe_for(server: &MockServer, route: &str) -> HttpThroughputProbe {
    let url = Url::parse(&format!("{}{route}", server.uri())).unwrap();
    HttpThroughputProbe::new(url, Duration::from_secs(10)).unwrap()
}

// ── Downloads ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_counts_downloaded_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/__down"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 256 * 1024]))
        .expect(1)
        .mount(&server)
        .await;

    let probe = probe_for(&server, "/__down").await;
    let throughput = probe.measure().await.unwrap();

    assert_eq!(throughput.bytes, 256 * 1024);
    assert!(throughput.elapsed > Duration::ZERO);
    assert!(throughput.bits_per_second() > 0.0);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/__down"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let probe = probe_for(&server, "/__down").await;
    let err = probe.download().await.unwrap_err();

    match err {
        HostError::HttpStatus { status, url } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/__down"));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }

    let core = probe.measure().await.unwrap_err();
    assert!(core.to_string().contains("404"), "got {core}");
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let url = Url::parse("http://127.0.0.1:9/__down").unwrap();
    let probe = HttpThroughputProbe::new(url, Duration::from_secs(2)).unwrap();
    assert!(matches!(
        probe.download().await.unwrap_err(),
        HostError::Transport(_)
    ));
}
