// ── HTTP throughput probe ──
//
// Times a streaming GET of a fixed-size object and counts the bytes
// that actually arrived.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;
use url::Url;

use revtether_core::{CoreError, Throughput, ThroughputProbe};

use crate::error::HostError;

pub const DEFAULT_SPEEDTEST_URL: &str = "https://speed.cloudflare.com/__down?bytes=10000000";

#[derive(Debug, Clone)]
pub struct HttpThroughputProbe {
    http: reqwest::Client,
    url: Url,
}

impl HttpThroughputProbe {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, HostError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("revtether/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, url))
    }

    pub fn with_client(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn download(&self) -> Result<Throughput, HostError> {
        debug!(url = %self.url, "starting throughput download");
        let started = Instant::now();

        let resp = self.http.get(self.url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(HostError::HttpStatus {
                status: status.as_u16(),
                url: self.url.to_string(),
            });
        }

        let mut bytes: u64 = 0;
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            bytes += u64::try_from(chunk?.len()).unwrap_or(u64::MAX);
        }

        let elapsed = started.elapsed();
        debug!(bytes, elapsed_ms = elapsed.as_millis(), "throughput download finished");
        Ok(Throughput { bytes, elapsed })
    }
}

#[async_trait]
impl ThroughputProbe for HttpThroughputProbe {
    async fn measure(&self) -> Result<Throughput, CoreError> {
        Ok(self.download().await?)
    }
}
