use std::time::Duration;

use anyhow::Result;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde::Deserialize;

/// Evidence-search collaborator: title search plus short plaintext summaries.
/// The retrieval layer composes these into deduplicated snippet lists.
#[async_trait::async_trait]
pub trait Searcher: Send + Sync {
    async fn search_titles(&self, query: &str, n: usize) -> Result<Vec<String>>;
    async fn summary(&self, title: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SummaryResp {
    #[serde(default)]
    extract: String,
}

/// MediaWiki-backed searcher. Rate-limited, with a client-level timeout and a
/// small bounded retry so one stalled call fails a single item instead of
/// wedging the batch.
pub struct WikiSearch {
    http: Client,
    api_base: String,
    limiter: DefaultDirectRateLimiter,
    retries: u32,
}

impl WikiSearch {
    pub fn new(api_base: String, qps: u32, timeout_ms: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        let qps = std::num::NonZeroU32::new(qps).unwrap_or(nonzero!(2u32));
        let limiter = RateLimiter::direct(Quota::per_second(qps));
        Ok(Self {
            http,
            api_base,
            limiter,
            retries: 2,
        })
    }

    async fn get_with_retry(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let mut backoff = Duration::from_millis(250);
        let mut attempt = 0;
        loop {
            self.limiter.until_ready().await;
            let res = self
                .http
                .get(url)
                .query(query)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match res {
                Ok(resp) => return Ok(resp),
                Err(err) if attempt < self.retries => {
                    tracing::debug!(%err, attempt, "search request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[async_trait::async_trait]
impl Searcher for WikiSearch {
    async fn search_titles(&self, query: &str, n: usize) -> Result<Vec<String>> {
        let url = format!("{}/w/api.php", self.api_base);
        let params = [
            ("action", "opensearch".to_string()),
            ("search", query.to_string()),
            ("limit", n.to_string()),
            ("format", "json".to_string()),
        ];
        let resp = self.get_with_retry(&url, &params).await?;
        // opensearch returns [query, [titles], [descriptions], [urls]]
        let body: serde_json::Value = resp.json().await?;
        let titles = body
            .get(1)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .take(n)
                    .collect()
            })
            .unwrap_or_default();
        Ok(titles)
    }

    async fn summary(&self, title: &str) -> Result<String> {
        let url = format!(
            "{}/api/rest_v1/page/summary/{}",
            self.api_base,
            title.replace(' ', "_")
        );
        let resp = self.get_with_retry(&url, &[]).await?;
        let body: SummaryResp = resp.json().await?;
        Ok(body.extract)
    }
}
