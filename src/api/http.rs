use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{miner_endpoint, MinerLookup, PoolApi, PoolStats, STATS_ENDPOINT};
use crate::config::DashboardConfig;
use crate::logging::{log_fetch, ProfileScope};

pub struct HttpPoolApi {
    client: Client,
    base: Url,
}

impl HttpPoolApi {
    pub fn new(cfg: &DashboardConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.http_timeout())
            .build()
            .context("building http client")?;
        Ok(Self { client, base: parse_base(&cfg.api_url)? })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("joining {} onto {}", path, self.base))
    }

    /// Decodes the body whatever the status: the miner lookup answers
    /// `404` with a JSON error body that the view must see.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let scope = ProfileScope::new("api.get");
        let url = self.endpoint(path)?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        let body = resp.text().await.with_context(|| format!("reading {}", url))?;
        let parsed = serde_json::from_str(&body).with_context(|| format!("decoding {}", url))?;
        log_fetch(path, scope.elapsed_ms());
        Ok(parsed)
    }
}

/// A base without a trailing slash would lose its last path segment on join.
pub(crate) fn parse_base(raw: &str) -> Result<Url> {
    let mut s = raw.to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    Url::parse(&s).with_context(|| format!("invalid base url {:?}", raw))
}

#[async_trait]
impl PoolApi for HttpPoolApi {
    async fn stats(&self) -> Result<PoolStats> {
        self.get_json(STATS_ENDPOINT).await
    }

    async fn miner(&self, address: &str) -> Result<MinerLookup> {
        self.get_json(&miner_endpoint(address)).await
    }
}
