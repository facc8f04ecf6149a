use anyhow::Result;
use async_trait::async_trait;

mod http;
pub mod types;

pub use http::HttpPoolApi;
pub(crate) use http::parse_base;
pub use types::{BlockRecord, HrPoint, MinerLookup, MinerStats, PoolStats, Withdrawal};

pub const STATS_ENDPOINT: &str = "/stats";

pub fn miner_endpoint(address: &str) -> String {
    format!("{}/{}", STATS_ENDPOINT, address)
}

/// The pool backend as seen by the dashboard. Transport and decoding
/// failures are errors; an `{error}` body from the miner lookup is not.
#[async_trait]
pub trait PoolApi: Send + Sync {
    async fn stats(&self) -> Result<PoolStats>;
    async fn miner(&self, address: &str) -> Result<MinerLookup>;
}
