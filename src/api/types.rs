//! Pool API response shapes.
//!
//! Numeric fields default to zero when absent and optional series decode
//! `null` as `None`, matching how the page treats missing values.

use serde::{Deserialize, Deserializer};

/// Go encodes nil slices as `null`; treat that like an empty list.
fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
pub struct HrPoint {
    /// Unix seconds
    pub t: i64,
    pub h: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolCharts {
    #[serde(default, deserialize_with = "nullable")]
    pub hashrate: Vec<HrPoint>,
    #[serde(default)]
    pub workers: Option<Vec<f64>>,
    #[serde(default)]
    pub addresses: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BlockRecord {
    #[serde(default)]
    pub height: u64,
    pub hash: String,
    /// 1.0 means exactly the expected amount of work
    pub effort: f64,
    /// Unix seconds
    pub time: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastBlock {
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolWithdrawal {
    pub txid: String,
    pub time: i64,
    pub amount: f64,
    #[serde(default)]
    pub destinations: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolStats {
    #[serde(default)]
    pub pool_hr: f64,
    #[serde(default)]
    pub net_hr: f64,
    #[serde(default)]
    pub connected_addresses: f64,
    #[serde(default)]
    pub connected_workers: f64,
    #[serde(default)]
    pub chart: PoolCharts,
    #[serde(default)]
    pub num_blocks_found: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub recent_blocks_found: Vec<BlockRecord>,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub last_block: Option<LastBlock>,
    #[serde(default)]
    pub reward: f64,
    #[serde(default)]
    pub pplns_window_seconds: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub withdrawals: Vec<PoolWithdrawal>,
    #[serde(default)]
    pub effort: f64,
    #[serde(default)]
    pub pool_fee_percent: Option<f64>,
    #[serde(default)]
    pub payment_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Withdrawal {
    pub txid: String,
    pub amount: f64,
    pub time: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinerStats {
    #[serde(default)]
    pub hashrate: f64,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub balance_pending: f64,
    #[serde(default)]
    pub paid: f64,
    #[serde(default)]
    pub est_pending: Option<f64>,
    #[serde(default)]
    pub hr_chart: Option<Vec<HrPoint>>,
    #[serde(default, deserialize_with = "nullable")]
    pub withdrawals: Vec<Withdrawal>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// `GET /stats/{address}` answers either with stats or an error body.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MinerLookup {
    Failed { error: ApiErrorBody },
    Found(MinerStats),
}
