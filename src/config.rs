use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Storage key for the last entered wallet address.
pub const ADDRESS_KEY: &str = "addr";

/// Addresses this short or shorter are not looked up.
pub const MIN_ADDRESS_LEN: usize = 10;

/// Sparkline viewport after normalisation.
pub const SPARKLINE_VIEW_BOX: &str = "0 0 200 100";

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_url: String,
    pub explorer_tx_url: String,
    pub explorer_block_url: String,
    pub ticker: String,
    pub short_term: usize,
    pub block_time_secs: f64,
    pub stats_refresh_secs: u64,
    pub reload_secs: u64,
    pub calc_tick_ms: u64,
    pub chart_settle_ms: u64,
    pub http_timeout_secs: u64,
    pub state_db: String,
    pub static_root: PathBuf,
    pub fragment_base_url: Option<String>,
    pub snapshot_path: PathBuf,
    pub start_route: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.xelpool.com".to_string(),
            explorer_tx_url: "https://explorer.xelis.io/txs/".to_string(),
            explorer_block_url: "https://explorer.xelis.io/blocks/".to_string(),
            ticker: "XEL".to_string(),
            short_term: 10,
            block_time_secs: 15.0,
            stats_refresh_secs: 120,
            reload_secs: 3600,
            calc_tick_ms: 100,
            chart_settle_ms: 1,
            http_timeout_secs: 10,
            state_db: "./pooldash.sqlite".to_string(),
            static_root: PathBuf::from("./webui"),
            fragment_base_url: None,
            snapshot_path: PathBuf::from("./dashboard.html"),
            start_route: String::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_url: std::env::var("POOL_API_URL").unwrap_or(d.api_url),
            explorer_tx_url: std::env::var("EXPLORER_TX_URL").unwrap_or(d.explorer_tx_url),
            explorer_block_url: std::env::var("EXPLORER_BLOCK_URL").unwrap_or(d.explorer_block_url),
            ticker: std::env::var("TICKER").unwrap_or(d.ticker),
            short_term: env_parse("SHORT_TERM", d.short_term),
            block_time_secs: env_parse("BLOCK_TIME_SECS", d.block_time_secs),
            stats_refresh_secs: env_parse("STATS_REFRESH_SECS", d.stats_refresh_secs),
            reload_secs: env_parse("RELOAD_SECS", d.reload_secs),
            calc_tick_ms: env_parse("CALC_TICK_MS", d.calc_tick_ms),
            chart_settle_ms: env_parse("CHART_SETTLE_MS", d.chart_settle_ms),
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", d.http_timeout_secs),
            state_db: std::env::var("STATE_DB").unwrap_or(d.state_db),
            static_root: std::env::var("STATIC_ROOT").map(PathBuf::from).unwrap_or(d.static_root),
            fragment_base_url: std::env::var("FRAGMENT_BASE_URL").ok().filter(|v| !v.is_empty()),
            snapshot_path: std::env::var("SNAPSHOT_PATH").map(PathBuf::from).unwrap_or(d.snapshot_path),
            start_route: std::env::var("START_ROUTE").unwrap_or(d.start_route),
        }
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_url).with_context(|| format!("POOL_API_URL {:?}", self.api_url))?;
        Url::parse(&self.explorer_tx_url).context("EXPLORER_TX_URL")?;
        Url::parse(&self.explorer_block_url).context("EXPLORER_BLOCK_URL")?;
        if let Some(base) = &self.fragment_base_url {
            Url::parse(base).context("FRAGMENT_BASE_URL")?;
        }
        if self.short_term == 0 {
            bail!("SHORT_TERM must be positive");
        }
        if !(self.block_time_secs > 0.0) {
            bail!("BLOCK_TIME_SECS must be positive");
        }
        if self.stats_refresh_secs == 0 || self.reload_secs == 0 || self.calc_tick_ms == 0 {
            bail!("refresh, reload and calculator intervals must be positive");
        }
        Ok(())
    }

    pub fn stats_refresh(&self) -> Duration {
        Duration::from_secs(self.stats_refresh_secs)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_secs)
    }

    pub fn calc_tick(&self) -> Duration {
        Duration::from_millis(self.calc_tick_ms)
    }

    pub fn chart_settle(&self) -> Duration {
        Duration::from_millis(self.chart_settle_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn tx_link(&self, txid: &str) -> String {
        format!("{}{}", self.explorer_tx_url, txid)
    }

    pub fn block_link(&self, hash: &str) -> String {
        format!("{}{}", self.explorer_block_url, hash)
    }
}
