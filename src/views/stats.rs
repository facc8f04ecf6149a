//! Pool overview and the per-miner panel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::join;

use crate::api::{miner_endpoint, MinerLookup, MinerStats, PoolApi, PoolStats, STATS_ENDPOINT};
use crate::chart::{HoverBinding, LineChart, SparkPoint, Sparkline, MINER_SERIES_COLOR};
use crate::config::{DashboardConfig, ADDRESS_KEY, MIN_ADDRESS_LEN, SPARKLINE_VIEW_BOX};
use crate::format::{format_duration, format_hashes, js_number, local_datetime, local_time, round_to, to_fixed, to_precision};
use crate::html::{escape, row, tx_anchor};
use crate::logging::{log, log_fetch_error, obj, shorten_address, v_str, Domain, Level, ProfileScope};
use crate::storage::KvStore;
use crate::surface::{apply, FieldUpdate, SharedSurface};

pub const NET_HR: &str = "nethr";
pub const HEIGHT: &str = "height";
pub const BLOCKS_FOUND: &str = "blocksfound";
pub const EFFORT: &str = "effort";
pub const POOL_HR_TEXT: &str = "pool-hr-text";
pub const POOL_HR_CHART: &str = "pool-hr-chart";
pub const WORKERS_TEXT: &str = "workers-text";
pub const WORKERS_CHART: &str = "workers-chart";
pub const ADDRESSES_TEXT: &str = "addresses-text";
pub const ADDRESSES_CHART: &str = "addresses-chart";
pub const POOL_FEE: &str = "poolfee";
pub const MIN_PAYOUT: &str = "minpayout";
pub const PPLNS_WINDOW: &str = "pplns";
pub const LAST_BLOCK: &str = "lastblock";
pub const POOL_PAYOUTS: &str = "poolPayouts";

pub const MINER_AREA: &str = "minerArea";
pub const MINER_HR: &str = "hashrate";
pub const BALANCE: &str = "totaldue";
pub const UNCONFIRMED: &str = "unconfirmed";
pub const PAID: &str = "paid";
pub const EST_PENDING: &str = "estpending";
pub const MINER_CHART: &str = "minerChart";
pub const PAYOUTS: &str = "payouts";

fn hashrate_text(v: f64) -> String {
    format!("{}H/s", format_hashes(v))
}

fn sparkline(id: &str, target: &str, points: Vec<SparkPoint>, label: fn(f64) -> String, resting: String) -> FieldUpdate {
    let labels = points.iter().map(|p| label(p.value)).collect();
    FieldUpdate::Sparkline {
        id: id.to_string(),
        svg: Sparkline::new(points).render(),
        hover: HoverBinding { target: target.to_string(), labels, resting },
    }
}

fn count_series(values: &[f64]) -> Vec<SparkPoint> {
    values.iter().map(|v| SparkPoint { date_ms: 0, value: *v }).collect()
}

pub fn render_pool(stats: &PoolStats, cfg: &DashboardConfig) -> Vec<FieldUpdate> {
    let mut out = vec![
        FieldUpdate::text(NET_HR, hashrate_text(stats.net_hr)),
        FieldUpdate::text(HEIGHT, stats.height.to_string()),
        FieldUpdate::text(BLOCKS_FOUND, stats.num_blocks_found.to_string()),
        FieldUpdate::text(EFFORT, format!("{}%", to_fixed(stats.effort * 100.0, 1))),
    ];

    let pool_hr = hashrate_text(stats.pool_hr);
    let hr_points = stats
        .chart
        .hashrate
        .iter()
        .map(|p| SparkPoint { date_ms: p.t.saturating_mul(1000), value: p.h })
        .collect();
    out.push(FieldUpdate::text(POOL_HR_TEXT, pool_hr.clone()));
    out.push(sparkline(POOL_HR_CHART, POOL_HR_TEXT, hr_points, hashrate_text, pool_hr));

    if let Some(workers) = &stats.chart.workers {
        let resting = js_number(stats.connected_workers);
        out.push(FieldUpdate::text(WORKERS_TEXT, resting.clone()));
        out.push(sparkline(WORKERS_CHART, WORKERS_TEXT, count_series(workers), js_number, resting));
    }
    if let Some(addresses) = &stats.chart.addresses {
        let resting = js_number(stats.connected_addresses);
        out.push(FieldUpdate::text(ADDRESSES_TEXT, resting.clone()));
        out.push(sparkline(ADDRESSES_CHART, ADDRESSES_TEXT, count_series(addresses), js_number, resting));
    }

    out.push(FieldUpdate::NormalizeSvg {
        view_box: SPARKLINE_VIEW_BOX.to_string(),
        preserve_aspect_ratio: "none".to_string(),
    });

    if let Some(fee) = stats.pool_fee_percent {
        out.push(FieldUpdate::text(POOL_FEE, format!("{}%", js_number(fee))));
    }
    if let Some(threshold) = stats.payment_threshold {
        out.push(FieldUpdate::text(MIN_PAYOUT, format!("{} {}", js_number(threshold), cfg.ticker)));
    }
    if let Some(window) = stats.pplns_window_seconds {
        out.push(FieldUpdate::text(PPLNS_WINDOW, format_duration(window)));
    }
    if let Some(last) = stats.last_block.as_ref().filter(|b| b.height > 0) {
        out.push(FieldUpdate::text(LAST_BLOCK, last.height.to_string()));
    }
    let payouts: String = stats
        .withdrawals
        .iter()
        .map(|w| {
            row(&[
                tx_anchor(&cfg.tx_link(&w.txid), &w.txid),
                escape(&format!("{} {}", to_precision(w.amount, 6), cfg.ticker)),
                w.destinations.to_string(),
                escape(&local_datetime(w.time)),
            ])
        })
        .collect();
    out.push(FieldUpdate::html(POOL_PAYOUTS, payouts));

    out
}

fn balance_text(v: f64, decimals: i32, ticker: &str) -> String {
    format!("{} {}", js_number(round_to(v, decimals)), ticker)
}

/// The lookup error short-circuits the panel: only the alert is emitted.
pub fn render_miner(lookup: &MinerLookup, cfg: &DashboardConfig) -> Vec<FieldUpdate> {
    let miner: &MinerStats = match lookup {
        MinerLookup::Failed { error } => {
            return vec![FieldUpdate::Alert(format!("could not find miner: {}", error.message))];
        }
        MinerLookup::Found(m) => m,
    };

    let mut out = vec![
        FieldUpdate::text(MINER_HR, hashrate_text(miner.hashrate)),
        FieldUpdate::text(BALANCE, balance_text(miner.balance, 5, &cfg.ticker)),
        FieldUpdate::text(UNCONFIRMED, balance_text(miner.balance_pending, 5, &cfg.ticker)),
        FieldUpdate::text(PAID, balance_text(miner.paid, 3, &cfg.ticker)),
    ];
    if let Some(est) = miner.est_pending {
        out.push(FieldUpdate::text(EST_PENDING, balance_text(est, 5, &cfg.ticker)));
    }

    match &miner.hr_chart {
        Some(series) => {
            out.push(FieldUpdate::visible(MINER_CHART, true));
            out.push(FieldUpdate::Chart {
                id: MINER_CHART.to_string(),
                chart: LineChart {
                    series_name: "Your hashrate".to_string(),
                    x_labels: series.iter().map(|p| local_time(p.t)).collect(),
                    values: series.iter().map(|p| p.h).collect(),
                    color: MINER_SERIES_COLOR.to_string(),
                },
            });
        }
        None => out.push(FieldUpdate::visible(MINER_CHART, false)),
    }

    let payouts: String = miner
        .withdrawals
        .iter()
        .map(|w| {
            row(&[
                tx_anchor(&cfg.tx_link(&w.txid), &w.txid),
                escape(&format!("{} {}", to_precision(w.amount, 6), cfg.ticker)),
                escape(&local_datetime(w.time)),
            ])
        })
        .collect();
    out.push(FieldUpdate::html(PAYOUTS, payouts));
    out.push(FieldUpdate::visible(MINER_AREA, true));
    out
}

pub struct StatsPoller {
    api: Arc<dyn PoolApi>,
    surface: SharedSurface,
    cfg: Arc<DashboardConfig>,
    store: Arc<Mutex<KvStore>>,
    address: Mutex<String>,
    chart_bound: AtomicBool,
}

impl StatsPoller {
    /// Pre-fills the address input from storage.
    pub fn new(
        api: Arc<dyn PoolApi>,
        surface: SharedSurface,
        cfg: Arc<DashboardConfig>,
        store: Arc<Mutex<KvStore>>,
    ) -> Self {
        let stored = {
            let guard = store.lock().unwrap_or_else(|e| e.into_inner());
            guard.get(ADDRESS_KEY)
        };
        let address = match stored {
            Ok(v) => v.unwrap_or_default(),
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Storage,
                    "address_load_failed",
                    obj(&[("msg", v_str(&format!("{:#}", err)))]),
                );
                String::new()
            }
        };
        Self {
            api,
            surface,
            cfg,
            store,
            address: Mutex::new(address),
            chart_bound: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> String {
        self.address.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Change listener of the address input: persist, then re-poll at once.
    pub async fn set_address(&self, value: &str) {
        *self.address.lock().unwrap_or_else(|e| e.into_inner()) = value.to_string();
        let saved = {
            let mut guard = self.store.lock().unwrap_or_else(|e| e.into_inner());
            guard.set(ADDRESS_KEY, value)
        };
        match saved {
            Ok(()) => log(Level::Info, Domain::Storage, "address_saved", obj(&[("address", v_str(value))])),
            Err(err) => log(
                Level::Error,
                Domain::Storage,
                "address_save_failed",
                obj(&[("msg", v_str(&format!("{:#}", err)))]),
            ),
        }
        self.refresh().await;
    }

    /// Pool and miner fetches run concurrently; each renders on its own.
    pub async fn refresh(&self) {
        let _scope = ProfileScope::new("stats.refresh");
        let address = self.address();
        join(self.refresh_pool(), self.refresh_miner(&address)).await;
    }

    async fn refresh_pool(&self) {
        match self.api.stats().await {
            Ok(stats) => apply(&self.surface, render_pool(&stats, &self.cfg)),
            Err(err) => log_fetch_error("stats", STATS_ENDPOINT, &err),
        }
    }

    async fn refresh_miner(&self, address: &str) {
        if address.len() <= MIN_ADDRESS_LEN {
            apply(&self.surface, vec![FieldUpdate::visible(MINER_AREA, false)]);
            return;
        }

        let lookup = match self.api.miner(address).await {
            Ok(l) => l,
            Err(err) => {
                log_fetch_error("miner", &miner_endpoint(&shorten_address(address)), &err);
                apply(&self.surface, vec![FieldUpdate::Alert(format!("error: {:#}", err))]);
                return;
            }
        };
        if let MinerLookup::Failed { error } = &lookup {
            log(
                Level::Warn,
                Domain::Api,
                "miner_not_found",
                obj(&[("address", v_str(address)), ("msg", v_str(&error.message))]),
            );
        }

        let updates = render_miner(&lookup, &self.cfg);
        let has_chart = updates.iter().any(|u| matches!(u, FieldUpdate::Chart { .. }));
        apply(&self.surface, updates);

        if has_chart && !self.chart_bound.swap(true, Ordering::SeqCst) {
            self.settle_chart();
        }
    }

    /// First render lays the chart out before its container has a size;
    /// one forced resize shortly after corrects it.
    fn settle_chart(&self) {
        let surface = self.surface.clone();
        let delay = self.cfg.chart_settle();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            apply(&surface, vec![FieldUpdate::ResizeChart { id: MINER_CHART.to_string() }]);
        });
    }
}
