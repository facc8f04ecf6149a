//! Recently found blocks and the luck/effort summary.
//!
//! Luck of a block is its effort relative to the mean effort of the whole
//! fetched window. The long-term figure compares that mean with itself and
//! is therefore always 100% for a non-empty window; it is kept as the pool
//! page has always shown it.

use std::sync::Arc;

use chrono::Utc;

use crate::api::{BlockRecord, PoolApi, STATS_ENDPOINT};
use crate::config::DashboardConfig;
use crate::format::{format_hashes, local_datetime, to_fixed};
use crate::html::{escape, row, tx_anchor};
use crate::logging::{log, log_fetch_error, obj, v_num, Domain, Level, ProfileScope};
use crate::metric::Metric;
use crate::surface::{apply, FieldUpdate, SharedSurface};

pub const BLOCKS_TABLE: &str = "blocksFound";
pub const EFFORT_LONG: &str = "effortL";
pub const EFFORT_SHORT: &str = "effortS";
pub const EST_CHUNK: &str = "estChunk";
pub const EST_ACTUAL: &str = "estActual";

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRow {
    pub hash: String,
    pub luck: Metric,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockLuck {
    pub rows: Vec<BlockRow>,
    /// Mean effort over the whole window.
    pub long_term_effort: Metric,
    pub long_term_pct: Metric,
    pub short_term_pct: Metric,
    /// Fraction of network blocks the pool is estimated to find.
    pub chunk: Metric,
    pub est_actual_hr: Metric,
}

/// `blocks` is newest first; `now` is fractional Unix seconds.
pub fn compute_luck(
    blocks: &[BlockRecord],
    pool_hr: f64,
    now: f64,
    short_term: usize,
    block_time_secs: f64,
) -> BlockLuck {
    let efforts: Vec<f64> = blocks.iter().map(|b| b.effort).collect();
    let count = efforts.len() as f64;
    let effort_sum: f64 = efforts.iter().sum();
    let short_sum: f64 = efforts.iter().take(short_term).sum();

    let long_term_effort = Metric::mean(&efforts);

    let rows = blocks
        .iter()
        .map(|b| BlockRow {
            hash: b.hash.clone(),
            luck: Metric::finite(b.effort * 100.0).per(long_term_effort),
            time: b.time,
        })
        .collect();

    // Divided by the window size even when fewer blocks were returned.
    let short_term_pct = Metric::ratio(short_sum, short_term as f64)
        .map(|v| v * 100.0)
        .per(long_term_effort);
    let long_term_pct = Metric::ratio(effort_sum, count)
        .map(|v| v * 100.0)
        .per(long_term_effort);

    let chunk = match blocks.last() {
        Some(oldest) => {
            let delta = now - oldest.time as f64;
            if delta > 0.0 {
                Metric::finite(count / delta * block_time_secs)
            } else {
                Metric::Unavailable
            }
        }
        None => Metric::Unavailable,
    };
    let est_actual_hr = Metric::finite(pool_hr).per(chunk);

    BlockLuck {
        rows,
        long_term_effort,
        long_term_pct,
        short_term_pct,
        chunk,
        est_actual_hr,
    }
}

pub fn render(luck: &BlockLuck, cfg: &DashboardConfig) -> Vec<FieldUpdate> {
    let table: String = luck
        .rows
        .iter()
        .map(|r| {
            row(&[
                tx_anchor(&cfg.block_link(&r.hash), &r.hash),
                escape(&r.luck.render(|v| format!("{}%", to_fixed(v, 1)))),
                escape(&local_datetime(r.time)),
            ])
        })
        .collect();

    vec![
        FieldUpdate::html(BLOCKS_TABLE, table),
        FieldUpdate::text(EFFORT_LONG, luck.long_term_pct.render(|v| format!("{}%", to_fixed(v, 1)))),
        FieldUpdate::text(EFFORT_SHORT, luck.short_term_pct.render(|v| format!("{}%", to_fixed(v, 1)))),
        FieldUpdate::text(EST_CHUNK, luck.chunk.render(|v| format!("{} %", to_fixed(v * 100.0, 2)))),
        FieldUpdate::text(EST_ACTUAL, luck.est_actual_hr.render(|v| format!("{}H/s", format_hashes(v)))),
    ]
}

pub struct BlocksPoller {
    api: Arc<dyn PoolApi>,
    surface: SharedSurface,
    cfg: Arc<DashboardConfig>,
}

impl BlocksPoller {
    pub fn new(api: Arc<dyn PoolApi>, surface: SharedSurface, cfg: Arc<DashboardConfig>) -> Self {
        Self { api, surface, cfg }
    }

    /// One fetch per page load. Failures are logged and leave the table
    /// as it was.
    pub async fn refresh(&self) {
        let _scope = ProfileScope::new("blocks.refresh");
        let stats = match self.api.stats().await {
            Ok(s) => s,
            Err(err) => {
                log_fetch_error("blocks", STATS_ENDPOINT, &err);
                return;
            }
        };

        let luck = compute_luck(
            &stats.recent_blocks_found,
            stats.pool_hr,
            Utc::now().timestamp_millis() as f64 / 1000.0,
            self.cfg.short_term,
            self.cfg.block_time_secs,
        );
        log(
            Level::Info,
            Domain::Api,
            "blocks_loaded",
            obj(&[
                ("blocks", v_num(luck.rows.len() as f64)),
                ("mean_effort", luck.long_term_effort.value().map(v_num).unwrap_or_default()),
            ]),
        );
        apply(&self.surface, render(&luck, &self.cfg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(hash: &str, effort: f64, time: i64) -> BlockRecord {
        BlockRecord { height: 0, hash: hash.to_string(), effort, time }
    }

    fn window(efforts: &[f64], newest: i64, spacing: i64) -> Vec<BlockRecord> {
        efforts
            .iter()
            .enumerate()
            .map(|(i, e)| block(&format!("h{}", i), *e, newest - i as i64 * spacing))
            .collect()
    }

    #[test]
    fn test_long_term_is_always_one_hundred() {
        for efforts in [vec![0.5], vec![0.2, 1.7, 3.1], vec![1.0; 25]] {
            let blocks = window(&efforts, 10_000, 60);
            let luck = compute_luck(&blocks, 1e6, 20_000.0, 10, 15.0);
            assert_eq!(luck.long_term_pct.fixed(1), "100.0");
        }
    }

    #[test]
    fn test_short_term_uses_newest_ten() {
        let mut efforts = vec![2.0; 10];
        efforts.extend(vec![0.5; 10]);
        let blocks = window(&efforts, 10_000, 60);
        let luck = compute_luck(&blocks, 1e6, 20_000.0, 10, 15.0);
        // mean(all) = 1.25, mean(newest ten) = 2.0 -> 160%
        assert_eq!(luck.short_term_pct.fixed(1), "160.0");
        assert_eq!(luck.rows[0].luck.fixed(1), "160.0");
        assert_eq!(luck.rows[19].luck.fixed(1), "40.0");
    }

    #[test]
    fn test_short_term_divides_by_window_when_fewer_blocks() {
        let blocks = window(&[1.0, 1.0], 10_000, 60);
        let luck = compute_luck(&blocks, 1e6, 20_000.0, 10, 15.0);
        assert_eq!(luck.short_term_pct.fixed(1), "20.0");
    }

    #[test]
    fn test_chunk_and_actual_hashrate() {
        // 4 blocks, oldest 600s ago: 4/600*15 = 0.1
        let blocks = window(&[1.0; 4], 1_000, 100);
        let luck = compute_luck(&blocks, 2_000_000.0, 1_300.0, 10, 15.0);
        assert!((luck.chunk.value().unwrap() - 0.1).abs() < 1e-12);
        assert!((luck.est_actual_hr.value().unwrap() - 20_000_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_window_is_unavailable() {
        let luck = compute_luck(&[], 1e6, 1_000.0, 10, 15.0);
        assert!(luck.rows.is_empty());
        assert_eq!(luck.long_term_pct, Metric::Unavailable);
        assert_eq!(luck.short_term_pct, Metric::Unavailable);
        assert_eq!(luck.chunk, Metric::Unavailable);
        assert_eq!(luck.est_actual_hr, Metric::Unavailable);
    }

    #[test]
    fn test_zero_effort_window() {
        let blocks = window(&[0.0, 0.0], 1_000, 10);
        let luck = compute_luck(&blocks, 1e6, 2_000.0, 10, 15.0);
        assert_eq!(luck.rows[0].luck, Metric::Unavailable);
        assert_eq!(luck.long_term_pct, Metric::Unavailable);
        assert!(luck.chunk.value().is_some());
    }

    #[test]
    fn test_oldest_block_in_future() {
        let blocks = window(&[1.0], 5_000, 10);
        let luck = compute_luck(&blocks, 1e6, 5_000.0, 10, 15.0);
        assert_eq!(luck.chunk, Metric::Unavailable);
        assert_eq!(luck.est_actual_hr, Metric::Unavailable);
    }

    #[test]
    fn test_fractional_now_within_first_second() {
        let blocks = window(&[1.0, 1.0, 1.0], 1_000, 0);
        let luck = compute_luck(&blocks, 9e6, 1_000.5, 10, 15.0);
        // 3 / 0.5 * 15
        assert_eq!(luck.chunk, Metric::Value(90.0));
        assert_eq!(luck.est_actual_hr, Metric::Value(100_000.0));
    }

    #[test]
    fn test_render_fields() {
        let cfg = DashboardConfig::default();
        let blocks = window(&[1.0; 4], 1_000, 100);
        let luck = compute_luck(&blocks, 2_000_000.0, 1_300.0, 10, 15.0);
        let updates = render(&luck, &cfg);
        assert!(updates.contains(&FieldUpdate::text(EFFORT_LONG, "100.0%")));
        assert!(updates.contains(&FieldUpdate::text(EFFORT_SHORT, "40.0%")));
        assert!(updates.contains(&FieldUpdate::text(EST_CHUNK, "10.00 %")));
        assert!(updates.contains(&FieldUpdate::text(EST_ACTUAL, "20.00 MH/s")));
        let FieldUpdate::Html { html, .. } = &updates[0] else { panic!("table first") };
        assert_eq!(html.matches("<tr>").count(), 4);
        assert!(html.contains("href=\"https://explorer.xelis.io/blocks/h0\""));
        assert!(html.contains("<td>100.0%</td>"));
    }

    #[test]
    fn test_render_empty_shows_sentinel() {
        let cfg = DashboardConfig::default();
        let updates = render(&compute_luck(&[], 0.0, 0.0, 10, 15.0), &cfg);
        assert_eq!(updates[0], FieldUpdate::html(BLOCKS_TABLE, ""));
        for id in [EFFORT_LONG, EFFORT_SHORT, EST_CHUNK, EST_ACTUAL] {
            assert!(updates.contains(&FieldUpdate::text(id, "N/A")));
        }
    }
}
