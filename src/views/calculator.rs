//! Profitability calculator: projected daily payout for a hypothetical
//! hashrate, recomputed locally on a short tick.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::api::{PoolApi, STATS_ENDPOINT};
use crate::config::DashboardConfig;
use crate::format::parse_float_prefix;
use crate::logging::{log, log_fetch_error, obj, v_num, Domain, Level};
use crate::metric::Metric;
use crate::surface::{apply, FieldUpdate, SharedSurface};

pub const PROFIT_FIELD: &str = "estimateProfit";

const SECS_PER_DAY: f64 = 86_400.0;

/// Values captured from one `/stats` fetch. Zero until it resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkParams {
    pub block_reward: f64,
    /// Network hashrate scaled down by 1000 to match the input's unit.
    pub net_hr: f64,
}

/// Unparsable input counts as zero.
pub fn parse_hashrate(input: &str) -> f64 {
    parse_float_prefix(input).filter(|v| !v.is_nan()).unwrap_or(0.0)
}

pub fn daily_profit(user_hr: f64, params: NetworkParams, block_time_secs: f64) -> Metric {
    if user_hr == 0.0 {
        return Metric::Value(0.0);
    }
    if !(params.net_hr > 0.0) {
        return Metric::Unavailable;
    }
    Metric::finite(user_hr / params.net_hr * params.block_reward * (SECS_PER_DAY / block_time_secs))
}

pub struct Calculator {
    api: Arc<dyn PoolApi>,
    surface: SharedSurface,
    cfg: Arc<DashboardConfig>,
    params: Mutex<NetworkParams>,
    input: watch::Receiver<String>,
}

impl Calculator {
    pub fn new(
        api: Arc<dyn PoolApi>,
        surface: SharedSurface,
        cfg: Arc<DashboardConfig>,
        input: watch::Receiver<String>,
    ) -> Self {
        Self { api, surface, cfg, params: Mutex::new(NetworkParams::default()), input }
    }

    pub fn params(&self) -> NetworkParams {
        *self.params.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetches reward and network hashrate once, then recomputes.
    pub async fn load(&self) {
        match self.api.stats().await {
            Ok(stats) => {
                let params = NetworkParams { block_reward: stats.reward, net_hr: stats.net_hr / 1000.0 };
                *self.params.lock().unwrap_or_else(|e| e.into_inner()) = params;
                log(
                    Level::Info,
                    Domain::Calc,
                    "network_params",
                    obj(&[("block_reward", v_num(params.block_reward)), ("net_hr", v_num(params.net_hr))]),
                );
                self.recompute();
            }
            Err(err) => log_fetch_error("calculator", STATS_ENDPOINT, &err),
        }
    }

    pub fn recompute(&self) {
        let user_hr = parse_hashrate(&self.input.borrow());
        let profit = daily_profit(user_hr, self.params(), self.cfg.block_time_secs);
        apply(&self.surface, vec![FieldUpdate::text(PROFIT_FIELD, profit.fixed(3))]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hashrate_is_zero_profit() {
        for params in [
            NetworkParams { block_reward: 1.5, net_hr: 1000.0 },
            NetworkParams { block_reward: 0.0, net_hr: 0.0 },
            NetworkParams { block_reward: 3.0, net_hr: f64::NAN },
        ] {
            assert_eq!(daily_profit(0.0, params, 15.0).fixed(3), "0.000");
        }
    }

    #[test]
    fn test_zero_network_hashrate_is_unavailable() {
        let p = NetworkParams { block_reward: 1.5, net_hr: 0.0 };
        assert_eq!(daily_profit(10.0, p, 15.0), Metric::Unavailable);
        assert_eq!(daily_profit(10.0, p, 15.0).fixed(3), "N/A");
    }

    #[test]
    fn test_profit_formula() {
        // 10/1000 of the network, 1.5 per block, 5760 blocks a day
        let p = NetworkParams { block_reward: 1.5, net_hr: 1000.0 };
        assert_eq!(daily_profit(10.0, p, 15.0).fixed(3), "86.400");
    }

    #[test]
    fn test_parse_hashrate() {
        assert_eq!(parse_hashrate("12.5"), 12.5);
        assert_eq!(parse_hashrate("abc"), 0.0);
        assert_eq!(parse_hashrate(""), 0.0);
        assert_eq!(parse_hashrate("40 kH/s"), 40.0);
    }
}
