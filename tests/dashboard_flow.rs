//! End-to-end flows of the dashboard views against an in-memory pool API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use pooldash::api::{MinerLookup, PoolApi, PoolStats};
use pooldash::config::{DashboardConfig, ADDRESS_KEY};
use pooldash::dashboard::{Dashboard, UiEvent};
use pooldash::router::{FragmentSource, SPA_CONTAINER};
use pooldash::storage::KvStore;
use pooldash::surface::{FieldUpdate, MemorySurface, SharedSurface, Surface};
use pooldash::views::blocks::{EFFORT_LONG, EFFORT_SHORT, EST_ACTUAL, EST_CHUNK};
use pooldash::views::calculator::PROFIT_FIELD;
use pooldash::views::stats::{BALANCE, MINER_AREA, MINER_CHART, MINER_HR, NET_HR, POOL_HR_CHART, POOL_HR_TEXT};
use pooldash::views::{BlocksPoller, StatsPoller};

const ADDRESS: &str = "xel:ys4peuzztwl67rzhsdu0yxfzwcfmgt85uu53hycpeeary7n8qvysqmxznt0";

#[derive(Default)]
struct FakeApi {
    stats: Mutex<Option<serde_json::Value>>,
    miners: Mutex<HashMap<String, serde_json::Value>>,
    stats_calls: AtomicU32,
    miner_calls: AtomicU32,
}

impl FakeApi {
    fn with_stats(stats: serde_json::Value) -> Self {
        let api = Self::default();
        *api.stats.lock().unwrap() = Some(stats);
        api
    }

    fn set_stats(&self, stats: Option<serde_json::Value>) {
        *self.stats.lock().unwrap() = stats;
    }

    fn set_miner(&self, address: &str, body: serde_json::Value) {
        self.miners.lock().unwrap().insert(address.to_string(), body);
    }
}

#[async_trait]
impl PoolApi for FakeApi {
    async fn stats(&self) -> Result<PoolStats> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let body = self.stats.lock().unwrap().clone().ok_or_else(|| anyhow!("connection refused"))?;
        Ok(serde_json::from_value(body)?)
    }

    async fn miner(&self, address: &str) -> Result<MinerLookup> {
        self.miner_calls.fetch_add(1, Ordering::SeqCst);
        let body = self
            .miners
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| anyhow!("connection reset"))?;
        Ok(serde_json::from_value(body)?)
    }
}

struct NoFragments;

#[derive(Default)]
struct CountingFragments {
    requested: Mutex<Vec<String>>,
}

#[async_trait]
impl FragmentSource for CountingFragments {
    async fn fetch_fragment(&self, path: &str) -> Result<String> {
        self.requested.lock().unwrap().push(path.to_string());
        Ok(format!("<section>{}</section>", path))
    }
}

#[async_trait]
impl FragmentSource for NoFragments {
    async fn fetch_fragment(&self, path: &str) -> Result<String> {
        Err(anyhow!("no fragment {}", path))
    }
}

fn pool_stats() -> serde_json::Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "pool_hr": 1_500_000.0,
        "net_hr": 1_000_000.0,
        "height": 500,
        "num_blocks_found": 2,
        "effort": 0.5,
        "reward": 1.5,
        "connected_workers": 4,
        "connected_addresses": 2,
        "chart": { "hashrate": [{"t": 1, "h": 1000.0}, {"t": 2, "h": 3000.0}], "workers": [3, 4] },
        "recent_blocks_found": [
            {"height": 2, "hash": "b2", "effort": 1.5, "time": now - 100},
            {"height": 1, "hash": "b1", "effort": 0.5, "time": now - 300},
        ],
    })
}

fn surfaces() -> (Arc<Mutex<MemorySurface>>, SharedSurface) {
    let mem = Arc::new(Mutex::new(MemorySurface::new()));
    let shared: SharedSurface = mem.clone();
    (mem, shared)
}

fn memory_store() -> Arc<Mutex<KvStore>> {
    let mut store = KvStore::in_memory().unwrap();
    store.init().unwrap();
    Arc::new(Mutex::new(store))
}

fn store_with_address(address: &str) -> Arc<Mutex<KvStore>> {
    let store = memory_store();
    store.lock().unwrap().set(ADDRESS_KEY, address).unwrap();
    store
}

#[tokio::test]
async fn miner_error_alerts_and_leaves_panel_untouched() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    api.set_miner(ADDRESS, json!({"error": {"code": 1, "message": "not found"}}));
    let (mem, surface) = surfaces();
    let poller = StatsPoller::new(api.clone(), surface, Arc::new(DashboardConfig::default()), store_with_address(ADDRESS));

    poller.refresh().await;

    let s = mem.lock().unwrap();
    assert_eq!(s.alerts().len(), 1);
    assert!(s.alerts()[0].contains("not found"));
    assert_eq!(s.text(MINER_HR), None);
    assert_eq!(s.text(BALANCE), None);
    assert_eq!(s.is_visible(MINER_AREA), None);
    // the pool overview still rendered
    assert_eq!(s.text(NET_HR), Some("1.00 MH/s"));
}

#[tokio::test]
async fn miner_panel_renders_for_known_address() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    api.set_miner(
        ADDRESS,
        json!({
            "hashrate": 2500.0, "balance": 0.123456789, "balance_pending": 0.0, "paid": 3.0,
            "hr_chart": [{"t": 0, "h": 2000.0}, {"t": 60, "h": 2500.0}],
            "withdrawals": [{"txid": "t1", "amount": 2.0, "time": 0}],
        }),
    );
    let cfg = DashboardConfig { chart_settle_ms: 1, ..Default::default() };
    let (mem, surface) = surfaces();
    let poller = StatsPoller::new(api.clone(), surface, Arc::new(cfg), store_with_address(ADDRESS));

    poller.refresh().await;
    poller.refresh().await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let s = mem.lock().unwrap();
    assert!(s.alerts().is_empty());
    assert_eq!(s.text(MINER_HR), Some("2.50 kH/s"));
    assert_eq!(s.text(BALANCE), Some("0.12346 XEL"));
    assert_eq!(s.is_visible(MINER_AREA), Some(true));
    assert_eq!(s.is_visible(MINER_CHART), Some(true));
    assert_eq!(s.chart_inits(), 1);
    assert_eq!(s.chart(MINER_CHART).unwrap().resizes, 1);
    assert!(s.html("payouts").unwrap().contains("https://explorer.xelis.io/txs/t1"));
}

#[tokio::test]
async fn short_address_hides_miner_area_without_lookup() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    let (mem, surface) = surfaces();
    let poller = StatsPoller::new(api.clone(), surface, Arc::new(DashboardConfig::default()), store_with_address("xel:short"));

    poller.refresh().await;

    assert_eq!(api.miner_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mem.lock().unwrap().is_visible(MINER_AREA), Some(false));
}

#[tokio::test]
async fn fetch_failure_keeps_previous_state() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    let (mem, surface) = surfaces();
    let poller = StatsPoller::new(api.clone(), surface, Arc::new(DashboardConfig::default()), memory_store());

    poller.refresh().await;
    api.set_stats(None);
    poller.refresh().await;

    let s = mem.lock().unwrap();
    assert_eq!(s.text(NET_HR), Some("1.00 MH/s"));
    assert!(s.alerts().is_empty());
    assert_eq!(api.stats_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn miner_transport_failure_alerts() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    let (mem, surface) = surfaces();
    let poller = StatsPoller::new(api.clone(), surface, Arc::new(DashboardConfig::default()), store_with_address(ADDRESS));

    poller.refresh().await;

    let s = mem.lock().unwrap();
    assert_eq!(s.alerts().len(), 1);
    assert!(s.alerts()[0].starts_with("error: "));
    assert_eq!(s.text(MINER_HR), None);
}

#[tokio::test]
async fn address_change_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.sqlite");
    let path = path.to_str().unwrap().to_string();
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    api.set_miner(ADDRESS, json!({"hashrate": 1.0}));

    {
        let mut store = KvStore::open(&path).unwrap();
        store.init().unwrap();
        let (_mem, surface) = surfaces();
        let poller = StatsPoller::new(api.clone(), surface, Arc::new(DashboardConfig::default()), Arc::new(Mutex::new(store)));
        assert_eq!(poller.address(), "");
        poller.set_address(ADDRESS).await;
        // the change listener re-polls immediately
        assert_eq!(api.miner_calls.load(Ordering::SeqCst), 1);
    }

    let mut store = KvStore::open(&path).unwrap();
    store.init().unwrap();
    let (_mem, surface) = surfaces();
    let poller = StatsPoller::new(api, surface, Arc::new(DashboardConfig::default()), Arc::new(Mutex::new(store)));
    assert_eq!(poller.address(), ADDRESS);
}

#[tokio::test]
async fn blocks_poller_renders_summary() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    let (mem, surface) = surfaces();
    let poller = BlocksPoller::new(api, surface, Arc::new(DashboardConfig::default()));

    poller.refresh().await;

    let s = mem.lock().unwrap();
    assert_eq!(s.text(EFFORT_LONG), Some("100.0%"));
    // (1.5 + 0.5) / 10 / 1.0 * 100
    assert_eq!(s.text(EFFORT_SHORT), Some("20.0%"));
    assert!(s.text(EST_CHUNK).unwrap().ends_with(" %"));
    assert!(s.text(EST_ACTUAL).unwrap().ends_with("H/s"));
    let table = s.html("blocksFound").unwrap();
    assert!(table.contains("<td>150.0%</td>"));
    assert!(table.contains("<td>50.0%</td>"));
}

#[tokio::test]
async fn blocks_poller_empty_window_renders_sentinels() {
    let mut stats = pool_stats();
    stats["recent_blocks_found"] = json!([]);
    let api = Arc::new(FakeApi::with_stats(stats));
    let (mem, surface) = surfaces();
    BlocksPoller::new(api, surface, Arc::new(DashboardConfig::default())).refresh().await;

    let s = mem.lock().unwrap();
    for id in [EFFORT_LONG, EFFORT_SHORT, EST_CHUNK, EST_ACTUAL] {
        assert_eq!(s.text(id), Some("N/A"), "{}", id);
    }
}

fn dashboard(api: Arc<FakeApi>, surface: SharedSurface) -> Dashboard {
    let cfg = DashboardConfig { calc_tick_ms: 5, ..Default::default() };
    Dashboard::new(Arc::new(cfg), api, Arc::new(NoFragments), surface, memory_store())
}

#[tokio::test]
async fn calculator_tracks_input() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    let (mem, surface) = surfaces();
    let dash = dashboard(api, surface);
    let mut session = dash.start("").await;

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(mem.lock().unwrap().text(PROFIT_FIELD), Some("0.000"));

    // net_hr 1e6 / 1000 = 1000; 10/1000 * 1.5 * 5760
    session.handle(UiEvent::Hashrate("10".into())).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(mem.lock().unwrap().text(PROFIT_FIELD), Some("86.400"));

    session.handle(UiEvent::Hashrate("garbage".into())).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(mem.lock().unwrap().text(PROFIT_FIELD), Some("0.000"));
    session.shutdown();
}

#[tokio::test]
async fn calculator_without_network_stats_is_unavailable() {
    let api = Arc::new(FakeApi::default());
    let (mem, surface) = surfaces();
    let dash = dashboard(api, surface);
    let mut session = dash.start("").await;

    session.handle(UiEvent::Hashrate("10".into())).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(mem.lock().unwrap().text(PROFIT_FIELD), Some("N/A"));
    session.shutdown();
}

#[tokio::test]
async fn session_hover_and_shutdown() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    let (mem, surface) = surfaces();
    let dash = dashboard(api, surface);
    let mut session = dash.start("#home").await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(session.active_tasks() >= 2);
    assert_eq!(mem.lock().unwrap().text(POOL_HR_TEXT), Some("1.50 MH/s"));
    session
        .handle(UiEvent::PointerMove { chart: POOL_HR_CHART.into(), index: 1 })
        .await;
    assert_eq!(mem.lock().unwrap().text(POOL_HR_TEXT), Some("3.00 kH/s"));
    session.handle(UiEvent::PointerOut { chart: POOL_HR_CHART.into() }).await;
    assert_eq!(mem.lock().unwrap().text(POOL_HR_TEXT), Some("1.50 MH/s"));

    let svg = mem.lock().unwrap().sparkline(POOL_HR_CHART).cloned().unwrap();
    assert_eq!(svg.view_box.as_deref(), Some("0 0 200 100"));
    assert_eq!(svg.preserve_aspect_ratio.as_deref(), Some("none"));

    assert_eq!(session.route(), "#home");
    session.shutdown();
}

#[tokio::test]
async fn run_quits_on_event() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    let (_mem, surface) = surfaces();
    let dash = dashboard(api.clone(), surface);
    let (tx, rx) = tokio::sync::mpsc::channel(4);
    tx.send(UiEvent::Quit).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), dash.run(rx)).await.unwrap().unwrap();
}

#[tokio::test]
async fn stats_poller_recovers_on_next_tick() {
    let api = Arc::new(FakeApi::default());
    let (mem, surface) = surfaces();
    let cfg = DashboardConfig { stats_refresh_secs: 1, ..Default::default() };
    let dash = Dashboard::new(Arc::new(cfg), api.clone(), Arc::new(NoFragments), surface, memory_store());
    let session = dash.start("").await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mem.lock().unwrap().text(NET_HR), None);

    api.set_stats(Some(pool_stats()));
    tokio::time::sleep(Duration::from_millis(1_300)).await;
    assert_eq!(mem.lock().unwrap().text(NET_HR), Some("1.00 MH/s"));
    assert!(mem.lock().unwrap().alerts().is_empty());
    session.shutdown();
}

#[tokio::test]
async fn start_clears_previous_page() {
    let api = Arc::new(FakeApi::default());
    let (mem, surface) = surfaces();
    mem.lock().unwrap().apply(FieldUpdate::text(MINER_HR, "9.99 kH/s"));
    mem.lock().unwrap().apply(FieldUpdate::visible(MINER_AREA, true));

    let session = dashboard(api, surface).start("").await;

    assert_eq!(mem.lock().unwrap().text(MINER_HR), None);
    session.shutdown();
}

#[tokio::test]
async fn reload_restarts_session_on_current_route() {
    let api = Arc::new(FakeApi::with_stats(pool_stats()));
    let (mem, surface) = surfaces();
    let fragments = Arc::new(CountingFragments::default());
    let cfg = DashboardConfig { reload_secs: 1, ..Default::default() };
    let dash = Dashboard::new(Arc::new(cfg), api.clone(), fragments.clone(), surface, memory_store());
    let (tx, rx) = tokio::sync::mpsc::channel(4);

    let driver = async {
        tx.send(UiEvent::Navigate("#rules".into())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*fragments.requested.lock().unwrap(), vec!["/rules.html"]);

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        tx.send(UiEvent::Quit).await.unwrap();
    };
    let (res, ()) = tokio::join!(dash.run(rx), driver);
    res.unwrap();

    let requested = fragments.requested.lock().unwrap().clone();
    assert!(requested.len() >= 2);
    assert!(requested.iter().all(|p| p == "/rules.html"));
    assert_eq!(mem.lock().unwrap().html(SPA_CONTAINER), Some("<section>/rules.html</section>"));
    // each page load fetched /stats again
    assert!(api.stats_calls.load(Ordering::SeqCst) >= 4);
}
