use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use pooldash::api::HttpPoolApi;
use pooldash::config::DashboardConfig;
use pooldash::dashboard::{Dashboard, UiEvent};
use pooldash::logging::{log, obj, v_num, v_str, Domain, Level};
use pooldash::router::{DirFragments, FragmentSource, HttpFragments};
use pooldash::storage::KvStore;
use pooldash::surface::{SharedSurface, SnapshotSurface};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = DashboardConfig::from_env();
    cfg.validate()?;
    let cfg = Arc::new(cfg);

    let mut store = KvStore::open(&cfg.state_db)?;
    store.init()?;
    let store = Arc::new(Mutex::new(store));

    let api = Arc::new(HttpPoolApi::new(&cfg)?);
    let fragments: Arc<dyn FragmentSource> = match &cfg.fragment_base_url {
        Some(base) => Arc::new(HttpFragments::new(base, cfg.http_timeout())?),
        None => Arc::new(DirFragments::new(cfg.static_root.clone())),
    };
    let surface: SharedSurface = Arc::new(Mutex::new(SnapshotSurface::new(cfg.snapshot_path.clone())));

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("api_url", v_str(&cfg.api_url)),
            ("snapshot", v_str(&cfg.snapshot_path.to_string_lossy())),
            ("stats_refresh_secs", v_num(cfg.stats_refresh_secs as f64)),
            ("reload_secs", v_num(cfg.reload_secs as f64)),
        ]),
    );

    let (tx, rx) = mpsc::channel(64);

    // stdin is the input device; EOF just stops reading
    let input_tx = tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match UiEvent::parse(&line) {
                Ok(event) => {
                    if input_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(err) => eprintln!("{:#}", err),
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(UiEvent::Quit).await;
        }
    });

    Dashboard::new(cfg, api, fragments, surface, store).run(rx).await
}
