//! Wires the pollers, the calculator and the router into one page session.
//!
//! A session is what a page load is in the browser: it starts every poller,
//! owns their timers and is torn down wholesale on reload.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

use crate::api::PoolApi;
use crate::config::DashboardConfig;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::router::{FragmentSource, SpaRouter};
use crate::scheduler::Scheduler;
use crate::storage::KvStore;
use crate::surface::SharedSurface;
use crate::views::{BlocksPoller, Calculator, StatsPoller};

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Wallet-address input changed.
    Address(String),
    /// Calculator hashrate input edited.
    Hashrate(String),
    /// Location hash changed.
    Navigate(String),
    PointerMove { chart: String, index: usize },
    PointerOut { chart: String },
    Resize,
    Reload,
    Quit,
}

impl UiEvent {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let event = match cmd {
            "addr" => UiEvent::Address(rest.to_string()),
            "hr" => UiEvent::Hashrate(rest.to_string()),
            "go" => UiEvent::Navigate(rest.to_string()),
            "hover" => {
                let mut parts = rest.split_whitespace();
                let chart = parts.next().ok_or_else(|| anyhow!("hover needs a chart id"))?;
                let index = parts
                    .next()
                    .ok_or_else(|| anyhow!("hover needs a point index"))?
                    .parse()?;
                UiEvent::PointerMove { chart: chart.to_string(), index }
            }
            "out" if !rest.is_empty() => UiEvent::PointerOut { chart: rest.to_string() },
            "resize" => UiEvent::Resize,
            "reload" => UiEvent::Reload,
            "quit" | "exit" => UiEvent::Quit,
            _ => bail!("unknown command {:?}", line),
        };
        Ok(event)
    }
}

pub struct Session {
    scheduler: Scheduler,
    stats: Arc<StatsPoller>,
    router: SpaRouter,
    surface: SharedSurface,
    hashrate: watch::Sender<String>,
    route: String,
}

impl Session {
    pub fn stats(&self) -> &StatsPoller {
        &self.stats
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn active_tasks(&self) -> usize {
        self.scheduler.active()
    }

    pub async fn handle(&mut self, event: UiEvent) {
        match event {
            UiEvent::Address(value) => self.stats.set_address(&value).await,
            UiEvent::Hashrate(value) => {
                self.hashrate.send_replace(value);
            }
            UiEvent::Navigate(hash) => {
                self.route = hash.clone();
                // failure is logged by the router
                let _ = self.router.navigate(&hash).await;
            }
            UiEvent::PointerMove { chart, index } => {
                self.surface.lock().unwrap_or_else(|e| e.into_inner()).pointer_move(&chart, index);
            }
            UiEvent::PointerOut { chart } => {
                self.surface.lock().unwrap_or_else(|e| e.into_inner()).pointer_out(&chart);
            }
            UiEvent::Resize => self.surface.lock().unwrap_or_else(|e| e.into_inner()).resize(),
            UiEvent::Reload | UiEvent::Quit => {}
        }
    }

    pub fn shutdown(mut self) {
        self.scheduler.shutdown();
    }
}

enum Outcome {
    Reload,
    Quit,
}

pub struct Dashboard {
    cfg: Arc<DashboardConfig>,
    api: Arc<dyn PoolApi>,
    fragments: Arc<dyn FragmentSource>,
    surface: SharedSurface,
    store: Arc<Mutex<KvStore>>,
}

impl Dashboard {
    pub fn new(
        cfg: Arc<DashboardConfig>,
        api: Arc<dyn PoolApi>,
        fragments: Arc<dyn FragmentSource>,
        surface: SharedSurface,
        store: Arc<Mutex<KvStore>>,
    ) -> Self {
        Self { cfg, api, fragments, surface, store }
    }

    /// One page load: the surface starts blank, every view starts polling
    /// and the route is loaded.
    pub async fn start(&self, route: &str) -> Session {
        let cfg = &self.cfg;
        self.surface.lock().unwrap_or_else(|e| e.into_inner()).reset();
        let stats = Arc::new(StatsPoller::new(
            self.api.clone(),
            self.surface.clone(),
            cfg.clone(),
            self.store.clone(),
        ));
        let blocks = Arc::new(BlocksPoller::new(self.api.clone(), self.surface.clone(), cfg.clone()));
        let (hashrate, input) = watch::channel(String::new());
        let calculator = Arc::new(Calculator::new(self.api.clone(), self.surface.clone(), cfg.clone(), input));

        let mut scheduler = Scheduler::new();
        let s = stats.clone();
        scheduler.every("stats.refresh", cfg.stats_refresh(), move || {
            let s = s.clone();
            async move { s.refresh().await }
        });
        scheduler.after("blocks.refresh", Duration::ZERO, move || async move { blocks.refresh().await });
        let c = calculator.clone();
        scheduler.after("calc.load", Duration::ZERO, move || async move { c.load().await });
        scheduler.every("calc.tick", cfg.calc_tick(), move || {
            let c = calculator.clone();
            async move { c.recompute() }
        });

        let router = SpaRouter::new(self.fragments.clone(), self.surface.clone());
        // failure is logged by the router
        let _ = router.navigate(route).await;

        log(Level::Info, Domain::System, "session_start", obj(&[("route", v_str(route))]));
        Session {
            scheduler,
            stats,
            router,
            surface: self.surface.clone(),
            hashrate,
            route: route.to_string(),
        }
    }

    /// Runs sessions back to back, restarting every `reload_secs`, until a
    /// `Quit` event arrives or every event sender is gone.
    pub async fn run(&self, mut events: mpsc::Receiver<UiEvent>) -> Result<()> {
        let mut route = self.cfg.start_route.clone();
        loop {
            let mut session = self.start(&route).await;
            let reload = sleep(self.cfg.reload_interval());
            tokio::pin!(reload);

            let outcome = loop {
                tokio::select! {
                    _ = &mut reload => break Outcome::Reload,
                    event = events.recv() => match event {
                        None | Some(UiEvent::Quit) => break Outcome::Quit,
                        Some(UiEvent::Reload) => break Outcome::Reload,
                        Some(event) => session.handle(event).await,
                    },
                }
            };

            route = session.route().to_string();
            session.shutdown();
            match outcome {
                Outcome::Quit => {
                    log(Level::Info, Domain::System, "shutdown", obj(&[]));
                    return Ok(());
                }
                Outcome::Reload => {
                    log(Level::Info, Domain::Schedule, "reload", obj(&[("route", v_str(&route))]));
                }
            }
        }
    }
}
