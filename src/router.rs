//! Hash-fragment navigation: `#rules` loads `/rules.html` into the main
//! content container; `#home` keeps the built-in content.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::api::parse_base;
use crate::logging::{log, log_route, obj, v_str, Domain, Level};
use crate::surface::{apply, FieldUpdate, SharedSurface};

pub const SPA_CONTAINER: &str = "spa-main";
pub const HOME: &str = "home";

#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// `path` is absolute within the static site, e.g. `/rules.html`.
    async fn fetch_fragment(&self, path: &str) -> Result<String>;
}

pub struct HttpFragments {
    client: Client,
    base: Url,
}

impl HttpFragments {
    /// Every fetch is bounded by `timeout`.
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building fragment client")?;
        Ok(Self { client, base: parse_base(base)? })
    }
}

#[async_trait]
impl FragmentSource for HttpFragments {
    async fn fetch_fragment(&self, path: &str) -> Result<String> {
        let url = self.base.join(path.trim_start_matches('/'))?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()
            .with_context(|| format!("GET {}", url))?;
        Ok(resp.text().await?)
    }
}

/// Serves fragments from the static site's directory on disk.
pub struct DirFragments {
    root: PathBuf,
}

impl DirFragments {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FragmentSource for DirFragments {
    async fn fetch_fragment(&self, path: &str) -> Result<String> {
        let file = self.root.join(path.trim_start_matches('/'));
        tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))
    }
}

/// `None` means nothing to load.
pub fn fragment_path(hash: &str) -> Result<Option<String>> {
    let fragment = hash.strip_prefix('#').unwrap_or(hash);
    if fragment.is_empty() || fragment == HOME {
        return Ok(None);
    }
    if !fragment.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        bail!("invalid route fragment {:?}", fragment);
    }
    Ok(Some(format!("/{}.html", fragment)))
}

pub struct SpaRouter {
    source: Arc<dyn FragmentSource>,
    surface: SharedSurface,
}

impl SpaRouter {
    pub fn new(source: Arc<dyn FragmentSource>, surface: SharedSurface) -> Self {
        Self { source, surface }
    }

    /// Handles one hash change. Returns whether the container was replaced.
    /// Failures are logged and returned; the container keeps its content.
    pub async fn navigate(&self, hash: &str) -> Result<bool> {
        let result = self.load(hash).await;
        if let Err(err) = &result {
            log(
                Level::Error,
                Domain::Router,
                "navigate_failed",
                obj(&[("hash", v_str(hash)), ("msg", v_str(&format!("{:#}", err)))]),
            );
        }
        result
    }

    async fn load(&self, hash: &str) -> Result<bool> {
        let Some(path) = fragment_path(hash)? else {
            log_route(hash, false);
            return Ok(false);
        };
        let body = self.source.fetch_fragment(&path).await?;
        apply(&self.surface, vec![FieldUpdate::html(SPA_CONTAINER, body)]);
        log_route(hash, true);
        Ok(true)
    }
}
