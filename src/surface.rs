//! The rendering surface the views write to.
//!
//! Views never touch a surface directly while computing: they produce a
//! list of `FieldUpdate`s from a response snapshot, and the poller applies
//! that list in one go. Each view owns a disjoint set of element ids.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::chart::{HoverBinding, LineChart, Svg};
use crate::html::escape;
use crate::logging::{log, log_alert, obj, v_str, Domain, Level};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Text { id: String, text: String },
    Html { id: String, html: String },
    Visible { id: String, visible: bool },
    Sparkline { id: String, svg: Svg, hover: HoverBinding },
    /// Rewrites the viewport of every SVG on the surface.
    NormalizeSvg { view_box: String, preserve_aspect_ratio: String },
    /// Initialises the chart on first use, otherwise replaces its data.
    Chart { id: String, chart: LineChart },
    ResizeChart { id: String },
    Alert(String),
}

impl FieldUpdate {
    pub fn text(id: &str, text: impl Into<String>) -> Self {
        FieldUpdate::Text { id: id.to_string(), text: text.into() }
    }

    pub fn html(id: &str, html: impl Into<String>) -> Self {
        FieldUpdate::Html { id: id.to_string(), html: html.into() }
    }

    pub fn visible(id: &str, visible: bool) -> Self {
        FieldUpdate::Visible { id: id.to_string(), visible }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            FieldUpdate::Text { id, .. }
            | FieldUpdate::Html { id, .. }
            | FieldUpdate::Visible { id, .. }
            | FieldUpdate::Sparkline { id, .. }
            | FieldUpdate::Chart { id, .. }
            | FieldUpdate::ResizeChart { id } => Some(id),
            FieldUpdate::NormalizeSvg { .. } | FieldUpdate::Alert(_) => None,
        }
    }
}

pub trait Surface: Send {
    fn apply(&mut self, update: FieldUpdate);

    fn apply_all(&mut self, updates: Vec<FieldUpdate>) {
        for u in updates {
            self.apply(u);
        }
    }

    /// Pointer over point `index` of a sparkline.
    fn pointer_move(&mut self, chart: &str, index: usize);

    fn pointer_out(&mut self, chart: &str);

    /// Window resize: every initialised chart re-lays itself out.
    fn resize(&mut self);

    /// Page load: every region, chart and alert from before is dropped.
    fn reset(&mut self);
}

pub type SharedSurface = Arc<Mutex<dyn Surface>>;

pub fn apply(surface: &SharedSurface, updates: Vec<FieldUpdate>) {
    if updates.is_empty() {
        return;
    }
    let mut guard = surface.lock().unwrap_or_else(|e| e.into_inner());
    guard.apply_all(updates);
}

#[derive(Debug, Clone)]
pub struct ChartSlot {
    pub chart: LineChart,
    pub resizes: u32,
}

/// Keeps every region in memory. Used directly by tests and wrapped by
/// `SnapshotSurface` in the binary.
#[derive(Debug, Default)]
pub struct MemorySurface {
    text: BTreeMap<String, String>,
    html: BTreeMap<String, String>,
    visible: BTreeMap<String, bool>,
    sparklines: BTreeMap<String, (Svg, HoverBinding)>,
    charts: BTreeMap<String, ChartSlot>,
    chart_inits: u32,
    alerts: Vec<String>,
    dirty: bool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.text.get(id).map(String::as_str)
    }

    pub fn html(&self, id: &str) -> Option<&str> {
        self.html.get(id).map(String::as_str)
    }

    pub fn is_visible(&self, id: &str) -> Option<bool> {
        self.visible.get(id).copied()
    }

    pub fn sparkline(&self, id: &str) -> Option<&Svg> {
        self.sparklines.get(id).map(|(svg, _)| svg)
    }

    pub fn chart(&self, id: &str) -> Option<&ChartSlot> {
        self.charts.get(id)
    }

    /// Number of chart instances ever created.
    pub fn chart_inits(&self) -> u32 {
        self.chart_inits
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn set_text(&mut self, id: &str, text: &str) {
        if self.text.get(id).map(String::as_str) != Some(text) {
            self.text.insert(id.to_string(), text.to_string());
            self.dirty = true;
        }
    }

    pub fn to_html(&self) -> String {
        let mut ids: BTreeSet<&str> = BTreeSet::new();
        ids.extend(self.text.keys().map(String::as_str));
        ids.extend(self.html.keys().map(String::as_str));
        ids.extend(self.visible.keys().map(String::as_str));
        ids.extend(self.sparklines.keys().map(String::as_str));
        ids.extend(self.charts.keys().map(String::as_str));

        let mut body = String::new();
        for id in ids {
            let hidden = if self.visible.get(id) == Some(&false) { " style=\"display:none\"" } else { "" };
            let eid = escape(id);
            if let Some(rows) = self.html.get(id).filter(|h| h.trim_start().starts_with("<tr")) {
                body.push_str(&format!("<table{}><tbody id=\"{}\">{}</tbody></table>\n", hidden, eid, rows));
                continue;
            }
            let content = if let Some(t) = self.text.get(id) {
                escape(t)
            } else if let Some(h) = self.html.get(id) {
                h.clone()
            } else if let Some((svg, _)) = self.sparklines.get(id) {
                svg.to_markup()
            } else if let Some(slot) = self.charts.get(id) {
                let doc = json!({ "option": slot.chart.option(), "yTicks": slot.chart.y_ticks() });
                format!("<script type=\"application/json\">{}</script>", escape(&doc.to_string()))
            } else {
                String::new()
            };
            body.push_str(&format!("<div id=\"{}\"{}>{}</div>\n", eid, hidden, content));
        }

        format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>pool dashboard</title></head>\n<body>\n{}</body>\n</html>\n",
            body
        )
    }
}

impl Surface for MemorySurface {
    fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Text { id, text } => self.set_text(&id, &text),
            FieldUpdate::Html { id, html } => {
                self.html.insert(id, html);
                self.dirty = true;
            }
            FieldUpdate::Visible { id, visible } => {
                if self.visible.insert(id, visible) != Some(visible) {
                    self.dirty = true;
                }
            }
            FieldUpdate::Sparkline { id, svg, hover } => {
                self.sparklines.insert(id, (svg, hover));
                self.dirty = true;
            }
            FieldUpdate::NormalizeSvg { view_box, preserve_aspect_ratio } => {
                for (svg, _) in self.sparklines.values_mut() {
                    svg.set_attribute("viewBox", &view_box);
                    svg.set_attribute("preserveAspectRatio", &preserve_aspect_ratio);
                }
                self.dirty = true;
            }
            FieldUpdate::Chart { id, chart } => {
                match self.charts.get_mut(&id) {
                    Some(slot) => slot.chart = chart,
                    None => {
                        self.chart_inits += 1;
                        self.charts.insert(id, ChartSlot { chart, resizes: 0 });
                    }
                }
                self.dirty = true;
            }
            FieldUpdate::ResizeChart { id } => {
                if let Some(slot) = self.charts.get_mut(&id) {
                    slot.resizes += 1;
                }
            }
            FieldUpdate::Alert(msg) => self.alerts.push(msg),
        }
    }

    fn pointer_move(&mut self, chart: &str, index: usize) {
        let hit = self
            .sparklines
            .get(chart)
            .and_then(|(_, b)| b.on_move(index))
            .map(|(t, l)| (t.to_string(), l.to_string()));
        if let Some((target, label)) = hit {
            self.set_text(&target, &label);
        }
    }

    fn pointer_out(&mut self, chart: &str) {
        let rest = self
            .sparklines
            .get(chart)
            .map(|(_, b)| b.on_out())
            .map(|(t, l)| (t.to_string(), l.to_string()));
        if let Some((target, resting)) = rest {
            self.set_text(&target, &resting);
        }
    }

    fn resize(&mut self) {
        for slot in self.charts.values_mut() {
            slot.resizes += 1;
        }
    }

    fn reset(&mut self) {
        *self = MemorySurface { dirty: true, ..Default::default() };
    }
}

/// Writes the whole surface to an HTML file whenever it changes. Alerts
/// are blocking in a browser; here they go to stderr and the log.
pub struct SnapshotSurface {
    inner: MemorySurface,
    path: PathBuf,
}

impl SnapshotSurface {
    pub fn new(path: PathBuf) -> Self {
        Self { inner: MemorySurface::new(), path }
    }

    pub fn inner(&self) -> &MemorySurface {
        &self.inner
    }

    fn flush(&mut self) {
        if !self.inner.take_dirty() {
            return;
        }
        if let Err(err) = std::fs::write(&self.path, self.inner.to_html()) {
            log(
                Level::Error,
                Domain::Render,
                "snapshot_failed",
                obj(&[
                    ("path", v_str(&self.path.to_string_lossy())),
                    ("msg", v_str(&err.to_string())),
                ]),
            );
        }
    }
}

impl Surface for SnapshotSurface {
    fn apply(&mut self, update: FieldUpdate) {
        if let FieldUpdate::Alert(msg) = &update {
            log_alert(msg);
            eprintln!("ALERT: {}", msg);
        } else if let Some(id) = update.target() {
            log(Level::Trace, Domain::Render, "update", obj(&[("id", v_str(id))]));
        }
        self.inner.apply(update);
    }

    fn apply_all(&mut self, updates: Vec<FieldUpdate>) {
        for u in updates {
            self.apply(u);
        }
        self.flush();
    }

    fn pointer_move(&mut self, chart: &str, index: usize) {
        self.inner.pointer_move(chart, index);
        self.flush();
    }

    fn pointer_out(&mut self, chart: &str) {
        self.inner.pointer_out(chart);
        self.flush();
    }

    fn resize(&mut self) {
        self.inner.resize();
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{SparkPoint, Sparkline};

    fn binding() -> HoverBinding {
        HoverBinding {
            target: "workers-text".into(),
            labels: vec!["3".into(), "4".into()],
            resting: "5".into(),
        }
    }

    #[test]
    fn test_hover_overrides_and_reverts() {
        let mut s = MemorySurface::new();
        let svg = Sparkline::new(vec![SparkPoint { date_ms: 0, value: 3.0 }]).render();
        s.apply_all(vec![
            FieldUpdate::text("workers-text", "5"),
            FieldUpdate::Sparkline { id: "workers-chart".into(), svg, hover: binding() },
        ]);
        s.pointer_move("workers-chart", 1);
        assert_eq!(s.text("workers-text"), Some("4"));
        s.pointer_out("workers-chart");
        assert_eq!(s.text("workers-text"), Some("5"));
        s.pointer_move("unknown", 0);
        assert_eq!(s.text("workers-text"), Some("5"));
    }

    #[test]
    fn test_normalize_touches_every_svg() {
        let mut s = MemorySurface::new();
        let svg = Sparkline::new(vec![]).render();
        s.apply(FieldUpdate::Sparkline { id: "a".into(), svg: svg.clone(), hover: binding() });
        s.apply(FieldUpdate::Sparkline { id: "b".into(), svg, hover: binding() });
        s.apply(FieldUpdate::NormalizeSvg {
            view_box: "0 0 200 100".into(),
            preserve_aspect_ratio: "none".into(),
        });
        for id in ["a", "b"] {
            let svg = s.sparkline(id).unwrap();
            assert_eq!(svg.view_box.as_deref(), Some("0 0 200 100"));
            assert_eq!(svg.preserve_aspect_ratio.as_deref(), Some("none"));
        }
    }

    #[test]
    fn test_chart_is_reused() {
        let mut s = MemorySurface::new();
        let chart = LineChart {
            series_name: "Your hashrate".into(),
            x_labels: vec![],
            values: vec![],
            color: "#2039c9".into(),
        };
        s.apply(FieldUpdate::Chart { id: "minerChart".into(), chart: chart.clone() });
        s.apply(FieldUpdate::Chart { id: "minerChart".into(), chart });
        assert_eq!(s.chart_inits(), 1);
        s.resize();
        s.apply(FieldUpdate::ResizeChart { id: "minerChart".into() });
        assert_eq!(s.chart("minerChart").unwrap().resizes, 2);
    }

    #[test]
    fn test_reset_drops_previous_page() {
        let mut s = MemorySurface::new();
        s.apply(FieldUpdate::text("hashrate", "1.00 kH/s"));
        s.apply(FieldUpdate::visible("minerArea", true));
        s.apply(FieldUpdate::Alert("boom".into()));
        s.take_dirty();
        s.reset();
        assert_eq!(s.text("hashrate"), None);
        assert_eq!(s.is_visible("minerArea"), None);
        assert!(s.alerts().is_empty());
        assert!(s.take_dirty());
    }

    #[test]
    fn test_dirty_tracking() {
        let mut s = MemorySurface::new();
        s.apply(FieldUpdate::text("x", "1"));
        assert!(s.take_dirty());
        s.apply(FieldUpdate::text("x", "1"));
        assert!(!s.take_dirty());
    }

    #[test]
    fn test_to_html_wraps_rows_and_hides() {
        let mut s = MemorySurface::new();
        s.apply(FieldUpdate::html("payouts", "<tr><td>a</td></tr>"));
        s.apply(FieldUpdate::visible("minerArea", false));
        s.apply(FieldUpdate::text("height", "<5>"));
        let doc = s.to_html();
        assert!(doc.contains("<tbody id=\"payouts\"><tr><td>a</td></tr></tbody>"));
        assert!(doc.contains("<div id=\"minerArea\" style=\"display:none\"></div>"));
        assert!(doc.contains("<div id=\"height\">&lt;5&gt;</div>"));
    }

    #[test]
    fn test_snapshot_written_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dash.html");
        let mut s = SnapshotSurface::new(path.clone());
        s.apply_all(vec![FieldUpdate::text("nethr", "1.00 MH/s")]);
        let doc = std::fs::read_to_string(&path).unwrap();
        assert!(doc.contains("1.00 MH/s"));
    }
}
