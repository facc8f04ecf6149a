//! Sparklines and the miner hashrate line chart.

use serde::Serialize;
use serde_json::{json, Value};

use crate::format::format_hashes;
use crate::html::escape;

pub const SPARKLINE_WIDTH: f64 = 200.0;
pub const SPARKLINE_HEIGHT: f64 = 100.0;
pub const MINER_SERIES_COLOR: &str = "#2039c9";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparkPoint {
    pub date_ms: i64,
    pub value: f64,
}

/// A rendered SVG element whose viewport attributes can be rewritten after
/// rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Svg {
    pub width: f64,
    pub height: f64,
    pub view_box: Option<String>,
    pub preserve_aspect_ratio: Option<String>,
    pub body: String,
}

impl Svg {
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match name {
            "viewBox" => self.view_box = Some(value.to_string()),
            "preserveAspectRatio" => self.preserve_aspect_ratio = Some(value.to_string()),
            _ => {}
        }
    }

    pub fn to_markup(&self) -> String {
        let mut attrs = format!("width=\"{}\" height=\"{}\"", self.width, self.height);
        if let Some(vb) = &self.view_box {
            attrs.push_str(&format!(" viewBox=\"{}\"", escape(vb)));
        }
        if let Some(par) = &self.preserve_aspect_ratio {
            attrs.push_str(&format!(" preserveAspectRatio=\"{}\"", escape(par)));
        }
        format!("<svg xmlns=\"http://www.w3.org/2000/svg\" {}>{}</svg>", attrs, self.body)
    }
}

pub struct Sparkline {
    points: Vec<SparkPoint>,
}

impl Sparkline {
    pub fn new(points: Vec<SparkPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[SparkPoint] {
        &self.points
    }

    /// Polyline through the values, x evenly spaced, y scaled to the
    /// min..max range with the maximum at the top edge.
    pub fn render(&self) -> Svg {
        let values: Vec<f64> = self.points.iter().map(|p| p.value).filter(|v| v.is_finite()).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = if max > min { max - min } else { 1.0 };
        let step = if self.points.len() > 1 {
            SPARKLINE_WIDTH / (self.points.len() - 1) as f64
        } else {
            0.0
        };

        let coords: Vec<String> = self
            .points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.value.is_finite())
            .map(|(i, p)| {
                let x = i as f64 * step;
                let y = if max > min {
                    SPARKLINE_HEIGHT - (p.value - min) / span * SPARKLINE_HEIGHT
                } else {
                    SPARKLINE_HEIGHT / 2.0
                };
                format!("{:.2},{:.2}", x, y)
            })
            .collect();

        let body = if coords.is_empty() {
            String::new()
        } else {
            format!(
                "<polyline class=\"sparkline--line\" fill=\"none\" points=\"{}\"/>",
                coords.join(" ")
            )
        };
        Svg {
            width: SPARKLINE_WIDTH,
            height: SPARKLINE_HEIGHT,
            view_box: None,
            preserve_aspect_ratio: None,
            body,
        }
    }
}

/// Hovering a sparkline point swaps `target`'s text for that point's
/// label; leaving the chart puts `resting` back.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverBinding {
    pub target: String,
    pub labels: Vec<String>,
    pub resting: String,
}

impl HoverBinding {
    pub fn on_move(&self, index: usize) -> Option<(&str, &str)> {
        self.labels.get(index).map(|l| (self.target.as_str(), l.as_str()))
    }

    pub fn on_out(&self) -> (&str, &str) {
        (self.target.as_str(), self.resting.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub series_name: String,
    pub x_labels: Vec<String>,
    pub values: Vec<f64>,
    pub color: String,
}

impl LineChart {
    pub fn y_axis_label(value: f64) -> String {
        format!("{}H/s", format_hashes(value))
    }

    /// Option document in the shape the charting widget consumes; the
    /// y-axis formatter is resolved to `y_axis_label` by the renderer.
    pub fn option(&self) -> Value {
        let style = json!({ "color": self.color });
        json!({
            "xAxis": { "type": "category", "data": self.x_labels },
            "yAxis": { "type": "value", "axisLabel": { "formatter": "hashrate" } },
            "tooltip": { "trigger": "axis" },
            "series": [{
                "name": self.series_name,
                "data": self.values,
                "type": "line",
                "showSymbol": false,
                "lineStyle": style,
                "itemStyle": style,
            }],
        })
    }

    /// Five evenly spaced y-axis ticks between zero and the series maximum.
    pub fn y_ticks(&self) -> Vec<String> {
        let max = self.values.iter().copied().filter(|v| v.is_finite()).fold(0.0, f64::max);
        (0..5).map(|i| Self::y_axis_label(max * i as f64 / 4.0)).collect()
    }
}
