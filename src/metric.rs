//! Derived metrics that may be undefined.
//!
//! Every ratio or mean the dashboard displays goes through `Metric` so a
//! zero denominator or an empty window renders as `N/A` instead of `NaN`.

use crate::format::to_fixed;

pub const UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Value(f64),
    Unavailable,
}

impl Metric {
    pub fn finite(v: f64) -> Self {
        if v.is_finite() {
            Metric::Value(v)
        } else {
            Metric::Unavailable
        }
    }

    pub fn ratio(num: f64, den: f64) -> Self {
        if den == 0.0 {
            return Metric::Unavailable;
        }
        Self::finite(num / den)
    }

    pub fn mean(values: &[f64]) -> Self {
        if values.is_empty() {
            return Metric::Unavailable;
        }
        Self::ratio(values.iter().sum(), values.len() as f64)
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::Unavailable => None,
        }
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Metric::Value(v) => Self::finite(f(v)),
            Metric::Unavailable => Metric::Unavailable,
        }
    }

    /// Divides by another metric; unavailable if either side is.
    pub fn per(self, den: Metric) -> Self {
        match (self, den) {
            (Metric::Value(n), Metric::Value(d)) => Self::ratio(n, d),
            _ => Metric::Unavailable,
        }
    }

    pub fn render(self, f: impl FnOnce(f64) -> String) -> String {
        match self {
            Metric::Value(v) => f(v),
            Metric::Unavailable => UNAVAILABLE.to_string(),
        }
    }

    pub fn fixed(self, decimals: usize) -> String {
        self.render(|v| to_fixed(v, decimals))
    }
}
