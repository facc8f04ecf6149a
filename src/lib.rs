//! Mining pool dashboard: polls the pool API, derives luck and
//! profitability figures, and renders them onto a surface.

pub mod api;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod format;
pub mod html;
pub mod logging;
pub mod metric;
pub mod router;
pub mod scheduler;
pub mod storage;
pub mod surface;
pub mod views;
