pub mod blocks;
pub mod calculator;
pub mod stats;

pub use blocks::BlocksPoller;
pub use calculator::Calculator;
pub use stats::StatsPoller;
