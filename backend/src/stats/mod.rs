//! Sample aggregation
//!
//! - **sample**: mergeable running statistics per metric
//! - **tracking**: benefit, uptime and resource gain counters
//! - **normal**: standard normal helpers for confidence intervals

pub mod normal;
pub mod sample;
pub mod tracking;

pub use normal::{stdnormal_cdf, stdnormal_inv};
pub use sample::SampleSeries;
pub use tracking::{Benefit, GainLedger, ResourceGain, Uptime};
