//! Mathematical utilities: price-series indicators.

pub mod indicators;

pub use indicators::*;
