//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - listing/source enums (`ListingKind`, `Market`, `Term`)
//! - scraped and fetched inputs (`StockListing`, `PriceBar`, `Fundamentals`)
//! - scoring inputs and outputs (`StockMetrics`, `ScoreResult`, etc.)

pub mod types;

pub use types::*;
