//! Recovery scoring and ranking.
//!
//! - `engine`: the rule-table score for one stock
//! - `ranking`: deterministic orderings and conjunctive filters

pub mod engine;
pub mod ranking;

pub use engine::*;
pub use ranking::*;
