//! `ytd-screener` library crate.
//!
//! The binary (`ytd`) is a thin wrapper around this library so the scoring
//! core, the data sources and the reports stay testable without spawning
//! processes.

pub mod analysis;
pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod score;
pub mod tui;
