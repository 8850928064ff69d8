//! ENEM score analysis
//!
//! Loads exam microdata, filters it to one municipality, compares scores by
//! school type and renders the comparisons as charts.

pub mod charts;
pub mod config;
pub mod data;
pub mod export;
pub mod pipeline;
pub mod stats;
