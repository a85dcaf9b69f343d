// CleanLog - core/mod.rs
//
// Core analysis layer.
// Must NOT depend on: web, platform, app.

pub mod chat;
pub mod dedup;
pub mod export;
pub mod heatmap;
pub mod ledger;
pub mod log_analyzer;
pub mod model;
pub mod report;
pub mod similarity;
pub mod table;
pub mod xlsx;
