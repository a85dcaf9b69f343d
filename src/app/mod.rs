// CleanLog - app/mod.rs
//
// Application layer: module pipelines, shared dashboard state, launcher.
// Dependencies: core, platform, util.
// Must NOT depend on: web.

pub mod launcher;
pub mod pipeline;
pub mod state;
