// CleanLog - platform/mod.rs
//
// Platform abstraction layer.
// Dependencies: standard library, directories crate, util.
// Must NOT depend on: core, app, web.

pub mod config;
pub mod fs;
