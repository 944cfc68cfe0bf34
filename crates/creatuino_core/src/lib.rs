//! creatuino core - SD card layout builder for TonUINO-style players.
//!
//! This crate contains all business logic with zero CLI dependencies:
//! map file parsing, job resolution and planning, parallel dispatch to an
//! external encoder, and run reporting.

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod logging;
pub mod mapfile;
pub mod pipeline;
pub mod plan;
pub mod report;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
