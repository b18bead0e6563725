//! CLI library components for the `nps` binary.

pub mod config;
pub mod logging;
pub mod render;
