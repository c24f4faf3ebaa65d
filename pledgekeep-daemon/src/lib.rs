//! Pledgekeep Daemon Library
//!
//! This library exposes the daemon's interaction endpoint, command
//! handling, and configuration for testing and potential embedding in
//! other applications.

pub mod commands;
pub mod config;
pub mod server;

pub use config::{load_config, Config};
pub use server::{build_router, AppState};
