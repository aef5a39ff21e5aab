//! ConsoleMod - console mod file management
//!
//! Moves mod files to and from a game console's FTP server, discovers USB
//! storage and user profiles, and reports installed packages that have newer
//! catalog versions.

pub mod config;
pub mod console;
pub mod ftp;
pub mod packages;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging
///
/// Honors `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
