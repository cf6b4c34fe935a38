// Module declarations for the application's core components
pub mod config;      // Configuration management
pub mod coordinator; // One connect/query/decode/dispatch cycle
pub mod error;       // Error taxonomy and helpers
pub mod logging;     // env_logger setup
pub mod omnik;       // Omnik logger protocol implementation
pub mod options;     // Command line options parsing
pub mod plugins;     // Output plugins and their registry
pub mod prelude;     // Common imports and types
pub mod utils;       // Utility functions

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use std::sync::Arc;

/// Loads the config file and applies command line overrides on top of it.
pub fn load_config(options: &Options) -> Result<Config> {
    let mut config = Config::new(&options.config_file)?;
    config.apply_options(options)?;
    Ok(config)
}

/// Main application entry point
///
/// Loads the plugins, then polls the logger once. Plugin failures are
/// recorded in the returned outcome; everything else is an error.
pub async fn app(config: Config) -> Result<Outcome> {
    info!("omnik-export {} starting", CARGO_PKG_VERSION);
    config.log_summary();

    info!("Loading plugins...");
    let registry = Registry::register(config.plugins.enabled(), &config.plugins)?;
    info!("  {} plugin(s) loaded: {}", registry.len(), registry.names().join(", "));

    let coordinator = Coordinator::new(config.logger.clone(), Arc::new(registry));
    let outcome = coordinator.run().await?;

    info!("Poll complete: {}", outcome);
    Ok(outcome)
}
