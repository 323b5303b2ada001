//! # CLI Module
//!
//! User-facing commands of discoverfm. Each command loads the configuration
//! once, builds the components it needs and reports progress with the
//! logging macros from the crate root.
//!
//! - [`sync`] - Runs one discovery pass and queues new studio albums
//! - [`check`] - Validates the configuration and the downstream service
//! - [`cache_info`], [`cache_prune`], [`cache_clear_similar`] - Inspect and maintain the cache file
//!
//! ## Exit status
//!
//! Configuration errors and a failing service health check end the process
//! with status 1 before any discovery call is made. An interrupted or failed
//! sync persists the cache first and then exits with status 1.
//!
//! ## Usage
//!
//! ```bash
//! discoverfm check                 # Verify the setup
//! discoverfm sync                  # Discover and queue albums
//! discoverfm --verbose sync        # Same, with every decision logged
//! discoverfm cache prune           # Drop expired similarity lists
//! ```

mod cache;
mod check;
mod sync;

pub use cache::cache_clear_similar;
pub use cache::cache_info;
pub use cache::cache_prune;
pub use check::check;
pub use sync::sync;

use crate::{config::Config, error};

/// Loads the run configuration or exits. `--verbose` and `DEBUG_PRINT`
/// both enable debug output.
fn load_config(verbose: bool) -> Config {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration. Err: {}", e);
        }
    };
    crate::set_verbose(verbose || config.debug);
    config
}
