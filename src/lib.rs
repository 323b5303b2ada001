//! Last.fm driven music discovery library
//!
//! This library discovers new music for a listener by walking the "similar
//! artist" graph of the artists they played recently, resolving the popular
//! albums of those artists against MusicBrainz and queueing the studio albums
//! it has not queued before in a download manager (Headphones or Lidarr).
//!
//! # Modules
//!
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration loading and the immutable run configuration
//! - `discovery` - Identifier resolution, candidate selection and the run orchestrator
//! - `error` - Error taxonomy shared by all components
//! - `lastfm` - Listening-history capability and its Last.fm client
//! - `management` - Persistent de-duplication cache
//! - `musicbrainz` - Metadata-graph capability and its MusicBrainz client
//! - `remote` - Rate limited, retrying remote call engine
//! - `services` - Downstream music manager abstraction (Headphones, Lidarr)
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Output
//!
//! All user-facing output goes through the [`info!`], [`success!`],
//! [`warning!`], [`failed!`], [`error!`] and [`debug!`] macros.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod lastfm;
pub mod management;
pub mod musicbrainz;
pub mod remote;
pub mod services;
pub mod types;
pub mod utils;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enables or disables the output of the [`debug!`] macro.
pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

/// Returns whether [`debug!`] output is currently enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Analyzing {} artists...", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Queued album {}", key);
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Terminates the program with exit code 1. Only the CLI layer uses this
/// macro, and only after the cache has been persisted; library code reports
/// recoverable failures with [`failed!`] instead.
///
/// # Example
///
/// ```
/// error!("Missing required configuration keys: {}", keys);
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a failure message with a red cross without terminating.
///
/// Used for operation level failures that are counted and skipped, such as a
/// downstream service refusing to add an album.
///
/// # Example
///
/// ```
/// failed!("Cannot add artist {} ({})", name, id);
/// ```
#[macro_export]
macro_rules! failed {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "x".red().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// # Example
///
/// ```
/// warning!("Cache file is corrupt, starting with an empty cache");
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a dimmed debug message when verbose output is enabled.
///
/// Verbose output is switched on with `--verbose` or `DEBUG_PRINT=true`.
///
/// # Example
///
/// ```
/// debug!("Discarding {} ({}): already processed", name, id);
/// ```
#[macro_export]
macro_rules! debug {
  ($($arg:tt)*) => ({
    if $crate::is_verbose() {
      use colored::Colorize;
      println!("[{}] {}", ".".dimmed(), std::format!($($arg)*).dimmed());
    }
  })
}
