//! Configuration management for discoverfm.
//!
//! Configuration is read exactly once at startup. Values come from:
//! 1. Environment variables (highest priority)
//! 2. A `.env` file in the local data directory (or the file passed with `--env-file`)
//! 3. Application defaults (where applicable)
//!
//! The result is an immutable [`Config`] that is handed by reference to every
//! component when it is constructed. Nothing reads the environment after that.

use std::{collections::HashMap, env, path::PathBuf, str::FromStr, time::Duration};

use crate::error::ConfigError;

pub const APP_DIR: &str = "discoverfm";

pub const DEFAULT_LASTFM_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";
pub const DEFAULT_MUSICBRAINZ_API_URL: &str = "https://musicbrainz.org/ws/2/";
pub const DEFAULT_SERVICE: &str = "headphones";

/// Loads environment variables from a `.env` file.
///
/// Without an explicit path the file is looked up in the platform-specific
/// local data directory:
/// - Linux: `~/.local/share/discoverfm/.env`
/// - macOS: `~/Library/Application Support/discoverfm/.env`
/// - Windows: `%LOCALAPPDATA%/discoverfm/.env`
///
/// A missing default file is not an error, configuration may come from the
/// process environment alone. Variables that are already set are never
/// overridden by the file.
///
/// # Errors
///
/// Returns an error if the data directory cannot be created, or if the file
/// exists but cannot be parsed, or if an explicit path does not exist.
pub async fn load_env(path: Option<PathBuf>) -> Result<(), String> {
    let explicit = path.is_some();
    let path = path.unwrap_or_else(|| app_dir().join(".env"));

    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if !path.exists() {
        if explicit {
            return Err(format!("{} does not exist", path.display()));
        }
        return Ok(());
    }

    dotenv::from_path(&path).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Returns the application data directory, e.g. `~/.local/share/discoverfm`.
pub fn app_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

/// A snapshot of raw configuration values.
///
/// Empty values are treated as absent so that a template with blank
/// credentials reports them as missing.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn from_env() -> Self {
        let values = env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { values }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns the value of a required key, recording the key in `missing`
    /// when it is absent so all missing keys can be reported at once.
    pub fn require(&self, key: &str, missing: &mut Vec<String>) -> String {
        match self.get(key) {
            Some(v) => v.to_string(),
            None => {
                missing.push(key.to_string());
                String::new()
            }
        }
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Parses a duration given in (fractional) seconds.
    pub fn secs_or(&self, key: &str, default: f64) -> Result<Duration, ConfigError> {
        let secs: f64 = self.parse_or(key, default)?;
        Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            value: secs.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw.to_string(),
                    reason: "expected true or false".to_string(),
                }),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct LastFmConfig {
    pub username: String,
    pub api_key: String,
    pub api_url: String,
    pub min_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MusicBrainzConfig {
    pub api_url: String,
    pub user_agent: String,
    pub min_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

/// Tuning of the discovery workflow.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub recent_months: u32,
    pub min_plays: u32,
    pub similar_match_min: f64,
    pub max_similar_per_artist: usize,
    pub similar_fetch_limit: usize,
    pub max_popular_albums: usize,
    pub cache_ttl_hours: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            recent_months: 3,
            min_plays: 20,
            similar_match_min: 0.46,
            max_similar_per_artist: 20,
            similar_fetch_limit: 50,
            max_popular_albums: 5,
            cache_ttl_hours: 24.0,
        }
    }
}

/// The immutable per-run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub service: String,
    pub lastfm: LastFmConfig,
    pub musicbrainz: MusicBrainzConfig,
    pub discovery: DiscoveryConfig,
    pub cache_file: PathBuf,
    pub debug: bool,
    settings: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_settings(Settings::from_env())
    }

    /// Builds the configuration, reporting every missing required key at once.
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let username = settings.require("LASTFM_USERNAME", &mut missing);
        let api_key = settings.require("LASTFM_API_KEY", &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        let lastfm = LastFmConfig {
            username,
            api_key,
            api_url: settings
                .get("LASTFM_API_URL")
                .unwrap_or(DEFAULT_LASTFM_API_URL)
                .to_string(),
            min_interval: settings.secs_or("REQUEST_LIMIT", 0.2)?,
            max_retries: positive(&settings, "LASTFM_MAX_RETRIES", 3)?,
            retry_delay: settings.secs_or("LASTFM_RETRY_DELAY", 2.0)?,
            timeout: settings.secs_or("LASTFM_TIMEOUT", 30.0)?,
        };

        let musicbrainz = MusicBrainzConfig {
            api_url: settings
                .get("MUSICBRAINZ_API_URL")
                .unwrap_or(DEFAULT_MUSICBRAINZ_API_URL)
                .to_string(),
            user_agent: settings
                .get("MBZ_USER_AGENT")
                .map(str::to_string)
                .unwrap_or_else(default_user_agent),
            min_interval: settings.secs_or("MBZ_DELAY", 1.1)?,
            max_retries: positive(&settings, "MBZ_MAX_RETRIES", 3)?,
            retry_delay: settings.secs_or("MBZ_RETRY_DELAY", 2.0)?,
            timeout: settings.secs_or("MBZ_TIMEOUT", 30.0)?,
        };

        let defaults = DiscoveryConfig::default();
        let discovery = DiscoveryConfig {
            recent_months: settings.parse_or("RECENT_MONTHS", defaults.recent_months)?,
            min_plays: settings.parse_or("MIN_PLAYS", defaults.min_plays)?,
            similar_match_min: settings
                .parse_or("SIMILAR_MATCH_MIN", defaults.similar_match_min)?,
            max_similar_per_artist: settings
                .parse_or("MAX_SIMILAR_PER_ART", defaults.max_similar_per_artist)?,
            similar_fetch_limit: settings
                .parse_or("SIMILAR_FETCH_LIMIT", defaults.similar_fetch_limit)?,
            max_popular_albums: settings.parse_or("MAX_POP_ALBUMS", defaults.max_popular_albums)?,
            cache_ttl_hours: cache_ttl_hours(&settings)?,
        };

        if !(0.0..=1.0).contains(&discovery.similar_match_min) {
            return Err(ConfigError::Invalid {
                key: "SIMILAR_MATCH_MIN".to_string(),
                value: discovery.similar_match_min.to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }
        let cache_file = cache_file(&settings);

        Ok(Self {
            service: settings
                .get("MUSIC_SERVICE")
                .unwrap_or(DEFAULT_SERVICE)
                .to_ascii_lowercase(),
            lastfm,
            musicbrainz,
            discovery,
            cache_file,
            debug: settings.bool_or("DEBUG_PRINT", false)?,
            settings,
        })
    }

    /// Raw values, used by the downstream service variants to validate
    /// their own configuration subset.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Location of the cache file, `CACHE_FILE` or the data directory default.
pub fn cache_file(settings: &Settings) -> PathBuf {
    settings
        .get("CACHE_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| app_dir().join("lastfm_similar_cache.json"))
}

/// Lifetime of a cached similarity list in hours.
pub fn cache_ttl_hours(settings: &Settings) -> Result<f64, ConfigError> {
    let ttl: f64 = settings.parse_or("CACHE_TTL_HOURS", DiscoveryConfig::default().cache_ttl_hours)?;
    if !ttl.is_finite() || ttl < 0.0 {
        return Err(ConfigError::Invalid {
            key: "CACHE_TTL_HOURS".to_string(),
            value: ttl.to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    Ok(ttl)
}

fn positive(settings: &Settings, key: &str, default: u32) -> Result<u32, ConfigError> {
    let value: u32 = settings.parse_or(key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

fn default_user_agent() -> String {
    format!(
        "{}/{} ( https://github.com/discoverfm/discoverfm )",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

/// Retry settings shared by the downstream service variants.
pub fn service_retries(
    settings: &Settings,
    prefix: &str,
) -> Result<(u32, Duration, Duration), ConfigError> {
    Ok((
        positive(settings, &format!("{prefix}_MAX_RETRIES"), 3)?,
        settings.secs_or(&format!("{prefix}_RETRY_DELAY"), 5.0)?,
        settings.secs_or(&format!("{prefix}_TIMEOUT"), 60.0)?,
    ))
}
