//! # Downstream music manager services
//!
//! The discovery workflow only talks to the download manager through the
//! [`MusicService`] capability. Two variants implement it:
//!
//! - [`HeadphonesService`] - a single `/api` endpoint taking a flat `cmd`
//!   query parameter and an `apikey`.
//! - [`LidarrService`] - versioned `/api/v1/<resource>` paths authenticated
//!   with an `X-Api-Key` header.
//!
//! Every operation returns `false` (never an error) once the variant's own
//! retry policy is exhausted, so the orchestrator can count the failure and
//! continue with the next candidate. Each variant owns its timeout table and
//! its classification of retryable signals. Both share the
//! [`RemoteClient`](crate::remote::RemoteClient) engine and the
//! [`OverloadGuard`].
//!
//! ## Construction
//!
//! [`create`] selects the variant named by `MUSIC_SERVICE`, validates its
//! configuration subset (no network activity), constructs it and runs its
//! health check. A failure at any step aborts startup; there is no silent
//! fallback to another variant.

mod headphones;
mod lidarr;

use std::{
    collections::BTreeSet,
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;

pub use headphones::{HeadphonesConfig, HeadphonesService};
pub use lidarr::{LidarrConfig, LidarrService};

use crate::{
    config::{Config, Settings},
    error::{ConfigError, DiscoveryError, RemoteError, ServiceError},
    info,
    success,
    types::{AlbumCandidate, ArtistCandidate, CanonicalKey, ServiceInfoRow},
    warning,
};

#[async_trait]
pub trait MusicService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lightweight reachability and authentication probe.
    async fn test_connection(&self) -> bool;

    /// Startup verification. Fails when the service cannot be used.
    async fn health_check(&self) -> Result<(), ServiceError> {
        if self.test_connection().await {
            Ok(())
        } else {
            Err(ServiceError::Unhealthy {
                service: self.name().to_string(),
                reason: "connection test failed".to_string(),
            })
        }
    }

    async fn add_artist(&self, artist: &ArtistCandidate) -> bool;

    async fn refresh_artist(&self, artist_id: &str) -> bool;

    async fn add_album(&self, album: &AlbumCandidate, key: &CanonicalKey) -> bool;

    async fn queue_album(&self, key: &CanonicalKey, force_new: bool) -> bool;

    /// Whether `key` is already known, locally or in the service's library.
    async fn album_exists(&self, key: &CanonicalKey, local: &BTreeSet<CanonicalKey>) -> bool;

    async fn force_search(&self) -> bool;

    /// `false` while the service is overloaded and writes should be skipped.
    fn accepting_writes(&self) -> bool {
        true
    }

    async fn service_info(&self) -> Vec<ServiceInfoRow>;
}

/// A concrete service variant that can be built from raw settings.
pub trait ServiceVariant: MusicService + Sized + 'static {
    const NAME: &'static str;

    type Config;

    /// Checks the variant's configuration subset, naming every missing key.
    fn validate_config(settings: &Settings) -> Result<Self::Config, ConfigError>;

    fn from_config(config: Self::Config) -> Result<Self, ServiceError>;
}

pub const HEADPHONES: &str = "headphones";
pub const LIDARR: &str = "lidarr";

pub const AVAILABLE_SERVICES: &[&str] = &[HEADPHONES, LIDARR];

/// Validates the configuration of the selected service without any network
/// activity.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    match config.service.as_str() {
        HEADPHONES => HeadphonesService::validate_config(config.settings()).map(|_| ()),
        LIDARR => LidarrService::validate_config(config.settings()).map(|_| ()),
        other => Err(unknown_service(other)),
    }
}

/// Selects, validates, constructs and health-checks the configured service.
pub async fn create(config: &Config) -> Result<Box<dyn MusicService>, DiscoveryError> {
    match config.service.as_str() {
        HEADPHONES => build::<HeadphonesService>(config.settings()).await,
        LIDARR => build::<LidarrService>(config.settings()).await,
        other => Err(unknown_service(other).into()),
    }
}

async fn build<S: ServiceVariant>(settings: &Settings) -> Result<Box<dyn MusicService>, DiscoveryError> {
    let config = S::validate_config(settings)?;

    info!("Creating {} service...", S::NAME);
    let service = S::from_config(config)?;

    info!("Testing {} connection...", S::NAME);
    ensure_healthy(&service).await?;

    success!("Successfully initialized {} service", S::NAME);
    Ok(Box::new(service))
}

/// Runs the health check of an already constructed service.
pub async fn ensure_healthy(service: &dyn MusicService) -> Result<(), ServiceError> {
    service.health_check().await
}

fn unknown_service(name: &str) -> ConfigError {
    ConfigError::UnknownService {
        name: name.to_string(),
        available: AVAILABLE_SERVICES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Tracks consecutive "overloaded" failures of a service.
///
/// After `threshold` operations in a row gave up on an overloaded signal the
/// guard closes for `cooldown`: [`OverloadGuard::accepting_writes`] returns
/// `false` and the orchestrator defers its writes. After the cooldown one
/// more write is let through; a success resets the guard, another overloaded
/// failure closes it again.
#[derive(Debug)]
pub struct OverloadGuard {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<GuardState>,
}

#[derive(Debug, Default)]
struct GuardState {
    consecutive: u32,
    closed_until: Option<Instant>,
}

impl OverloadGuard {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(GuardState::default()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self::new(
            settings.parse_or("SERVICE_OVERLOAD_THRESHOLD", 3)?,
            settings.secs_or("SERVICE_OVERLOAD_COOLDOWN", 300.0)?,
        ))
    }

    /// Feeds the final outcome of an operation into the guard.
    pub fn observe<T>(&self, service: &str, result: &Result<T, RemoteError>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match result {
            Ok(_) => {
                state.consecutive = 0;
                state.closed_until = None;
            }
            Err(err) if err.is_overloaded() => {
                state.consecutive += 1;
                if state.consecutive >= self.threshold {
                    state.closed_until = Some(Instant::now() + self.cooldown);
                    warning!(
                        "{} is overloaded ({} failures in a row), pausing writes for {}s.",
                        service,
                        state.consecutive,
                        self.cooldown.as_secs()
                    );
                }
            }
            Err(_) => {}
        }
    }

    pub fn accepting_writes(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.closed_until {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }
}

/// Turns the outcome of an operation into the boolean the orchestrator
/// counts, logging the failure.
fn settle(service: &str, operation: &str, result: Result<bool, RemoteError>) -> bool {
    match result {
        Ok(done) => done,
        Err(err) => {
            report(service, operation, err);
            false
        }
    }
}

/// Logs a failed operation in the common format.
fn report(service: &str, operation: &str, source: RemoteError) {
    let err = ServiceError::Request {
        service: service.to_string(),
        operation: operation.to_string(),
        source,
    };
    crate::failed!("{}", err);
}
