use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::Value;

use super::{HEADPHONES, MusicService, OverloadGuard, ServiceVariant, report, settle};
use crate::{
    config::{Settings, service_retries},
    debug,
    error::{ConfigError, RemoteError, ServiceError},
    remote::{self, Backoff, Disposition, RemoteClient, RetryPolicy},
    types::{AlbumCandidate, ArtistCandidate, CanonicalKey, ServiceInfoRow},
};

/// Commands that routinely take longer than the default timeout.
const SLOW_COMMANDS: &[(&str, u64)] = &[
    ("forceSearch", 300),
    ("addAlbum", 120),
    ("queueAlbum", 120),
    ("addArtist", 120),
];

#[derive(Debug)]
pub struct HeadphonesConfig {
    pub api_key: String,
    pub endpoint: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub guard: OverloadGuard,
}

/// A decoded Headphones answer. Most commands answer JSON, some plain text
/// ("OK").
#[derive(Debug)]
enum Reply {
    Json(Value),
    Text(String),
}

pub struct HeadphonesService {
    http: Client,
    endpoint: String,
    api_url: String,
    api_key: String,
    timeout: Duration,
    remote: RemoteClient,
    guard: OverloadGuard,
}

impl HeadphonesService {
    fn timeout_for(&self, cmd: &str) -> Duration {
        SLOW_COMMANDS
            .iter()
            .find(|(name, _)| *name == cmd)
            .map(|(_, secs)| Duration::from_secs(*secs))
            .unwrap_or(self.timeout)
    }

    /// Runs one API command (`/api?cmd=...&apikey=...`).
    async fn command(&self, cmd: &str, params: &[(&str, &str)]) -> Result<Reply, RemoteError> {
        let timeout = self.timeout_for(cmd);

        let result = self
            .remote
            .call(cmd, move || async move {
                let response = self
                    .http
                    .get(&self.api_url)
                    .query(&[("cmd", cmd), ("apikey", self.api_key.as_str())])
                    .query(params)
                    .timeout(timeout)
                    .send()
                    .await?;

                let response = remote::check_status(response)?;
                let is_json = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|ct| ct.starts_with("application/json"));
                let body = response.text().await?;

                if is_json {
                    Ok(Reply::Json(serde_json::from_str(&body)?))
                } else {
                    Ok(Reply::Text(body))
                }
            })
            .await;

        self.guard.observe(HEADPHONES, &result);
        result
    }

    async fn run(&self, cmd: &str, params: &[(&str, &str)]) -> bool {
        settle(
            HEADPHONES,
            cmd,
            self.command(cmd, params).await.map(|_| true),
        )
    }
}

impl ServiceVariant for HeadphonesService {
    const NAME: &'static str = HEADPHONES;

    type Config = HeadphonesConfig;

    fn validate_config(settings: &Settings) -> Result<HeadphonesConfig, ConfigError> {
        let mut missing = Vec::new();
        let api_key = settings.require("HP_API_KEY", &mut missing);
        let endpoint = settings.require("HP_ENDPOINT", &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        let (max_retries, retry_delay, timeout) = service_retries(settings, "HP")?;

        Ok(HeadphonesConfig {
            api_key,
            endpoint,
            max_retries,
            retry_delay,
            timeout,
            guard: OverloadGuard::from_settings(settings)?,
        })
    }

    fn from_config(config: HeadphonesConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ServiceError::Client {
                service: HEADPHONES.to_string(),
                message: e.to_string(),
            })?;

        let endpoint = config.endpoint.trim_end_matches('/').to_string();

        Ok(Self {
            http,
            api_url: format!("{}/api", endpoint),
            endpoint,
            api_key: config.api_key,
            timeout: config.timeout,
            remote: RemoteClient::new(
                "Headphones",
                Duration::ZERO,
                RetryPolicy::new(config.max_retries, config.retry_delay),
            )
            .with_classifier(classify),
            guard: config.guard,
        })
    }
}

#[async_trait]
impl MusicService for HeadphonesService {
    fn name(&self) -> &'static str {
        HEADPHONES
    }

    async fn test_connection(&self) -> bool {
        self.run("getIndex", &[]).await
    }

    async fn add_artist(&self, artist: &ArtistCandidate) -> bool {
        self.run("addArtist", &[("id", artist.id.as_str())]).await
    }

    async fn refresh_artist(&self, artist_id: &str) -> bool {
        self.run("refreshArtist", &[("id", artist_id)]).await
    }

    async fn add_album(&self, _album: &AlbumCandidate, key: &CanonicalKey) -> bool {
        self.run("addAlbum", &[("id", key.as_str())]).await
    }

    async fn queue_album(&self, key: &CanonicalKey, force_new: bool) -> bool {
        let mut params = vec![("id", key.as_str())];
        if force_new {
            params.push(("new", "True"));
        }
        self.run("queueAlbum", &params).await
    }

    async fn album_exists(&self, key: &CanonicalKey, local: &BTreeSet<CanonicalKey>) -> bool {
        if local.contains(key) {
            return true;
        }

        // An unknown album comes back with empty `album` and `tracks` arrays.
        match self.command("getAlbum", &[("id", key.as_str())]).await {
            Ok(Reply::Json(body)) => {
                let exists = has_content(body.get("album")) || has_content(body.get("tracks"));
                if !exists {
                    debug!("Album {} not found in Headphones", key);
                }
                exists
            }
            Ok(Reply::Text(_)) | Err(RemoteError::NotFound) => false,
            Err(err) => {
                report(HEADPHONES, "getAlbum", err);
                false
            }
        }
    }

    async fn force_search(&self) -> bool {
        self.run("forceSearch", &[]).await
    }

    fn accepting_writes(&self) -> bool {
        self.guard.accepting_writes()
    }

    async fn service_info(&self) -> Vec<ServiceInfoRow> {
        let status = match self.command("getIndex", &[]).await {
            Ok(_) => "connected",
            Err(_) => "error",
        };

        vec![
            ServiceInfoRow {
                key: "service".to_string(),
                value: HEADPHONES.to_string(),
            },
            ServiceInfoRow {
                key: "endpoint".to_string(),
                value: self.endpoint.clone(),
            },
            ServiceInfoRow {
                key: "status".to_string(),
                value: status.to_string(),
            },
            ServiceInfoRow {
                key: "timeout".to_string(),
                value: format!("{}s", self.timeout.as_secs()),
            },
            ServiceInfoRow {
                key: "max retries".to_string(),
                value: self.remote.policy().max_attempts.to_string(),
            },
        ]
    }
}

fn has_content(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

/// Headphones has no rate limit signal; every transient failure, 503
/// included, waits `retry_delay × attempt`.
fn classify(err: &RemoteError) -> Disposition {
    if err.is_transient() {
        Disposition::Retry(Backoff::Linear)
    } else {
        Disposition::Fail
    }
}
