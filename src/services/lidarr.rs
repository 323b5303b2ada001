use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Map, Value, json};

use super::{LIDARR, MusicService, OverloadGuard, ServiceVariant, settle};
use crate::{
    config::{Settings, service_retries},
    debug,
    error::{ConfigError, RemoteError, ServiceError},
    info,
    remote::{self, Backoff, Disposition, RemoteClient, RetryPolicy},
    types::{AlbumCandidate, ArtistCandidate, CanonicalKey, ServiceInfoRow},
    warning,
};

pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(3600);

/// Fields of an `artist/lookup` result carried over into the add request.
const ARTIST_LOOKUP_FIELDS: &[&str] = &[
    "artistType",
    "disambiguation",
    "overview",
    "images",
    "links",
    "genres",
];

#[derive(Debug)]
pub struct LidarrConfig {
    pub api_key: String,
    pub endpoint: String,
    pub root_folder: String,
    pub quality_profile_id: i64,
    pub metadata_profile_id: i64,
    pub monitor_mode: String,
    pub search_on_add: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub lookup_timeout: Duration,
    pub guard: OverloadGuard,
}

impl LidarrConfig {
    /// Lidarr's `Retry-After` can ask for minutes; it is waited out in full
    /// up to [`MAX_RATE_LIMIT_WAIT`].
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay).with_max_delay(MAX_RATE_LIMIT_WAIT)
    }
}

pub struct LidarrService {
    http: Client,
    config: LidarrConfig,
    remote: RemoteClient,
}

impl LidarrService {
    /// Issues a request against `/api/v1/<resource>`.
    ///
    /// Lookups query the remote metadata server behind Lidarr and get the
    /// longer lookup timeout. An empty body decodes to `Value::Null`.
    async fn request(
        &self,
        method: Method,
        resource: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, RemoteError> {
        let url = format!("{}/api/v1/{}", self.config.endpoint, resource);
        let timeout = if resource.ends_with("/lookup") {
            self.config.lookup_timeout
        } else {
            self.config.timeout
        };
        let operation = format!("{} {}", method, resource);

        let result = self
            .remote
            .call(&operation, move || {
                let method = method.clone();
                let url = url.clone();
                async move {
                    let mut request = self
                        .http
                        .request(method, &url)
                        .header("X-Api-Key", self.config.api_key.as_str())
                        .query(query)
                        .timeout(timeout);
                    if let Some(body) = body {
                        request = request.json(body);
                    }

                    let response = remote::check_status(request.send().await?)?;
                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        Ok(Value::Null)
                    } else {
                        Ok(serde_json::from_str(&text)?)
                    }
                }
            })
            .await;

        self.config.guard.observe(LIDARR, &result);
        result
    }

    async fn get(&self, resource: &str, query: &[(&str, String)]) -> Result<Value, RemoteError> {
        self.request(Method::GET, resource, query, None).await
    }

    async fn post(&self, resource: &str, body: &Value) -> Result<Value, RemoteError> {
        self.request(Method::POST, resource, &[], Some(body)).await
    }

    async fn command(&self, body: Value) -> Result<bool, RemoteError> {
        Ok(!self.post("command", &body).await?.is_null())
    }

    /// The library artist with the given MusicBrainz id.
    async fn find_artist(&self, mbid: &str) -> Result<Option<Value>, RemoteError> {
        let artists = self.get("artist", &[("mbId", mbid.to_string())]).await?;
        Ok(first_matching(artists, "foreignArtistId", mbid))
    }

    /// The library album with the given MusicBrainz release(-group) id.
    async fn find_album(&self, mbid: &str) -> Result<Option<Value>, RemoteError> {
        let albums = self
            .get("album", &[("foreignAlbumId", mbid.to_string())])
            .await?;
        Ok(first_matching(albums, "foreignAlbumId", mbid))
    }

    async fn lookup(&self, kind: &str, mbid: &str) -> Result<Option<Value>, RemoteError> {
        let results = self
            .get(
                &format!("{}/lookup", kind),
                &[("term", format!("mbid:{}", mbid))],
            )
            .await?;
        Ok(match results {
            Value::Array(items) => items.into_iter().next(),
            _ => None,
        })
    }

    async fn try_add_artist(&self, artist: &ArtistCandidate) -> Result<bool, RemoteError> {
        if self.find_artist(&artist.id).await?.is_some() {
            debug!("Artist {} already in Lidarr", artist.name);
            return Ok(true);
        }

        let Some(found) = self.lookup("artist", &artist.id).await? else {
            warning!("Artist {} not found in the Lidarr database", artist.name);
            return Ok(false);
        };

        let mut payload = Map::new();
        if let Value::Object(fields) = found {
            payload.extend(
                fields
                    .into_iter()
                    .filter(|(k, _)| ARTIST_LOOKUP_FIELDS.contains(&k.as_str())),
            );
        }
        payload.insert("foreignArtistId".into(), json!(artist.id));
        payload.insert("artistName".into(), json!(artist.name));
        payload.insert("monitored".into(), json!(true));
        payload.insert("rootFolderPath".into(), json!(self.config.root_folder));
        payload.insert(
            "qualityProfileId".into(),
            json!(self.config.quality_profile_id),
        );
        payload.insert(
            "metadataProfileId".into(),
            json!(self.config.metadata_profile_id),
        );
        payload.insert(
            "addOptions".into(),
            json!({
                "monitor": self.config.monitor_mode,
                "searchForMissingAlbums": self.config.search_on_add,
            }),
        );

        let added = !self.post("artist", &Value::Object(payload)).await?.is_null();
        if added {
            info!("Added artist {} to Lidarr", artist.name);
        }
        Ok(added)
    }

    async fn try_refresh_artist(&self, artist_id: &str) -> Result<bool, RemoteError> {
        let Some(id) = self.find_artist(artist_id).await?.and_then(|a| library_id(&a)) else {
            warning!("Artist {} not in the Lidarr library, cannot refresh", artist_id);
            return Ok(false);
        };

        self.command(json!({ "name": "RefreshArtist", "artistId": id }))
            .await
    }

    async fn try_add_album(
        &self,
        album: &AlbumCandidate,
        key: &CanonicalKey,
    ) -> Result<bool, RemoteError> {
        if self.find_album(key.as_str()).await?.is_some() {
            debug!("Album {} already in Lidarr", album.title);
            return Ok(true);
        }

        let Some(artist_id) = self
            .find_artist(&album.artist_id)
            .await?
            .and_then(|a| library_id(&a))
        else {
            warning!(
                "Artist {} not in the Lidarr library, cannot add {}",
                album.artist_name,
                album.title
            );
            return Ok(false);
        };

        let Some(found) = self.lookup("album", key.as_str()).await? else {
            warning!("Album {} not found in the Lidarr database", album.title);
            return Ok(false);
        };

        // The lookup result is the album resource Lidarr expects, only the
        // library placement is ours.
        let mut payload = match found {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        payload.insert("foreignAlbumId".into(), json!(key.as_str()));
        payload.insert("artistId".into(), json!(artist_id));
        payload.insert("monitored".into(), json!(true));
        payload.insert(
            "addOptions".into(),
            json!({ "searchForNewAlbum": self.config.search_on_add }),
        );

        let added = !self.post("album", &Value::Object(payload)).await?.is_null();
        if added {
            info!("Added album {} to Lidarr", album.title);
        }
        Ok(added)
    }

    async fn try_queue_album(&self, key: &CanonicalKey) -> Result<bool, RemoteError> {
        let Some(id) = self.find_album(key.as_str()).await?.and_then(|a| library_id(&a)) else {
            warning!("Album {} not in the Lidarr library, cannot search it", key);
            return Ok(false);
        };

        self.command(json!({ "name": "AlbumSearch", "albumIds": [id] }))
            .await
    }

    /// Warns about configured profiles Lidarr does not know. Never fails.
    async fn verify_profiles(&self) {
        for (resource, id) in [
            ("qualityprofile", self.config.quality_profile_id),
            ("metadataprofile", self.config.metadata_profile_id),
        ] {
            match self.get(resource, &[]).await {
                Ok(Value::Array(profiles)) => {
                    if !profiles.iter().any(|p| p.get("id").and_then(Value::as_i64) == Some(id)) {
                        warning!("Lidarr has no {} with id {}", resource, id);
                    }
                }
                Ok(_) => {}
                Err(e) => warning!("Cannot verify Lidarr {} ({}), continuing", resource, e),
            }
        }
    }

    async fn version(&self) -> Option<String> {
        self.get("system/status", &[])
            .await
            .ok()?
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl ServiceVariant for LidarrService {
    const NAME: &'static str = LIDARR;

    type Config = LidarrConfig;

    fn validate_config(settings: &Settings) -> Result<LidarrConfig, ConfigError> {
        let mut missing = Vec::new();
        let api_key = settings.require("LIDARR_API_KEY", &mut missing);
        let endpoint = settings.require("LIDARR_ENDPOINT", &mut missing);
        let root_folder = settings.require("LIDARR_ROOT_FOLDER", &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        let (max_retries, retry_delay, timeout) = service_retries(settings, "LIDARR")?;

        Ok(LidarrConfig {
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            root_folder,
            quality_profile_id: settings.parse_or("LIDARR_QUALITY_PROFILE_ID", 1)?,
            metadata_profile_id: settings.parse_or("LIDARR_METADATA_PROFILE_ID", 1)?,
            monitor_mode: settings
                .get("LIDARR_MONITOR_MODE")
                .unwrap_or("all")
                .to_string(),
            search_on_add: settings.bool_or("LIDARR_SEARCH_ON_ADD", true)?,
            max_retries,
            retry_delay,
            timeout,
            lookup_timeout: settings.secs_or("LIDARR_LOOKUP_TIMEOUT", 300.0)?,
            guard: OverloadGuard::from_settings(settings)?,
        })
    }

    fn from_config(config: LidarrConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ServiceError::Client {
                service: LIDARR.to_string(),
                message: e.to_string(),
            })?;

        let remote = RemoteClient::new("Lidarr", Duration::ZERO, config.retry_policy())
            .with_classifier(classify);

        Ok(Self {
            http,
            config,
            remote,
        })
    }
}

#[async_trait]
impl MusicService for LidarrService {
    fn name(&self) -> &'static str {
        LIDARR
    }

    async fn test_connection(&self) -> bool {
        match self.get("system/status", &[]).await {
            Ok(status) => status.get("version").is_some(),
            Err(e) => {
                debug!("Lidarr status request failed: {}", e);
                false
            }
        }
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        if !self.test_connection().await {
            return Err(ServiceError::Unhealthy {
                service: LIDARR.to_string(),
                reason: "system/status did not report a version".to_string(),
            });
        }
        self.verify_profiles().await;
        Ok(())
    }

    async fn add_artist(&self, artist: &ArtistCandidate) -> bool {
        settle(LIDARR, "add artist", self.try_add_artist(artist).await)
    }

    async fn refresh_artist(&self, artist_id: &str) -> bool {
        settle(
            LIDARR,
            "refresh artist",
            self.try_refresh_artist(artist_id).await,
        )
    }

    async fn add_album(&self, album: &AlbumCandidate, key: &CanonicalKey) -> bool {
        settle(LIDARR, "add album", self.try_add_album(album, key).await)
    }

    /// Lidarr has no notion of re-queueing a known album, `force_new` is ignored.
    async fn queue_album(&self, key: &CanonicalKey, _force_new: bool) -> bool {
        settle(LIDARR, "queue album", self.try_queue_album(key).await)
    }

    async fn album_exists(&self, key: &CanonicalKey, local: &BTreeSet<CanonicalKey>) -> bool {
        if local.contains(key) {
            return true;
        }
        settle(
            LIDARR,
            "album lookup",
            self.find_album(key.as_str()).await.map(|a| a.is_some()),
        )
    }

    async fn force_search(&self) -> bool {
        settle(
            LIDARR,
            "force search",
            self.command(json!({ "name": "MissingAlbumSearch" })).await,
        )
    }

    fn accepting_writes(&self) -> bool {
        self.config.guard.accepting_writes()
    }

    async fn service_info(&self) -> Vec<ServiceInfoRow> {
        let rows = [
            ("service", LIDARR.to_string()),
            (
                "version",
                self.version().await.unwrap_or_else(|| "unknown".to_string()),
            ),
            ("endpoint", self.config.endpoint.clone()),
            ("root folder", self.config.root_folder.clone()),
            (
                "quality profile",
                self.config.quality_profile_id.to_string(),
            ),
            (
                "metadata profile",
                self.config.metadata_profile_id.to_string(),
            ),
            ("monitor mode", self.config.monitor_mode.clone()),
            ("search on add", self.config.search_on_add.to_string()),
        ];

        rows.into_iter()
            .map(|(key, value)| ServiceInfoRow {
                key: key.to_string(),
                value,
            })
            .collect()
    }
}

/// First element of a JSON array whose `field` equals `id`.
fn first_matching(list: Value, field: &str, id: &str) -> Option<Value> {
    match list {
        Value::Array(items) => items
            .into_iter()
            .find(|item| item.get(field).and_then(Value::as_str) == Some(id)),
        _ => None,
    }
}

/// The numeric library id of an artist or album resource.
fn library_id(resource: &Value) -> Option<i64> {
    resource.get("id").and_then(Value::as_i64)
}

/// 429 honours `Retry-After`, 503 (overloaded) backs off exponentially, other
/// server and transport failures linearly.
fn classify(err: &RemoteError) -> Disposition {
    match err {
        RemoteError::Status {
            status: 429,
            retry_after,
        } => Disposition::RateLimited(*retry_after),
        e if e.is_overloaded() => Disposition::Retry(Backoff::Exponential),
        e if e.is_transient() => Disposition::Retry(Backoff::Linear),
        _ => Disposition::Fail,
    }
}
