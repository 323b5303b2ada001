//! # Listening-history integration
//!
//! The discovery workflow depends on four listening-history capabilities,
//! expressed by the [`ListeningHistory`] trait:
//!
//! - recent tracks of the user, paged, to find the seed artists
//! - similar artists of an artist, ranked by the service
//! - the popular albums of an artist with their play counts
//! - the canonical id of an artist known only by name
//!
//! [`LastFmClient`] implements them against the Last.fm 2.0 API
//! (`?method=...&api_key=...&format=json`). Every request goes through the
//! client's [`RemoteClient`] so consecutive calls keep the configured spacing
//! (`REQUEST_LIMIT`, 5 requests per second by default) and transient failures
//! are retried with a fixed delay.
//!
//! Last.fm reports application errors inside a `200 OK` body
//! (`{"error": 29, "message": "Rate Limit Exceeded"}`); those bodies are
//! turned into [`RemoteError::Api`], unknown artists (code 6) into
//! [`RemoteError::NotFound`].

mod artists;
mod tracks;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    config::LastFmConfig,
    error::RemoteError,
    remote::{self, RemoteClient, RetryPolicy},
    types::{RecentTracksPage, SimilarArtist, TopAlbum},
};

#[async_trait]
pub trait ListeningHistory: Send + Sync {
    /// One page of the user's scrobbles between `since` and `until` (epoch seconds).
    async fn recent_tracks(
        &self,
        user: &str,
        since: i64,
        until: Option<i64>,
        page: u32,
    ) -> Result<RecentTracksPage, RemoteError>;

    /// Similar artists in the service's relevance order, at most `limit`.
    async fn similar_artists(
        &self,
        artist_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarArtist>, RemoteError>;

    /// Popular albums in the service's order, at most `limit`.
    async fn top_albums(&self, artist_id: &str, limit: usize)
    -> Result<Vec<TopAlbum>, RemoteError>;

    /// Canonical id of an artist known by name, `None` when the service has none.
    async fn artist_id(&self, name: &str) -> Result<Option<String>, RemoteError>;
}

pub struct LastFmClient {
    http: Client,
    api_url: String,
    api_key: String,
    remote: RemoteClient,
}

impl LastFmClient {
    pub fn new(config: &LastFmConfig) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            remote: RemoteClient::new(
                "Last.fm",
                config.min_interval,
                RetryPolicy::new(config.max_retries, config.retry_delay),
            ),
        })
    }

    /// Calls an API method and decodes the JSON body.
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        self.remote
            .call(method, move || async move {
                let response = self
                    .http
                    .get(&self.api_url)
                    .query(&[
                        ("method", method),
                        ("api_key", self.api_key.as_str()),
                        ("format", "json"),
                    ])
                    .query(params)
                    .send()
                    .await?;

                let body: Value = remote::read_json(response).await?;
                if let Some(code) = body.get("error").and_then(Value::as_i64) {
                    let message = body
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    return Err(match code {
                        6 => RemoteError::NotFound,
                        _ => RemoteError::Api { code, message },
                    });
                }

                Ok(serde_json::from_value::<T>(body)?)
            })
            .await
    }
}

#[async_trait]
impl ListeningHistory for LastFmClient {
    async fn recent_tracks(
        &self,
        user: &str,
        since: i64,
        until: Option<i64>,
        page: u32,
    ) -> Result<RecentTracksPage, RemoteError> {
        self.get_recent_tracks(user, since, until, page).await
    }

    async fn similar_artists(
        &self,
        artist_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarArtist>, RemoteError> {
        self.get_similar_artists(artist_id, limit).await
    }

    async fn top_albums(
        &self,
        artist_id: &str,
        limit: usize,
    ) -> Result<Vec<TopAlbum>, RemoteError> {
        self.get_top_albums(artist_id, limit).await
    }

    async fn artist_id(&self, name: &str) -> Result<Option<String>, RemoteError> {
        self.get_artist_info(name).await
    }
}

/// Last.fm returns a bare object instead of a one element array.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
        None => Vec::new(),
    })
}

/// Numbers arrive as strings ("12") or numbers depending on the method.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
