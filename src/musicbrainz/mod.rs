//! Metadata-graph capability backed by the MusicBrainz web service.
//!
//! MusicBrainz asks clients to identify themselves with a descriptive
//! `User-Agent` and to stay at or below one request per second, answering
//! `503`/`429` when they do not. The client keeps `MBZ_DELAY` between calls
//! and honours `Retry-After` on those statuses.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::MusicBrainzConfig,
    error::RemoteError,
    remote::{self, Backoff, Disposition, RemoteClient, RetryPolicy},
    types::ReleaseGroup,
};

#[async_trait]
pub trait MetadataGraph: Send + Sync {
    /// The release group a release belongs to.
    async fn release_parent_group(&self, release_id: &str) -> Result<String, RemoteError>;

    /// Primary type and secondary tags of a release group.
    async fn release_group(&self, group_id: &str) -> Result<ReleaseGroup, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    #[serde(rename = "release-group")]
    release_group: Option<ReleaseGroupRef>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupResponse {
    id: String,
    #[serde(rename = "primary-type", default)]
    primary_type: Option<String>,
    #[serde(rename = "secondary-types", default)]
    secondary_types: Vec<String>,
}

pub struct MusicBrainzClient {
    http: Client,
    api_url: String,
    remote: RemoteClient,
}

impl MusicBrainzClient {
    pub fn new(config: &MusicBrainzConfig) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            remote: RemoteClient::new(
                "MusicBrainz",
                config.min_interval,
                RetryPolicy::new(config.max_retries, config.retry_delay),
            )
            .with_classifier(classify),
        })
    }

    async fn get<T>(&self, operation: &str, path: &str, inc: Option<&str>) -> Result<T, RemoteError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.api_url, path);
        self.remote
            .call(operation, move || {
                let url = url.clone();
                async move {
                    let mut request = self.http.get(&url).query(&[("fmt", "json")]);
                    if let Some(inc) = inc {
                        request = request.query(&[("inc", inc)]);
                    }
                    let response = request.send().await?;
                    remote::read_json::<T>(response).await
                }
            })
            .await
    }
}

/// MusicBrainz signals its rate limit with 503 as well as 429.
fn classify(err: &RemoteError) -> Disposition {
    match err {
        RemoteError::Status {
            status: 429 | 503,
            retry_after,
        } => Disposition::RateLimited(*retry_after),
        e if e.is_transient() => Disposition::Retry(Backoff::Fixed),
        _ => Disposition::Fail,
    }
}

#[async_trait]
impl MetadataGraph for MusicBrainzClient {
    async fn release_parent_group(&self, release_id: &str) -> Result<String, RemoteError> {
        let res: ReleaseResponse = self
            .get(
                "release",
                &format!("release/{}", release_id),
                Some("release-groups"),
            )
            .await?;

        res.release_group
            .map(|rg| rg.id)
            .ok_or(RemoteError::NotFound)
    }

    async fn release_group(&self, group_id: &str) -> Result<ReleaseGroup, RemoteError> {
        let res: ReleaseGroupResponse = self
            .get("release-group", &format!("release-group/{}", group_id), None)
            .await?;

        Ok(ReleaseGroup {
            id: res.id,
            primary_type: res.primary_type,
            secondary_types: res.secondary_types,
        })
    }
}
