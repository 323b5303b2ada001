use serde::Deserialize;

use super::{LastFmClient, lenient_u64, one_or_many};
use crate::{
    error::RemoteError,
    types::{RecentTrack, RecentTracksPage},
};

/// Maximum page size accepted by `user.getRecentTracks`.
pub const RECENT_TRACKS_PAGE_SIZE: u32 = 200;

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    #[serde(rename = "recenttracks")]
    recent_tracks: RecentTracksContainer,
}

#[derive(Debug, Deserialize)]
struct RecentTracksContainer {
    #[serde(default, deserialize_with = "one_or_many")]
    track: Vec<LastFmTrack>,
    #[serde(rename = "@attr")]
    attr: PageAttr,
}

#[derive(Debug, Deserialize)]
struct PageAttr {
    #[serde(default, deserialize_with = "lenient_u64")]
    page: u64,
    #[serde(rename = "totalPages", default, deserialize_with = "lenient_u64")]
    total_pages: u64,
}

#[derive(Debug, Deserialize)]
struct LastFmTrack {
    artist: TrackArtist,
}

#[derive(Debug, Deserialize)]
struct TrackArtist {
    #[serde(rename = "#text", default)]
    name: String,
    #[serde(default)]
    mbid: Option<String>,
}

impl LastFmClient {
    /// Retrieves one page of the user's scrobbles (`user.getRecentTracks`).
    pub async fn get_recent_tracks(
        &self,
        user: &str,
        since: i64,
        until: Option<i64>,
        page: u32,
    ) -> Result<RecentTracksPage, RemoteError> {
        let mut params = vec![
            ("user", user.to_string()),
            ("limit", RECENT_TRACKS_PAGE_SIZE.to_string()),
            ("page", page.to_string()),
            ("from", since.to_string()),
        ];
        if let Some(until) = until {
            params.push(("to", until.to_string()));
        }

        let res: RecentTracksResponse = self.request("user.getRecentTracks", &params).await?;

        Ok(RecentTracksPage {
            tracks: res
                .recent_tracks
                .track
                .into_iter()
                .map(|t| RecentTrack {
                    artist_name: t.artist.name,
                    artist_id: t.artist.mbid.filter(|id| !id.is_empty()),
                })
                .collect(),
            page: res.recent_tracks.attr.page as u32,
            total_pages: res.recent_tracks.attr.total_pages as u32,
        })
    }
}
