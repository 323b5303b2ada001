use serde::Deserialize;

use super::{LastFmClient, lenient_u64, one_or_many};
use crate::{
    error::RemoteError,
    types::{SimilarArtist, TopAlbum},
};

#[derive(Debug, Deserialize)]
struct SimilarArtistsResponse {
    #[serde(rename = "similarartists")]
    similar_artists: SimilarArtistsContainer,
}

#[derive(Debug, Deserialize)]
struct SimilarArtistsContainer {
    #[serde(default, deserialize_with = "one_or_many")]
    artist: Vec<SimilarArtist>,
}

#[derive(Debug, Deserialize)]
struct TopAlbumsResponse {
    #[serde(rename = "topalbums")]
    top_albums: TopAlbumsContainer,
}

#[derive(Debug, Deserialize)]
struct TopAlbumsContainer {
    #[serde(default, deserialize_with = "one_or_many")]
    album: Vec<LastFmAlbum>,
}

#[derive(Debug, Deserialize)]
struct LastFmAlbum {
    #[serde(default)]
    name: String,
    #[serde(default)]
    mbid: Option<String>,
    #[serde(rename = "playcount", default, deserialize_with = "lenient_u64")]
    play_count: u64,
}

#[derive(Debug, Deserialize)]
struct ArtistInfoResponse {
    artist: ArtistInfo,
}

#[derive(Debug, Deserialize)]
struct ArtistInfo {
    #[serde(default)]
    mbid: Option<String>,
}

impl LastFmClient {
    /// Retrieves the artists similar to `artist_id` (`artist.getSimilar`).
    ///
    /// The list is returned exactly in the order Last.fm ranks it.
    pub async fn get_similar_artists(
        &self,
        artist_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarArtist>, RemoteError> {
        let res: SimilarArtistsResponse = self
            .request(
                "artist.getSimilar",
                &[("mbid", artist_id.to_string()), ("limit", limit.to_string())],
            )
            .await?;

        Ok(res.similar_artists.artist)
    }

    /// Retrieves the popular albums of `artist_id` (`artist.getTopAlbums`).
    ///
    /// Albums without a release id are kept here; ranking and filtering is
    /// done by [`crate::utils::rank_top_albums`].
    pub async fn get_top_albums(
        &self,
        artist_id: &str,
        limit: usize,
    ) -> Result<Vec<TopAlbum>, RemoteError> {
        let res: TopAlbumsResponse = self
            .request(
                "artist.getTopAlbums",
                &[("mbid", artist_id.to_string()), ("limit", limit.to_string())],
            )
            .await?;

        Ok(res
            .top_albums
            .album
            .into_iter()
            .map(|a| TopAlbum {
                release_id: a.mbid.unwrap_or_default(),
                title: a.name,
                play_count: a.play_count,
            })
            .collect())
    }

    /// Looks up the MusicBrainz id of an artist by name (`artist.getInfo`).
    pub async fn get_artist_info(&self, name: &str) -> Result<Option<String>, RemoteError> {
        let res: ArtistInfoResponse = match self
            .request(
                "artist.getInfo",
                &[("artist", name.to_string()), ("autocorrect", "1".to_string())],
            )
            .await
        {
            Ok(res) => res,
            Err(RemoteError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(res.artist.mbid.filter(|id| !id.is_empty()))
    }
}
