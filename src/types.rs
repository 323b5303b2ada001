use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tabled::Tabled;

/// An artist considered during a run. Seed artists come from the listening
/// history and carry no similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistCandidate {
    pub id: String,
    pub name: String,
    pub similarity: Option<f64>,
}

impl ArtistCandidate {
    pub fn seed(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            similarity: None,
        }
    }
}

/// Outcome of classifying a release group.
///
/// `Unknown` means the metadata could not be fetched; it is distinct from
/// `NonStudio` and leads to queueing by the raw release id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Studio,
    NonStudio,
    Unknown,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Studio => "studio",
            Classification::NonStudio => "non-studio",
            Classification::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// The single identifier used to de-duplicate and queue an album.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CanonicalKey {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumCandidate {
    pub release_id: String,
    pub release_group_id: Option<String>,
    pub title: String,
    pub artist_id: String,
    pub artist_name: String,
    pub classification: Classification,
}

impl AlbumCandidate {
    /// Chooses the canonical key: the release group for studio albums, the
    /// raw release id when the classification is unknown, nothing for
    /// non-studio releases (they are never queued).
    pub fn canonical_key(&self) -> Option<CanonicalKey> {
        match (self.classification, &self.release_group_id) {
            (Classification::NonStudio, _) => None,
            (Classification::Studio, Some(group)) => Some(CanonicalKey::new(group.clone())),
            _ => Some(CanonicalKey::new(self.release_id.clone())),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.classification == Classification::Unknown
    }
}

/// One entry of a "similar artists" list, in the shape it is cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarArtist {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mbid: Option<String>,
    #[serde(rename = "match", default, deserialize_with = "lenient_score")]
    pub score: f64,
}

impl SimilarArtist {
    /// The artist id if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.mbid.as_deref().filter(|id| !id.is_empty())
    }
}

/// A popular album of an artist as reported by the listening-history service.
#[derive(Debug, Clone, PartialEq)]
pub struct TopAlbum {
    pub release_id: String,
    pub title: String,
    pub play_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentTrack {
    pub artist_name: String,
    pub artist_id: Option<String>,
}

/// Plays of one (name, id) pair inside the recency window.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistPlays {
    pub name: String,
    pub id: Option<String>,
    pub plays: u32,
}

#[derive(Debug, Clone)]
pub struct RecentTracksPage {
    pub tracks: Vec<RecentTrack>,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseGroup {
    pub id: String,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
}

/// Diagnostics of a downstream service, shown by `discoverfm check`.
#[derive(Debug, Clone, Tabled)]
pub struct ServiceInfoRow {
    pub key: String,
    pub value: String,
}

#[derive(Tabled)]
pub struct SummaryRow {
    pub metric: String,
    pub count: usize,
}

#[derive(Tabled)]
pub struct CacheInfoRow {
    pub entry: String,
    pub count: usize,
}

/// Accepts a score as number or numeric string, the listening-history
/// service returns the latter.
fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Score {
        Number(f64),
        Text(String),
    }

    let score = match Option::<Score>::deserialize(deserializer)? {
        Some(Score::Number(n)) => n,
        Some(Score::Text(s)) => s.trim().parse().unwrap_or(0.0),
        None => 0.0,
    };
    // "NaN" and "inf" parse as f64 but are not scores.
    Ok(if score.is_finite() { score } else { 0.0 })
}
