use std::{
    collections::{BTreeMap, BTreeSet},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::CacheError,
    services::MusicService,
    types::{CanonicalKey, SimilarArtist},
    warning,
};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// A cached similarity list and the time it was fetched (epoch seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarEntry {
    #[serde(rename = "ts", alias = "timestamp")]
    pub timestamp: f64,
    #[serde(default)]
    pub data: Vec<SimilarArtist>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    similar_cache: BTreeMap<String, SimilarEntry>,
    #[serde(default)]
    added_albums: BTreeSet<CanonicalKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub similar_entries: usize,
    pub fresh_entries: usize,
    pub added_albums: usize,
}

/// The persistent de-duplication cache.
///
/// Holds the similarity lists with their fetch time and the set of canonical
/// keys that were already queued. The set only grows while a run is in
/// progress; [`DedupCache::persist`] is the only code path that writes the
/// file.
pub struct DedupCache {
    path: PathBuf,
    ttl_hours: f64,
    doc: CacheDocument,
}

impl DedupCache {
    /// An empty cache that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>, ttl_hours: f64) -> Self {
        Self {
            path: path.into(),
            ttl_hours,
            doc: CacheDocument::default(),
        }
    }

    /// Loads the cache from `path`.
    ///
    /// A missing file is created with an empty structure. A file that cannot
    /// be decoded is moved aside to `<path>.corrupt` and an empty cache is
    /// returned, so the following persist does not destroy it.
    pub async fn load(path: impl Into<PathBuf>, ttl_hours: f64) -> Result<Self, CacheError> {
        let mut cache = Self::new(path, ttl_hours);

        if !cache.path.exists() {
            cache.persist().await?;
            return Ok(cache);
        }

        let decoded = match async_fs::read(&cache.path).await {
            Ok(bytes) => serde_json::from_slice::<CacheDocument>(&bytes).map_err(|e| e.to_string()),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(e.to_string()),
            Err(e) => return Err(e.into()),
        };
        match decoded {
            Ok(doc) => cache.doc = doc,
            Err(e) => {
                let aside = corrupt_path(&cache.path);
                warning!(
                    "Cannot read cache {} ({}), moved it to {} and starting empty.",
                    cache.path.display(),
                    e,
                    aside.display()
                );
                async_fs::rename(&cache.path, &aside).await?;
            }
        }

        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fast local check, no remote call.
    pub fn is_known(&self, key: &CanonicalKey) -> bool {
        self.doc.added_albums.contains(key)
    }

    /// Asks the downstream service whether it already has `key`, for albums
    /// added before this cache existed or by hand.
    pub async fn check_remote_exists(&self, service: &dyn MusicService, key: &CanonicalKey) -> bool {
        service.album_exists(key, &self.doc.added_albums).await
    }

    /// Records a queued album. Returns `false` if it was already known.
    pub fn record(&mut self, key: CanonicalKey) -> bool {
        self.doc.added_albums.insert(key)
    }

    pub fn added_albums(&self) -> &BTreeSet<CanonicalKey> {
        &self.doc.added_albums
    }

    /// Cached similarity list of `artist_id` if it is younger than the TTL.
    pub fn cached_similar(&self, artist_id: &str) -> Option<&[SimilarArtist]> {
        self.cached_similar_at(artist_id, now())
    }

    /// Same as [`DedupCache::cached_similar`] evaluated at `now` (epoch seconds).
    ///
    /// An entry written at `T` is valid for reads before `T + ttl` and absent
    /// from `T + ttl` on.
    pub fn cached_similar_at(&self, artist_id: &str, now: f64) -> Option<&[SimilarArtist]> {
        self.doc
            .similar_cache
            .get(artist_id)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.data.as_slice())
    }

    pub fn store_similar(&mut self, artist_id: &str, data: Vec<SimilarArtist>) {
        self.store_similar_at(artist_id, data, now());
    }

    pub fn store_similar_at(&mut self, artist_id: &str, data: Vec<SimilarArtist>, timestamp: f64) {
        self.doc
            .similar_cache
            .insert(artist_id.to_string(), SimilarEntry { timestamp, data });
    }

    /// Drops expired similarity entries, returns how many were removed.
    pub fn prune_expired(&mut self) -> usize {
        let now = now();
        let ttl_secs = self.ttl_hours * SECONDS_PER_HOUR;
        let before = self.doc.similar_cache.len();
        self.doc
            .similar_cache
            .retain(|_, entry| now - entry.timestamp < ttl_secs);
        before - self.doc.similar_cache.len()
    }

    /// Drops every similarity entry. The queued album set is left untouched.
    pub fn clear_similar(&mut self) -> usize {
        let removed = self.doc.similar_cache.len();
        self.doc.similar_cache.clear();
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = now();
        CacheStats {
            similar_entries: self.doc.similar_cache.len(),
            fresh_entries: self
                .doc
                .similar_cache
                .values()
                .filter(|entry| self.is_fresh(entry, now))
                .count(),
            added_albums: self.doc.added_albums.len(),
        }
    }

    /// Writes the whole cache atomically: the document goes to a temporary
    /// file next to the target which is then renamed over it.
    pub async fn persist(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                async_fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(&self.doc)?;
        let tmp = self.path.with_extension("tmp");
        async_fs::write(&tmp, json).await?;
        async_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn is_fresh(&self, entry: &SimilarEntry, now: f64) -> bool {
        now - entry.timestamp < self.ttl_hours * SECONDS_PER_HOUR
    }
}

/// Current time as fractional epoch seconds.
pub fn now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}
