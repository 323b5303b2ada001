#![allow(dead_code)]

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use discoverfm::{
    config::{Config, Settings},
    error::RemoteError,
    lastfm::ListeningHistory,
    musicbrainz::MetadataGraph,
    services::MusicService,
    types::{
        AlbumCandidate, ArtistCandidate, CanonicalKey, RecentTrack, RecentTracksPage,
        ReleaseGroup, ServiceInfoRow, SimilarArtist, TopAlbum,
    },
};

// Builds a configuration from defaults plus `extra` (later keys win)
pub fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut pairs = vec![
        ("LASTFM_USERNAME", "listener"),
        ("LASTFM_API_KEY", "secret"),
        ("MIN_PLAYS", "2"),
    ];
    pairs.extend_from_slice(extra);
    Config::from_settings(Settings::from_pairs(pairs)).unwrap()
}

pub fn similar(name: &str, id: Option<&str>, score: f64) -> SimilarArtist {
    SimilarArtist {
        name: name.to_string(),
        mbid: id.map(str::to_string),
        score,
    }
}

// Serves `router` on an ephemeral local port and returns its base url
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[derive(Default)]
pub struct FakeHistory {
    tracks: Vec<RecentTrack>,
    similar: HashMap<String, Vec<SimilarArtist>>,
    albums: HashMap<String, Vec<TopAlbum>>,
    ids_by_name: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(mut self, name: &str, id: Option<&str>, plays: u32) -> Self {
        for _ in 0..plays {
            self.tracks.push(RecentTrack {
                artist_name: name.to_string(),
                artist_id: id.map(str::to_string),
            });
        }
        self
    }

    pub fn similar_to(mut self, artist_id: &str, list: Vec<SimilarArtist>) -> Self {
        self.similar.insert(artist_id.to_string(), list);
        self
    }

    pub fn albums_of(mut self, artist_id: &str, list: &[(&str, &str, u64)]) -> Self {
        self.albums.insert(
            artist_id.to_string(),
            list.iter()
                .map(|(id, title, plays)| TopAlbum {
                    release_id: id.to_string(),
                    title: title.to_string(),
                    play_count: *plays,
                })
                .collect(),
        );
        self
    }

    pub fn known_as(mut self, name: &str, id: &str) -> Self {
        self.ids_by_name.insert(name.to_string(), id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ListeningHistory for FakeHistory {
    async fn recent_tracks(
        &self,
        _user: &str,
        _since: i64,
        _until: Option<i64>,
        page: u32,
    ) -> Result<RecentTracksPage, RemoteError> {
        self.record(format!("recent:{}", page));
        Ok(RecentTracksPage {
            tracks: self.tracks.clone(),
            page,
            total_pages: 1,
        })
    }

    async fn similar_artists(
        &self,
        artist_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarArtist>, RemoteError> {
        self.record(format!("similar:{}", artist_id));
        let mut list = self.similar.get(artist_id).cloned().unwrap_or_default();
        list.truncate(limit);
        Ok(list)
    }

    async fn top_albums(
        &self,
        artist_id: &str,
        _limit: usize,
    ) -> Result<Vec<TopAlbum>, RemoteError> {
        self.record(format!("top_albums:{}", artist_id));
        Ok(self.albums.get(artist_id).cloned().unwrap_or_default())
    }

    async fn artist_id(&self, name: &str) -> Result<Option<String>, RemoteError> {
        self.record(format!("artist_id:{}", name));
        Ok(self.ids_by_name.get(name).cloned())
    }
}

#[derive(Default)]
pub struct FakeGraph {
    releases: HashMap<String, String>,
    groups: HashMap<String, ReleaseGroup>,
    unavailable: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(mut self, release_id: &str, group_id: &str) -> Self {
        self.releases
            .insert(release_id.to_string(), group_id.to_string());
        self
    }

    pub fn group(mut self, group_id: &str, primary: &str, secondary: &[&str]) -> Self {
        self.groups.insert(
            group_id.to_string(),
            ReleaseGroup {
                id: group_id.to_string(),
                primary_type: Some(primary.to_string()),
                secondary_types: secondary.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    pub fn studio(self, group_id: &str) -> Self {
        self.group(group_id, "Album", &[])
    }

    // Release-group fetches fail as if the service stayed overloaded
    pub fn unavailable(mut self, group_id: &str) -> Self {
        self.unavailable.insert(group_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataGraph for FakeGraph {
    async fn release_parent_group(&self, release_id: &str) -> Result<String, RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("release:{}", release_id));
        self.releases
            .get(release_id)
            .cloned()
            .ok_or(RemoteError::NotFound)
    }

    async fn release_group(&self, group_id: &str) -> Result<ReleaseGroup, RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("release_group:{}", group_id));
        if self.unavailable.contains(group_id) {
            return Err(RemoteError::Status {
                status: 503,
                retry_after: None,
            });
        }
        self.groups
            .get(group_id)
            .cloned()
            .ok_or(RemoteError::NotFound)
    }
}

pub struct FakeService {
    healthy: bool,
    library: BTreeSet<CanonicalKey>,
    failing_artists: HashSet<String>,
    accepting: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            healthy: true,
            library: BTreeSet::new(),
            failing_artists: HashSet::new(),
            accepting: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::default()
        }
    }

    pub fn with_album(mut self, key: &str) -> Self {
        self.library.insert(CanonicalKey::from(key));
        self
    }

    pub fn failing_artist(mut self, id: &str) -> Self {
        self.failing_artists.insert(id.to_string());
        self
    }

    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    // Keys passed to queue_album, in call order
    pub fn queued(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix("queue_album:"))
            .map(str::to_string)
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MusicService for FakeService {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn test_connection(&self) -> bool {
        self.record("test_connection".to_string());
        self.healthy
    }

    async fn add_artist(&self, artist: &ArtistCandidate) -> bool {
        self.record(format!("add_artist:{}", artist.id));
        !self.failing_artists.contains(&artist.id)
    }

    async fn refresh_artist(&self, artist_id: &str) -> bool {
        self.record(format!("refresh_artist:{}", artist_id));
        true
    }

    async fn add_album(&self, _album: &AlbumCandidate, key: &CanonicalKey) -> bool {
        self.record(format!("add_album:{}", key));
        true
    }

    async fn queue_album(&self, key: &CanonicalKey, _force_new: bool) -> bool {
        self.record(format!("queue_album:{}", key));
        true
    }

    async fn album_exists(&self, key: &CanonicalKey, local: &BTreeSet<CanonicalKey>) -> bool {
        self.record(format!("album_exists:{}", key));
        local.contains(key) || self.library.contains(key)
    }

    async fn force_search(&self) -> bool {
        self.record("force_search".to_string());
        true
    }

    fn accepting_writes(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    async fn service_info(&self) -> Vec<ServiceInfoRow> {
        Vec::new()
    }
}
