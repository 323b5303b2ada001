//! # Discovery workflow
//!
//! One run walks the listening history strictly sequentially:
//!
//! ```text
//! seed artists ─→ add + refresh on the service
//!      │
//!      └─→ similar artists (cached, filtered) ─→ add + refresh
//!               │
//!               └─→ popular albums ─→ release group ─→ duplicate check
//!                        ─→ studio classification ─→ add + queue ─→ persist
//! ```
//!
//! Failures of a single artist or album are counted and the run moves on.
//! Only a cache write failure ends a run early.

mod candidates;
mod resolver;

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

pub use candidates::{expand_similar, seed_artists, select_candidates, top_albums};
pub use resolver::{classify_studio, resolve_canonical_group};

use crate::{
    config::{Config, DiscoveryConfig},
    debug,
    error::DiscoveryError,
    failed, info,
    lastfm::ListeningHistory,
    management::DedupCache,
    musicbrainz::MetadataGraph,
    services::MusicService,
    success,
    types::{AlbumCandidate, ArtistCandidate, CanonicalKey, Classification, SummaryRow, TopAlbum},
    warning,
};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub seed_artists: usize,
    pub artists_processed: usize,
    pub succeeded: usize,
    pub errored: usize,
    pub skipped: usize,
    pub fallback: usize,
    pub non_studio: usize,
    pub deferred: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn rows(&self) -> Vec<SummaryRow> {
        [
            ("Seed artists", self.seed_artists),
            ("Similar artists processed", self.artists_processed),
            ("Albums queued", self.succeeded),
            ("Errors", self.errored),
            ("Skipped (already known)", self.skipped),
            ("Queued by fallback id", self.fallback),
            ("Not a studio album", self.non_studio),
            ("Deferred (service overloaded)", self.deferred),
        ]
        .into_iter()
        .map(|(metric, count)| SummaryRow {
            metric: metric.to_string(),
            count,
        })
        .collect()
    }
}

/// The run orchestrator. Owns the `seen` set for the duration of one run and
/// borrows the cache, which holds the `added_albums` working set.
pub struct Discovery<'a> {
    config: &'a DiscoveryConfig,
    user: &'a str,
    history: &'a dyn ListeningHistory,
    graph: &'a dyn MetadataGraph,
    service: &'a dyn MusicService,
    cache: &'a mut DedupCache,
    seen: HashSet<String>,
    fallback: Vec<CanonicalKey>,
    summary: RunSummary,
}

impl<'a> Discovery<'a> {
    pub fn new(
        config: &'a Config,
        history: &'a dyn ListeningHistory,
        graph: &'a dyn MetadataGraph,
        service: &'a dyn MusicService,
        cache: &'a mut DedupCache,
    ) -> Self {
        Self {
            config: &config.discovery,
            user: &config.lastfm.username,
            history,
            graph,
            service,
            cache,
            seen: HashSet::new(),
            fallback: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    pub async fn run(mut self) -> Result<RunSummary, DiscoveryError> {
        let started = Instant::now();

        let seeds = seed_artists(
            self.history,
            self.user,
            self.config.recent_months,
            self.config.min_plays,
        )
        .await;
        info!("Analyzing {} artists...", seeds.len());
        self.summary.seed_artists = seeds.len();

        for seed in &seeds {
            self.process_seed(seed).await?;
        }

        if !self.fallback.is_empty() {
            info!(
                "Final search for {} albums queued by fallback id...",
                self.fallback.len()
            );
            if !self.service.force_search().await {
                self.summary.errored += 1;
            }
        }

        self.summary.elapsed = started.elapsed();
        Ok(self.summary)
    }

    async fn process_seed(&mut self, seed: &ArtistCandidate) -> Result<(), DiscoveryError> {
        info!("Processing artist: {} ({})", seed.name, seed.id);
        if !self.add_artist(seed).await {
            return Ok(());
        }

        let similar = expand_similar(
            self.history,
            self.cache,
            &seed.id,
            self.config.similar_fetch_limit,
        )
        .await;
        let accepted = select_candidates(
            &similar,
            &mut self.seen,
            self.config.max_similar_per_artist,
            self.config.similar_match_min,
        );

        for artist in &accepted {
            self.process_similar(artist).await?;
        }
        Ok(())
    }

    async fn process_similar(&mut self, artist: &ArtistCandidate) -> Result<(), DiscoveryError> {
        info!(
            "Processing similar artist: {} ({}, match {:.2})",
            artist.name,
            artist.id,
            artist.similarity.unwrap_or_default()
        );
        self.summary.artists_processed += 1;

        if !self.add_artist(artist).await {
            return Ok(());
        }

        let albums = top_albums(self.history, &artist.id, self.config.max_popular_albums).await;
        info!("Found {} albums for {}", albums.len(), artist.name);

        for album in albums {
            self.process_album(artist, album).await?;
        }
        Ok(())
    }

    /// Adds and refreshes an artist. `false` when the artist must be skipped.
    async fn add_artist(&mut self, artist: &ArtistCandidate) -> bool {
        if !self.service.accepting_writes() {
            warning!(
                "{} is overloaded, deferring artist {}",
                self.service.name(),
                artist.name
            );
            self.summary.deferred += 1;
            return false;
        }

        if !self.service.add_artist(artist).await {
            failed!("Cannot add artist {} ({})", artist.name, artist.id);
            self.summary.errored += 1;
            return false;
        }
        if !self.service.refresh_artist(&artist.id).await {
            warning!("Cannot refresh artist {} ({})", artist.name, artist.id);
        }
        true
    }

    async fn process_album(
        &mut self,
        artist: &ArtistCandidate,
        album: TopAlbum,
    ) -> Result<(), DiscoveryError> {
        let group = resolve_canonical_group(self.graph, &album.release_id).await;

        let mut ids = Vec::with_capacity(2);
        if let Some(group) = &group {
            ids.push(CanonicalKey::new(group.clone()));
        }
        ids.push(CanonicalKey::new(album.release_id.clone()));

        if self.already_known(&ids).await {
            debug!("Album {} ({}) already known", album.title, album.release_id);
            self.summary.skipped += 1;
            return Ok(());
        }

        let classification = match &group {
            Some(group) => classify_studio(self.graph, group).await,
            None => Classification::Unknown,
        };

        let candidate = AlbumCandidate {
            release_id: album.release_id,
            release_group_id: group,
            title: album.title,
            artist_id: artist.id.clone(),
            artist_name: artist.name.clone(),
            classification,
        };

        let Some(key) = candidate.canonical_key() else {
            debug!("Album {} is not a studio album", candidate.title);
            self.summary.non_studio += 1;
            return Ok(());
        };

        if !self.service.accepting_writes() {
            warning!(
                "{} is overloaded, deferring album {}",
                self.service.name(),
                candidate.title
            );
            self.summary.deferred += 1;
            return Ok(());
        }

        if candidate.is_fallback() {
            info!("Adding album {} by fallback id {}", candidate.title, key);
        } else {
            info!("Adding album {} ({})", candidate.title, key);
        }

        let queued = self.service.add_album(&candidate, &key).await
            && self.service.queue_album(&key, true).await;
        if !queued {
            failed!("Cannot queue album {} ({})", candidate.title, key);
            self.summary.errored += 1;
            return Ok(());
        }

        if candidate.is_fallback() {
            self.fallback.push(key.clone());
            self.summary.fallback += 1;
        }
        self.summary.succeeded += 1;
        success!(
            "Queued {} by {} ({})",
            candidate.title,
            candidate.artist_name,
            key
        );

        self.cache.record(key);
        self.cache.persist().await?;
        Ok(())
    }

    /// Local working set first, then the downstream library.
    async fn already_known(&self, ids: &[CanonicalKey]) -> bool {
        if ids.iter().any(|id| self.cache.is_known(id)) {
            return true;
        }
        for id in ids {
            if self.cache.check_remote_exists(self.service, id).await {
                return true;
            }
        }
        false
    }
}
