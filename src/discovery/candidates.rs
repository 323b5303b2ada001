use std::{collections::HashSet, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    debug,
    lastfm::ListeningHistory,
    management::DedupCache,
    types::{ArtistCandidate, SimilarArtist, TopAlbum},
    utils, warning,
};

/// Similar artists of `artist_id` in upstream order.
///
/// A fresh cached list is used as is. Otherwise the list is fetched (at most
/// `limit` entries) and cached; a failed fetch yields an empty list and
/// leaves the cache untouched, so the next run tries again.
pub async fn expand_similar(
    history: &dyn ListeningHistory,
    cache: &mut DedupCache,
    artist_id: &str,
    limit: usize,
) -> Vec<SimilarArtist> {
    if let Some(cached) = cache.cached_similar(artist_id) {
        debug!("Using cached similar artists of {}", artist_id);
        return cached.to_vec();
    }

    match history.similar_artists(artist_id, limit).await {
        Ok(similar) => {
            cache.store_similar(artist_id, similar.clone());
            similar
        }
        Err(e) => {
            warning!("Cannot fetch similar artists of {}: {}", artist_id, e);
            Vec::new()
        }
    }
}

/// Filters a similarity list for one seed artist.
///
/// Walks the list in upstream order and stops after `max_count` accepted
/// artists. Entries without an id, entries already in `seen` and entries
/// scoring below `min_match` are discarded. Accepted ids are added to
/// `seen`, which lives for the whole run.
pub fn select_candidates(
    similar: &[SimilarArtist],
    seen: &mut HashSet<String>,
    max_count: usize,
    min_match: f64,
) -> Vec<ArtistCandidate> {
    let mut accepted = Vec::new();

    for artist in similar {
        if accepted.len() >= max_count {
            debug!("Discarding {}: reached {} similar artists", artist.name, max_count);
            break;
        }
        let Some(id) = artist.id() else {
            debug!("Discarding {}: no artist id", artist.name);
            continue;
        };
        if seen.contains(id) {
            debug!("Discarding {} ({}): already processed", artist.name, id);
            continue;
        }
        if artist.score.is_nan() || artist.score < min_match {
            debug!(
                "Discarding {} ({}): match too low ({:.2} < {:.2})",
                artist.name, id, artist.score, min_match
            );
            continue;
        }

        seen.insert(id.to_string());
        accepted.push(ArtistCandidate {
            id: id.to_string(),
            name: artist.name.clone(),
            similarity: Some(artist.score),
        });
    }

    accepted
}

/// The `max_count` most played albums of an artist that carry a release id.
pub async fn top_albums(
    history: &dyn ListeningHistory,
    artist_id: &str,
    max_count: usize,
) -> Vec<TopAlbum> {
    // Over-fetch, some entries have no id.
    match history.top_albums(artist_id, max_count * 2).await {
        Ok(albums) => utils::rank_top_albums(albums, max_count),
        Err(e) => {
            warning!("Cannot fetch top albums of {}: {}", artist_id, e);
            Vec::new()
        }
    }
}

/// Seed artists: artists the user played at least `min_plays` times during
/// the last `months` months.
///
/// Artists reported without an id are looked up by name and skipped when
/// that fails too.
pub async fn seed_artists(
    history: &dyn ListeningHistory,
    user: &str,
    months: u32,
    min_plays: u32,
) -> Vec<ArtistCandidate> {
    let (since, until) = utils::recent_window(months);

    let pb = ProgressBar::new_spinner();
    pb.set_message("Fetching recent tracks...");
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }

    let mut tracks = Vec::new();
    let mut page = 1;
    loop {
        match history.recent_tracks(user, since, until, page).await {
            Ok(result) => {
                tracks.extend(result.tracks);
                pb.set_message(format!(
                    "Fetched page {} of {} ({} tracks)...",
                    page,
                    result.total_pages,
                    tracks.len()
                ));
                if page >= result.total_pages {
                    break;
                }
                page += 1;
            }
            Err(e) => {
                pb.suspend(|| warning!("Cannot fetch recent tracks page {}: {}", page, e));
                break;
            }
        }
    }
    pb.finish_and_clear();

    let mut seeds = Vec::new();
    for artist in utils::frequent_artists(&tracks, min_plays) {
        let id = match artist.id {
            Some(id) => Some(id),
            None => match history.artist_id(&artist.name).await {
                Ok(id) => id,
                Err(e) => {
                    debug!("Cannot look up {}: {}", artist.name, e);
                    None
                }
            },
        };

        match id {
            Some(id) => seeds.push(ArtistCandidate::seed(id, artist.name)),
            None => debug!("Skipping {}: no artist id", artist.name),
        }
    }

    seeds
}
