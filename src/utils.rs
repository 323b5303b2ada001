use std::collections::HashMap;

use chrono::{Duration, Utc};

use crate::types::{ArtistPlays, RecentTrack, ReleaseGroup, TopAlbum};

/// Secondary types that disqualify a release group from being a studio album.
pub const EXCLUDED_SECONDARY_TYPES: &[&str] = &[
    "Compilation",
    "Live",
    "Remix",
    "Soundtrack",
    "DJ-mix",
    "Mixtape/Street",
    "EP",
    "Single",
    "Interview",
    "Audiobook",
];

/// Start and end (epoch seconds) of the listening window, `months` of 30 days
/// back from now. The end is open.
pub fn recent_window(months: u32) -> (i64, Option<i64>) {
    let since = Utc::now() - Duration::days(30 * months as i64);
    (since.timestamp(), None)
}

/// Counts plays per (artist name, artist id) in first-seen order.
pub fn tally_plays<'a>(tracks: impl IntoIterator<Item = &'a RecentTrack>) -> Vec<ArtistPlays> {
    let mut index: HashMap<(String, Option<String>), usize> = HashMap::new();
    let mut tally: Vec<ArtistPlays> = Vec::new();

    for track in tracks {
        let key = (track.artist_name.clone(), track.artist_id.clone());
        match index.get(&key) {
            Some(&i) => tally[i].plays += 1,
            None => {
                index.insert(key, tally.len());
                tally.push(ArtistPlays {
                    name: track.artist_name.clone(),
                    id: track.artist_id.clone(),
                    plays: 1,
                });
            }
        }
    }

    tally
}

/// Artists played at least `min_plays` times, in first-seen order.
pub fn frequent_artists<'a>(
    tracks: impl IntoIterator<Item = &'a RecentTrack>,
    min_plays: u32,
) -> Vec<ArtistPlays> {
    let mut tally = tally_plays(tracks);
    tally.retain(|a| a.plays >= min_plays);
    tally
}

/// Orders albums by play count, highest first, keeping the upstream order
/// for ties, drops albums without an id and keeps at most `max_count`.
pub fn rank_top_albums(mut albums: Vec<TopAlbum>, max_count: usize) -> Vec<TopAlbum> {
    albums.retain(|a| !a.release_id.trim().is_empty());
    // sort_by is stable
    albums.sort_by(|a, b| b.play_count.cmp(&a.play_count));
    albums.truncate(max_count);
    albums
}

/// A studio album has primary type "Album" and none of the excluded
/// secondary types.
pub fn is_studio(group: &ReleaseGroup) -> bool {
    let is_album = group
        .primary_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("Album"));

    is_album
        && !group.secondary_types.iter().any(|secondary| {
            EXCLUDED_SECONDARY_TYPES
                .iter()
                .any(|excluded| excluded.eq_ignore_ascii_case(secondary))
        })
}

/// Formats an elapsed time as minutes with one decimal, e.g. `12.5 min`.
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    format!("{:.1} min", elapsed.as_secs_f64() / 60.0)
}
