use chrono::Utc;
use discoverfm::types::{RecentTrack, ReleaseGroup, TopAlbum};
use discoverfm::utils::*;

// Helper function to create a test track
fn track(name: &str, id: Option<&str>) -> RecentTrack {
    RecentTrack {
        artist_name: name.to_string(),
        artist_id: id.map(str::to_string),
    }
}

// Helper function to create a test album
fn album(id: &str, plays: u64) -> TopAlbum {
    TopAlbum {
        release_id: id.to_string(),
        title: format!("Album {}", id),
        play_count: plays,
    }
}

fn group(primary: Option<&str>, secondary: &[&str]) -> ReleaseGroup {
    ReleaseGroup {
        id: "g".to_string(),
        primary_type: primary.map(str::to_string),
        secondary_types: secondary.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn test_tally_plays_keeps_first_seen_order() {
    let tracks = vec![
        track("B", Some("b")),
        track("A", Some("a")),
        track("B", Some("b")),
        track("A", None),
    ];

    let tally = tally_plays(&tracks);

    // Same name with and without id are different entries
    assert_eq!(tally.len(), 3);
    assert_eq!(tally[0].name, "B");
    assert_eq!(tally[0].plays, 2);
    assert_eq!(tally[1].id.as_deref(), Some("a"));
    assert_eq!(tally[2].id, None);
}

#[test]
fn test_frequent_artists_applies_min_plays() {
    let tracks = vec![
        track("A", Some("a")),
        track("A", Some("a")),
        track("B", Some("b")),
    ];

    let frequent = frequent_artists(&tracks, 2);
    assert_eq!(frequent.len(), 1);
    assert_eq!(frequent[0].name, "A");

    // Exactly at the threshold is enough
    assert_eq!(frequent_artists(&tracks, 1).len(), 2);
    assert!(frequent_artists(&tracks, 3).is_empty());
}

#[test]
fn test_rank_top_albums() {
    let albums = vec![
        album("low", 1),
        album("tie-first", 10),
        album("", 100),
        album("top", 50),
        album("tie-second", 10),
    ];

    let ranked = rank_top_albums(albums, 3);
    let ids: Vec<_> = ranked.iter().map(|a| a.release_id.as_str()).collect();

    // Descending by plays, ties in upstream order, empty ids dropped
    assert_eq!(ids, vec!["top", "tie-first", "tie-second"]);
}

#[test]
fn test_rank_top_albums_with_fewer_albums_than_cap() {
    let ranked = rank_top_albums(vec![album("a", 1)], 5);
    assert_eq!(ranked.len(), 1);
    assert!(rank_top_albums(Vec::new(), 5).is_empty());
}

#[test]
fn test_is_studio() {
    assert!(is_studio(&group(Some("Album"), &[])));

    // Every excluded secondary type disqualifies
    for secondary in EXCLUDED_SECONDARY_TYPES {
        assert!(!is_studio(&group(Some("Album"), &[*secondary])), "{}", secondary);
    }

    // MusicBrainz spells it "DJ-mix"
    assert!(!is_studio(&group(Some("Album"), &["DJ-Mix"])));

    // Harmless secondary types are kept
    assert!(is_studio(&group(Some("Album"), &["Demo"])));

    assert!(!is_studio(&group(Some("EP"), &[])));
    assert!(!is_studio(&group(Some("Single"), &[])));
    assert!(!is_studio(&group(None, &[])));
}

#[test]
fn test_recent_window() {
    let (since, until) = recent_window(3);
    let expected = Utc::now().timestamp() - 90 * 24 * 3600;

    assert!((since - expected).abs() <= 5);
    assert_eq!(until, None);
}

#[test]
fn test_format_elapsed() {
    assert_eq!(format_elapsed(std::time::Duration::from_secs(90)), "1.5 min");
    assert_eq!(format_elapsed(std::time::Duration::ZERO), "0.0 min");
}
