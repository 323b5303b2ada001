mod common;

use std::collections::HashSet;

use common::{FakeGraph, FakeHistory, FakeService, similar, test_config};
use discoverfm::{
    config::Config,
    discovery::{
        Discovery, RunSummary, classify_studio, resolve_canonical_group, seed_artists,
        select_candidates,
    },
    management::DedupCache,
    types::{CanonicalKey, Classification, SimilarArtist},
};
use tempfile::TempDir;

// Seed "a" with two similar artists, s1 above and s2 below the default 0.46 threshold
fn base_history() -> FakeHistory {
    FakeHistory::new()
        .played("Artist A", Some("a"), 3)
        .similar_to(
            "a",
            vec![
                similar("Similar One", Some("s1"), 0.60),
                similar("Similar Two", Some("s2"), 0.40),
            ],
        )
        .albums_of("s1", &[("r1", "First Album", 10)])
        .albums_of("s2", &[("r2", "Other Album", 10)])
}

fn temp_cache(dir: &TempDir) -> DedupCache {
    DedupCache::new(dir.path().join("cache.json"), 24.0)
}

async fn run(
    config: &Config,
    history: &FakeHistory,
    graph: &FakeGraph,
    service: &FakeService,
    cache: &mut DedupCache,
) -> RunSummary {
    Discovery::new(config, history, graph, service, cache)
        .run()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_studio_album_is_queued_by_release_group() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&[]);
    let history = base_history();
    let graph = FakeGraph::new().release("r1", "g1").studio("g1");
    let service = FakeService::new();
    let mut cache = temp_cache(&dir);

    let summary = run(&config, &history, &graph, &service, &mut cache).await;

    assert_eq!(service.queued(), vec!["g1"]);
    assert!(service.calls().contains(&"add_album:g1".to_string()));
    assert!(cache.is_known(&CanonicalKey::from("g1")));
    assert!(!cache.is_known(&CanonicalKey::from("r1")));
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.fallback, 0);
    assert_eq!(service.count("force_search"), 0);
}

#[tokio::test]
async fn test_unknown_classification_queues_raw_release_id() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&[]);
    let history = base_history();
    let graph = FakeGraph::new().release("r1", "g1").unavailable("g1");
    let service = FakeService::new();
    let mut cache = temp_cache(&dir);

    let summary = run(&config, &history, &graph, &service, &mut cache).await;

    assert_eq!(service.queued(), vec!["r1"]);
    assert!(cache.is_known(&CanonicalKey::from("r1")));
    assert!(!cache.is_known(&CanonicalKey::from("g1")));
    assert_eq!(summary.fallback, 1);

    // A single final search for the fallback albums
    assert_eq!(service.count("force_search"), 1);
}

#[tokio::test]
async fn test_unresolvable_release_queues_raw_release_id() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&[]);
    let history = base_history();
    let graph = FakeGraph::new();
    let service = FakeService::new();
    let mut cache = temp_cache(&dir);

    let summary = run(&config, &history, &graph, &service, &mut cache).await;

    assert_eq!(service.queued(), vec!["r1"]);
    assert_eq!(summary.fallback, 1);
}

#[tokio::test]
async fn test_non_studio_albums_are_never_queued() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&[]);
    let history = base_history().albums_of(
        "s1",
        &[("r1", "Live At Home", 10), ("r2", "Radio Edit", 5)],
    );
    let graph = FakeGraph::new()
        .release("r1", "g1")
        .group("g1", "Album", &["Live"])
        .release("r2", "g2")
        .group("g2", "Single", &[]);
    let service = FakeService::new();
    let mut cache = temp_cache(&dir);

    let summary = run(&config, &history, &graph, &service, &mut cache).await;

    assert!(service.queued().is_empty());
    assert_eq!(service.count("add_album"), 0);
    assert_eq!(summary.non_studio, 2);
    assert!(cache.added_albums().is_empty());
}

#[tokio::test]
async fn test_similar_artist_below_threshold_is_discarded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&[]);
    let history = base_history();
    let graph = FakeGraph::new().release("r1", "g1").studio("g1");
    let service = FakeService::new();
    let mut cache = temp_cache(&dir);

    let summary = run(&config, &history, &graph, &service, &mut cache).await;

    let calls = service.calls();
    assert!(calls.contains(&"add_artist:s1".to_string()));
    assert!(!calls.contains(&"add_artist:s2".to_string()));
    assert_eq!(history.count("top_albums:s2"), 0);
    assert_eq!(summary.artists_processed, 1);
}

#[tokio::test]
async fn test_second_run_does_not_requeue_known_albums() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    let config = test_config(&[]);
    let history = base_history();
    let graph = FakeGraph::new().release("r1", "g1").studio("g1");

    let first = FakeService::new();
    let mut cache = DedupCache::load(&path, 24.0).await.unwrap();
    run(&config, &history, &graph, &first, &mut cache).await;
    cache.persist().await.unwrap();
    assert_eq!(first.queued(), vec!["g1"]);

    // Second run starts from the persisted file
    let second = FakeService::new();
    let mut cache = DedupCache::load(&path, 24.0).await.unwrap();
    let summary = run(&config, &history, &graph, &second, &mut cache).await;

    assert_eq!(second.count("add_album"), 0);
    assert_eq!(second.count("queue_album"), 0);
    assert_eq!(summary.skipped, 1);

    // The similarity list was served from the cache the second time
    assert_eq!(history.count("similar:a"), 1);
}

#[tokio::test]
async fn test_album_in_remote_library_is_skipped() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&[]);
    let history = base_history();
    let graph = FakeGraph::new().release("r1", "g1").studio("g1");
    let service = FakeService::new().with_album("g1");
    let mut cache = temp_cache(&dir);

    let summary = run(&config, &history, &graph, &service, &mut cache).await;

    assert!(service.queued().is_empty());
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_failed_artist_add_skips_expansion() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&[]);
    let history = base_history();
    let graph = FakeGraph::new();
    let service = FakeService::new().failing_artist("a");
    let mut cache = temp_cache(&dir);

    let summary = run(&config, &history, &graph, &service, &mut cache).await;

    assert_eq!(summary.errored, 1);
    assert_eq!(history.count("similar:"), 0);
    assert_eq!(service.count("refresh_artist"), 0);
}

#[tokio::test]
async fn test_writes_are_deferred_while_service_is_overloaded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&[]);
    let history = base_history();
    let graph = FakeGraph::new();
    let service = FakeService::new();
    service.set_accepting(false);
    let mut cache = temp_cache(&dir);

    let summary = run(&config, &history, &graph, &service, &mut cache).await;

    assert_eq!(summary.deferred, 1);
    assert_eq!(service.count("add_artist"), 0);
    assert!(service.queued().is_empty());
}

#[tokio::test]
async fn test_fan_out_cap_is_per_seed_artist() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&[("MAX_SIMILAR_PER_ART", "2")]);
    let history = FakeHistory::new()
        .played("Artist A", Some("a"), 3)
        .played("Artist B", Some("b"), 3)
        .similar_to(
            "a",
            vec![
                similar("One", Some("s1"), 0.9),
                similar("Two", Some("s2"), 0.9),
                similar("Three", Some("s3"), 0.9),
            ],
        )
        .similar_to(
            "b",
            vec![
                similar("Four", Some("s4"), 0.9),
                similar("Five", Some("s5"), 0.9),
            ],
        );
    let graph = FakeGraph::new();
    let service = FakeService::new();
    let mut cache = temp_cache(&dir);

    let summary = run(&config, &history, &graph, &service, &mut cache).await;

    assert_eq!(summary.artists_processed, 4);
    assert!(!service.calls().contains(&"add_artist:s3".to_string()));
    assert!(service.calls().contains(&"add_artist:s5".to_string()));
}

#[test]
fn test_select_candidates_accepts_exactly_max_count_in_order() {
    let list: Vec<_> = (0..25)
        .map(|i| similar(&format!("Artist {}", i), Some(&format!("s{}", i)), 0.9))
        .collect();
    let mut seen = HashSet::new();

    let accepted = select_candidates(&list, &mut seen, 20, 0.46);

    assert_eq!(accepted.len(), 20);
    let ids: Vec<_> = accepted.iter().map(|a| a.id.clone()).collect();
    let expected: Vec<_> = (0..20).map(|i| format!("s{}", i)).collect();
    assert_eq!(ids, expected);
    assert_eq!(seen.len(), 20);
}

#[test]
fn test_select_candidates_discards_missing_seen_and_weak_entries() {
    let list = vec![
        similar("No Id", None, 0.9),
        similar("Empty Id", Some(""), 0.9),
        similar("Seen", Some("seen"), 0.9),
        similar("Weak", Some("weak"), 0.40),
        similar("Good", Some("good"), 0.60),
    ];
    let mut seen = HashSet::from(["seen".to_string()]);

    let accepted = select_candidates(&list, &mut seen, 20, 0.46);

    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, "good");
    assert_eq!(accepted[0].similarity, Some(0.60));

    // Discarded entries are not marked as seen
    assert!(!seen.contains("weak"));
    assert!(seen.contains("good"));
}

#[test]
fn test_select_candidates_rejects_non_finite_scores() {
    let list: Vec<SimilarArtist> = serde_json::from_str(
        r#"[
            {"name": "Not A Number", "mbid": "nan", "match": "NaN"},
            {"name": "Infinite", "mbid": "inf", "match": "inf"},
            {"name": "Good", "mbid": "good", "match": "0.60"}
        ]"#,
    )
    .unwrap();
    assert_eq!(list[0].score, 0.0);
    assert_eq!(list[1].score, 0.0);

    let mut seen = HashSet::new();
    let accepted = select_candidates(&list, &mut seen, 20, 0.46);

    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, "good");

    // Built by hand, bypassing deserialization
    let list = vec![similar("Raw NaN", Some("raw"), f64::NAN)];
    assert!(select_candidates(&list, &mut seen, 20, 0.46).is_empty());
    assert!(!seen.contains("raw"));
}

#[test]
fn test_select_candidates_with_zero_cap() {
    let list = vec![similar("Good", Some("good"), 0.9)];
    let mut seen = HashSet::new();

    assert!(select_candidates(&list, &mut seen, 0, 0.46).is_empty());
    assert!(seen.is_empty());
}

#[tokio::test]
async fn test_seed_artists_resolves_missing_ids_by_name() {
    let history = FakeHistory::new()
        .played("Named", None, 3)
        .played("Ghost", None, 3)
        .played("Known", Some("k"), 2)
        .played("Rare", Some("r"), 1)
        .known_as("Named", "n");

    let seeds = seed_artists(&history, "listener", 3, 2).await;

    let ids: Vec<_> = seeds.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["n", "k"]);
    assert_eq!(history.count("artist_id:"), 2);
}

#[tokio::test]
async fn test_resolver_falls_back_to_release_group_id() {
    // The id is a release group, not a release
    let graph = FakeGraph::new().studio("g1");

    assert_eq!(
        resolve_canonical_group(&graph, "g1").await,
        Some("g1".to_string())
    );
    assert_eq!(resolve_canonical_group(&graph, "missing").await, None);
}

#[tokio::test]
async fn test_classify_studio_outcomes() {
    let graph = FakeGraph::new()
        .studio("studio")
        .group("compilation", "Album", &["Compilation"])
        .group("ep", "EP", &[])
        .unavailable("down");

    assert_eq!(classify_studio(&graph, "studio").await, Classification::Studio);
    assert_eq!(
        classify_studio(&graph, "compilation").await,
        Classification::NonStudio
    );
    assert_eq!(classify_studio(&graph, "ep").await, Classification::NonStudio);
    assert_eq!(classify_studio(&graph, "down").await, Classification::Unknown);
    assert_eq!(
        classify_studio(&graph, "missing").await,
        Classification::Unknown
    );
}
