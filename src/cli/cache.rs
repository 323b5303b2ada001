use std::path::PathBuf;

use tabled::Table;

use crate::{
    config::{self, Settings},
    error,
    management::DedupCache,
    success,
    types::CacheInfoRow,
};

/// The cache needs no credentials, only its location and TTL.
async fn open_cache() -> DedupCache {
    let settings = Settings::from_env();
    let path: PathBuf = config::cache_file(&settings);
    let ttl = match config::cache_ttl_hours(&settings) {
        Ok(ttl) => ttl,
        Err(e) => {
            error!("Invalid configuration. Err: {}", e);
        }
    };

    match DedupCache::load(&path, ttl).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("Cannot load cache {}. Err: {}", path.display(), e);
        }
    }
}

async fn save(cache: &DedupCache) {
    if let Err(e) = cache.persist().await {
        error!("Cannot save cache {}. Err: {}", cache.path().display(), e);
    }
}

pub async fn cache_info() {
    let cache = open_cache().await;
    let stats = cache.stats();

    let rows = vec![
        CacheInfoRow {
            entry: "Queued albums".to_string(),
            count: stats.added_albums,
        },
        CacheInfoRow {
            entry: "Similarity lists".to_string(),
            count: stats.similar_entries,
        },
        CacheInfoRow {
            entry: "Similarity lists (fresh)".to_string(),
            count: stats.fresh_entries,
        },
    ];

    println!("{}", cache.path().display());
    println!("{}", Table::new(rows));
}

pub async fn cache_prune() {
    let mut cache = open_cache().await;
    let removed = cache.prune_expired();
    save(&cache).await;
    success!("Removed {} expired similarity lists", removed);
}

pub async fn cache_clear_similar() {
    let mut cache = open_cache().await;
    let removed = cache.clear_similar();
    save(&cache).await;
    success!(
        "Removed {} similarity lists, {} queued albums kept",
        removed,
        cache.added_albums().len()
    );
}
