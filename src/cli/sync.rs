use tabled::Table;

use crate::{
    cli::load_config,
    discovery::Discovery,
    error, failed, info,
    lastfm::LastFmClient,
    management::DedupCache,
    musicbrainz::MusicBrainzClient,
    services, success, utils,
};

pub async fn sync(verbose: bool) {
    let config = load_config(verbose);

    // The working set exists before anything can fail remotely.
    let mut cache = match DedupCache::load(&config.cache_file, config.discovery.cache_ttl_hours).await {
        Ok(cache) => cache,
        Err(e) => {
            error!(
                "Cannot load cache {}. Err: {}",
                config.cache_file.display(),
                e
            );
        }
    };
    let stats = cache.stats();
    info!(
        "Loaded cache: {} queued albums, {} similarity lists",
        stats.added_albums, stats.similar_entries
    );

    let history = match LastFmClient::new(&config.lastfm) {
        Ok(client) => client,
        Err(e) => {
            error!("Cannot create Last.fm client. Err: {}", e);
        }
    };
    let graph = match MusicBrainzClient::new(&config.musicbrainz) {
        Ok(client) => client,
        Err(e) => {
            error!("Cannot create MusicBrainz client. Err: {}", e);
        }
    };
    let service = match services::create(&config).await {
        Ok(service) => service,
        Err(e) => {
            error!("Cannot start {} service. Err: {}", config.service, e);
        }
    };

    let outcome = {
        let discovery = Discovery::new(&config, &history, &graph, service.as_ref(), &mut cache);
        tokio::select! {
            result = discovery.run() => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    };

    let saved = match cache.persist().await {
        Ok(()) => true,
        Err(e) => {
            failed!("Cannot save cache {}. Err: {}", cache.path().display(), e);
            false
        }
    };

    match outcome {
        Some(Ok(summary)) => {
            success!("Sync completed in {}", utils::format_elapsed(summary.elapsed));
            println!("{}", Table::new(summary.rows()));
            if !saved {
                std::process::exit(1);
            }
        }
        Some(Err(e)) => {
            error!("Sync aborted. Err: {}", e);
        }
        None => {
            error!("Interrupted, {} queued albums on record.", cache.added_albums().len());
        }
    }
}
