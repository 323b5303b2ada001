use tabled::Table;

use crate::{cli::load_config, error, info, services, success};

/// Validates the configuration, health-checks the configured service and
/// prints its diagnostics.
pub async fn check(verbose: bool) {
    let config = load_config(verbose);

    if let Err(e) = services::validate(&config) {
        error!("Invalid {} configuration. Err: {}", config.service, e);
    }
    success!("Configuration is valid ({} service)", config.service);

    let service = match services::create(&config).await {
        Ok(service) => service,
        Err(e) => {
            error!("Cannot start {} service. Err: {}", config.service, e);
        }
    };

    info!("Last.fm user: {}", config.lastfm.username);
    info!("Cache file: {}", config.cache_file.display());
    println!("{}", Table::new(service.service_info().await));
}
