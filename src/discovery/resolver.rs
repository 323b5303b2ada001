use crate::{
    debug, error::RemoteError, musicbrainz::MetadataGraph, types::Classification, utils,
};

/// Resolves a release id to the id of its release group.
///
/// When the release does not exist the id is tried as a release-group id,
/// popularity rankings sometimes carry group ids. Any other failure (the
/// metadata service is unreachable after its retries) yields `None`, which
/// the caller treats as "unknown".
pub async fn resolve_canonical_group(graph: &dyn MetadataGraph, release_id: &str) -> Option<String> {
    match graph.release_parent_group(release_id).await {
        Ok(group_id) => return Some(group_id),
        Err(RemoteError::NotFound) => {}
        Err(e) => {
            debug!("Cannot resolve release {}: {}", release_id, e);
            return None;
        }
    }

    match graph.release_group(release_id).await {
        Ok(group) => Some(group.id),
        Err(e) => {
            debug!("{} is neither a release nor a release group: {}", release_id, e);
            None
        }
    }
}

/// Classifies a release group. A group that cannot be fetched is `Unknown`,
/// never `NonStudio`.
pub async fn classify_studio(graph: &dyn MetadataGraph, group_id: &str) -> Classification {
    match graph.release_group(group_id).await {
        Ok(group) => {
            debug!(
                "Release group {}: primary-type={:?}, secondary-types={:?}",
                group_id, group.primary_type, group.secondary_types
            );
            if utils::is_studio(&group) {
                Classification::Studio
            } else {
                Classification::NonStudio
            }
        }
        Err(e) => {
            debug!("Release group {}: no data ({})", group_id, e);
            Classification::Unknown
        }
    }
}
