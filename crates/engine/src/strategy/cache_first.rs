//! Cache-first with network fallback.

use shellcache_core::{CacheDb, Error, Request};
use url::Url;

use super::{ResponseSource, Served};
use crate::network::Network;

/// Serve from `cache_name` if present, otherwise from the network.
///
/// A fetched 200 that isn't opaque is stored before it is returned. If the
/// fetch fails, the offline fallback document is looked up across all
/// generations; only when that is missing too does the fetch error surface.
pub async fn cache_first(
    db: &CacheDb, network: &dyn Network, request: &Request, cache_name: &str, fallback: &Url,
) -> Result<Served, Error> {
    let generation = db.open_generation(cache_name).await?;

    if let Some(cached) = generation.match_request(request).await? {
        tracing::debug!(url = %request.url, generation = cache_name, "cache hit");
        return Ok(Served::new(cached, ResponseSource::Cache));
    }

    match network.fetch(request).await {
        Ok(response) => {
            if response.is_cacheable_for_shell()
                && let Err(e) = generation.put(request, &response).await
            {
                tracing::warn!(url = %request.url, error = %e, "failed to store response");
            }
            Ok(Served::new(response, ResponseSource::Network))
        }
        Err(err) => {
            tracing::warn!(url = %request.url, error = %err, "fetch failed, trying offline fallback");
            match db.match_any(&Request::get(fallback.clone())).await? {
                Some(document) => Ok(Served::new(document, ResponseSource::Fallback)),
                None => Err(err),
            }
        }
    }
}
