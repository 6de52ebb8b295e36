//! Stale-while-revalidate.

use std::sync::Arc;

use shellcache_core::{CacheDb, Error, Generation, Request, Response};

use super::{ResponseSource, Served};
use crate::network::Network;

/// Serve the stored copy from `cache_name` at once and refresh it in the background.
///
/// The refresh always starts. With a stale copy the caller gets it without
/// waiting, and the refresh handle travels back in [`Served::revalidation`].
/// Without one the caller waits for the network, and a fetch failure
/// surfaces as the error.
pub async fn stale_while_revalidate(
    db: &CacheDb, network: Arc<dyn Network>, request: &Request, cache_name: &str,
) -> Result<Served, Error> {
    let generation = db.open_generation(cache_name).await?;
    let stale = generation.match_request(request).await?;

    let refresh = tokio::spawn(revalidate(network, generation, request.clone()));

    match stale {
        Some(stale) => {
            tracing::debug!(url = %request.url, generation = cache_name, "serving stale copy, revalidating");
            Ok(Served { response: stale, source: ResponseSource::Cache, revalidation: Some(refresh) })
        }
        None => {
            let fresh = refresh
                .await
                .map_err(|e| Error::Worker(format!("revalidation task failed: {e}")))??;
            Ok(Served::new(fresh, ResponseSource::Network))
        }
    }
}

async fn revalidate(network: Arc<dyn Network>, generation: Generation, request: Request) -> Result<Response, Error> {
    let response = network.fetch(&request).await.inspect_err(|e| {
        tracing::debug!(url = %request.url, error = %e, "revalidation fetch failed");
    })?;

    if response.status == 200
        && let Err(e) = generation.put(&request, &response).await
    {
        tracing::warn!(url = %request.url, error = %e, "failed to store revalidated response");
    }

    Ok(response)
}
