//! Request-identity cache key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the cache key for a request identity.
///
/// The fragment never reaches the network, so it is not part of the identity.
/// The query string is.
pub fn compute_entry_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
