use chrono::Utc;
use tracing::info;

use civic_common::{Address, CivicError, LocationKey, Representative};

use crate::engine::CivicEngine;

impl CivicEngine {
    /// Fresh representatives tagged with any location key of the address.
    pub async fn cached_reps(&self, address: &Address) -> Result<Vec<Representative>, CivicError> {
        let keys = LocationKey::for_address(address);
        let since = Utc::now() - self.settings.rep_cache_ttl;
        self.store.fresh_representatives(&keys, since).await
    }

    /// Serve from cache when anything fresh is stored, otherwise synthesize live.
    pub async fn reps_for_address(&self, address: &Address) -> Result<Vec<Representative>, CivicError> {
        let cached = self.cached_reps(address).await?;
        if !cached.is_empty() {
            info!(count = cached.len(), "Serving representatives from cache");
            return Ok(cached);
        }

        let keys: Vec<String> = LocationKey::for_address(address)
            .iter()
            .map(|k| k.to_string())
            .collect();
        info!(keys = keys.join(", "), "Cache miss or stale, fetching live data");
        self.fetch_and_synthesize_reps(address).await
    }
}
