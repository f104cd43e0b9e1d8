use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use civic_common::{CivicError, Locality};

use crate::engine::CivicEngine;
use crate::traits::LocalityRegistry;

/// Outcome of one pass over every registered locality.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub localities: usize,
    pub entries_ingested: u64,
    pub entries_updated: u64,
    pub representatives: usize,
    /// `city-state` keys of localities where a step failed.
    pub failures: Vec<String>,
}

/// One locality per `city-state`, in first-seen order; a later duplicate replaces the earlier one.
pub fn unique_localities(localities: Vec<Locality>) -> Vec<Locality> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Locality> = Vec::new();
    for locality in localities {
        let key = locality.dedupe_key();
        match index.get(&key) {
            Some(&i) => out[i] = locality,
            None => {
                index.insert(key, out.len());
                out.push(locality);
            }
        }
    }
    out
}

/// Ingest events and re-synthesize representatives for every registered locality.
///
/// Localities run one at a time. A failing step is logged and recorded in the
/// report; the pass moves on. Only a failure to read the registry is an error.
pub async fn refresh_all(
    engine: &CivicEngine,
    registry: &dyn LocalityRegistry,
) -> Result<RefreshReport, CivicError> {
    let localities = unique_localities(registry.list().await?);
    let mut report = RefreshReport {
        localities: localities.len(),
        ..Default::default()
    };
    if localities.is_empty() {
        warn!("No registered localities, skipping refresh");
        return Ok(report);
    }
    info!(count = localities.len(), "Refreshing localities");

    for locality in &localities {
        let key = locality.dedupe_key();
        let address = locality.to_address();
        let mut failed = false;

        match engine.ingest_all_sources(&address).await {
            Ok(stats) => {
                report.entries_ingested += stats.ingested;
                report.entries_updated += stats.updated;
            }
            Err(e) => {
                warn!(locality = key.as_str(), error = %e, "Event ingestion failed");
                failed = true;
            }
        }

        match engine.fetch_and_synthesize_reps(&address).await {
            Ok(reps) => report.representatives += reps.len(),
            Err(e) => {
                warn!(locality = key.as_str(), error = %e, "Representative refresh failed");
                failed = true;
            }
        }

        if failed {
            report.failures.push(key);
        }
    }

    info!(
        localities = report.localities,
        ingested = report.entries_ingested,
        updated = report.entries_updated,
        representatives = report.representatives,
        failures = report.failures.len(),
        "Refresh complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locality(city: &str, state: &str, zip: Option<&str>) -> Locality {
        Locality {
            city: city.into(),
            state: state.into(),
            zip: zip.map(String::from),
            street: None,
        }
    }

    #[test]
    fn duplicates_collapse_by_city_and_state() {
        let unique = unique_localities(vec![
            locality("Springfield", "IL", Some("62701")),
            locality("Chicago", "IL", None),
            locality("springfield ", "il", Some("62704")),
            locality("Springfield", "MO", None),
        ]);
        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].zip.as_deref(), Some("62704"));
        assert_eq!(unique[1].city, "Chicago");
        assert_eq!(unique[2].state, "MO");
    }
}
