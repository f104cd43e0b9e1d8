// Trait seams for every external collaborator of the civic pipeline.
//
// Geocoder, WebSearcher, PageFetcher and CivicDataSource return
// `Result<_, SourceUnavailable>` so the engine can degrade each source to an
// empty result on its own. CivicStore and LocalityRegistry failures are fatal.
//
// MockGeocoder, MockSearcher etc. in `testing` implement the same traits:
// no network, no database.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use civic_common::{
    Address, CivicEntry, CivicError, Coordinates, IngestStats, Locality, LocationContext,
    LocationKey, Representative, Source, SourceUnavailable,
};
use civic_store::PgStore;
use google_client::{CustomSearchClient, GeocodeResult, GeocodingClient};
use openstates_client::{Bill, Event, GeoPerson, Jurisdiction, OpenStatesClient, PersonNode};

// ---------------------------------------------------------------------------
// Geocoder
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve an address into coordinates plus lowercase place names.
    async fn locate(&self, address: &Address) -> Result<LocationContext, SourceUnavailable>;
}

#[async_trait]
impl Geocoder for GeocodingClient {
    async fn locate(&self, address: &Address) -> Result<LocationContext, SourceUnavailable> {
        let result = self
            .geocode(&address.one_line())
            .await
            .map_err(|e| SourceUnavailable::new(Source::Geocoding, e))?;
        context_from_geocode(&result, address)
    }
}

/// Build a LocationContext from the best geocode match, filling gaps from the request.
pub fn context_from_geocode(
    result: &GeocodeResult,
    address: &Address,
) -> Result<LocationContext, SourceUnavailable> {
    let long = |kind: &str| {
        result
            .component(kind)
            .map(|c| c.long_name.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    };

    let state = result
        .component("administrative_area_level_1")
        .map(|c| c.short_name.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .or_else(|| address.state_code())
        .ok_or_else(|| SourceUnavailable::new(Source::Geocoding, "no state in geocode result"))?;

    Ok(LocationContext {
        coordinates: Some(Coordinates {
            lat: result.location.lat,
            lng: result.location.lng,
        }),
        city: long("locality")
            .or_else(|| long("postal_town"))
            .unwrap_or_else(|| address.city.trim().to_lowercase()),
        borough: long("sublocality_level_1"),
        county: long("administrative_area_level_2"),
        state,
        zip: long("postal_code").or_else(|| {
            let zip = address.zip.trim();
            (!zip.is_empty()).then(|| zip.to_string())
        }),
    })
}

// ---------------------------------------------------------------------------
// WebSearcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Result URLs for one query, in ranking order.
    async fn search(&self, query: &str, num: u32) -> Result<Vec<String>, SourceUnavailable>;
}

#[async_trait]
impl WebSearcher for CustomSearchClient {
    async fn search(&self, query: &str, num: u32) -> Result<Vec<String>, SourceUnavailable> {
        let items = CustomSearchClient::search(self, query, num)
            .await
            .map_err(|e| SourceUnavailable::new(Source::Search, e))?;
        Ok(items.into_iter().map(|i| i.link).collect())
    }
}

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page and render its main content as markdown.
    async fn fetch_text(&self, url: &str) -> Result<String, SourceUnavailable>;
}

// ---------------------------------------------------------------------------
// CivicDataSource: authoritative civic API
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CivicDataSource: Send + Sync {
    async fn events(&self, jurisdiction_id: &str) -> Result<Vec<Event>, SourceUnavailable>;

    async fn bills(
        &self,
        jurisdiction_id: &str,
        action_since: NaiveDate,
        max_pages: usize,
    ) -> Result<Vec<Bill>, SourceUnavailable>;

    async fn people_at(&self, lat: f64, lng: f64) -> Result<Vec<PersonNode>, SourceUnavailable>;

    async fn people_in_division(
        &self,
        division_id: &str,
    ) -> Result<Vec<PersonNode>, SourceUnavailable>;

    async fn people_geo(&self, lat: f64, lng: f64) -> Result<Vec<GeoPerson>, SourceUnavailable>;

    async fn jurisdictions_named(&self, name: &str)
        -> Result<Vec<Jurisdiction>, SourceUnavailable>;
}

fn openstates(e: openstates_client::OpenStatesError) -> SourceUnavailable {
    SourceUnavailable::new(Source::OpenStates, e)
}

#[async_trait]
impl CivicDataSource for OpenStatesClient {
    async fn events(&self, jurisdiction_id: &str) -> Result<Vec<Event>, SourceUnavailable> {
        OpenStatesClient::events(self, jurisdiction_id)
            .await
            .map_err(openstates)
    }

    async fn bills(
        &self,
        jurisdiction_id: &str,
        action_since: NaiveDate,
        max_pages: usize,
    ) -> Result<Vec<Bill>, SourceUnavailable> {
        OpenStatesClient::bills(self, jurisdiction_id, action_since, Some(max_pages))
            .await
            .map_err(openstates)
    }

    async fn people_at(&self, lat: f64, lng: f64) -> Result<Vec<PersonNode>, SourceUnavailable> {
        self.people_near(lat, lng, 50).await.map_err(openstates)
    }

    async fn people_in_division(
        &self,
        division_id: &str,
    ) -> Result<Vec<PersonNode>, SourceUnavailable> {
        self.people_member_of(division_id, 100)
            .await
            .map_err(openstates)
    }

    async fn people_geo(&self, lat: f64, lng: f64) -> Result<Vec<GeoPerson>, SourceUnavailable> {
        OpenStatesClient::people_geo(self, lat, lng)
            .await
            .map_err(openstates)
    }

    async fn jurisdictions_named(
        &self,
        name: &str,
    ) -> Result<Vec<Jurisdiction>, SourceUnavailable> {
        self.jurisdictions("municipality", name)
            .await
            .map_err(openstates)
    }
}

// ---------------------------------------------------------------------------
// Unconfigured: stands in for a source whose credential is missing
// ---------------------------------------------------------------------------

/// Every call fails with `SourceUnavailable::missing_credential`.
pub struct Unconfigured(pub Source);

#[async_trait]
impl Geocoder for Unconfigured {
    async fn locate(&self, _address: &Address) -> Result<LocationContext, SourceUnavailable> {
        Err(SourceUnavailable::missing_credential(self.0))
    }
}

#[async_trait]
impl WebSearcher for Unconfigured {
    async fn search(&self, _query: &str, _num: u32) -> Result<Vec<String>, SourceUnavailable> {
        Err(SourceUnavailable::missing_credential(self.0))
    }
}

#[async_trait]
impl CivicDataSource for Unconfigured {
    async fn events(&self, _jurisdiction_id: &str) -> Result<Vec<Event>, SourceUnavailable> {
        Err(SourceUnavailable::missing_credential(self.0))
    }

    async fn bills(
        &self,
        _jurisdiction_id: &str,
        _action_since: NaiveDate,
        _max_pages: usize,
    ) -> Result<Vec<Bill>, SourceUnavailable> {
        Err(SourceUnavailable::missing_credential(self.0))
    }

    async fn people_at(&self, _lat: f64, _lng: f64) -> Result<Vec<PersonNode>, SourceUnavailable> {
        Err(SourceUnavailable::missing_credential(self.0))
    }

    async fn people_in_division(
        &self,
        _division_id: &str,
    ) -> Result<Vec<PersonNode>, SourceUnavailable> {
        Err(SourceUnavailable::missing_credential(self.0))
    }

    async fn people_geo(&self, _lat: f64, _lng: f64) -> Result<Vec<GeoPerson>, SourceUnavailable> {
        Err(SourceUnavailable::missing_credential(self.0))
    }

    async fn jurisdictions_named(
        &self,
        _name: &str,
    ) -> Result<Vec<Jurisdiction>, SourceUnavailable> {
        Err(SourceUnavailable::missing_credential(self.0))
    }
}

// ---------------------------------------------------------------------------
// CivicStore: persistence owned by the engine
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CivicStore: Send + Sync {
    async fn upsert_entries(&self, entries: &[CivicEntry]) -> Result<IngestStats, CivicError>;

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CivicEntry>, CivicError>;

    async fn entry_by_id(&self, unique_id: &str) -> Result<Option<CivicEntry>, CivicError>;

    async fn upsert_representatives(&self, reps: &[Representative]) -> Result<u64, CivicError>;

    async fn fresh_representatives(
        &self,
        keys: &[LocationKey],
        since: DateTime<Utc>,
    ) -> Result<Vec<Representative>, CivicError>;
}

#[async_trait]
impl CivicStore for PgStore {
    async fn upsert_entries(&self, entries: &[CivicEntry]) -> Result<IngestStats, CivicError> {
        Ok(PgStore::upsert_entries(self, entries).await?)
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CivicEntry>, CivicError> {
        Ok(PgStore::events_between(self, start, end).await?)
    }

    async fn entry_by_id(&self, unique_id: &str) -> Result<Option<CivicEntry>, CivicError> {
        Ok(PgStore::entry_by_id(self, unique_id).await?)
    }

    async fn upsert_representatives(&self, reps: &[Representative]) -> Result<u64, CivicError> {
        Ok(PgStore::upsert_representatives(self, reps).await?)
    }

    async fn fresh_representatives(
        &self,
        keys: &[LocationKey],
        since: DateTime<Utc>,
    ) -> Result<Vec<Representative>, CivicError> {
        Ok(PgStore::fresh_representatives(self, keys, since).await?)
    }
}

// ---------------------------------------------------------------------------
// LocalityRegistry: places the refresh job keeps warm
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LocalityRegistry: Send + Sync {
    /// Returns false when the locality was already registered.
    async fn register(&self, locality: &Locality) -> Result<bool, CivicError>;

    async fn list(&self) -> Result<Vec<Locality>, CivicError>;
}

#[async_trait]
impl LocalityRegistry for PgStore {
    async fn register(&self, locality: &Locality) -> Result<bool, CivicError> {
        Ok(self.register_locality(locality).await?)
    }

    async fn list(&self) -> Result<Vec<Locality>, CivicError> {
        Ok(self.localities().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_client::{AddressComponent, LatLng};

    fn component(long: &str, short: &str, kind: &str) -> AddressComponent {
        AddressComponent {
            long_name: long.into(),
            short_name: short.into(),
            types: vec![kind.into(), "political".into()],
        }
    }

    #[test]
    fn geocode_components_become_lowercase_context() {
        let result = GeocodeResult {
            location: LatLng { lat: 40.75, lng: -73.99 },
            formatted_address: None,
            components: vec![
                component("Manhattan", "Manhattan", "sublocality_level_1"),
                component("New York", "New York", "locality"),
                component("New York County", "New York County", "administrative_area_level_2"),
                component("New York", "NY", "administrative_area_level_1"),
                component("10001", "10001", "postal_code"),
            ],
        };
        let ctx = context_from_geocode(&result, &Address::default()).unwrap();
        assert_eq!(ctx.city, "new york");
        assert_eq!(ctx.borough.as_deref(), Some("manhattan"));
        assert_eq!(ctx.county.as_deref(), Some("new york county"));
        assert_eq!(ctx.state, "ny");
        assert_eq!(ctx.zip.as_deref(), Some("10001"));
        assert_eq!(ctx.coordinates.unwrap().lat, 40.75);
    }

    #[test]
    fn postal_town_and_request_fields_fill_gaps() {
        let result = GeocodeResult {
            location: LatLng { lat: 1.0, lng: 2.0 },
            formatted_address: None,
            components: vec![component("Smallville", "Smallville", "postal_town")],
        };
        let addr = Address::new("1 Main St", "Ignored", "KS", "66002");
        let ctx = context_from_geocode(&result, &addr).unwrap();
        assert_eq!(ctx.city, "smallville");
        assert_eq!(ctx.state, "ks");
        assert_eq!(ctx.zip.as_deref(), Some("66002"));
        assert!(ctx.borough.is_none());
    }

    #[test]
    fn stateless_result_is_unavailable() {
        let result = GeocodeResult {
            location: LatLng { lat: 1.0, lng: 2.0 },
            formatted_address: None,
            components: vec![],
        };
        assert!(context_from_geocode(&result, &Address::default()).is_err());
    }

    #[tokio::test]
    async fn unconfigured_source_reports_missing_credential() {
        let searcher = Unconfigured(Source::Search);
        let err = WebSearcher::search(&searcher, "q", 3).await.unwrap_err();
        assert_eq!(err.source, Source::Search);
        assert!(err.reason.contains("credential"));
    }
}
