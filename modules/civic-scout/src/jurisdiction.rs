use std::sync::Arc;

use tracing::{info, warn};

use civic_common::{state_jurisdiction_id, Address, CivicError, Source, SourceUnavailable};

use crate::traits::{CivicDataSource, Geocoder};

/// Maps an address to an OpenStates jurisdiction id. The address must carry a
/// state; after that check any lookup problem resolves to the state-level
/// government.
pub struct JurisdictionResolver {
    geocoder: Arc<dyn Geocoder>,
    civic_data: Arc<dyn CivicDataSource>,
}

impl JurisdictionResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, civic_data: Arc<dyn CivicDataSource>) -> Self {
        Self {
            geocoder,
            civic_data,
        }
    }

    /// Geocode, then take the jurisdiction of the first person the geo lookup returns.
    pub async fn resolve(&self, address: &Address) -> Result<String, CivicError> {
        let state = required_state(address)?;
        Ok(match self.resolve_by_location(address).await {
            Ok(id) => {
                info!(jurisdiction_id = id.as_str(), "Resolved jurisdiction via geo lookup");
                id
            }
            Err(e) => fallback(&state, e),
        })
    }

    /// Look the city up by name, accepting only a municipality inside the address's state.
    pub async fn resolve_by_name(&self, address: &Address) -> Result<String, CivicError> {
        let state = required_state(address)?;
        Ok(match self.resolve_by_city_name(address, &state).await {
            Ok(id) => {
                info!(jurisdiction_id = id.as_str(), "Resolved jurisdiction by name");
                id
            }
            Err(e) => fallback(&state, e),
        })
    }

    async fn resolve_by_location(&self, address: &Address) -> Result<String, SourceUnavailable> {
        let ctx = self.geocoder.locate(address).await?;
        let coords = ctx
            .coordinates
            .ok_or_else(|| SourceUnavailable::new(Source::Geocoding, "no coordinates"))?;

        let people = self.civic_data.people_geo(coords.lat, coords.lng).await?;
        let first = people
            .first()
            .ok_or_else(|| SourceUnavailable::new(Source::OpenStates, "no people at coordinates"))?;

        first
            .jurisdiction
            .as_ref()
            .map(|j| j.id.clone())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SourceUnavailable::new(Source::OpenStates, "first person has no jurisdiction"))
    }

    async fn resolve_by_city_name(
        &self,
        address: &Address,
        state: &str,
    ) -> Result<String, SourceUnavailable> {
        let marker = format!("/state:{state}/");

        let candidates = self.civic_data.jurisdictions_named(address.city.trim()).await?;
        candidates
            .into_iter()
            .map(|j| j.id)
            .find(|id| id.contains(&marker))
            .ok_or_else(|| {
                SourceUnavailable::new(Source::OpenStates, format!("no municipality named {} in {state}", address.city))
            })
    }
}

fn required_state(address: &Address) -> Result<String, CivicError> {
    address
        .state_code()
        .ok_or_else(|| CivicError::InvalidAddress("state is required".to_string()))
}

fn fallback(state: &str, cause: SourceUnavailable) -> String {
    let id = state_jurisdiction_id(state);
    warn!(
        source = cause.source.as_str(),
        reason = cause.reason.as_str(),
        fallback = id.as_str(),
        "Falling back to state-level jurisdiction"
    );
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{geo_person, springfield_context, MockCivicData, MockGeocoder};
    use openstates_client::Jurisdiction;

    fn springfield() -> Address {
        Address::new("100 S 2nd St", "Springfield", "IL", "62701")
    }

    fn municipality(id: &str) -> Jurisdiction {
        Jurisdiction {
            id: id.into(),
            name: "Springfield".into(),
            classification: Some("municipality".into()),
            url: None,
        }
    }

    #[tokio::test]
    async fn first_geo_person_wins() {
        let geocoder = MockGeocoder::new().on_city("Springfield", springfield_context());
        let data = MockCivicData::new().with_people_geo(vec![
            geo_person("p1", Some("ocd-jurisdiction/country:us/state:il/place:springfield/government")),
            geo_person("p2", Some("ocd-jurisdiction/country:us/state:il/government")),
        ]);
        let resolver = JurisdictionResolver::new(Arc::new(geocoder), Arc::new(data));
        assert_eq!(
            resolver.resolve(&springfield()).await.unwrap(),
            "ocd-jurisdiction/country:us/state:il/place:springfield/government"
        );
    }

    #[tokio::test]
    async fn geocode_failure_falls_back_to_state() {
        let resolver = JurisdictionResolver::new(
            Arc::new(MockGeocoder::new()),
            Arc::new(MockCivicData::new()),
        );
        assert_eq!(
            resolver.resolve(&springfield()).await.unwrap(),
            "ocd-jurisdiction/country:us/state:il/government"
        );
    }

    #[tokio::test]
    async fn person_without_jurisdiction_falls_back() {
        let geocoder = MockGeocoder::new().on_city("Springfield", springfield_context());
        let data = MockCivicData::new().with_people_geo(vec![geo_person("p1", None)]);
        let resolver = JurisdictionResolver::new(Arc::new(geocoder), Arc::new(data));
        assert_eq!(
            resolver.resolve(&springfield()).await.unwrap(),
            "ocd-jurisdiction/country:us/state:il/government"
        );
    }

    #[tokio::test]
    async fn name_lookup_rejects_other_states() {
        let data = MockCivicData::new().with_jurisdictions(vec![
            municipality("ocd-jurisdiction/country:us/state:mo/place:springfield/government"),
            municipality("ocd-jurisdiction/country:us/state:il/place:springfield/government"),
        ]);
        let resolver = JurisdictionResolver::new(Arc::new(MockGeocoder::new()), Arc::new(data));
        assert_eq!(
            resolver.resolve_by_name(&springfield()).await.unwrap(),
            "ocd-jurisdiction/country:us/state:il/place:springfield/government"
        );
    }

    #[tokio::test]
    async fn name_lookup_without_in_state_match_falls_back() {
        let data = MockCivicData::new().with_jurisdictions(vec![municipality(
            "ocd-jurisdiction/country:us/state:ma/place:springfield/government",
        )]);
        let resolver = JurisdictionResolver::new(Arc::new(MockGeocoder::new()), Arc::new(data));
        assert_eq!(
            resolver.resolve_by_name(&springfield()).await.unwrap(),
            "ocd-jurisdiction/country:us/state:il/government"
        );
    }

    #[tokio::test]
    async fn stateless_address_is_rejected_before_any_lookup() {
        let geocoder = Arc::new(MockGeocoder::new().on_city("Springfield", springfield_context()));
        let data = Arc::new(MockCivicData::new());
        let resolver = JurisdictionResolver::new(geocoder.clone(), data.clone());
        let stateless = Address::new("100 S 2nd St", "Springfield", " ", "62701");

        assert!(matches!(resolver.resolve(&stateless).await, Err(CivicError::InvalidAddress(_))));
        assert!(matches!(
            resolver.resolve_by_name(&stateless).await,
            Err(CivicError::InvalidAddress(_))
        ));
        assert_eq!(geocoder.calls(), 0);
        assert_eq!(data.calls(), 0);
    }
}
