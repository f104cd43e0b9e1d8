use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use civic_common::{ContactDetail, Link, LocationContext, OrEmpty, Representative};
use openstates_client::PersonNode;

use crate::traits::CivicDataSource;

pub const DEFAULT_PARTY: &str = "Non-Partisan";
pub const DEFAULT_ROLE: &str = "Official";

/// People for a location: by coordinates (when known) and by place division,
/// fetched concurrently and deduplicated by person id.
pub async fn authoritative_people(
    source: &dyn CivicDataSource,
    ctx: &LocationContext,
) -> Vec<PersonNode> {
    let division = ctx.place_division_id();
    let by_location = async {
        match ctx.coordinates {
            Some(c) => source.people_at(c.lat, c.lng).await.or_empty(),
            None => Vec::new(),
        }
    };
    let by_division = async { source.people_in_division(&division).await.or_empty() };

    let (near, members) = tokio::join!(by_location, by_division);
    let people = dedupe_people(
        near.into_iter()
            .chain(members)
            .filter(|p| !p.id.trim().is_empty() && !p.name.trim().is_empty()),
    );
    info!(division = division.as_str(), count = people.len(), "Found authoritative officials");
    people
}

/// Later records with the same id replace earlier ones in place.
pub fn dedupe_people(people: impl IntoIterator<Item = PersonNode>) -> Vec<PersonNode> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<PersonNode> = Vec::new();
    for person in people {
        match index.get(&person.id) {
            Some(&i) => out[i] = person,
            None => {
                index.insert(person.id.clone(), out.len());
                out.push(person);
            }
        }
    }
    out
}

/// Authoritative person as a Representative. Location keys are assigned on write.
pub fn representative_from_person(person: &PersonNode, now: DateTime<Utc>) -> Representative {
    Representative {
        ocd_id: person.id.clone(),
        name: person.name.clone(),
        party: person.party().unwrap_or(DEFAULT_PARTY).to_string(),
        role: person.role().unwrap_or(DEFAULT_ROLE).to_string(),
        image: person.image.clone().filter(|s| !s.trim().is_empty()),
        links: person
            .links
            .iter()
            .map(|l| Link {
                url: l.url.clone(),
                note: l.note.clone(),
            })
            .collect(),
        contact_details: person
            .contact_details
            .iter()
            .map(|c| ContactDetail {
                kind: c.kind.clone(),
                value: c.value.clone(),
                note: c.note.clone(),
            })
            .collect(),
        location_keys: Vec::new(),
        last_updated_at: now,
    }
}
