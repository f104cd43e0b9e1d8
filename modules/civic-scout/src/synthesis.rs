use std::collections::HashMap;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use civic_common::{
    normalize_name, Address, CivicError, CollisionPolicy, ContactDetail, Link, LocationContext,
    MatchKey, MatchVerdict, OrEmpty, Representative,
};

use crate::connector::{authoritative_people, representative_from_person};
use crate::engine::CivicEngine;
use crate::extractor::ExtractedOfficial;

pub const AI_PARTY: &str = "Unknown";
const HOMEPAGE: &str = "homepage";

impl CivicEngine {
    /// Live lookup: authoritative officials plus AI-discovered ones, merged and
    /// written back to the cache under every location key of the address.
    pub async fn fetch_and_synthesize_reps(
        &self,
        address: &Address,
    ) -> Result<Vec<Representative>, CivicError> {
        let ctx = self.location_context(address).await?;

        let (people, officials) = tokio::join!(
            authoritative_people(self.civic_data.as_ref(), &ctx),
            self.discover_officials(&ctx),
        );

        let now = Utc::now();
        let authoritative: Vec<Representative> = people
            .iter()
            .map(|p| representative_from_person(p, now))
            .collect();
        let mut reps =
            merge_representatives(authoritative, officials, self.settings.collision_policy);

        let keys = ctx.location_keys();
        for rep in &mut reps {
            rep.location_keys = keys.clone();
            rep.last_updated_at = now;
        }

        if !reps.is_empty() {
            self.store.upsert_representatives(&reps).await?;
        }
        info!(
            city = ctx.city.as_str(),
            state = ctx.state.as_str(),
            count = reps.len(),
            "Synthesized representatives"
        );
        Ok(reps)
    }

    /// Geocoded context, or one built from the request when geocoding fails.
    async fn location_context(&self, address: &Address) -> Result<LocationContext, CivicError> {
        if !address.has_state() {
            return Err(CivicError::InvalidAddress("state is required".to_string()));
        }
        match self.geocoder.locate(address).await {
            Ok(ctx) => Ok(ctx),
            Err(e) => {
                warn!(
                    source = e.source.as_str(),
                    reason = e.reason.as_str(),
                    "Geocoding failed, continuing without coordinates"
                );
                LocationContext::from_address(address)
                    .ok_or_else(|| CivicError::InvalidAddress("state is required".to_string()))
            }
        }
    }

    /// Official pages from search, capped, run through AI extraction.
    async fn discover_officials(&self, ctx: &LocationContext) -> Vec<ExtractedOfficial> {
        let urls = self.discovery.find_official_pages(ctx).await;
        let pages = urls.iter().take(self.settings.rep_page_limit);

        let officials: Vec<ExtractedOfficial> = join_all(
            pages.map(|url| async move { self.extractor.officials_from_url(url).await.or_empty() }),
        )
        .await
        .into_iter()
        .flatten()
        .filter(ExtractedOfficial::is_usable)
        .collect();

        info!(count = officials.len(), "AI discovery found officials");
        officials
    }
}

/// Merge AI-discovered officials into authoritative records.
///
/// Authoritative records are keyed by normalized name (a later duplicate
/// replaces an earlier one). An AI record that matches keeps the authoritative
/// fields and only contributes a missing image and a missing homepage link; an
/// unmatched AI record becomes a synthetic `ai-<name key>` entry.
pub fn merge_representatives(
    authoritative: Vec<Representative>,
    ai: Vec<ExtractedOfficial>,
    policy: CollisionPolicy,
) -> Vec<Representative> {
    let mut merged: Vec<Representative> = Vec::with_capacity(authoritative.len() + ai.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for rep in authoritative {
        let key = normalize_name(&rep.name);
        match by_name.get(&key) {
            Some(&i) if !key.is_empty() => merged[i] = rep,
            _ => {
                if !key.is_empty() {
                    by_name.insert(key, merged.len());
                }
                merged.push(rep);
            }
        }
    }

    for official in ai {
        let (Some(name), Some(role)) = (official.name.as_deref(), official.role.as_deref()) else {
            continue;
        };
        let incoming = MatchKey::new(name, role);
        if incoming.name.is_empty() {
            continue;
        }

        let target = match by_name.get(&incoming.name) {
            Some(&i) => match policy.judge(&merged[i].match_key(), &incoming) {
                MatchVerdict::Same => Some(i),
                MatchVerdict::SuspectedCollision => {
                    warn!(
                        name = merged[i].name.as_str(),
                        existing_role = merged[i].role.as_str(),
                        incoming_role = role,
                        "Same name with unrelated roles; merging, but these may be different people"
                    );
                    Some(i)
                }
                MatchVerdict::Refused | MatchVerdict::Distinct => {
                    let synthetic_id = synthetic_id(&incoming.name);
                    merged.iter().position(|r| r.ocd_id == synthetic_id)
                }
            },
            None => None,
        };

        match target {
            Some(i) => enrich(&mut merged[i], &official),
            None => {
                let rep = synthetic_representative(&incoming.name, name, role, &official);
                by_name.entry(incoming.name.clone()).or_insert(merged.len());
                merged.push(rep);
            }
        }
    }

    merged
}

fn synthetic_id(name_key: &str) -> String {
    format!("ai-{name_key}")
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Fill gaps only; authoritative values always win.
fn enrich(rep: &mut Representative, official: &ExtractedOfficial) {
    if rep.image.is_none() {
        rep.image = non_blank(official.photo_url.as_deref());
    }
    if !rep.has_link_note(HOMEPAGE) {
        if let Some(url) = non_blank(official.website.as_deref()) {
            rep.links.push(Link {
                url,
                note: Some(HOMEPAGE.to_string()),
            });
        }
    }
}

fn synthetic_representative(
    name_key: &str,
    name: &str,
    role: &str,
    official: &ExtractedOfficial,
) -> Representative {
    let contact = |kind: &str, value: Option<&str>| {
        non_blank(value).map(|value| ContactDetail {
            kind: kind.to_string(),
            value,
            note: None,
        })
    };

    Representative {
        ocd_id: synthetic_id(name_key),
        name: name.trim().to_string(),
        party: AI_PARTY.to_string(),
        role: role.trim().to_string(),
        image: non_blank(official.photo_url.as_deref()),
        links: non_blank(official.website.as_deref())
            .map(|url| Link {
                url,
                note: Some(HOMEPAGE.to_string()),
            })
            .into_iter()
            .collect(),
        contact_details: [
            contact("email", official.email.as_deref()),
            contact("phone", official.phone.as_deref()),
        ]
        .into_iter()
        .flatten()
        .collect(),
        location_keys: Vec::new(),
        last_updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::official;

    fn authoritative(id: &str, name: &str, role: &str, image: Option<&str>) -> Representative {
        Representative {
            ocd_id: id.into(),
            name: name.into(),
            party: "Democratic".into(),
            role: role.into(),
            image: image.map(String::from),
            links: vec![],
            contact_details: vec![],
            location_keys: vec![],
            last_updated_at: Utc::now(),
        }
    }

    #[test]
    fn ai_photo_enriches_authoritative_record() {
        let merged = merge_representatives(
            vec![authoritative("ocd-person/1", "Jane Doe", "Mayor", None)],
            vec![official("jane doe", "Mayor of Springfield", Some("https://img/jane.jpg"), None)],
            CollisionPolicy::NameOnly,
        );
        assert_eq!(merged.len(), 1);
        let jane = &merged[0];
        assert_eq!(jane.ocd_id, "ocd-person/1");
        assert_eq!(jane.party, "Democratic");
        assert_eq!(jane.role, "Mayor");
        assert_eq!(jane.image.as_deref(), Some("https://img/jane.jpg"));
    }

    #[test]
    fn existing_image_and_homepage_are_kept() {
        let mut rep = authoritative("ocd-person/1", "Jane Doe", "Mayor", Some("https://os/jane.png"));
        rep.links.push(Link {
            url: "https://jane.gov".into(),
            note: Some("homepage".into()),
        });
        let merged = merge_representatives(
            vec![rep],
            vec![official("Jane Doe", "Mayor", Some("https://img/other.jpg"), Some("https://other.example"))],
            CollisionPolicy::NameOnly,
        );
        assert_eq!(merged[0].image.as_deref(), Some("https://os/jane.png"));
        assert_eq!(merged[0].links.len(), 1);
        assert_eq!(merged[0].links[0].url, "https://jane.gov");
    }

    #[test]
    fn homepage_added_when_missing() {
        let merged = merge_representatives(
            vec![authoritative("ocd-person/1", "Jane Doe", "Mayor", None)],
            vec![official("Jane Doe", "Mayor", None, Some("https://jane.example"))],
            CollisionPolicy::NameOnly,
        );
        assert!(merged[0].has_link_note("homepage"));
    }

    #[test]
    fn unmatched_ai_record_becomes_synthetic() {
        let mut o = official("Sam O'Neil", "County Executive", None, Some("https://sam.example"));
        o.email = Some("sam@county.gov".into());
        o.phone = Some("  ".into());
        let merged = merge_representatives(vec![], vec![o], CollisionPolicy::NameOnly);

        assert_eq!(merged.len(), 1);
        let sam = &merged[0];
        assert_eq!(sam.ocd_id, "ai-samoneil");
        assert_eq!(sam.party, "Unknown");
        assert_eq!(sam.role, "County Executive");
        assert_eq!(sam.contact_details.len(), 1);
        assert_eq!(sam.contact_details[0].kind, "email");
        assert_eq!(sam.links[0].note.as_deref(), Some("homepage"));
    }

    #[test]
    fn repeated_ai_records_collapse() {
        let merged = merge_representatives(
            vec![],
            vec![
                official("Sam Roe", "Alderman", None, None),
                official("SAM ROE", "Alderman, Ward 2", Some("https://img/sam.jpg"), None),
            ],
            CollisionPolicy::NameOnly,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].image.as_deref(), Some("https://img/sam.jpg"));
    }

    #[test]
    fn role_mismatch_merges_under_name_only() {
        let merged = merge_representatives(
            vec![authoritative("ocd-person/7", "John Smith", "State Senator", None)],
            vec![official("John Smith", "County Clerk", Some("https://img/clerk.jpg"), None)],
            CollisionPolicy::NameOnly,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].image.as_deref(), Some("https://img/clerk.jpg"));
    }

    #[test]
    fn role_mismatch_kept_apart_when_overlap_required() {
        let merged = merge_representatives(
            vec![authoritative("ocd-person/7", "John Smith", "State Senator", None)],
            vec![official("John Smith", "County Clerk", Some("https://img/clerk.jpg"), None)],
            CollisionPolicy::RequireRoleOverlap,
        );
        assert_eq!(merged.len(), 2);
        assert!(merged[0].image.is_none());
        assert_eq!(merged[1].ocd_id, "ai-johnsmith");
        assert_eq!(merged[1].role, "County Clerk");
    }

    #[test]
    fn duplicate_authoritative_names_last_wins() {
        let merged = merge_representatives(
            vec![
                authoritative("ocd-person/1", "Jane Doe", "Mayor", None),
                authoritative("ocd-person/2", "JANE DOE", "Mayor", None),
            ],
            vec![],
            CollisionPolicy::NameOnly,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].ocd_id, "ocd-person/2");
    }
}
