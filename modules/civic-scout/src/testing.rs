// Test mocks for the civic pipeline.
//
// One mock per trait boundary:
// - MockGeocoder (Geocoder): city → LocationContext
// - MockSearcher (WebSearcher): exact query → URLs
// - MockFetcher (PageFetcher): URL → page text
// - MockGenerator (TextGenerator): prompt substring → canned reply
// - MockCivicData (CivicDataSource): fixed people/events/bills, counts live calls
// - MemoryStore (CivicStore): stateful in-memory entries and representatives
// - MemoryRegistry (LocalityRegistry): in-memory locality list
//
// Unregistered lookups fail with SourceUnavailable so tests exercise the
// degrade-to-empty paths. Plus fixture helpers for people, events and officials.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ai_client::TextGenerator;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Map;

use civic_common::{
    Address, CivicEntry, CivicError, Coordinates, DataType, IngestStats, Locality,
    LocationContext, LocationKey, Representative, Source, SourceUnavailable,
};
use openstates_client::{
    Bill, Event, GeoPerson, Jurisdiction, JurisdictionRef, Membership, Organization, PersonNode,
    Post,
};

use crate::extractor::ExtractedOfficial;
use crate::traits::{CivicDataSource, CivicStore, Geocoder, LocalityRegistry, PageFetcher, WebSearcher};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Springfield, IL coordinates.
pub const SPRINGFIELD: (f64, f64) = (39.7990, -89.6440);

/// Geocoded context for 100 S 2nd St, Springfield, IL 62701.
pub fn springfield_context() -> LocationContext {
    LocationContext {
        coordinates: Some(Coordinates {
            lat: SPRINGFIELD.0,
            lng: SPRINGFIELD.1,
        }),
        city: "springfield".into(),
        borough: None,
        county: Some("sangamon county".into()),
        state: "il".into(),
        zip: Some("62701".into()),
    }
}

/// A GraphQL person with an optional party membership and an optional role post.
pub fn person(id: &str, name: &str, party: Option<&str>, role: Option<&str>) -> PersonNode {
    let mut memberships = Vec::new();
    if let Some(party) = party {
        memberships.push(Membership {
            organization: Organization {
                name: Some(party.to_string()),
                classification: Some("party".into()),
            },
            post: None,
        });
    }
    if let Some(role) = role {
        memberships.push(Membership {
            organization: Organization {
                name: Some("City Council".into()),
                classification: Some("legislature".into()),
            },
            post: Some(Post {
                label: Some(role.to_string()),
            }),
        });
    }
    PersonNode {
        id: id.to_string(),
        name: name.to_string(),
        image: None,
        current_memberships: memberships,
        contact_details: vec![],
        links: vec![],
    }
}

pub fn geo_person(id: &str, jurisdiction_id: Option<&str>) -> GeoPerson {
    GeoPerson {
        id: id.to_string(),
        name: format!("Person {id}"),
        party: None,
        current_role: None,
        jurisdiction: jurisdiction_id.map(|jid| JurisdictionRef {
            id: jid.to_string(),
            name: None,
            classification: None,
        }),
        image: None,
    }
}

pub fn os_event(id: &str, name: &str, start_date: Option<&str>) -> Event {
    Event {
        id: id.to_string(),
        name: name.to_string(),
        jurisdiction: None,
        description: None,
        classification: Some("committee-meeting".into()),
        start_date: start_date.map(String::from),
        end_date: None,
        status: None,
        location: None,
        links: vec![],
        sources: vec![],
        agenda: vec![],
        extra: Map::new(),
    }
}

pub fn os_bill(id: &str, title: &str, first_action_date: Option<&str>) -> Bill {
    Bill {
        id: id.to_string(),
        identifier: None,
        title: title.to_string(),
        classification: vec!["bill".into()],
        session: None,
        jurisdiction: None,
        openstates_url: None,
        first_action_date: first_action_date.map(String::from),
        latest_action_date: None,
        latest_action_description: None,
        extra: Map::new(),
    }
}

pub fn official(name: &str, role: &str, photo_url: Option<&str>, website: Option<&str>) -> ExtractedOfficial {
    ExtractedOfficial {
        name: Some(name.to_string()),
        role: Some(role.to_string()),
        email: None,
        phone: None,
        website: website.map(String::from),
        photo_url: photo_url.map(String::from),
    }
}

/// A cached representative tagged with `keys`, last updated at `updated`.
pub fn cached_rep(id: &str, name: &str, keys: &[&str], updated: DateTime<Utc>) -> Representative {
    Representative {
        ocd_id: id.to_string(),
        name: name.to_string(),
        party: "Democratic".into(),
        role: "Mayor".into(),
        image: None,
        links: vec![],
        contact_details: vec![],
        location_keys: keys.iter().map(|k| LocationKey::from_raw(*k)).collect(),
        last_updated_at: updated,
    }
}

// ---------------------------------------------------------------------------
// MockGeocoder
// ---------------------------------------------------------------------------

/// Keyed by lowercase city. Unregistered cities fail.
#[derive(Default)]
pub struct MockGeocoder {
    cities: HashMap<String, LocationContext>,
    calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_city(mut self, city: &str, ctx: LocationContext) -> Self {
        self.cities.insert(city.trim().to_lowercase(), ctx);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn locate(&self, address: &Address) -> Result<LocationContext, SourceUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cities
            .get(&address.city.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| SourceUnavailable::new(Source::Geocoding, format!("MockGeocoder: no city {}", address.city)))
    }
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Exact query → URLs. Unregistered queries fail.
#[derive(Default)]
pub struct MockSearcher {
    results: HashMap<String, Vec<String>>,
    queries: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_query(mut self, query: &str, urls: &[&str]) -> Self {
        self.results
            .insert(query.to_string(), urls.iter().map(|u| u.to_string()).collect());
        self
    }

    /// Every query received, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, num: u32) -> Result<Vec<String>, SourceUnavailable> {
        self.queries.lock().unwrap().push(query.to_string());
        self.results
            .get(query)
            .map(|urls| urls.iter().take(num as usize).cloned().collect())
            .ok_or_else(|| SourceUnavailable::new(Source::Search, format!("MockSearcher: no results for {query}")))
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// URL → page text. Unregistered URLs fail.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, SourceUnavailable> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| SourceUnavailable::new(Source::PageFetch, format!("MockFetcher: no page for {url}")))
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Replies with the first registered reply whose needle occurs in the prompt,
/// else the default reply, else an error. Records every prompt.
#[derive(Default)]
pub struct MockGenerator {
    replies: Vec<(String, String)>,
    default_reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_prompt_containing(mut self, needle: &str, reply: &str) -> Self {
        self.replies.push((needle.to_string(), reply.to_string()));
        self
    }

    pub fn with_default(mut self, reply: &str) -> Self {
        self.default_reply = Some(reply.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.default_reply.clone())
            .ok_or_else(|| anyhow::anyhow!("MockGenerator: no reply registered for prompt"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockCivicData
// ---------------------------------------------------------------------------

/// Fixed authoritative data. Every call is counted.
#[derive(Default)]
pub struct MockCivicData {
    events: Vec<Event>,
    bills: Vec<Bill>,
    people_at: Vec<PersonNode>,
    divisions: HashMap<String, Vec<PersonNode>>,
    people_geo: Vec<GeoPerson>,
    jurisdictions: Vec<Jurisdiction>,
    bill_requests: Mutex<Vec<BillRequest>>,
    people_at_calls: AtomicUsize,
    calls: AtomicUsize,
}

/// Arguments of one `bills` call.
#[derive(Debug, Clone, PartialEq)]
pub struct BillRequest {
    pub jurisdiction_id: String,
    pub action_since: NaiveDate,
    pub max_pages: usize,
}

impl MockCivicData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    pub fn with_bills(mut self, bills: Vec<Bill>) -> Self {
        self.bills = bills;
        self
    }

    pub fn with_people_at(mut self, people: Vec<PersonNode>) -> Self {
        self.people_at = people;
        self
    }

    pub fn with_division(mut self, division_id: &str, people: Vec<PersonNode>) -> Self {
        self.divisions.insert(division_id.to_string(), people);
        self
    }

    pub fn with_people_geo(mut self, people: Vec<GeoPerson>) -> Self {
        self.people_geo = people;
        self
    }

    pub fn with_jurisdictions(mut self, jurisdictions: Vec<Jurisdiction>) -> Self {
        self.jurisdictions = jurisdictions;
        self
    }

    pub fn bill_requests(&self) -> Vec<BillRequest> {
        self.bill_requests.lock().unwrap().clone()
    }

    pub fn people_at_calls(&self) -> usize {
        self.people_at_calls.load(Ordering::SeqCst)
    }

    /// Calls across every method.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CivicDataSource for MockCivicData {
    async fn events(&self, _jurisdiction_id: &str) -> Result<Vec<Event>, SourceUnavailable> {
        self.count();
        Ok(self.events.clone())
    }

    async fn bills(
        &self,
        jurisdiction_id: &str,
        action_since: NaiveDate,
        max_pages: usize,
    ) -> Result<Vec<Bill>, SourceUnavailable> {
        self.count();
        self.bill_requests.lock().unwrap().push(BillRequest {
            jurisdiction_id: jurisdiction_id.to_string(),
            action_since,
            max_pages,
        });
        Ok(self.bills.clone())
    }

    async fn people_at(&self, _lat: f64, _lng: f64) -> Result<Vec<PersonNode>, SourceUnavailable> {
        self.count();
        self.people_at_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.people_at.clone())
    }

    async fn people_in_division(
        &self,
        division_id: &str,
    ) -> Result<Vec<PersonNode>, SourceUnavailable> {
        self.count();
        Ok(self.divisions.get(division_id).cloned().unwrap_or_default())
    }

    async fn people_geo(&self, _lat: f64, _lng: f64) -> Result<Vec<GeoPerson>, SourceUnavailable> {
        self.count();
        Ok(self.people_geo.clone())
    }

    async fn jurisdictions_named(
        &self,
        _name: &str,
    ) -> Result<Vec<Jurisdiction>, SourceUnavailable> {
        self.count();
        Ok(self.jurisdictions.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory CivicStore with the same upsert and freshness semantics as Postgres.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CivicEntry>>,
    reps: Mutex<Vec<Representative>>,
    rep_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_representatives(self, reps: Vec<Representative>) -> Self {
        *self.reps.lock().unwrap() = reps;
        self
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn entry(&self, unique_id: &str) -> Option<CivicEntry> {
        self.entries.lock().unwrap().get(unique_id).cloned()
    }

    pub fn representatives(&self) -> Vec<Representative> {
        self.reps.lock().unwrap().clone()
    }

    /// Number of representative upsert batches received.
    pub fn rep_writes(&self) -> usize {
        self.rep_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CivicStore for MemoryStore {
    async fn upsert_entries(&self, entries: &[CivicEntry]) -> Result<IngestStats, CivicError> {
        let mut stored = self.entries.lock().unwrap();
        let mut stats = IngestStats::default();
        for entry in entries {
            match stored.insert(entry.unique_id.clone(), entry.clone()) {
                Some(_) => stats.updated += 1,
                None => stats.ingested += 1,
            }
        }
        Ok(stats)
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CivicEntry>, CivicError> {
        let stored = self.entries.lock().unwrap();
        let mut events: Vec<CivicEntry> = stored
            .values()
            .filter(|e| e.data_type == DataType::Event)
            .filter(|e| {
                e.data.start_date.is_some_and(|d| d >= start && end.map_or(true, |end| d <= end))
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.data.start_date);
        Ok(events)
    }

    async fn entry_by_id(&self, unique_id: &str) -> Result<Option<CivicEntry>, CivicError> {
        Ok(self.entry(unique_id))
    }

    async fn upsert_representatives(&self, reps: &[Representative]) -> Result<u64, CivicError> {
        self.rep_writes.fetch_add(1, Ordering::SeqCst);
        let mut stored = self.reps.lock().unwrap();
        for rep in reps {
            match stored.iter_mut().find(|r| r.ocd_id == rep.ocd_id) {
                Some(existing) => *existing = rep.clone(),
                None => stored.push(rep.clone()),
            }
        }
        Ok(reps.len() as u64)
    }

    async fn fresh_representatives(
        &self,
        keys: &[LocationKey],
        since: DateTime<Utc>,
    ) -> Result<Vec<Representative>, CivicError> {
        Ok(self
            .reps
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.last_updated_at >= since)
            .filter(|r| r.location_keys.iter().any(|k| keys.contains(k)))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRegistry {
    localities: Mutex<Vec<Locality>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed without the duplicate check, as if written by several registrations.
    pub fn with_localities(self, localities: Vec<Locality>) -> Self {
        *self.localities.lock().unwrap() = localities;
        self
    }
}

#[async_trait]
impl LocalityRegistry for MemoryRegistry {
    async fn register(&self, locality: &Locality) -> Result<bool, CivicError> {
        let mut stored = self.localities.lock().unwrap();
        if stored.iter().any(|l| l.dedupe_key() == locality.dedupe_key()) {
            return Ok(false);
        }
        stored.push(locality.clone());
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<Locality>, CivicError> {
        Ok(self.localities.lock().unwrap().clone())
    }
}
