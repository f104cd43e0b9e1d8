use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Event,
    Bill,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Event => "event",
            DataType::Bill => "bill",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "event" => Some(DataType::Event),
            "bill" => Some(DataType::Bill),
            _ => None,
        }
    }
}

/// Provenance of a stored record. OpenStates is authoritative; Gemini records
/// were extracted from scraped pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceApi {
    OpenStates,
    Gemini,
}

impl SourceApi {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceApi::OpenStates => "open_states",
            SourceApi::Gemini => "gemini",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open_states" => Some(SourceApi::OpenStates),
            "gemini" => Some(SourceApi::Gemini),
            _ => None,
        }
    }
}

// --- Civic entries ---

/// Normalized subset of an entry, promoted out of the raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryData {
    pub name: String,
    pub description: Option<String>,
    pub classification: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub location_name: Option<String>,
}

/// An event, bill or person record keyed by a deterministic `unique_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CivicEntry {
    pub unique_id: String,
    pub data_type: DataType,
    pub source_api: SourceApi,
    pub source_url: Option<String>,
    pub jurisdiction_id: String,
    pub data: EntryData,
    pub raw_data: serde_json::Value,
    pub last_ingested_at: DateTime<Utc>,
}

/// Counts returned by a batched upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub ingested: u64,
    pub updated: u64,
}

impl IngestStats {
    pub fn total(&self) -> u64 {
        self.ingested + self.updated
    }
}

/// Inclusive window for event listings. A missing start means today 00:00 UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventRange {
    pub fn resolved_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.start.unwrap_or_else(|| {
            now.date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc())
                .unwrap_or(now)
        })
    }
}

/// A single summarized agenda line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgendaItem {
    pub description: String,
    #[serde(default)]
    pub classification: Vec<String>,
}

/// Parse a source-supplied date. Accepts RFC 3339, naive date-times (read as UTC)
/// and bare dates (midnight UTC). Anything else is `None`.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// --- Representatives ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representative {
    pub ocd_id: String,
    pub name: String,
    pub party: String,
    pub role: String,
    pub image: Option<String>,
    pub links: Vec<Link>,
    pub contact_details: Vec<ContactDetail>,
    pub location_keys: Vec<LocationKey>,
    pub last_updated_at: DateTime<Utc>,
}

impl Representative {
    pub fn match_key(&self) -> MatchKey {
        MatchKey::new(&self.name, &self.role)
    }

    pub fn has_link_note(&self, note: &str) -> bool {
        self.links.iter().any(|l| l.note.as_deref() == Some(note))
    }
}

// --- Location keys ---

/// Hierarchical cache tag: `zip_<zip>`, `city_<city>`, `state_<st>` or `federal_us`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn zip(zip: &str) -> Self {
        Self(format!("zip_{}", zip.trim()))
    }

    pub fn city(city: &str) -> Self {
        Self(format!("city_{}", city.trim().to_lowercase()))
    }

    pub fn state(state: &str) -> Self {
        Self(format!("state_{}", state.trim().to_lowercase()))
    }

    pub fn federal() -> Self {
        Self("federal_us".to_string())
    }

    /// Every granularity the address supports. `federal_us` only when a state is present.
    pub fn for_address(address: &Address) -> Vec<Self> {
        let mut keys = Vec::with_capacity(4);
        if let Some(zip) = non_empty(&address.zip) {
            keys.push(Self::zip(zip));
        }
        if let Some(city) = non_empty(&address.city) {
            keys.push(Self::city(city));
        }
        if let Some(state) = non_empty(&address.state) {
            keys.push(Self::state(state));
            keys.push(Self::federal());
        }
        keys
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Match keys ---

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]").unwrap());

const ROLE_STOPWORDS: &[&str] = &["of", "the", "and", "for", "official"];

/// Lowercase and strip everything outside `[a-z0-9]`.
pub fn normalize_name(name: &str) -> String {
    NON_ALNUM.replace_all(&name.to_lowercase(), "").into_owned()
}

/// Cross-source identity of a person: normalized name plus role tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKey {
    pub name: String,
    pub role_tokens: HashSet<String>,
}

impl MatchKey {
    pub fn new(name: &str, role: &str) -> Self {
        let role_tokens = role
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty() && !ROLE_STOPWORDS.contains(t))
            .map(str::to_string)
            .collect();
        Self {
            name: normalize_name(name),
            role_tokens,
        }
    }

    /// Role tokens intersect, or one side carries no role information.
    pub fn roles_overlap(&self, other: &MatchKey) -> bool {
        self.role_tokens.is_empty()
            || other.role_tokens.is_empty()
            || !self.role_tokens.is_disjoint(&other.role_tokens)
    }
}

/// How two records with the same normalized name are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Merge on equal names; a role mismatch only logs a warning.
    #[default]
    NameOnly,
    /// Merge only when the roles also overlap.
    RequireRoleOverlap,
}

/// Outcome of comparing an incoming record against an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchVerdict {
    Distinct,
    Same,
    /// Same name but disjoint roles; merged under `NameOnly`.
    SuspectedCollision,
    /// Same name, disjoint roles, and the policy refused to merge.
    Refused,
}

impl CollisionPolicy {
    pub fn judge(&self, existing: &MatchKey, incoming: &MatchKey) -> MatchVerdict {
        if existing.name.is_empty() || existing.name != incoming.name {
            return MatchVerdict::Distinct;
        }
        if existing.roles_overlap(incoming) {
            return MatchVerdict::Same;
        }
        match self {
            CollisionPolicy::NameOnly => MatchVerdict::SuspectedCollision,
            CollisionPolicy::RequireRoleOverlap => MatchVerdict::Refused,
        }
    }
}

// --- Addresses and geography ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        zip: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            zip: zip.into(),
        }
    }

    /// `street, city, ST zip` with empty parts skipped.
    pub fn one_line(&self) -> String {
        let region = [self.state.trim(), self.zip.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        [self.street.trim(), self.city.trim(), region.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn has_state(&self) -> bool {
        non_empty(&self.state).is_some()
    }

    /// Lowercase two-letter state code, if present.
    pub fn state_code(&self) -> Option<String> {
        non_empty(&self.state).map(|s| s.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Geography derived once per synthesis run. Text fields are lowercase.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationContext {
    pub coordinates: Option<Coordinates>,
    pub city: String,
    pub borough: Option<String>,
    pub county: Option<String>,
    pub state: String,
    pub zip: Option<String>,
}

impl LocationContext {
    /// Context built from the request alone, used when geocoding fails.
    pub fn from_address(address: &Address) -> Option<Self> {
        let state = address.state_code()?;
        Some(Self {
            coordinates: None,
            city: address.city.trim().to_lowercase(),
            borough: None,
            county: None,
            state,
            zip: non_empty(&address.zip).map(str::to_string),
        })
    }

    pub fn state_upper(&self) -> String {
        self.state.to_uppercase()
    }

    /// `ocd-division/country:us/state:<st>/place:<city_with_underscores>`
    pub fn place_division_id(&self) -> String {
        format!(
            "ocd-division/country:us/state:{}/place:{}",
            self.state,
            self.city.split_whitespace().collect::<Vec<_>>().join("_")
        )
    }

    pub fn location_keys(&self) -> Vec<LocationKey> {
        let mut keys = Vec::with_capacity(4);
        if let Some(zip) = self.zip.as_deref() {
            keys.push(LocationKey::zip(zip));
        }
        if !self.city.is_empty() {
            keys.push(LocationKey::city(&self.city));
        }
        keys.push(LocationKey::state(&self.state));
        keys.push(LocationKey::federal());
        keys
    }
}

/// `ocd-jurisdiction/country:us/state:<st>/government`
pub fn state_jurisdiction_id(state: &str) -> String {
    format!(
        "ocd-jurisdiction/country:us/state:{}/government",
        state.trim().to_lowercase()
    )
}

// --- Localities ---

/// A place the refresh job keeps warm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locality {
    pub city: String,
    pub state: String,
    pub zip: Option<String>,
    pub street: Option<String>,
}

impl Locality {
    /// `city-state`, lowercased; localities sharing it are refreshed once.
    pub fn dedupe_key(&self) -> String {
        format!(
            "{}-{}",
            self.city.trim().to_lowercase(),
            self.state.trim().to_lowercase()
        )
    }

    pub fn to_address(&self) -> Address {
        Address::new(
            self.street.clone().unwrap_or_default(),
            self.city.clone(),
            self.state.clone(),
            self.zip.clone().unwrap_or_default(),
        )
    }
}

// --- Proposals ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub creator_id: String,
    pub supporters: Vec<String>,
    pub supporter_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    pub const DEFAULT_CATEGORY: &'static str = "general";

    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: Option<String>,
        creator_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            category: category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| Self::DEFAULT_CATEGORY.to_string()),
            creator_id: creator_id.into(),
            supporters: Vec::new(),
            supporter_count: 0,
            created_at: Utc::now(),
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn normalize_name_strips_punctuation_and_case() {
        assert_eq!(normalize_name("Jane Q. Doe-Smith"), "janeqdoesmith");
        assert_eq!(normalize_name("  JANE DOE "), "janedoe");
        assert_eq!(normalize_name("Zoë"), "zo");
    }

    #[test]
    fn location_keys_for_full_address() {
        let addr = Address::new("100 S 2nd St", "Springfield", "IL", "62701");
        let keys: Vec<String> = LocationKey::for_address(&addr)
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["zip_62701", "city_springfield", "state_il", "federal_us"]);
    }

    #[test]
    fn federal_key_requires_state() {
        let addr = Address::new("", "Springfield", "", "62701");
        let keys = LocationKey::for_address(&addr);
        assert!(!keys.contains(&LocationKey::federal()));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn multi_word_city_keeps_spaces_in_key_and_underscores_in_division() {
        let ctx = LocationContext::from_address(&Address::new("", "New York", "NY", "10001")).unwrap();
        assert_eq!(LocationKey::city(&ctx.city).as_str(), "city_new york");
        assert_eq!(
            ctx.place_division_id(),
            "ocd-division/country:us/state:ny/place:new_york"
        );
    }

    #[test]
    fn context_without_state_is_rejected() {
        assert!(LocationContext::from_address(&Address::new("", "Springfield", " ", "")).is_none());
    }

    #[test]
    fn state_jurisdiction_is_lowercase() {
        assert_eq!(
            state_jurisdiction_id("IL"),
            "ocd-jurisdiction/country:us/state:il/government"
        );
    }

    #[test]
    fn parse_datetime_accepts_common_shapes() {
        let rfc = parse_datetime("2025-03-05T10:00:00-06:00").unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2025, 3, 5, 16, 0, 0).unwrap());

        let naive = parse_datetime("2025-03-05T10:00:00").unwrap();
        assert_eq!(naive.hour(), 10);

        let date = parse_datetime("2025-03-05").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2025, 3, 5, 0, 0, 0).unwrap());

        assert!(parse_datetime("next Tuesday").is_none());
        assert!(parse_datetime("").is_none());
        assert!(parse_datetime("2025-13-45").is_none());
    }

    #[test]
    fn name_only_policy_flags_role_mismatch() {
        let senator = MatchKey::new("John Smith", "State Senator");
        let clerk = MatchKey::new("john smith", "County Clerk");
        let policy = CollisionPolicy::NameOnly;
        assert_eq!(policy.judge(&senator, &clerk), MatchVerdict::SuspectedCollision);
        assert_eq!(
            CollisionPolicy::RequireRoleOverlap.judge(&senator, &clerk),
            MatchVerdict::Refused
        );
    }

    #[test]
    fn generic_role_matches_anything() {
        let official = MatchKey::new("Jane Doe", "Official");
        let mayor = MatchKey::new("JANE DOE", "Mayor of Springfield");
        assert_eq!(CollisionPolicy::RequireRoleOverlap.judge(&official, &mayor), MatchVerdict::Same);
    }

    #[test]
    fn different_names_are_distinct() {
        let a = MatchKey::new("Jane Doe", "Mayor");
        let b = MatchKey::new("Jane Dole", "Mayor");
        assert_eq!(CollisionPolicy::NameOnly.judge(&a, &b), MatchVerdict::Distinct);
    }

    #[test]
    fn proposal_defaults_category() {
        let p = Proposal::new("Bike lanes", "Protected lanes on 5th", None, "user-1");
        assert_eq!(p.category, "general");
        assert_eq!(p.supporter_count, 0);
        let p = Proposal::new("Parks", "More trees", Some("environment".into()), "user-2");
        assert_eq!(p.category, "environment");
    }

    #[test]
    fn event_range_defaults_to_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 15, 30, 0).unwrap();
        let start = EventRange::default().resolved_start(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn locality_dedupe_ignores_case_and_zip() {
        let a = Locality { city: "Springfield".into(), state: "IL".into(), zip: Some("62701".into()), street: None };
        let b = Locality { city: "springfield".into(), state: "il".into(), zip: Some("62702".into()), street: None };
        assert_eq!(a.dedupe_key(), b.dedupe_key());
    }

    #[test]
    fn address_one_line_skips_blanks() {
        assert_eq!(
            Address::new("", "Springfield", "IL", "62701").one_line(),
            "Springfield, IL 62701"
        );
    }
}
