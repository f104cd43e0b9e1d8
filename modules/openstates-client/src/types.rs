use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Null or missing strings read as empty, so one incomplete record does not
/// fail the page it arrives in. Callers drop blank records.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Shared fragments ---

/// `{url, note}` pair used for links and sources across v3 resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Compact jurisdiction embedded in events, bills and people.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
}

// --- REST pagination envelope ---

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub max_page: u32,
    #[serde(default)]
    pub total_items: u64,
}

/// Raw `/events`, `/bills`, `/jurisdictions` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    pub pagination: Option<Pagination>,
}

/// One page pulled from a paginated listing, numbered from 1.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub number: u32,
    pub max_page: u32,
    pub results: Vec<T>,
}

// --- Events ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLocation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A v3 event. Unmodelled fields are kept in `extra` so the full payload
/// round-trips into storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    pub jurisdiction: Option<JurisdictionRef>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<EventLocation>,
    #[serde(default)]
    pub links: Vec<LinkRef>,
    #[serde(default)]
    pub sources: Vec<LinkRef>,
    #[serde(default)]
    pub agenda: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// The page a reader should visit: the `web` link, else the first source.
    pub fn web_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.note.as_deref() == Some("web"))
            .or_else(|| self.sources.first())
            .map(|l| l.url.as_str())
            .filter(|url| !url.trim().is_empty())
    }
}

// --- Bills ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub classification: Vec<String>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<JurisdictionRef>,
    #[serde(default)]
    pub openstates_url: Option<String>,
    #[serde(default)]
    pub first_action_date: Option<String>,
    #[serde(default)]
    pub latest_action_date: Option<String>,
    #[serde(default)]
    pub latest_action_description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// --- People (REST people.geo) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentRole {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub org_classification: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPerson {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub current_role: Option<CurrentRole>,
    #[serde(default)]
    pub jurisdiction: Option<JurisdictionRef>,
    #[serde(default)]
    pub image: Option<String>,
}

// --- Jurisdictions ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

// --- GraphQL people ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub organization: Organization,
    #[serde(default)]
    pub post: Option<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// `PersonNode` as selected by [`crate::PERSON_FRAGMENT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonNode {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_memberships: Vec<Membership>,
    #[serde(default)]
    pub contact_details: Vec<ContactDetail>,
    #[serde(default)]
    pub links: Vec<LinkRef>,
}

impl PersonNode {
    /// Party name from the membership whose organization is classified `party`.
    pub fn party(&self) -> Option<&str> {
        self.current_memberships
            .iter()
            .find(|m| m.organization.classification.as_deref() == Some("party"))
            .and_then(|m| m.organization.name.as_deref())
    }

    /// Post label of the first non-party membership.
    pub fn role(&self) -> Option<&str> {
        self.current_memberships
            .iter()
            .find(|m| m.organization.classification.as_deref() != Some("party"))
            .and_then(|m| m.post.as_ref())
            .and_then(|p| p.label.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PeopleData {
    pub people: Option<Connection<PersonNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Edge<T> {
    pub node: Option<T>,
}
