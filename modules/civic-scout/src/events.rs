use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use url::Url;

use civic_common::{CivicEntry, CivicError, EventRange, Link};

use crate::engine::CivicEngine;

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";
const GOOGLE_CALENDAR_URL: &str = "https://www.google.com/calendar/render";

const NAME_FALLBACK: &str = "Event Name Not Available";
const DESCRIPTION_FALLBACK: &str = "No description provided.";
const LOCATION_FALLBACK: &str = "Location TBD";
const CLASSIFICATION_FALLBACK: &str = "Event";
const STATUS_FALLBACK: &str = "confirmed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarLinks {
    pub google: String,
}

/// A stored event shaped for display. Links and fallbacks are derived at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    pub id: String,
    pub name: String,
    pub description: String,
    /// RFC 3339 with millisecond precision.
    pub start_date: Option<String>,
    pub location_name: String,
    pub classification: String,
    pub agenda: Vec<Value>,
    pub google_maps_url: Option<String>,
    pub calendar_links: Option<CalendarLinks>,
    pub sources: Vec<Link>,
    pub links: Vec<Link>,
    pub status: String,
}

impl CivicEngine {
    /// Stored events starting within the range, earliest first. An open start means today.
    pub async fn list_events(&self, range: &EventRange) -> Result<Vec<EventView>, CivicError> {
        let start = range.resolved_start(Utc::now());
        let entries = self.store.events_between(start, range.end).await?;
        info!(start = %start, count = entries.len(), "Listed events");
        Ok(entries.iter().map(format_event).collect())
    }

    pub async fn event_detail(&self, unique_id: &str) -> Result<Option<EventView>, CivicError> {
        let entry = self.store.entry_by_id(unique_id).await?;
        Ok(entry.as_ref().map(format_event))
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

pub fn format_event(entry: &CivicEntry) -> EventView {
    let data = &entry.data;
    let name = non_blank(Some(&data.name));
    let description = non_blank(data.description.as_deref());
    let location = non_blank(data.location_name.as_deref());
    let raw = &entry.raw_data;

    let agenda = match raw.get("agenda") {
        Some(Value::Array(items)) => items.clone(),
        _ => description
            .map(|d| vec![json!({ "description": d })])
            .unwrap_or_default(),
    };

    let sources = raw_links(raw, "sources").unwrap_or_else(|| {
        vec![Link {
            url: entry.source_url.clone().unwrap_or_else(|| "#".to_string()),
            note: Some("Source".to_string()),
        }]
    });

    EventView {
        id: entry.unique_id.clone(),
        name: name.unwrap_or(NAME_FALLBACK).to_string(),
        description: description.unwrap_or(DESCRIPTION_FALLBACK).to_string(),
        start_date: data
            .start_date
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        location_name: location.unwrap_or(LOCATION_FALLBACK).to_string(),
        classification: non_blank(data.classification.as_deref())
            .unwrap_or(CLASSIFICATION_FALLBACK)
            .to_string(),
        agenda,
        google_maps_url: location.and_then(maps_url),
        calendar_links: data.start_date.and_then(|start| {
            calendar_url(start, name.unwrap_or(""), description.unwrap_or(""), location.unwrap_or(""))
                .map(|google| CalendarLinks { google })
        }),
        sources,
        links: raw_links(raw, "links").unwrap_or_default(),
        status: raw
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| non_blank(Some(s)))
            .unwrap_or(STATUS_FALLBACK)
            .to_string(),
    }
}

/// `{url, note}` objects under `key`; None when the key is absent or not such a list.
fn raw_links(raw: &Value, key: &str) -> Option<Vec<Link>> {
    raw.get(key)
        .filter(|v| v.is_array())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

pub fn maps_url(location: &str) -> Option<String> {
    Url::parse_with_params(MAPS_SEARCH_URL, &[("api", "1"), ("query", location)])
        .ok()
        .map(String::from)
}

fn calendar_stamp(t: DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Google Calendar template link for a one-hour slot starting at `start`.
pub fn calendar_url(start: DateTime<Utc>, name: &str, details: &str, location: &str) -> Option<String> {
    let end = start + Duration::hours(1);
    let dates = format!("{}/{}", calendar_stamp(start), calendar_stamp(end));
    Url::parse_with_params(
        GOOGLE_CALENDAR_URL,
        &[
            ("action", "TEMPLATE"),
            ("text", name),
            ("dates", dates.as_str()),
            ("details", details),
            ("location", location),
        ],
    )
    .ok()
    .map(String::from)
}
