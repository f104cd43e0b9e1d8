use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, info};

use civic_common::{
    parse_datetime, state_jurisdiction_id, Address, CivicEntry, CivicError, DataType, EntryData,
    IngestStats, OrEmpty, SourceApi,
};
use openstates_client::{Bill, Event};

use crate::engine::CivicEngine;
use crate::extractor::ExtractedEvent;

const COMMUNITY_CLASSIFICATION: &str = "Community";
/// Discovered pages extracted per on-demand city lookup.
pub const ON_DEMAND_PAGE_LIMIT: usize = 5;

impl CivicEngine {
    /// Pull events and bills from every source for the address's area and
    /// upsert them by unique id.
    pub async fn ingest_all_sources(&self, address: &Address) -> Result<IngestStats, CivicError> {
        let jurisdiction_id = self.resolver.resolve(address).await?;
        let state = address
            .state_code()
            .ok_or_else(|| CivicError::InvalidAddress("state is required".to_string()))?;
        let state_jurisdiction = state_jurisdiction_id(&state);
        let action_since =
            (Utc::now() - chrono::Duration::days(self.settings.bill_lookback_days)).date_naive();

        let state_upper = state.to_uppercase();
        let (events, bills, urls) = tokio::join!(
            async { self.civic_data.events(&jurisdiction_id).await.or_empty() },
            async {
                self.civic_data
                    .bills(&state_jurisdiction, action_since, self.settings.bill_page_limit)
                    .await
                    .or_empty()
            },
            self.discovery.find_event_pages(address.city.trim(), &state_upper),
        );

        let extracted: Vec<ExtractedEvent> = join_all(
            urls.iter()
                .map(|url| async move { self.extractor.events_from_url(url).await.or_empty() }),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        let events = self.fill_missing_agendas(events).await;

        let now = Utc::now();
        let candidates = events.len() + bills.len() + extracted.len();
        let mut entries: Vec<CivicEntry> = Vec::with_capacity(candidates);
        entries.extend(events.iter().filter_map(|e| event_entry(e, &jurisdiction_id, now)));
        entries.extend(bills.iter().filter_map(|b| bill_entry(b, &state_jurisdiction, now)));
        entries.extend(extracted.iter().filter_map(|e| extracted_event_entry(e, &jurisdiction_id, now)));

        info!(
            jurisdiction_id = jurisdiction_id.as_str(),
            events = events.len(),
            bills = bills.len(),
            extracted = extracted.len(),
            valid = entries.len(),
            dropped = candidates - entries.len(),
            "Normalized civic entries"
        );

        if entries.is_empty() {
            return Ok(IngestStats::default());
        }
        let stats = self.store.upsert_entries(&entries).await?;
        info!(
            ingested = stats.ingested,
            updated = stats.updated,
            total = stats.total(),
            "Ingestion complete"
        );
        Ok(stats)
    }

    /// Community events for a city without a full ingestion run: search discovery
    /// only, the first few pages, filed under the state jurisdiction. Returns the
    /// entries that were stored.
    pub async fn ingest_community_events(
        &self,
        city: &str,
        state: &str,
    ) -> Result<Vec<CivicEntry>, CivicError> {
        let (city, state) = (city.trim(), state.trim());
        if city.is_empty() || state.is_empty() {
            return Err(CivicError::InvalidAddress("city and state are required".to_string()));
        }
        let jurisdiction_id = state_jurisdiction_id(state);

        let urls = self.discovery.find_event_pages(city, &state.to_uppercase()).await;
        let extracted: Vec<ExtractedEvent> = join_all(
            urls.iter()
                .take(ON_DEMAND_PAGE_LIMIT)
                .map(|url| async move { self.extractor.events_from_url(url).await.or_empty() }),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        let now = Utc::now();
        let entries: Vec<CivicEntry> = extracted
            .iter()
            .filter_map(|e| extracted_event_entry(e, &jurisdiction_id, now))
            .collect();
        info!(city, state, extracted = extracted.len(), valid = entries.len(), "On-demand community events");

        if !entries.is_empty() {
            self.store.upsert_entries(&entries).await?;
        }
        Ok(entries)
    }

    /// Give events with a description but no agenda one summarized agenda item.
    async fn fill_missing_agendas(&self, events: Vec<Event>) -> Vec<Event> {
        stream::iter(events)
            .map(|mut event| async move {
                let description = event.description.clone().unwrap_or_default();
                if event.agenda.is_empty() && !description.trim().is_empty() {
                    debug!(event = event.name.as_str(), "Generating agenda from description");
                    if let Some(item) = self.extractor.summarize_agenda(&description).await {
                        event.agenda = vec![serde_json::to_value(item).unwrap_or(Value::Null)];
                    }
                }
                event
            })
            .buffered(self.settings.agenda_concurrency.max(1))
            .collect()
            .await
    }
}

/// `gem-<source url>-<name with whitespace runs as '-'>`
pub fn extracted_event_id(source_url: &str, name: &str) -> String {
    format!("gem-{}-{}", source_url, name.split_whitespace().collect::<Vec<_>>().join("-"))
}

fn dated(raw: Option<&str>, unique_id: &str) -> Option<DateTime<Utc>> {
    let parsed = raw.and_then(parse_datetime);
    if parsed.is_none() {
        debug!(unique_id, raw, "Dropping entry without a usable date");
    }
    parsed
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Authoritative event. Dropped without an id, a name or a parseable start date.
pub fn event_entry(event: &Event, fallback_jurisdiction: &str, now: DateTime<Utc>) -> Option<CivicEntry> {
    if event.id.trim().is_empty() || event.name.trim().is_empty() {
        return None;
    }
    let unique_id = format!("os-event-{}", event.id);
    let start_date = dated(event.start_date.as_deref(), &unique_id)?;

    Some(CivicEntry {
        source_url: event.web_url().map(str::to_string),
        jurisdiction_id: event
            .jurisdiction
            .as_ref()
            .map(|j| j.id.clone())
            .unwrap_or_else(|| fallback_jurisdiction.to_string()),
        data: EntryData {
            name: event.name.clone(),
            description: non_blank(event.description.as_deref()),
            classification: non_blank(event.classification.as_deref()),
            start_date: Some(start_date),
            location_name: event.location.as_ref().and_then(|l| non_blank(l.name.as_deref())),
        },
        raw_data: serde_json::to_value(event).unwrap_or(Value::Null),
        unique_id,
        data_type: DataType::Event,
        source_api: SourceApi::OpenStates,
        last_ingested_at: now,
    })
}

/// Bill dated by its first action, else its latest action.
pub fn bill_entry(bill: &Bill, state_jurisdiction: &str, now: DateTime<Utc>) -> Option<CivicEntry> {
    if bill.id.trim().is_empty() || bill.title.trim().is_empty() {
        return None;
    }
    let unique_id = format!("os-bill-{}", bill.id);
    let raw_date = bill
        .first_action_date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .or(bill.latest_action_date.as_deref());
    let start_date = dated(raw_date, &unique_id)?;

    Some(CivicEntry {
        source_url: bill.openstates_url.clone(),
        jurisdiction_id: bill
            .jurisdiction
            .as_ref()
            .map(|j| j.id.clone())
            .unwrap_or_else(|| state_jurisdiction.to_string()),
        data: EntryData {
            name: bill.title.clone(),
            description: non_blank(bill.latest_action_description.as_deref()),
            classification: bill.classification.first().cloned(),
            start_date: Some(start_date),
            location_name: None,
        },
        raw_data: serde_json::to_value(bill).unwrap_or(Value::Null),
        unique_id,
        data_type: DataType::Bill,
        source_api: SourceApi::OpenStates,
        last_ingested_at: now,
    })
}

/// AI-extracted event. Dropped without a name, a source URL or a parseable date.
pub fn extracted_event_entry(
    event: &ExtractedEvent,
    jurisdiction_id: &str,
    now: DateTime<Utc>,
) -> Option<CivicEntry> {
    let name = non_blank(event.event_name.as_deref())?;
    let source_url = event.source_url.clone()?;
    let unique_id = extracted_event_id(&source_url, &name);
    let start_date = dated(event.event_date.as_deref(), &unique_id)?;

    Some(CivicEntry {
        unique_id,
        data_type: DataType::Event,
        source_api: SourceApi::Gemini,
        source_url: Some(source_url),
        jurisdiction_id: jurisdiction_id.to_string(),
        data: EntryData {
            name,
            description: non_blank(event.summary.as_deref()),
            classification: Some(COMMUNITY_CLASSIFICATION.to_string()),
            start_date: Some(start_date),
            location_name: non_blank(event.location.as_deref()),
        },
        raw_data: serde_json::to_value(event).unwrap_or_else(|_| json!({})),
        last_ingested_at: now,
    })
}
