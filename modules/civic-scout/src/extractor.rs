use std::sync::Arc;

use ai_client::{generate_json, truncate_to_char_boundary, TextGenerator};
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use civic_common::{AgendaItem, Source, SourceUnavailable};

use crate::traits::PageFetcher;

const EVENT_TEXT_LIMIT: usize = 30_000;
const OFFICIAL_TEXT_LIMIT: usize = 40_000;

/// An event found on a scraped page. All fields are optional as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEvent {
    pub event_name: Option<String>,
    /// ISO-8601 date or date-time.
    pub event_date: Option<String>,
    pub location: Option<String>,
    pub summary: Option<String>,
    /// Page the event was extracted from; set by the extractor, never by the model.
    #[serde(default, skip_deserializing)]
    #[schemars(skip)]
    pub source_url: Option<String>,
}

/// An elected official named on a scraped page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedOfficial {
    pub name: Option<String>,
    /// Title or office, e.g. "Mayor" or "City Council Member, District 9".
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub photo_url: Option<String>,
}

impl ExtractedOfficial {
    /// Both name and role are present and non-blank.
    pub fn is_usable(&self) -> bool {
        let filled = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        filled(&self.name) && filled(&self.role)
    }
}

fn schema_json<T: JsonSchema>() -> String {
    serde_json::to_string_pretty(&schema_for!(T)).unwrap_or_default()
}

fn event_prompt(text: &str) -> String {
    format!(
        "Read the webpage text below and find every upcoming civic meeting, town hall, \
         public hearing or community board event. Event details may appear in prose, lists or \
         table rows. Return a JSON array where each element matches this schema:\n{}\n\
         Use ISO 8601 for eventDate and null for anything missing. Return [] if there are no \
         events. Respond with JSON only.\n\nTEXT:\n{}",
        schema_json::<ExtractedEvent>(),
        truncate_to_char_boundary(text, EVENT_TEXT_LIMIT)
    )
}

fn official_prompt(text: &str) -> String {
    format!(
        "Read the webpage text below and list every elected official it names. For each, give \
         the full name, the specific office held, and any email, phone, website or photo URL \
         shown. Return a JSON array where each element matches this schema:\n{}\n\
         Use null for anything missing. Return [] if no officials are named. Respond with JSON \
         only.\n\nTEXT:\n{}",
        schema_json::<ExtractedOfficial>(),
        truncate_to_char_boundary(text, OFFICIAL_TEXT_LIMIT)
    )
}

fn agenda_prompt(description: &str) -> String {
    format!(
        "Summarize this civic event description as one concise agenda item capturing the main \
         purpose of the event. Respond with JSON only, exactly of the form \
         {{\"description\": \"...\", \"classification\": [\"summary\"]}}.\n\nDESCRIPTION:\n{description}"
    )
}

/// Structured records from unstructured page text via a generative model.
pub struct AiExtractor {
    generator: Option<Arc<dyn TextGenerator>>,
    fetcher: Arc<dyn PageFetcher>,
}

impl AiExtractor {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { generator, fetcher }
    }

    fn generator(&self) -> Result<&dyn TextGenerator, SourceUnavailable> {
        self.generator
            .as_deref()
            .ok_or_else(|| SourceUnavailable::missing_credential(Source::Gemini))
    }

    /// Prompt for a JSON array, skipping elements that don't fit `T`.
    async fn extract_array<T: DeserializeOwned>(&self, prompt: &str) -> Result<Vec<T>, SourceUnavailable> {
        let generator = self.generator()?;
        let values: Vec<serde_json::Value> = generate_json(generator, prompt)
            .await
            .map_err(|e| SourceUnavailable::new(Source::Gemini, e))?;

        let total = values.len();
        let items: Vec<T> = values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if items.len() < total {
            debug!(skipped = total - items.len(), "Dropped malformed extracted records");
        }
        Ok(items)
    }

    pub async fn events_from_text(&self, text: &str) -> Result<Vec<ExtractedEvent>, SourceUnavailable> {
        self.extract_array(&event_prompt(text)).await
    }

    /// Fetch a page and extract its events, each tagged with `url`.
    pub async fn events_from_url(&self, url: &str) -> Result<Vec<ExtractedEvent>, SourceUnavailable> {
        // Fail before fetching when the model is not configured.
        self.generator()?;
        let text = self.fetcher.fetch_text(url).await?;
        let mut events = self.events_from_text(&text).await?;
        for event in &mut events {
            event.source_url = Some(url.to_string());
        }
        info!(url, count = events.len(), "Extracted events");
        Ok(events)
    }

    pub async fn officials_from_text(&self, text: &str) -> Result<Vec<ExtractedOfficial>, SourceUnavailable> {
        self.extract_array(&official_prompt(text)).await
    }

    pub async fn officials_from_url(&self, url: &str) -> Result<Vec<ExtractedOfficial>, SourceUnavailable> {
        self.generator()?;
        let text = self.fetcher.fetch_text(url).await?;
        let officials = self.officials_from_text(&text).await?;
        info!(url, count = officials.len(), "Extracted officials");
        Ok(officials)
    }

    /// One agenda item summarizing `description`, or None if the model is unavailable.
    pub async fn summarize_agenda(&self, description: &str) -> Option<AgendaItem> {
        if description.trim().is_empty() {
            return None;
        }
        let generator = self.generator().ok()?;
        match generate_json::<AgendaItem>(generator, &agenda_prompt(description)).await {
            Ok(item) if !item.description.trim().is_empty() => Some(item),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Agenda summary failed");
                None
            }
        }
    }
}
