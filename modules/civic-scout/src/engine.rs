use std::sync::Arc;

use ai_client::{Gemini, TextGenerator};
use chrono::Duration;
use typed_builder::TypedBuilder;

use civic_common::{CollisionPolicy, Config, Source};
use google_client::{CustomSearchClient, GeocodingClient};
use openstates_client::OpenStatesClient;

use crate::discovery::SearchDiscovery;
use crate::extractor::AiExtractor;
use crate::jurisdiction::JurisdictionResolver;
use crate::scraper::HttpScraper;
use crate::traits::{CivicDataSource, CivicStore, Geocoder, PageFetcher, Unconfigured, WebSearcher};

/// Tunables for one engine instance.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ScoutSettings {
    #[builder(default = Duration::hours(24))]
    pub rep_cache_ttl: Duration,
    /// Official pages sent for AI extraction per synthesis run.
    #[builder(default = 5)]
    pub rep_page_limit: usize,
    #[builder(default = 5)]
    pub bill_page_limit: usize,
    #[builder(default = 365)]
    pub bill_lookback_days: i64,
    #[builder(default = 3)]
    pub search_results_per_query: u32,
    /// Agenda summaries in flight at once.
    #[builder(default = 4)]
    pub agenda_concurrency: usize,
    #[builder(default)]
    pub collision_policy: CollisionPolicy,
}

impl Default for ScoutSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ScoutSettings {
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .rep_cache_ttl(config.rep_cache_ttl())
            .rep_page_limit(config.rep_page_limit)
            .bill_page_limit(config.bill_page_limit)
            .bill_lookback_days(config.bill_lookback_days)
            .search_results_per_query(config.search_results_per_query)
            .build()
    }
}

/// Shared dependency container for the engine. Long-lived and cloneable.
#[derive(Clone, TypedBuilder)]
pub struct ScoutDeps {
    pub geocoder: Arc<dyn Geocoder>,
    pub civic_data: Arc<dyn CivicDataSource>,
    pub searcher: Arc<dyn WebSearcher>,
    pub fetcher: Arc<dyn PageFetcher>,
    #[builder(default)]
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub store: Arc<dyn CivicStore>,
    #[builder(default)]
    pub settings: ScoutSettings,
}

impl ScoutDeps {
    /// Production clients for every configured credential; `Unconfigured` for the rest.
    pub fn from_config(config: &Config, store: Arc<dyn CivicStore>) -> Self {
        let geocoder: Arc<dyn Geocoder> = match &config.google_geocoding_api_key {
            Some(key) => Arc::new(GeocodingClient::new(key)),
            None => Arc::new(Unconfigured(Source::Geocoding)),
        };
        let searcher: Arc<dyn WebSearcher> =
            match (&config.google_search_api_key, &config.google_search_cx) {
                (Some(key), Some(cx)) => Arc::new(CustomSearchClient::new(key, cx)),
                _ => Arc::new(Unconfigured(Source::Search)),
            };
        let civic_data: Arc<dyn CivicDataSource> = match &config.openstates_api_key {
            Some(key) => Arc::new(OpenStatesClient::new(key)),
            None => Arc::new(Unconfigured(Source::OpenStates)),
        };
        let generator = config
            .gemini_api_key
            .as_ref()
            .map(|key| Arc::new(Gemini::new(key, &config.gemini_model)) as Arc<dyn TextGenerator>);

        Self::builder()
            .geocoder(geocoder)
            .civic_data(civic_data)
            .searcher(searcher)
            .fetcher(Arc::new(HttpScraper::new()))
            .generator(generator)
            .store(store)
            .settings(ScoutSettings::from_config(config))
            .build()
    }
}

/// Orchestrates ingestion, synthesis and the representative cache.
pub struct CivicEngine {
    pub(crate) geocoder: Arc<dyn Geocoder>,
    pub(crate) civic_data: Arc<dyn CivicDataSource>,
    pub(crate) store: Arc<dyn CivicStore>,
    pub(crate) resolver: JurisdictionResolver,
    pub(crate) discovery: SearchDiscovery,
    pub(crate) extractor: AiExtractor,
    pub(crate) settings: ScoutSettings,
}

impl CivicEngine {
    pub fn new(deps: ScoutDeps) -> Self {
        let settings = deps.settings;
        Self {
            resolver: JurisdictionResolver::new(deps.geocoder.clone(), deps.civic_data.clone()),
            discovery: SearchDiscovery::new(deps.searcher, settings.search_results_per_query),
            extractor: AiExtractor::new(deps.generator, deps.fetcher),
            geocoder: deps.geocoder,
            civic_data: deps.civic_data,
            store: deps.store,
            settings,
        }
    }

    pub fn settings(&self) -> &ScoutSettings {
        &self.settings
    }

    pub fn store(&self) -> &dyn CivicStore {
        self.store.as_ref()
    }

    pub fn resolver(&self) -> &JurisdictionResolver {
        &self.resolver
    }
}
