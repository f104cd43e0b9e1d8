use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use civic_common::{LocationContext, OrEmpty};

use crate::traits::WebSearcher;

/// Appended to every query to keep memorial and listing pages out of results.
pub const NEGATIVE_KEYWORDS: &str = "-obituary -funeral -genealogy -classifieds";

/// Finds candidate pages for AI extraction via a fixed battery of search queries.
pub struct SearchDiscovery {
    searcher: Arc<dyn WebSearcher>,
    results_per_query: u32,
}

impl SearchDiscovery {
    pub fn new(searcher: Arc<dyn WebSearcher>, results_per_query: u32) -> Self {
        Self {
            searcher,
            results_per_query,
        }
    }

    /// Pages likely to list upcoming public meetings in the city.
    pub async fn find_event_pages(&self, city: &str, state: &str) -> Vec<String> {
        let queries = event_queries(city, state);
        let urls = self.run(&queries).await;
        info!(city, state, queries = queries.len(), count = urls.len(), "Discovered event pages");
        urls
    }

    /// Pages likely to name local elected officials.
    pub async fn find_official_pages(&self, ctx: &LocationContext) -> Vec<String> {
        let queries = official_queries(ctx);
        let urls = self.run(&queries).await;
        info!(city = ctx.city.as_str(), queries = queries.len(), count = urls.len(), "Discovered official pages");
        urls
    }

    /// Run all queries concurrently; a failing query contributes nothing.
    async fn run(&self, queries: &[String]) -> Vec<String> {
        let searches = queries.iter().map(|q| {
            let query = format!("{q} {NEGATIVE_KEYWORDS}");
            async move { self.searcher.search(&query, self.results_per_query).await.or_empty() }
        });
        dedupe_urls(join_all(searches).await.into_iter().flatten())
    }
}

pub fn event_queries(city: &str, state: &str) -> Vec<String> {
    vec![
        format!(r#"site:.gov "{city}" "community board meeting" agenda"#),
        format!(r#"site:.gov "{city}" "city council" "public hearing schedule""#),
        format!(r#""{city} {state}" "planning commission" agenda"#),
        format!(r#""{city}" "town hall meeting" local news"#),
        format!(r#"inurl:.org "{city} {state}" "events""#),
        format!(r#"site:reddit.com "r/{city}" "town hall""#),
        format!(r#"site:facebook.com "{city} events" "public meeting""#),
        format!(r#"site:meetup.com "{city}" "community meeting""#),
    ]
}

pub fn official_queries(ctx: &LocationContext) -> Vec<String> {
    let city = &ctx.city;
    let st = ctx.state_upper();
    let mut queries = vec![
        format!(r#""mayor of {city}, {st}""#),
        format!(r#""{city} city council, {st}""#),
    ];
    if let Some(borough) = ctx.borough.as_deref() {
        queries.push(format!(r#""{borough} Borough President""#));
        queries.push(format!(r#""community board {borough}""#));
    }
    if let Some(county) = ctx.county.as_deref() {
        queries.push(format!(r#""{county} executive, {st}""#));
        queries.push(format!(r#""{county} board of supervisors, {st}""#));
    }
    queries
}

/// Exact-string dedup keeping the first occurrence.
pub fn dedupe_urls(urls: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.clone()))
        .collect()
}
