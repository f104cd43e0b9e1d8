use anyhow::{Context, Result};
use chrono::Duration;

/// Application configuration loaded from environment variables.
/// Only `DATABASE_URL` is required; a missing credential disables that source.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Google
    pub google_geocoding_api_key: Option<String>,
    pub google_search_api_key: Option<String>,
    pub google_search_cx: Option<String>,

    // OpenStates
    pub openstates_api_key: Option<String>,

    // AI
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,

    // Tunables
    pub rep_cache_ttl_hours: i64,
    pub rep_page_limit: usize,
    pub bill_page_limit: usize,
    pub bill_lookback_days: i64,
    pub search_results_per_query: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            google_geocoding_api_key: optional_env("GOOGLE_GEOCODING_API_KEY"),
            google_search_api_key: optional_env("GOOGLE_SEARCH_API_KEY"),
            google_search_cx: optional_env("GOOGLE_SEARCH_CX"),
            openstates_api_key: optional_env("OPENSTATES_API_KEY"),
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_model: optional_env("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            rep_cache_ttl_hours: parsed_env("REP_CACHE_TTL_HOURS", 24)?,
            rep_page_limit: parsed_env("REP_PAGE_LIMIT", 5)?,
            bill_page_limit: parsed_env("BILL_PAGE_LIMIT", 5)?,
            bill_lookback_days: parsed_env("BILL_LOOKBACK_DAYS", 365)?,
            search_results_per_query: parsed_env("SEARCH_RESULTS_PER_QUERY", 3)?,
        })
    }

    pub fn rep_cache_ttl(&self) -> Duration {
        Duration::hours(self.rep_cache_ttl_hours)
    }

    /// Log which credentials are configured, never their values.
    pub fn log_redacted(&self) {
        fn presence(val: &Option<String>) -> &'static str {
            match val {
                Some(_) => "set",
                None => "<not set>",
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  GOOGLE_GEOCODING_API_KEY: {}", presence(&self.google_geocoding_api_key));
        tracing::info!("  GOOGLE_SEARCH_API_KEY: {}", presence(&self.google_search_api_key));
        tracing::info!("  GOOGLE_SEARCH_CX: {}", presence(&self.google_search_cx));
        tracing::info!("  OPENSTATES_API_KEY: {}", presence(&self.openstates_api_key));
        tracing::info!("  GEMINI_API_KEY: {}", presence(&self.gemini_api_key));
        tracing::info!(
            model = self.gemini_model.as_str(),
            rep_cache_ttl_hours = self.rep_cache_ttl_hours,
            rep_page_limit = self.rep_page_limit,
            bill_page_limit = self.bill_page_limit,
            bill_lookback_days = self.bill_lookback_days,
            search_results_per_query = self.search_results_per_query,
            "  Tunables"
        );
    }
}

/// Unset and blank values both count as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_env_falls_back_to_default() {
        let v: usize = parsed_env("CIVIC_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(v, 7);
    }
}
