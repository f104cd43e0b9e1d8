pub mod cache;
pub mod connector;
pub mod discovery;
pub mod engine;
pub mod events;
pub mod extractor;
pub mod ingestion;
pub mod jurisdiction;
pub mod refresh;
pub mod scraper;
pub mod synthesis;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use engine::{CivicEngine, ScoutDeps, ScoutSettings};
pub use events::{format_event, EventView};
pub use refresh::{refresh_all, RefreshReport};
