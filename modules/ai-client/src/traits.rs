use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::util::strip_code_blocks;

// =============================================================================
// TextGenerator Trait
// =============================================================================

/// A single-shot prompt → text model. Implemented by every provider so callers
/// can swap models (or mocks) behind an `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Provider/model label for logs.
    fn name(&self) -> &str;
}

/// Prompt the model and parse its reply as JSON, tolerating markdown code fences.
pub async fn generate_json<T: DeserializeOwned>(
    generator: &dyn TextGenerator,
    prompt: &str,
) -> Result<T> {
    let raw = generator.generate(prompt).await?;
    let json = strip_code_blocks(&raw);
    serde_json::from_str(json).map_err(|e| {
        anyhow!(
            "{} returned non-JSON output: {e} (first bytes: {:?})",
            generator.name(),
            json.chars().take(80).collect::<String>()
        )
    })
}
