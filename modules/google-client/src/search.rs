use serde::Deserialize;
use tracing::info;

use crate::error::{GoogleError, Result};

const BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

/// Google Programmable Search (Custom Search JSON API).
pub struct CustomSearchClient {
    client: reqwest::Client,
    api_key: String,
    cx: String,
    base_url: String,
}

impl CustomSearchClient {
    pub fn new(api_key: impl Into<String>, cx: impl Into<String>) -> Self {
        Self {
            client: crate::http_client(),
            api_key: api_key.into(),
            cx: cx.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Run one query. The API caps `num` at 10; an empty result set is `Ok(vec![])`.
    pub async fn search(&self, query: &str, num: u32) -> Result<Vec<SearchItem>> {
        let num = num.clamp(1, 10).to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GoogleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = resp.json().await?;
        info!(query, count = body.items.len(), "Custom search complete");
        Ok(body.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn search_returns_item_links() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "mayor of Springfield, IL".into()),
                Matcher::UrlEncoded("cx".into(), "engine".into()),
                Matcher::UrlEncoded("num".into(), "3".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"items":[
                    {"link":"https://springfield.il.us/mayor","title":"Office of the Mayor"},
                    {"link":"https://en.wikipedia.org/wiki/Springfield"}
                ]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = CustomSearchClient::new("key", "engine").with_base_url(format!("{}/", server.url()));
        let items = client.search("mayor of Springfield, IL", 3).await.unwrap();

        mock.assert_async().await;
        let links: Vec<&str> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://springfield.il.us/mayor", "https://en.wikipedia.org/wiki/Springfield"]
        );
    }

    #[tokio::test]
    async fn no_items_field_means_no_results() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"searchInformation":{"totalResults":"0"}}"#)
            .create_async()
            .await;

        let client = CustomSearchClient::new("key", "engine").with_base_url(format!("{}/", server.url()));
        assert!(client.search("obscure", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quota_exceeded_is_an_api_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("rateLimitExceeded")
            .create_async()
            .await;

        let client = CustomSearchClient::new("key", "engine").with_base_url(format!("{}/", server.url()));
        match client.search("q", 3).await {
            Err(GoogleError::Api { status, .. }) => assert_eq!(status, 429),
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
