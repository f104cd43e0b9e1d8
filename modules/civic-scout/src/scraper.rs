use std::time::Duration;

use async_trait::async_trait;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use civic_common::{Source, SourceUnavailable};

use crate::traits::PageFetcher;

/// Plain HTTP GET followed by Readability extraction to markdown.
pub struct HttpScraper {
    client: reqwest::Client,
}

impl HttpScraper {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("civic-scout/0.1")
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpScraper {
    fn default() -> Self {
        Self::new()
    }
}

/// Render HTML to markdown. Falls back to the raw body when extraction yields nothing.
pub fn html_to_markdown(url: &str, html: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    let text = transform_content_input(input, &config);
    if text.trim().is_empty() {
        html.to_string()
    } else {
        text
    }
}

#[async_trait]
impl PageFetcher for HttpScraper {
    async fn fetch_text(&self, url: &str) -> Result<String, SourceUnavailable> {
        let parsed = url::Url::parse(url).map_err(|e| SourceUnavailable::new(Source::PageFetch, e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SourceUnavailable::new(
                Source::PageFetch,
                format!("only http/https URLs are allowed, got {}", parsed.scheme()),
            ));
        }

        let resp = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| SourceUnavailable::new(Source::PageFetch, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceUnavailable::new(
                Source::PageFetch,
                format!("{url} responded with status {}", status.as_u16()),
            ));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| SourceUnavailable::new(Source::PageFetch, e))?;
        if html.trim().is_empty() {
            warn!(url, "Empty HTML response");
            return Ok(String::new());
        }

        let text = html_to_markdown(url, &html);
        info!(url, bytes = text.len(), "Scraped successfully");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn non_success_status_is_unavailable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/agenda")
            .with_status(404)
            .create_async()
            .await;

        let scraper = HttpScraper::new();
        let err = scraper
            .fetch_text(&format!("{}/agenda", server.url()))
            .await
            .unwrap_err();
        assert_eq!(err.source, Source::PageFetch);
        assert!(err.reason.contains("404"));
    }

    #[tokio::test]
    async fn page_text_is_returned() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/calendar")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><main><h1>City Council</h1><p>Regular meeting on March 5, 2025 at City Hall.</p></main></body></html>")
            .create_async()
            .await;

        let scraper = HttpScraper::new();
        let text = scraper
            .fetch_text(&format!("{}/calendar", server.url()))
            .await
            .unwrap();
        assert!(!text.trim().is_empty());
    }

    #[tokio::test]
    async fn non_http_scheme_is_rejected() {
        let scraper = HttpScraper::new();
        assert!(scraper.fetch_text("file:///etc/passwd").await.is_err());
    }
}
