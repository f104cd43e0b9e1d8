pub mod error;
pub mod types;

pub use error::{OpenStatesError, Result};
pub use types::{
    Bill, ContactDetail, CurrentRole, Event, EventLocation, GeoPerson, Jurisdiction,
    JurisdictionRef, LinkRef, Membership, Organization, Page, Paginated, Pagination, PersonNode,
    Post,
};

use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use types::{GraphQlResponse, PeopleData};

const BASE_URL: &str = "https://v3.openstates.org";
const GRAPHQL_URL: &str = "https://openstates.org/graphql";

/// Hard per-page ceiling enforced by the v3 API.
pub const PER_PAGE: u32 = 20;

/// GraphQL selection shared by every people query.
pub const PERSON_FRAGMENT: &str = "fragment repFragment on PersonNode { id name image currentMemberships { organization { name classification } post { label } } contactDetails { type value note } links { url note } }";

/// Where the next request of a paginated listing should go.
///
/// Page 1 is always requested; its envelope fixes `max_page` for the rest of
/// the walk.
#[derive(Debug, Clone, Copy)]
struct PageCursor {
    next: u32,
    max_page: Option<u32>,
}

impl PageCursor {
    fn start() -> Self {
        Self {
            next: 1,
            max_page: None,
        }
    }

    fn next_page(&self) -> Option<u32> {
        match self.max_page {
            Some(max) if self.next > max => None,
            _ => Some(self.next),
        }
    }
}

pub struct OpenStatesClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    graphql_url: String,
}

impl OpenStatesClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            graphql_url: GRAPHQL_URL.to_string(),
        }
    }

    /// Point both the REST and GraphQL endpoints at `url` (GraphQL at `{url}/graphql`).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        self.graphql_url = format!("{url}/graphql");
        self.base_url = url;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(String, String)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let resp = self
            .client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenStatesError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Lazily walk a paginated listing, one sequential request per pulled page.
    ///
    /// The stream is restartable: calling `pages` again begins at page 1.
    /// Errors end the stream after being yielded.
    pub fn pages<'a, T>(
        &'a self,
        path: &'a str,
        params: Vec<(String, String)>,
    ) -> impl Stream<Item = Result<Page<T>>> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        stream::try_unfold(PageCursor::start(), move |cursor| {
            let mut params = params.clone();
            async move {
                let Some(number) = cursor.next_page() else {
                    return Ok(None);
                };

                params.push(("page".to_string(), number.to_string()));
                params.push(("per_page".to_string(), PER_PAGE.to_string()));

                let body: Paginated<T> = self.get_json(path, &params).await?;
                let max_page = cursor
                    .max_page
                    .unwrap_or_else(|| body.pagination.as_ref().map_or(1, |p| p.max_page));

                tracing::debug!(path, page = number, max_page, count = body.results.len(), "OpenStates page");

                let page = Page {
                    number,
                    max_page,
                    results: body.results,
                };
                let cursor = PageCursor {
                    next: number + 1,
                    max_page: Some(max_page),
                };
                Ok::<_, OpenStatesError>(Some((page, cursor)))
            }
        })
    }

    /// Pull pages until exhaustion (or `max_pages`) and concatenate results in order.
    pub async fn collect_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(String, String)>,
        max_pages: Option<usize>,
    ) -> Result<Vec<T>> {
        self.pages::<T>(path, params)
            .take(max_pages.unwrap_or(usize::MAX))
            .map_ok(|page| page.results)
            .try_concat()
            .await
    }

    /// All events for a jurisdiction, sorted by start date.
    pub async fn events(&self, jurisdiction: &str) -> Result<Vec<Event>> {
        let mut params = vec![
            ("jurisdiction".to_string(), jurisdiction.to_string()),
            ("sort".to_string(), "start_date".to_string()),
        ];
        for include in ["sources", "links", "participants", "agenda"] {
            params.push(("include".to_string(), include.to_string()));
        }

        let events: Vec<Event> = self.collect_pages("events", params, None).await?;
        tracing::info!(jurisdiction, count = events.len(), "Fetched OpenStates events");
        Ok(events)
    }

    /// Bills with an action on or after `action_since`, newest action first.
    pub async fn bills(
        &self,
        jurisdiction: &str,
        action_since: NaiveDate,
        max_pages: Option<usize>,
    ) -> Result<Vec<Bill>> {
        let params = vec![
            ("jurisdiction".to_string(), jurisdiction.to_string()),
            ("sort".to_string(), "latest_action_desc".to_string()),
            ("action_since".to_string(), action_since.format("%Y-%m-%d").to_string()),
            ("include".to_string(), "sources".to_string()),
        ];

        let bills: Vec<Bill> = self.collect_pages("bills", params, max_pages).await?;
        tracing::info!(jurisdiction, count = bills.len(), "Fetched OpenStates bills");
        Ok(bills)
    }

    /// People whose districts contain the point, most relevant first.
    pub async fn people_geo(&self, lat: f64, lng: f64) -> Result<Vec<GeoPerson>> {
        let params = vec![
            ("lat".to_string(), lat.to_string()),
            ("lng".to_string(), lng.to_string()),
        ];
        let body: Paginated<GeoPerson> = self.get_json("people.geo", &params).await?;
        Ok(body.results)
    }

    /// Jurisdictions of a classification (`municipality`, `state`) matching a name.
    pub async fn jurisdictions(&self, classification: &str, name: &str) -> Result<Vec<Jurisdiction>> {
        let params = vec![
            ("classification".to_string(), classification.to_string()),
            ("name".to_string(), name.to_string()),
        ];
        let body: Paginated<Jurisdiction> = self.get_json("jurisdictions", &params).await?;
        Ok(body.results)
    }

    // --- GraphQL ---

    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: serde_json::Value) -> Result<T> {
        let resp = self
            .client
            .post(&self.graphql_url)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenStatesError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GraphQlResponse<T> = serde_json::from_str(&resp.text().await?)?;
        if let Some(first) = body.errors.first() {
            return Err(OpenStatesError::GraphQl(first.message.clone()));
        }
        body.data
            .ok_or_else(|| OpenStatesError::Parse("GraphQL response without data".to_string()))
    }

    async fn people_query(&self, query: String, variables: serde_json::Value) -> Result<Vec<PersonNode>> {
        let data: PeopleData = self.graphql(&query, variables).await?;
        Ok(data
            .people
            .map(|c| c.edges.into_iter().filter_map(|e| e.node).collect())
            .unwrap_or_default())
    }

    /// People representing the point at `(lat, lng)`.
    pub async fn people_near(&self, lat: f64, lng: f64, first: u32) -> Result<Vec<PersonNode>> {
        let query = format!(
            "query ($lat: Float!, $lng: Float!, $first: Int!) {{ people(latitude: $lat, longitude: $lng, first: $first) {{ edges {{ node {{ ...repFragment }} }} }} }} {PERSON_FRAGMENT}"
        );
        self.people_query(query, json!({ "lat": lat, "lng": lng, "first": first }))
            .await
    }

    /// People holding a membership in the organization for an OCD division id.
    pub async fn people_member_of(&self, ocd_id: &str, first: u32) -> Result<Vec<PersonNode>> {
        let query = format!(
            "query ($ocdId: String!, $first: Int!) {{ people(memberOf: $ocdId, first: $first) {{ edges {{ node {{ ...repFragment }} }} }} }} {PERSON_FRAGMENT}"
        );
        self.people_query(query, json!({ "ocdId": ocd_id, "first": first }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn page_body(ids: &[&str], page: u32, max_page: u32) -> String {
        let results: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "name": format!("Hearing {id}"),
                    "jurisdiction": { "id": "ocd-jurisdiction/country:us/state:il/government" },
                    "start_date": "2025-03-05T10:00:00-06:00",
                    "location": { "name": "Capitol Room 212" },
                    "participants": []
                })
            })
            .collect();
        json!({
            "results": results,
            "pagination": { "per_page": 20, "page": page, "max_page": max_page, "total_items": 5 }
        })
        .to_string()
    }

    #[tokio::test]
    async fn events_walks_every_page_in_order() {
        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for (page, ids) in [(1, vec!["e1", "e2"]), (2, vec!["e3", "e4"]), (3, vec!["e5"])] {
            let mock = server
                .mock("GET", "/events")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("page".into(), page.to_string()),
                    Matcher::UrlEncoded("per_page".into(), "20".into()),
                    Matcher::UrlEncoded(
                        "jurisdiction".into(),
                        "ocd-jurisdiction/country:us/state:il/government".into(),
                    ),
                ]))
                .match_header("x-api-key", "os-test")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(page_body(&ids, page, 3))
                .expect(1)
                .create_async()
                .await;
            mocks.push(mock);
        }

        let client = OpenStatesClient::new("os-test").with_base_url(server.url());
        let events = client
            .events("ocd-jurisdiction/country:us/state:il/government")
            .await
            .unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3", "e4", "e5"]);
        for mock in mocks {
            mock.assert_async().await;
        }
        // Unmodelled fields survive for raw storage.
        assert!(events[0].extra.contains_key("participants"));
    }

    #[tokio::test]
    async fn single_page_listing_stops_after_first_request() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/events")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(page_body(&["only"], 1, 1))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/events")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(page_body(&[], 2, 1))
            .expect(0)
            .create_async()
            .await;

        let client = OpenStatesClient::new("os-test").with_base_url(server.url());
        let events = client.events("j").await.unwrap();
        assert_eq!(events.len(), 1);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn page_cap_limits_requests() {
        let mut server = Server::new_async().await;
        let _p1 = server
            .mock("GET", "/bills")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("action_since".into(), "2025-01-01".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "results": [{ "id": "b1", "title": "An Act" }],
                    "pagination": { "max_page": 40 }
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let p2 = server
            .mock("GET", "/bills")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .expect(0)
            .create_async()
            .await;

        let client = OpenStatesClient::new("os-test").with_base_url(server.url());
        let since = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let bills = client.bills("j", since, Some(1)).await.unwrap();
        assert_eq!(bills.len(), 1);
        p2.assert_async().await;
    }

    #[tokio::test]
    async fn incomplete_records_do_not_fail_the_page() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "results": [
                        { "id": "good", "name": "Budget Hearing", "start_date": "2025-03-05T10:00:00Z" },
                        { "id": "bad", "name": null, "start_date": "2025-03-06T10:00:00Z" },
                        { "id": "untitled", "links": [ { "url": null, "note": "web" } ] }
                    ],
                    "pagination": { "max_page": 1 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = OpenStatesClient::new("os-test").with_base_url(server.url());
        let events = client.events("j").await.unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "bad", "untitled"]);
        assert_eq!(events[0].name, "Budget Hearing");
        assert_eq!(events[1].name, "");
        assert_eq!(events[2].web_url(), None);
    }

    #[tokio::test]
    async fn http_error_fails_the_walk() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/events")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let client = OpenStatesClient::new("bad").with_base_url(server.url());
        match client.events("j").await {
            Err(OpenStatesError::Api { status, .. }) => assert_eq!(status, 401),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn graphql_errors_are_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data":null,"errors":[{"message":"Cannot query field"}]}"#)
            .create_async()
            .await;

        let client = OpenStatesClient::new("os-test").with_base_url(server.url());
        match client.people_near(39.8, -89.6, 50).await {
            Err(OpenStatesError::GraphQl(msg)) => assert!(msg.contains("Cannot query")),
            other => panic!("expected GraphQl error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn graphql_people_are_unwrapped() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(
                json!({
                    "data": { "people": { "edges": [ { "node": {
                        "id": "ocd-person/1",
                        "name": "Jane Doe",
                        "image": null,
                        "currentMemberships": [
                            { "organization": { "name": "Democratic", "classification": "party" }, "post": null },
                            { "organization": { "name": "Illinois House", "classification": "lower" }, "post": { "label": "District 99" } }
                        ],
                        "contactDetails": [ { "type": "email", "value": "jane@example.gov", "note": "Capitol Office" } ],
                        "links": []
                    } } ] } }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = OpenStatesClient::new("os-test").with_base_url(server.url());
        let people = client
            .people_member_of("ocd-division/country:us/state:il/place:springfield", 100)
            .await
            .unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].party(), Some("Democratic"));
        assert_eq!(people[0].role(), Some("District 99"));
        assert_eq!(people[0].contact_details[0].kind, "email");
    }
}
