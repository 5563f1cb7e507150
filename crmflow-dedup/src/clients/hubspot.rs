//! HubSpot CRM record store
//!
//! Implements `RecordStore` over the HubSpot REST API:
//! - Search: `POST /crm/v3/objects/contacts/search`
//! - Merge: `POST /contacts/v1/contact/merge-vids/{targetId}`
//!
//! Requests are rate limited client-side (private apps get a small
//! per-second allowance shared across all workflow actions).

use crate::config::HubSpotConfig;
use crate::types::{
    ClientError, DedupKey, RawCandidate, RecordId, RecordStore, SearchResult,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HubSpot API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HubSpot search page size (API maximum)
const SEARCH_PAGE_SIZE: u32 = 100;

/// Contact creation timestamp property
const CREATEDATE_PROPERTY: &str = "createdate";

/// HubSpot contacts client
pub struct HubSpotClient {
    http_client: Client,
    base_url: String,
    access_token: String,
    dedup_property: String,
    secondary_property: String,
    max_pages: u32,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HubSpotClient {
    pub fn new(config: &HubSpotConfig, access_token: String) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::NotConfigured(format!("HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            dedup_property: config.dedup_property.clone(),
            secondary_property: config.secondary_property.clone(),
            max_pages: config.max_pages.max(1),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    /// Fetch one page of contacts matching the dedup key
    async fn search_page(
        &self,
        key: &DedupKey,
        after: Option<&str>,
    ) -> Result<SearchResponse, ClientError> {
        self.rate_limiter.until_ready().await;

        let mut body = json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": self.dedup_property,
                    "operator": "EQ",
                    "value": key.as_str(),
                }]
            }],
            "properties": [self.secondary_property, CREATEDATE_PROPERTY],
            "limit": SEARCH_PAGE_SIZE,
        });
        if let Some(after) = after {
            body["after"] = json!(after);
        }

        let url = format!("{}/crm/v3/objects/contacts/search", self.base_url);
        debug!(url = %url, after = ?after, "Searching HubSpot contacts");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("HubSpot search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to parse HubSpot search response: {}", e)))
    }

    /// Convert one search result into a validated candidate
    fn to_candidate(&self, result: ContactResult) -> Result<RawCandidate, ClientError> {
        let secondary_attribute = property_string(&result.properties, &self.secondary_property);

        let created_raw = property_string(&result.properties, CREATEDATE_PROPERTY)
            .or(result.created_at)
            .ok_or_else(|| {
                ClientError::Parse(format!("Contact {} has no creation date", result.id))
            })?;

        let created_at = parse_timestamp(&created_raw).ok_or_else(|| {
            ClientError::Parse(format!(
                "Contact {} has unparseable creation date '{}'",
                result.id, created_raw
            ))
        })?;

        Ok(RawCandidate {
            id: RecordId::new(result.id),
            secondary_attribute,
            created_at,
        })
    }
}

#[async_trait]
impl RecordStore for HubSpotClient {
    fn name(&self) -> &'static str {
        "HubSpot"
    }

    async fn search(&self, key: &DedupKey) -> Result<SearchResult, ClientError> {
        let mut candidates = Vec::new();
        let mut after: Option<String> = None;

        for _ in 0..self.max_pages {
            let response = self.search_page(key, after.as_deref()).await?;

            for result in response.results {
                candidates.push(self.to_candidate(result)?);
            }

            after = response.paging.and_then(|p| p.next).map(|n| n.after);
            if after.is_none() {
                break;
            }
        }

        // A cursor left over after the last allowed page means more matches
        let truncated = after.is_some();
        if truncated {
            warn!(
                dedup_key = %key,
                max_pages = self.max_pages,
                fetched = candidates.len(),
                "HubSpot search truncated at page limit"
            );
        }

        debug!(dedup_key = %key, count = candidates.len(), "HubSpot search complete");
        Ok(SearchResult {
            candidates,
            truncated,
        })
    }

    async fn merge(&self, source_id: &RecordId, target_id: &RecordId) -> Result<(), ClientError> {
        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/contacts/v1/contact/merge-vids/{}",
            self.base_url,
            target_id.as_str()
        );

        // The v1 endpoint expects a numeric vid
        let vid_to_merge = match source_id.as_str().parse::<i64>() {
            Ok(vid) => json!(vid),
            Err(_) => json!(source_id.as_str()),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "vidToMerge": vid_to_merge }))
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("HubSpot merge request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            source_id = %source_id,
            target_id = %target_id,
            "HubSpot contacts merged"
        );
        Ok(())
    }
}

// ============================================================================
// HubSpot API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ContactResult>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct ContactResult {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(rename = "createdAt", default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<PagingNext>,
}

#[derive(Debug, Deserialize)]
struct PagingNext {
    after: String,
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Non-blank string property value
fn property_string(properties: &Map<String, Value>, name: &str) -> Option<String> {
    match properties.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a HubSpot timestamp: RFC 3339 or epoch milliseconds
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let millis = raw.parse::<i64>().ok()?;
        return Utc.timestamp_millis_opt(millis).single();
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer, max_pages: u32) -> HubSpotClient {
        let config = HubSpotConfig {
            base_url: server.base_url(),
            max_pages,
            requests_per_second: 1000,
            ..Default::default()
        };
        HubSpotClient::new(&config, "test-token".to_string()).unwrap()
    }

    fn key() -> DedupKey {
        DedupKey::parse(Some("+441234567890")).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2023-01-01T00:00:00.000Z").unwrap();
        let millis = parse_timestamp("1672531200000").unwrap();
        assert_eq!(rfc, millis);

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_property_string() {
        let mut props = Map::new();
        props.insert("email".into(), json!("  a@example.com "));
        props.insert("blank".into(), json!(""));
        props.insert("null".into(), Value::Null);

        assert_eq!(property_string(&props, "email").as_deref(), Some("a@example.com"));
        assert_eq!(property_string(&props, "blank"), None);
        assert_eq!(property_string(&props, "null"), None);
        assert_eq!(property_string(&props, "missing"), None);
    }

    #[tokio::test]
    async fn test_search_parses_contacts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/crm/v3/objects/contacts/search")
                    .header("authorization", "Bearer test-token");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "total": 2,
                        "results": [
                            {
                                "id": "101",
                                "properties": {
                                    "email": "a@example.com",
                                    "createdate": "2023-01-01T00:00:00.000Z"
                                }
                            },
                            {
                                "id": "102",
                                "properties": { "email": null, "createdate": null },
                                "createdAt": "2022-06-01T00:00:00Z"
                            }
                        ]
                    }));
            })
            .await;

        let client = client_for(&server, 10);
        let found = client.search(&key()).await.unwrap();

        mock.assert_async().await;
        assert!(!found.truncated);
        let candidates = found.candidates;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id.as_str(), "101");
        assert_eq!(candidates[0].secondary_attribute.as_deref(), Some("a@example.com"));
        assert_eq!(candidates[1].secondary_attribute, None);
        assert_eq!(
            candidates[1].created_at,
            parse_timestamp("2022-06-01T00:00:00Z").unwrap()
        );
    }

    #[tokio::test]
    async fn test_search_follows_paging_up_to_limit() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/crm/v3/objects/contacts/search");
                then.status(200).json_body(json!({
                    "results": [{
                        "id": "1",
                        "properties": { "createdate": "2023-01-01T00:00:00Z" }
                    }],
                    "paging": { "next": { "after": "1" } }
                }));
            })
            .await;

        let client = client_for(&server, 3);
        let found = client.search(&key()).await.unwrap();

        mock.assert_calls_async(3).await;
        assert_eq!(found.candidates.len(), 3);
        assert!(found.truncated);
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/crm/v3/objects/contacts/search");
                then.status(401).body("unauthorized");
            })
            .await;

        let client = client_for(&server, 10);
        let result = client.search(&key()).await;

        assert!(matches!(result, Err(ClientError::Api { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_search_rejects_missing_creation_date() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/crm/v3/objects/contacts/search");
                then.status(200).json_body(json!({
                    "results": [{ "id": "1", "properties": { "email": "a@example.com" } }]
                }));
            })
            .await;

        let client = client_for(&server, 10);
        let result = client.search(&key()).await;

        assert!(matches!(result, Err(ClientError::Parse(_))));
    }

    #[tokio::test]
    async fn test_merge_posts_numeric_vid() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/contacts/v1/contact/merge-vids/200")
                    .header("authorization", "Bearer test-token")
                    .json_body(json!({ "vidToMerge": 101 }));
                then.status(200);
            })
            .await;

        let client = client_for(&server, 10);
        client
            .merge(&RecordId::from("101"), &RecordId::from("200"))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_merge_failure_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/contacts/v1/contact/merge-vids/200");
                then.status(409).body("already merged");
            })
            .await;

        let client = client_for(&server, 10);
        let result = client
            .merge(&RecordId::from("101"), &RecordId::from("200"))
            .await;

        match result {
            Err(ClientError::Api { status, body }) => {
                assert_eq!(status, 409);
                assert_eq!(body, "already merged");
            }
            other => panic!("Expected API error, got {:?}", other),
        }
    }
}
