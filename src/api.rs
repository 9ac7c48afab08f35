//! Remote boundary: the two read-only listing endpoints of the video
//! platform's data API.
//!
//! The fetcher only talks to [`TrendingApi`], so tests can swap the blocking
//! HTTP client for canned pages. Items are handed over as untyped JSON values;
//! turning them into rows (and deciding what to do with odd ones) is the
//! fetcher's job.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{PipelineError, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
/// Largest page the listing endpoint will return.
pub const PAGE_SIZE: u32 = 50;

/// API credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// One page request against the most-popular listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub region: &'a str,
    pub page_token: Option<&'a str>,
    pub page_size: u32,
}

/// Envelope of the category listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryListResponse {
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Envelope of one most-popular page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

pub trait TrendingApi {
    /// Lists the video categories defined for `region`.
    fn video_categories(&self, key: &ApiKey, region: &str) -> Result<CategoryListResponse>;

    /// Fetches one page of the most-popular chart, with basic info, content
    /// details and statistics parts.
    fn most_popular(&self, key: &ApiKey, request: &PageRequest<'_>) -> Result<VideoListResponse>;
}

/// Blocking HTTP implementation backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    agent: ureq::Agent,
    base_url: String,
}

impl YouTubeClient {
    /// Every request is bounded by `timeout`; expiry is reported as a remote
    /// access failure.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        key: &ApiKey,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, ?params, "requesting");

        // The key travels in a header so it never shows up in transport
        // error messages, which embed the request URL.
        let mut request = self.agent.get(&url).set("X-goog-api-key", key.expose());
        for (name, value) in params {
            request = request.query(name, value);
        }

        match request.call() {
            Ok(response) => response.into_json::<T>().map_err(|err| {
                PipelineError::remote_access(format!("decoding {endpoint} response: {err}"))
            }),
            Err(ureq::Error::Status(code, response)) => {
                let detail = response
                    .into_string()
                    .ok()
                    .and_then(|body| api_error_message(&body))
                    .unwrap_or_else(|| "no error details".to_owned());
                Err(PipelineError::remote_access(format!(
                    "{endpoint} returned HTTP {code}: {detail}"
                )))
            }
            Err(ureq::Error::Transport(transport)) => Err(PipelineError::remote_access(format!(
                "requesting {endpoint}: {transport}"
            ))),
        }
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL, Duration::from_secs(30))
    }
}

impl TrendingApi for YouTubeClient {
    fn video_categories(&self, key: &ApiKey, region: &str) -> Result<CategoryListResponse> {
        self.get_json(
            key,
            "videoCategories",
            &[("part", "snippet"), ("regionCode", region)],
        )
    }

    fn most_popular(&self, key: &ApiKey, request: &PageRequest<'_>) -> Result<VideoListResponse> {
        let page_size = request.page_size.to_string();
        let mut params = vec![
            ("part", "snippet,contentDetails,statistics"),
            ("chart", "mostPopular"),
            ("regionCode", request.region),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = request.page_token {
            params.push(("pageToken", token));
        }
        self.get_json(key, "videos", &params)
    }
}

/// Pulls a readable message (and reason, e.g. `quotaExceeded`) out of the
/// API's JSON error envelope.
fn api_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let message = error.get("message").and_then(Value::as_str)?;
    let reason = error
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("reason"))
        .and_then(Value::as_str);
    Some(match reason {
        Some(reason) => format!("{message} ({reason})"),
        None => message.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret");
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
        assert_eq!(key.expose(), "super-secret");
    }

    #[test]
    fn api_error_message_reads_reason() {
        let body = r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your quota.","errors":[{"reason":"quotaExceeded"}]}}"#;
        assert_eq!(
            api_error_message(body).as_deref(),
            Some(
                "The request cannot be completed because you have exceeded your quota. (quotaExceeded)"
            )
        );
        assert_eq!(api_error_message("<html>"), None);
        assert_eq!(
            api_error_message(r#"{"error":{"message":"API key not valid."}}"#).as_deref(),
            Some("API key not valid.")
        );
    }

    #[test]
    fn video_page_envelope_tolerates_missing_fields() {
        let page: VideoListResponse =
            serde_json::from_str(r#"{"kind":"youtube#videoListResponse"}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_page_token, None);

        let page: VideoListResponse =
            serde_json::from_str(r#"{"items":[{"id":"a"}],"nextPageToken":"CDIQAA"}"#).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_page_token.as_deref(), Some("CDIQAA"));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = YouTubeClient::new("http://localhost:9999/v3/", Duration::from_secs(1));
        assert_eq!(client.base_url, "http://localhost:9999/v3");
    }

    #[test]
    fn unreachable_endpoint_is_remote_access_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client = YouTubeClient::new("http://127.0.0.1:9", Duration::from_secs(2));
        let err = client
            .video_categories(&ApiKey::new("k"), "US")
            .unwrap_err();
        assert!(matches!(err, PipelineError::RemoteAccess { .. }));
    }
}
