//! Slack Web API client for kudos collection
//!
//! Reads channel history (where kudos are posted) and user profiles. Every
//! call goes through the cache, so re-running an assessment for the same
//! period does not hit Slack again until the TTL runs out.

use std::fmt;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cache::{CacheError, CacheKey, CacheManager};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Environment variable holding the bot token
pub const TOKEN_ENV: &str = "SLACK_BOT_TOKEN";

/// How long channel history stays fresh
pub const HISTORY_CACHE_TTL: Duration = Duration::from_secs(120 * 60);

/// How long user profiles stay fresh
pub const USER_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const HISTORY_PAGE_SIZE: u32 = 200;

/// Used when a 429 response carries no Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

const AUTH_ERRORS: &[&str] = &["invalid_auth", "not_authed", "account_inactive", "token_revoked"];

/// Errors that can occur when calling Slack
#[derive(Debug, Error)]
pub enum SlackError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack rate limit hit on {endpoint}, retry after {retry_after}s")]
    RateLimited { endpoint: String, retry_after: u64 },

    #[error("Slack authentication failed on {endpoint}: {error}")]
    Unauthorized { endpoint: String, error: String },

    #[error("Slack API error on {endpoint}: {error}")]
    Api { endpoint: String, error: String },

    /// Failed to parse API response
    #[error("Failed to parse Slack response from {endpoint}: {source}")]
    Parse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing SLACK_BOT_TOKEN environment variable")]
    MissingToken,

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// A message from a channel's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackMessage {
    /// Author's user ID; absent for some bot messages
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Message timestamp, also its ID within the channel
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

/// A Slack user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    user: SlackUser,
}

/// Parameters that identify a history request, hashed into its cache key
#[derive(Serialize)]
struct HistoryParams<'a> {
    channel: &'a str,
    oldest: Option<&'a str>,
    latest: Option<&'a str>,
}

/// Maps a Slack response body with `"ok": false` to a typed error
fn check_ok(endpoint: &str, body: &Value) -> Result<(), SlackError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }

    let error = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    if AUTH_ERRORS.contains(&error.as_str()) {
        tracing::error!(endpoint, error = %error, "Slack authentication error");
        return Err(SlackError::Unauthorized {
            endpoint: endpoint.to_string(),
            error,
        });
    }

    tracing::error!(endpoint, error = %error, "Slack API error");
    Err(SlackError::Api {
        endpoint: endpoint.to_string(),
        error,
    })
}

/// Client for the Slack Web API with response caching
#[derive(Clone)]
pub struct SlackClient {
    http_client: Client,
    cache: CacheManager,
    /// Base URL for the API (allows override for testing)
    base_url: String,
    token: String,
}

impl fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackClient")
            .field("base_url", &self.base_url)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl SlackClient {
    pub fn new(token: impl Into<String>, cache: CacheManager) -> Self {
        Self {
            http_client: Client::new(),
            cache,
            base_url: SLACK_API_BASE.to_string(),
            token: token.into(),
        }
    }

    /// Creates a client from the SLACK_BOT_TOKEN environment variable
    pub fn from_env(cache: CacheManager) -> Result<Self, SlackError> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or(SlackError::MissingToken)?;
        Ok(Self::new(token, cache))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn history_cache_key(
        channel: &str,
        oldest: Option<&str>,
        latest: Option<&str>,
    ) -> Result<CacheKey, CacheError> {
        CacheKey::from_params(
            "slack_history",
            &HistoryParams {
                channel,
                oldest,
                latest,
            },
        )
    }

    fn user_cache_key(user_id: &str) -> Result<CacheKey, CacheError> {
        CacheKey::new(format!("slack_user:{}", user_id))
    }

    /// Fetches every message in `channel` between `oldest` and `latest`
    ///
    /// Timestamps are Slack `ts` strings (epoch seconds with a fractional part).
    /// Served from cache for [`HISTORY_CACHE_TTL`] after a successful fetch.
    pub async fn conversation_history(
        &self,
        channel: &str,
        oldest: Option<&str>,
        latest: Option<&str>,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        let key = Self::history_cache_key(channel, oldest, latest)?;
        self.cache
            .get_or_fetch(&key, Some(HISTORY_CACHE_TTL), || {
                self.fetch_history(channel, oldest, latest)
            })
            .await
    }

    /// Fetches a user's profile
    pub async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackError> {
        let key = Self::user_cache_key(user_id)?;
        self.cache
            .get_or_fetch(&key, Some(USER_CACHE_TTL), || async {
                let response: UserInfoResponse = self
                    .call("users.info", &[("user", user_id.to_string())])
                    .await?;
                Ok::<_, SlackError>(response.user)
            })
            .await
    }

    /// Walks the history cursor until Slack reports no more pages
    async fn fetch_history(
        &self,
        channel: &str,
        oldest: Option<&str>,
        latest: Option<&str>,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("channel", channel.to_string()),
                ("limit", HISTORY_PAGE_SIZE.to_string()),
            ];
            if let Some(oldest) = oldest {
                params.push(("oldest", oldest.to_string()));
            }
            if let Some(latest) = latest {
                params.push(("latest", latest.to_string()));
            }
            if let Some(ref cursor) = cursor {
                params.push(("cursor", cursor.clone()));
            }

            let page: HistoryPage = self.call("conversations.history", &params).await?;
            messages.extend(page.messages);

            let next = page
                .response_metadata
                .and_then(|meta| meta.next_cursor)
                .filter(|c| !c.is_empty());
            match next {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        tracing::info!(channel, count = messages.len(), "fetched Slack channel history");
        Ok(messages)
    }

    /// Makes a GET request to a Web API method and decodes the response
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, SlackError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(endpoint, "calling Slack API");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            tracing::warn!(endpoint, retry_after, "Slack rate limit hit");
            return Err(SlackError::RateLimited {
                endpoint: endpoint.to_string(),
                retry_after,
            });
        }

        let body: Value = response.error_for_status()?.json().await?;
        check_ok(endpoint, &body)?;
        serde_json::from_value(body).map_err(|source| SlackError::Parse {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCacheBackend;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Nothing listens here, so any real request fails fast
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn create_test_cache() -> (CacheManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = FileCacheBackend::open(temp_dir.path()).expect("Failed to open cache");
        (CacheManager::new(Arc::new(backend)), temp_dir)
    }

    fn message(user: &str, text: &str, ts: &str) -> SlackMessage {
        SlackMessage {
            user: Some(user.to_string()),
            text: text.to_string(),
            ts: ts.to_string(),
            thread_ts: None,
        }
    }

    #[test]
    fn test_check_ok_accepts_ok_body() {
        assert!(check_ok("conversations.history", &json!({"ok": true})).is_ok());
    }

    #[test]
    fn test_check_ok_maps_auth_errors() {
        let err = check_ok("users.info", &json!({"ok": false, "error": "invalid_auth"})).unwrap_err();
        assert!(matches!(err, SlackError::Unauthorized { ref error, .. } if error == "invalid_auth"));
    }

    #[test]
    fn test_check_ok_maps_other_errors() {
        let err = check_ok(
            "conversations.history",
            &json!({"ok": false, "error": "channel_not_found"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
        assert!(matches!(err, SlackError::Api { .. }));

        let err = check_ok("conversations.history", &json!({})).unwrap_err();
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_history_page_parsing() {
        let page: HistoryPage = serde_json::from_value(json!({
            "ok": true,
            "messages": [
                {"type": "message", "user": "U1", "text": "kudos to <@U2>!", "ts": "1735689600.000100"},
                {"type": "message", "subtype": "bot_message", "text": "reminder", "ts": "1735689700.000200"}
            ],
            "has_more": true,
            "response_metadata": {"next_cursor": "bmV4dA=="}
        }))
        .unwrap();

        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].user.as_deref(), Some("U1"));
        assert!(page.messages[1].user.is_none());
        assert!(page.has_more);
        assert_eq!(
            page.response_metadata.unwrap().next_cursor.as_deref(),
            Some("bmV4dA==")
        );
    }

    #[test]
    fn test_history_cache_key_depends_on_range() {
        let a = SlackClient::history_cache_key("C1", Some("1700000000"), None).unwrap();
        let b = SlackClient::history_cache_key("C1", Some("1700000000"), None).unwrap();
        let c = SlackClient::history_cache_key("C1", None, Some("1700000000")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("slack_history_"));
    }

    #[tokio::test]
    async fn test_history_served_from_cache_without_network() {
        let (cache, _temp_dir) = create_test_cache();
        let cached = vec![message("U1", "thanks <@U2> for the release", "1735689600.000100")];
        let key = SlackClient::history_cache_key("C123", Some("1735000000"), None).unwrap();
        cache.save(&key, &cached).unwrap();

        let client = SlackClient::new("xoxb-test", cache).with_base_url(UNREACHABLE);
        let result = client
            .conversation_history("C123", Some("1735000000"), None)
            .await
            .expect("Should be served from cache");

        assert_eq!(result, cached);
    }

    #[tokio::test]
    async fn test_user_served_from_cache_without_network() {
        let (cache, _temp_dir) = create_test_cache();
        let user = SlackUser {
            id: "U2".to_string(),
            name: "alice".to_string(),
            real_name: Some("Alice Doe".to_string()),
            deleted: false,
        };
        cache
            .save(&SlackClient::user_cache_key("U2").unwrap(), &user)
            .unwrap();

        let client = SlackClient::new("xoxb-test", cache).with_base_url(UNREACHABLE);
        assert_eq!(client.user_info("U2").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_suppressed() {
        let (cache, _temp_dir) = create_test_cache();
        let client = SlackClient::new("xoxb-test", cache.clone()).with_base_url(UNREACHABLE);

        let result = client.conversation_history("C999", None, None).await;

        assert!(matches!(result, Err(SlackError::Http(_))));
        let key = SlackClient::history_cache_key("C999", None, None).unwrap();
        assert!(cache.load::<Vec<SlackMessage>>(&key, None).is_none());
    }
}
