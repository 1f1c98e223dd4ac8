//! HTTP JSON provider.
//!
//! One provider instance wraps one upstream endpoint. Responses are parsed
//! into an item payload when the body carries an item array, and fall back
//! to a table payload for structured non-item documents such as index
//! quote maps.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::{FetchError, Item, Payload};

use super::{FetchQuery, Provider};

/// Quota marker some upstreams put in the response body alongside a 200
/// or 429 status.
const QUOTA_CODE: &str = "rateLimited";

/// Provider fetching JSON over HTTP.
pub struct HttpJsonProvider {
    id: String,
    url: String,
    client: reqwest::Client,
}

impl HttpJsonProvider {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Classify a non-success HTTP status.
    fn classify_status(status: reqwest::StatusCode, body: &str) -> FetchError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            // A throttle is transient unless the body says the daily quota
            // is gone
            if body.contains(QUOTA_CODE) {
                return FetchError::QuotaExhausted(format!("upstream reported {QUOTA_CODE}"));
            }
            return FetchError::Transient("upstream throttled the request (429)".into());
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return FetchError::Permanent(format!("upstream rejected credentials: {status}"));
        }
        if status.is_server_error() {
            return FetchError::Transient(format!("upstream server error: {status}"));
        }
        FetchError::Permanent(format!("upstream returned {status}"))
    }

    /// Parse a response body into a payload.
    ///
    /// Accepted shapes: a bare array of items, an object with an `items`
    /// or `articles` array, or any other JSON document as a table.
    fn parse_body(&self, body: &str) -> Result<Payload, FetchError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| FetchError::Permanent(format!("response is not valid JSON: {e}")))?;

        if let Some(code) = value.get("code").and_then(Value::as_str) {
            if code == QUOTA_CODE {
                return Err(FetchError::QuotaExhausted(format!(
                    "upstream reported {QUOTA_CODE}"
                )));
            }
        }

        let items_value = if value.is_array() {
            Some(&value)
        } else {
            value.get("items").or_else(|| value.get("articles"))
        };

        match items_value {
            Some(array) => {
                let items: Vec<Item> = serde_json::from_value(array.clone()).map_err(|e| {
                    FetchError::Permanent(format!("item array has unexpected shape: {e}"))
                })?;
                Ok(Payload::Items(items))
            }
            None => Ok(Payload::Table(value)),
        }
    }
}

#[async_trait]
impl Provider for HttpJsonProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Payload, FetchError> {
        debug!(provider = %self.id, url = %self.url, hours_back = query.hours_back, "Fetching");

        let response = self
            .client
            .get(&self.url)
            .query(&[("hours", query.hours_back.to_string())])
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }

        self.parse_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> HttpJsonProvider {
        HttpJsonProvider::new("newsapi", "https://example.test/news")
    }

    #[test]
    fn test_parse_bare_item_array() {
        let payload = provider()
            .parse_body(r#"[{"title": "RBI holds rates", "source": "newsapi"}]"#)
            .unwrap();
        match payload {
            Payload::Items(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].title, "RBI holds rates");
            }
            other => panic!("expected items, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_wrapped_articles() {
        let payload = provider()
            .parse_body(r#"{"status": "ok", "articles": [{"title": "Sensex gains"}]}"#)
            .unwrap();
        assert_eq!(payload.items().map(|i| i.len()), Some(1));
    }

    #[test]
    fn test_parse_non_item_document_as_table() {
        let payload = provider()
            .parse_body(r#"{"nifty": 24500.1, "sensex": 80123.4}"#)
            .unwrap();
        assert!(matches!(payload, Payload::Table(_)));
    }

    #[test]
    fn test_quota_code_in_body() {
        let err = provider()
            .parse_body(r#"{"code": "rateLimited", "message": "daily cap reached"}"#)
            .unwrap_err();
        assert!(matches!(err, FetchError::QuotaExhausted(_)));
    }

    #[test]
    fn test_invalid_json_is_permanent() {
        let err = provider().parse_body("<html>oops</html>").unwrap_err();
        assert!(matches!(err, FetchError::Permanent(_)));
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;

        assert!(matches!(
            HttpJsonProvider::classify_status(StatusCode::UNAUTHORIZED, ""),
            FetchError::Permanent(_)
        ));
        assert!(matches!(
            HttpJsonProvider::classify_status(StatusCode::BAD_GATEWAY, ""),
            FetchError::Transient(_)
        ));
        assert!(matches!(
            HttpJsonProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            FetchError::Transient(_)
        ));
        assert!(matches!(
            HttpJsonProvider::classify_status(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"code": "rateLimited"}"#
            ),
            FetchError::QuotaExhausted(_)
        ));
        assert!(matches!(
            HttpJsonProvider::classify_status(StatusCode::NOT_FOUND, ""),
            FetchError::Permanent(_)
        ));
    }
}
