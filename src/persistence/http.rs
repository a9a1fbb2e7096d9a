//! HTTP run store client.
//!
//! Speaks the `/api/escape-runs` JSON API served by `escaperoom store serve`.
//! Every request is bounded by a timeout; non-2xx responses are mapped to
//! [`PersistenceError`] using the `{"error": ...}` body when present.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url, redirect};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::PersistenceError;

use super::{NewRun, RenameRequest, RunStore, SavedRun};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest response body accepted from the store.
const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

/// Remote [`RunStore`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpStore {
    /// Creates a client for the store at `base_url`.
    ///
    /// Redirects are not followed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidInput`] if `base_url` is not an
    /// http(s) URL, or [`PersistenceError::Network`] if the client cannot be
    /// built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PersistenceError> {
        let base = Url::parse(base_url)
            .map_err(|e| PersistenceError::InvalidInput(format!("invalid store URL '{base_url}': {e}")))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(PersistenceError::InvalidInput(format!(
                "store URL must be http(s): {base_url}"
            )));
        }

        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    /// Base URL of the store.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, id: Option<&str>) -> Result<Url, PersistenceError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                PersistenceError::InvalidInput(format!("store URL cannot be a base: {}", self.base))
            })?;
            segments.pop_if_empty().extend(["api", "escape-runs"]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T, PersistenceError> {
        debug!(%method, %url, "store request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| PersistenceError::Timeout)?
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        let status = response.status();
        let bytes = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| PersistenceError::Timeout)?
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        if bytes.len() > MAX_RESPONSE_SIZE {
            return Err(PersistenceError::InvalidResponse(format!(
                "response body exceeds {MAX_RESPONSE_SIZE} byte limit"
            )));
        }

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes).map_or_else(
                |_| String::from_utf8_lossy(&bytes).trim().to_string(),
                |body| body.error,
            );
            return Err(if status == reqwest::StatusCode::NOT_FOUND {
                PersistenceError::NotFound(message)
            } else {
                PersistenceError::HttpStatus {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::InvalidResponse(e.to_string()))
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, PersistenceError> {
    serde_json::to_value(value).map_err(|e| PersistenceError::InvalidInput(e.to_string()))
}

fn not_found_as(id: &str) -> impl FnOnce(PersistenceError) -> PersistenceError + '_ {
    move |e| match e {
        PersistenceError::NotFound(_) => PersistenceError::NotFound(id.to_string()),
        other => other,
    }
}

#[async_trait]
impl RunStore for HttpStore {
    async fn create(&self, run: NewRun) -> Result<SavedRun, PersistenceError> {
        let url = self.endpoint(None)?;
        self.send(Method::POST, url, Some(to_body(&run)?)).await
    }

    async fn list(
        &self,
        scenario_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SavedRun>, PersistenceError> {
        let mut url = self.endpoint(None)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(scenario_id) = scenario_id {
                query.append_pair("scenarioId", scenario_id);
            }
            query.append_pair("limit", &limit.to_string());
        }
        self.send(Method::GET, url, None).await
    }

    async fn get(&self, id: &str) -> Result<SavedRun, PersistenceError> {
        let url = self.endpoint(Some(id))?;
        self.send(Method::GET, url, None)
            .await
            .map_err(not_found_as(id))
    }

    async fn rename(
        &self,
        id: &str,
        display_name: Option<String>,
    ) -> Result<SavedRun, PersistenceError> {
        let url = self.endpoint(Some(id))?;
        let body = to_body(&RenameRequest { display_name })?;
        self.send(Method::PATCH, url, Some(body))
            .await
            .map_err(not_found_as(id))
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let url = self.endpoint(Some(id))?;
        self.send::<serde_json::Value>(Method::DELETE, url, None)
            .await
            .map(|_| ())
            .map_err(not_found_as(id))
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            HttpStore::new("not a url", DEFAULT_TIMEOUT),
            Err(PersistenceError::InvalidInput(_))
        ));
        assert!(matches!(
            HttpStore::new("ftp://runs.example", DEFAULT_TIMEOUT),
            Err(PersistenceError::InvalidInput(_))
        ));
    }

    #[test]
    fn endpoint_joins_paths() {
        let store = HttpStore::new("http://127.0.0.1:8080", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            store.endpoint(None).unwrap().as_str(),
            "http://127.0.0.1:8080/api/escape-runs"
        );

        let nested = HttpStore::new("http://host/prefix/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            nested.endpoint(Some("a b")).unwrap().as_str(),
            "http://host/prefix/api/escape-runs/a%20b"
        );
    }

    #[tokio::test]
    async fn unreachable_store_is_network_error() {
        // Port 9 (discard) is closed on test hosts.
        let store = HttpStore::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = store.list(Some("x"), 10).await.unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Network(_) | PersistenceError::Timeout
        ));
    }
}
