//! JSON-over-HTTP client on `reqwest::blocking`.
//!
//! Calls block the calling thread; the engine only makes them from worker
//! threads. Route segments are appended to the configured base URL with
//! their own percent-encoding, never by string concatenation.

#![allow(missing_docs)]

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::ApplicationApi;
use crate::core::config::ApiConfig;
use crate::core::errors::{DeskError, Result};
use crate::model::application::{
    ApiResponse, ApplicationCounts, ApplicationDetail, ApplicationRecord, UserPendingCount,
};
use crate::model::section::Stage;
use crate::model::users::{LoginResponse, NewUser, UserAccount};

/// [`ApplicationApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            DeskError::InvalidConfig {
                details: format!("api.base_url {:?} is not a URL: {e}", config.base_url),
            }
        })?;
        if base.cannot_be_a_base() {
            return Err(DeskError::InvalidConfig {
                details: format!("api.base_url {:?} cannot carry a path", config.base_url),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| DeskError::Runtime {
                details: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, base })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request_json<T: DeserializeOwned>(&self, route: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().map_err(|e| DeskError::Transport {
            endpoint: route.to_string(),
            details: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().map_err(|e| DeskError::Transport {
            endpoint: route.to_string(),
            details: format!("failed to read response body: {e}"),
        })?;
        decode_response(route, status, &body)
    }
}

impl ApplicationApi for HttpApi {
    fn login(&self, name: &str) -> Result<LoginResponse> {
        let request = self
            .client
            .post(self.endpoint(&["login"]))
            .json(&serde_json::json!({ "name": name }));
        self.request_json("/login", request)
    }

    fn fetch_applications(&self, stage: &Stage) -> Result<ApiResponse<Vec<ApplicationRecord>>> {
        let request = self
            .client
            .get(self.endpoint(&["applications"]))
            .query(&[("status", stage.as_str())]);
        self.request_json("/applications", request)
    }

    fn fetch_application_counts(&self) -> Result<ApiResponse<ApplicationCounts>> {
        let request = self.client.get(self.endpoint(&["applications", "counts"]));
        self.request_json("/applications/counts", request)
    }

    fn fetch_user_pending_count(&self, user: &str) -> Result<UserPendingCount> {
        let request = self
            .client
            .get(self.endpoint(&["users", user, "pending-count"]));
        self.request_json("/users/pending-count", request)
    }

    fn fetch_application_details(
        &self,
        app_number: &str,
        user: &str,
    ) -> Result<ApiResponse<ApplicationDetail>> {
        let request = self
            .client
            .get(self.endpoint(&["applications", app_number]))
            .query(&[("user", user)]);
        self.request_json("/applications/details", request)
    }

    fn list_users(&self) -> Result<ApiResponse<Vec<UserAccount>>> {
        let request = self.client.get(self.endpoint(&["users"]));
        self.request_json("/users", request)
    }

    fn add_user(&self, user: &NewUser) -> Result<ApiResponse<Value>> {
        let request = self.client.post(self.endpoint(&["users"])).json(user);
        self.request_json("/users", request)
    }

    fn delete_user(&self, name: &str) -> Result<ApiResponse<Value>> {
        let request = self.client.delete(self.endpoint(&["users", name]));
        self.request_json("/users/delete", request)
    }
}

// ──────────────────── response decoding ────────────────────

/// Non-2xx responses that still carry a `{success, ...}` envelope are
/// returned as the envelope so callers see the server's message.
fn decode_response<T: DeserializeOwned>(endpoint: &str, status: StatusCode, body: &str) -> Result<T> {
    if status.is_success() {
        return Ok(serde_json::from_str(body)?);
    }
    let parsed = serde_json::from_str::<Value>(body).ok();
    if let Some(value) = parsed.as_ref().filter(|v| v.get("success").is_some())
        && let Ok(envelope) = serde_json::from_value::<T>(value.clone())
    {
        return Ok(envelope);
    }
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string);
    Err(DeskError::Server {
        endpoint: endpoint.to_string(),
        message,
    })
}
