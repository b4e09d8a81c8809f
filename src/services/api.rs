use crate::session::SessionContext;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Create the HTTP client shared by the remote boundaries.
///
/// Request timeouts live here rather than in the pipeline.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("moodtune/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Base URL plus the session used to authorise requests.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionContext>,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: &str, session: Arc<SessionContext>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(self.endpoint(path));
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Send `request` and decode a JSON body. Errors are plain messages, ready to
/// be wrapped in the caller's error category.
pub async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> std::result::Result<T, String> {
    let response = request
        .send()
        .await
        .map_err(|e| format!("Could not reach the server: {e}"))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("Failed to read response: {e}"))?;

    if !status.is_success() {
        return Err(error_message(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| format!("Malformed response: {e}"))
}

pub fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if !err.error.trim().is_empty() => err.error,
        _ => format!("Request failed with status {status}"),
    }
}
