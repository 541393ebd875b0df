//! HTTP client and analysis services for deepscan.
//!
//! Provides a minimal client for the prediction and history endpoints, the
//! [`AnalysisService`] seam with mock and HTTP implementations, history stores,
//! and [`AnalysisSession`], which drives the analysis workflow. The CLI uses
//! this crate directly.

pub mod history;
pub mod mock;
pub mod predict;
pub mod progress;
pub mod remote_history;
pub mod service;
pub mod session;

use deepscan_core::error::GENERIC_ANALYSIS_FAILURE;
use deepscan_core::{AppError, ClientConfig};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the analysis service.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, AppError> {
        Self::new(config.api_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = self.build_url(path);
        let mut request = self.client.get(&url);

        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(transport_error)?;
        decode_json(check_status(response, NotFoundAs::Missing).await?).await
    }

    /// POST multipart form and deserialize response.
    ///
    /// Every non-2xx status, 404 included, is a transport failure.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, AppError> {
        let url = self.build_url(path);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        decode_json(check_status(response, NotFoundAs::Transport).await?).await
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str) -> Result<(), AppError> {
        let url = self.build_url(path);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response, NotFoundAs::Missing).await?;
        Ok(())
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    tracing::warn!(error = %err, "Request to analysis service failed");
    if err.is_timeout() {
        AppError::transport("Request to analysis service timed out")
    } else if err.is_connect() {
        AppError::transport("Could not connect to analysis service")
    } else {
        AppError::transport(err.to_string())
    }
}

/// How a 404 is reported: a missing resource on lookups, a failed call on submissions.
#[derive(Clone, Copy, PartialEq, Eq)]
enum NotFoundAs {
    Missing,
    Transport,
}

async fn check_status(response: Response, not_found: NotFoundAs) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message_from_body(&body);
    tracing::debug!(status = %status, message = ?message, "Analysis service returned an error");

    if status == StatusCode::NOT_FOUND && not_found == NotFoundAs::Missing {
        return Err(AppError::NotFound(
            message.unwrap_or_else(|| "Analysis not found".to_string()),
        ));
    }

    Err(AppError::transport_with_status(
        message.unwrap_or_else(|| GENERIC_ANALYSIS_FAILURE.to_string()),
        status.as_u16(),
    ))
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let body = response.bytes().await.map_err(transport_error)?;
    Ok(serde_json::from_slice(&body)?)
}

/// Error text from a failed response: `detail`, then `message`, then the raw body.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                    return Some(s.clone())
                }
                Some(serde_json::Value::Null) | None => {}
                Some(other) => return Some(other.to_string()),
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// Re-export the main seams for convenience.
pub use history::{HistoryStore, InMemoryHistory};
pub use mock::{MockAnalysisService, MockConfig};
pub use predict::HttpAnalysisService;
pub use progress::{ProgressReceiver, ProgressReporter};
pub use remote_history::RemoteHistory;
pub use service::AnalysisService;
pub use session::AnalysisSession;
