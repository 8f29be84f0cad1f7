//! Shared HTTP plumbing for the REST clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::error::{ProvisionError, Result};

const USER_AGENT: &str = concat!("repo-provision/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used by every REST seam.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ProvisionError::Config(format!("failed to build HTTP client: {e}")))
}

/// Status, content-type class, and body of a completed response.
#[derive(Debug)]
pub(crate) struct ResponseParts {
    pub status: StatusCode,
    pub html: bool,
    pub body: String,
}

impl ResponseParts {
    pub async fn read(response: reqwest::Response) -> Self {
        let status = response.status();
        let html = is_html(response.headers());
        let body = response.text().await.unwrap_or_default();
        ResponseParts { status, html, body }
    }
}

/// Whether the response carries an HTML payload.
///
/// The source-control host answers unauthenticated API calls with a sign-in
/// page rather than a JSON error.
pub(crate) fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
}
