//! ArgoCD REST client.
//!
//! Authenticates with the bearer token carried by the request, which is
//! distinct from the source-control token.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::delivery::{ApplicationManifest, DeliveryController};
use crate::error::{ProvisionError, Result};
use crate::http::{build_client, ResponseParts};
use crate::request::GitOpsTarget;

/// Client for `POST /api/v1/applications`.
pub struct ArgoCdClient {
    http_client: reqwest::Client,
}

impl ArgoCdClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(ArgoCdClient {
            http_client: build_client(timeout)?,
        })
    }

    /// Applications endpoint under a controller base URL.
    pub fn applications_endpoint(argocd_url: &str) -> String {
        format!("{}/api/v1/applications", argocd_url.trim().trim_end_matches('/'))
    }
}

#[async_trait]
impl DeliveryController for ArgoCdClient {
    async fn create_application(
        &self,
        target: &GitOpsTarget,
        manifest: &ApplicationManifest,
    ) -> Result<()> {
        let url = Self::applications_endpoint(&target.argocd_url);
        debug!(url = %url, application = %manifest.metadata.name, "POST");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&target.argocd_token)
            .json(manifest)
            .send()
            .await
            .map_err(|e| ProvisionError::Registration {
                status: None,
                body: e.to_string(),
            })?;

        let parts = ResponseParts::read(response).await;
        if !parts.status.is_success() {
            return Err(ProvisionError::Registration {
                status: Some(parts.status.as_u16()),
                body: parts.body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applications_endpoint() {
        assert_eq!(
            ArgoCdClient::applications_endpoint("https://argocd.example.com/"),
            "https://argocd.example.com/api/v1/applications"
        );
        assert_eq!(
            ArgoCdClient::applications_endpoint("http://localhost:8080"),
            "http://localhost:8080/api/v1/applications"
        );
    }
}
