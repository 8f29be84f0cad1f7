//! Azure DevOps REST client for repository and pipeline creation.
//!
//! Every call is authenticated with HTTP Basic: empty username, the access
//! token as password. No call is retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProvisionConfig;
use crate::credential::CredentialContext;
use crate::error::{ProvisionError, Result};
use crate::http::{build_client, ResponseParts};
use crate::source_control::{CreatedPipeline, PipelineDefinition, RemoteRepository, SourceControlApi};

#[derive(Debug, Serialize)]
struct CreateRepositoryBody<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    project: Option<ProjectResponse>,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    remote_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    #[serde(default)]
    id: String,
}

/// Client for the Azure DevOps git and pipelines APIs.
pub struct AzureDevOpsClient {
    config: ProvisionConfig,
    http_client: reqwest::Client,
}

impl AzureDevOpsClient {
    pub fn new(config: ProvisionConfig) -> Result<Self> {
        let http_client = build_client(config.http_timeout())?;
        Ok(AzureDevOpsClient {
            config,
            http_client,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        credential: &CredentialContext,
    ) -> std::result::Result<ResponseParts, reqwest::Error> {
        debug!(url = %url, "POST");
        let response = self
            .http_client
            .post(url)
            .basic_auth("", Some(credential.token()))
            .json(body)
            .send()
            .await?;
        Ok(ResponseParts::read(response).await)
    }
}

#[async_trait]
impl SourceControlApi for AzureDevOpsClient {
    async fn create_repository(
        &self,
        project: &str,
        name: &str,
        credential: &CredentialContext,
    ) -> Result<RemoteRepository> {
        let url = self.config.repositories_endpoint(project);
        let parts = self
            .post_json(&url, &CreateRepositoryBody { name }, credential)
            .await
            .map_err(|e| ProvisionError::AuthOrApi {
                status: None,
                body: e.to_string(),
            })?;

        if !parts.status.is_success() || parts.html {
            return Err(ProvisionError::AuthOrApi {
                status: Some(parts.status.as_u16()),
                body: parts.body,
            });
        }

        let unexpected = |reason: String| ProvisionError::AuthOrApi {
            status: Some(parts.status.as_u16()),
            body: reason,
        };
        let repo: RepositoryResponse = serde_json::from_str(&parts.body)
            .map_err(|e| unexpected(format!("unexpected repository response ({e}): {}", parts.body)))?;
        let project_id = repo.project.map(|p| p.id).unwrap_or_default();
        if repo.id.is_empty() || project_id.is_empty() {
            return Err(unexpected(format!(
                "repository response is missing its identity: {}",
                parts.body
            )));
        }

        Ok(RemoteRepository {
            id: repo.id,
            project_id,
            name: if repo.name.is_empty() {
                name.to_string()
            } else {
                repo.name
            },
            default_branch_ref: repo
                .default_branch
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| self.config.default_branch.clone()),
            remote_url: repo.remote_url.unwrap_or_default(),
        })
    }

    async fn create_pipeline(
        &self,
        project: &str,
        definition: &PipelineDefinition,
        credential: &CredentialContext,
    ) -> Result<CreatedPipeline> {
        let url = self.config.pipelines_endpoint(project);
        let parts = self
            .post_json(&url, definition, credential)
            .await
            .map_err(|e| ProvisionError::Registration {
                status: None,
                body: e.to_string(),
            })?;

        if !parts.status.is_success() || parts.html {
            return Err(ProvisionError::Registration {
                status: Some(parts.status.as_u16()),
                body: parts.body,
            });
        }

        serde_json::from_str(&parts.body).map_err(|e| ProvisionError::Registration {
            status: Some(parts.status.as_u16()),
            body: format!("unexpected pipeline response ({e}): {}", parts.body),
        })
    }
}
