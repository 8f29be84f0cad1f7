//! Source-control host seam: repository and pipeline creation.
//!
//! The trait is async and backend-agnostic. `AzureDevOpsClient` talks to the
//! real REST API; `fakes::MemorySourceControl` is used in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credential::CredentialContext;
use crate::error::Result;

/// A repository created on the source-control host.
///
/// `id` and `project_id` are assigned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub default_branch_ref: String,
    /// Clone URL reported by the host (may be empty)
    pub remote_url: String,
}

/// Project reference inside a pipeline repository binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
}

/// Repository a pipeline definition is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRepository {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub repository_type: String,
    pub project: ProjectRef,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// `configuration` block of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    #[serde(rename = "type")]
    pub source_type: String,
    pub path: String,
    pub repository: PipelineRepository,
}

/// Request body of the pipeline creation API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub folder: String,
    pub configuration: PipelineConfiguration,
}

impl PipelineDefinition {
    /// YAML pipeline named after `repository`, bound to it by host identity.
    pub fn for_repository(
        repository: &RemoteRepository,
        yaml_path: &str,
        folder: &str,
        branch_ref: &str,
    ) -> Self {
        PipelineDefinition {
            name: repository.name.clone(),
            folder: folder.to_string(),
            configuration: PipelineConfiguration {
                source_type: "yaml".to_string(),
                path: yaml_path.to_string(),
                repository: PipelineRepository {
                    id: repository.id.clone(),
                    name: repository.name.clone(),
                    repository_type: "azureReposGit".to_string(),
                    project: ProjectRef {
                        id: repository.project_id.clone(),
                    },
                    git_ref: branch_ref.to_string(),
                },
            },
        }
    }
}

/// Pipeline as returned by the host after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPipeline {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Operations against the source-control host.
#[async_trait]
pub trait SourceControlApi: Send + Sync {
    /// Create an empty repository in `project`.
    ///
    /// Non-success and HTML responses fail with `ProvisionError::AuthOrApi`.
    async fn create_repository(
        &self,
        project: &str,
        name: &str,
        credential: &CredentialContext,
    ) -> Result<RemoteRepository>;

    /// Create a pipeline definition in `project`.
    ///
    /// Non-success responses fail with `ProvisionError::Registration`.
    async fn create_pipeline(
        &self,
        project: &str,
        definition: &PipelineDefinition,
        credential: &CredentialContext,
    ) -> Result<CreatedPipeline>;
}
