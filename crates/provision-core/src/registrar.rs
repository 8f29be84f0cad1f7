//! Delivery Registrar: binds a pushed repository to CI or to GitOps.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{GitOpsDefaults, ProvisionConfig};
use crate::credential::{redact_url, CredentialContext};
use crate::delivery::{ApplicationManifest, DeliveryController};
use crate::error::Result;
use crate::request::GitOpsTarget;
use crate::source_control::{CreatedPipeline, PipelineDefinition, RemoteRepository, SourceControlApi};

/// What was registered for a new repository. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryRegistration {
    Pipeline {
        definition: PipelineDefinition,
        pipeline: CreatedPipeline,
    },
    Application {
        controller_url: String,
        manifest: ApplicationManifest,
    },
}

impl DeliveryRegistration {
    /// Copy safe to print: credentials stripped from the manifest source URL.
    pub fn redacted(&self) -> Self {
        match self {
            DeliveryRegistration::Pipeline { .. } => self.clone(),
            DeliveryRegistration::Application {
                controller_url,
                manifest,
            } => {
                let mut manifest = manifest.clone();
                manifest.spec.source.repo_url = redact_url(&manifest.spec.source.repo_url);
                DeliveryRegistration::Application {
                    controller_url: controller_url.clone(),
                    manifest,
                }
            }
        }
    }
}

/// Registers repositories with the CI system or the GitOps controller.
pub struct DeliveryRegistrar {
    source_control: Arc<dyn SourceControlApi>,
    controller: Arc<dyn DeliveryController>,
    pipeline_yaml_path: String,
    pipeline_folder: String,
    branch_ref: String,
    gitops: GitOpsDefaults,
}

impl DeliveryRegistrar {
    pub fn new(
        source_control: Arc<dyn SourceControlApi>,
        controller: Arc<dyn DeliveryController>,
        config: &ProvisionConfig,
    ) -> Self {
        DeliveryRegistrar {
            source_control,
            controller,
            pipeline_yaml_path: config.pipeline_yaml_path.clone(),
            pipeline_folder: config.pipeline_folder.clone(),
            branch_ref: config.default_branch.clone(),
            gitops: config.gitops.clone(),
        }
    }

    /// Pipeline definition that would be submitted for `repository`.
    pub fn pipeline_definition(&self, repository: &RemoteRepository) -> PipelineDefinition {
        PipelineDefinition::for_repository(
            repository,
            &self.pipeline_yaml_path,
            &self.pipeline_folder,
            &self.branch_ref,
        )
    }

    /// Application manifest that would be submitted for `repo_url`.
    pub fn application_manifest(&self, repo_url: &str) -> ApplicationManifest {
        ApplicationManifest::new(repo_url, &self.gitops)
    }

    /// Create a YAML pipeline bound to `repository` by its host identity.
    pub async fn register_pipeline(
        &self,
        project_name: &str,
        repository: &RemoteRepository,
        credential: &CredentialContext,
    ) -> Result<DeliveryRegistration> {
        let definition = self.pipeline_definition(repository);
        info!(
            pipeline = %definition.name,
            repository_id = %repository.id,
            path = %definition.configuration.path,
            git_ref = %definition.configuration.repository.git_ref,
            "Creating pipeline"
        );

        let pipeline = self
            .source_control
            .create_pipeline(project_name, &definition, credential)
            .await?;
        info!(pipeline_id = pipeline.id, "Pipeline created");

        Ok(DeliveryRegistration::Pipeline {
            definition,
            pipeline,
        })
    }

    /// Submit an application manifest tracking `repo_url`.
    ///
    /// `repo_url` is the same authenticated URL the content was pushed to.
    pub async fn register_application(
        &self,
        target: &GitOpsTarget,
        repo_url: &str,
    ) -> Result<DeliveryRegistration> {
        let manifest = self.application_manifest(repo_url);
        info!(
            controller = %target.argocd_url,
            application = %manifest.metadata.name,
            source = %redact_url(repo_url),
            "Submitting application manifest"
        );

        self.controller.create_application(target, &manifest).await?;
        info!(application = %manifest.metadata.name, "Application registered");

        Ok(DeliveryRegistration::Application {
            controller_url: target.argocd_url.clone(),
            manifest,
        })
    }
}
