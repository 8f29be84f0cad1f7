//! GitOps delivery-controller seam and the application manifest it accepts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GitOpsDefaults;
use crate::error::Result;
use crate::request::GitOpsTarget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    pub path: String,
    pub target_revision: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDestination {
    pub server: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedSync {
    pub prune: bool,
    pub self_heal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    pub automated: AutomatedSync,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub project: String,
    pub source: ApplicationSource,
    pub destination: ApplicationDestination,
    pub sync_policy: SyncPolicy,
}

/// Application resource submitted to the GitOps controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationManifest {
    pub metadata: ApplicationMetadata,
    pub spec: ApplicationSpec,
}

impl ApplicationManifest {
    /// Manifest tracking `repo_url` with automated prune and self-heal.
    ///
    /// `metadata.name` comes from `defaults.application_name`, not from the
    /// repository: registering a second repository against the same
    /// controller collides on that name.
    pub fn new(repo_url: &str, defaults: &GitOpsDefaults) -> Self {
        ApplicationManifest {
            metadata: ApplicationMetadata {
                name: defaults.application_name.clone(),
                namespace: defaults.application_namespace.clone(),
            },
            spec: ApplicationSpec {
                project: defaults.project.clone(),
                source: ApplicationSource {
                    repo_url: repo_url.to_string(),
                    path: defaults.source_path.clone(),
                    target_revision: defaults.target_revision.clone(),
                },
                destination: ApplicationDestination {
                    server: defaults.destination_server.clone(),
                    namespace: defaults.destination_namespace.clone(),
                },
                sync_policy: SyncPolicy {
                    automated: AutomatedSync {
                        prune: true,
                        self_heal: true,
                    },
                },
            },
        }
    }
}

/// Operations against the GitOps delivery controller.
#[async_trait]
pub trait DeliveryController: Send + Sync {
    /// Submit `manifest` to the controller at `target.argocd_url`.
    ///
    /// Non-success responses fail with `ProvisionError::Registration`.
    async fn create_application(
        &self,
        target: &GitOpsTarget,
        manifest: &ApplicationManifest,
    ) -> Result<()>;
}
