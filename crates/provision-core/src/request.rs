//! Provisioning request: the immutable input of one workflow run.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};

/// Kind of repository provisioned in pipeline mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RepoType {
    Application,
    Infrastructure,
}

impl RepoType {
    pub fn name(&self) -> &'static str {
        match self {
            RepoType::Application => "application",
            RepoType::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for RepoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RepoType {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "application" | "app" => Ok(RepoType::Application),
            "infrastructure" | "infra" => Ok(RepoType::Infrastructure),
            other => Err(ProvisionError::Config(format!(
                "unknown repository type '{other}' (expected application or infrastructure)"
            ))),
        }
    }
}

/// GitOps controller endpoint and its bearer token.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitOpsTarget {
    pub argocd_url: String,
    pub argocd_token: String,
}

impl std::fmt::Debug for GitOpsTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitOpsTarget")
            .field("argocd_url", &self.argocd_url)
            .field("argocd_token", &"***")
            .finish()
    }
}

/// How the new repository is wired into delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Create a CI pipeline bound to the repository.
    Pipeline { repo_type: RepoType },
    /// Submit an application manifest to the GitOps controller.
    #[serde(rename = "gitops")]
    GitOps(GitOpsTarget),
}

impl DeliveryMode {
    /// Repository type, when one applies to this mode.
    pub fn repo_type(&self) -> Option<RepoType> {
        match self {
            DeliveryMode::Pipeline { repo_type } => Some(*repo_type),
            DeliveryMode::GitOps(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeliveryMode::Pipeline { .. } => "pipeline",
            DeliveryMode::GitOps(_) => "gitops",
        }
    }
}

/// Input of one provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub project_name: String,
    pub repo_name: String,
    #[serde(flatten)]
    pub mode: DeliveryMode,
}

impl ProvisioningRequest {
    pub fn pipeline(project_name: &str, repo_name: &str, repo_type: RepoType) -> Self {
        Self {
            project_name: project_name.to_string(),
            repo_name: repo_name.to_string(),
            mode: DeliveryMode::Pipeline { repo_type },
        }
    }

    pub fn gitops(project_name: &str, repo_name: &str, argocd_url: &str, argocd_token: &str) -> Self {
        Self {
            project_name: project_name.to_string(),
            repo_name: repo_name.to_string(),
            mode: DeliveryMode::GitOps(GitOpsTarget {
                argocd_url: argocd_url.to_string(),
                argocd_token: argocd_token.to_string(),
            }),
        }
    }

    /// Check every required field before any side effect.
    pub fn validate(&self) -> Result<()> {
        require("project name", &self.project_name)?;
        require("repository name", &self.repo_name)?;

        let project = self.project_name.trim();
        if project.chars().any(breaks_url_path) {
            return Err(ProvisionError::Config(format!(
                "project name '{}' must not contain '/', '\\', '?', '#' or '%'",
                self.project_name
            )));
        }

        let repo = self.repo_name.trim();
        if repo.starts_with('.')
            || repo
                .chars()
                .any(|c| breaks_url_path(c) || c.is_whitespace())
        {
            return Err(ProvisionError::Config(format!(
                "repository name '{}' is not a valid repository name",
                self.repo_name
            )));
        }

        if let DeliveryMode::GitOps(target) = &self.mode {
            require("ArgoCD URL", &target.argocd_url)?;
            require("ArgoCD token", &target.argocd_token)?;
            match Url::parse(target.argocd_url.trim()) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ProvisionError::Config(format!(
                        "ArgoCD URL '{}' is not an http(s) URL",
                        target.argocd_url
                    )))
                }
            }
        }

        Ok(())
    }
}

/// Characters that would end or re-scope a URL path segment.
fn breaks_url_path(c: char) -> bool {
    matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control()
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProvisionError::Config(format!("{field} is required")));
    }
    Ok(())
}
