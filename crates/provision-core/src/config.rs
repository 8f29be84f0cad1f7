//! Workflow configuration: endpoints, templates, and fixed registration values.
//!
//! Defaults describe the standard organization layout. `from_env` overlays
//! `PROVISION_*` environment variables; `from_file` loads a JSON document in
//! which every field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};
use crate::request::RepoType;

/// Template repositories, one per repository kind.
///
/// An entry is either a bare repository name inside `project`, or a full
/// location (URL or filesystem path) used verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TemplateCatalog {
    pub project: String,
    pub application: String,
    pub infrastructure: String,
    pub gitops: String,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        TemplateCatalog {
            project: "Templates".to_string(),
            application: "template-application".to_string(),
            infrastructure: "template-infrastructure".to_string(),
            gitops: "template-gitops".to_string(),
        }
    }
}

impl TemplateCatalog {
    fn entry(&self, repo_type: Option<RepoType>) -> &str {
        match repo_type {
            Some(RepoType::Application) => &self.application,
            Some(RepoType::Infrastructure) => &self.infrastructure,
            None => &self.gitops,
        }
    }
}

/// Identity used for the single initial commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        CommitIdentity {
            name: "Repository Provisioner".to_string(),
            email: "provisioner@localhost".to_string(),
            message: "Initial commit".to_string(),
        }
    }
}

/// Fixed values of the GitOps application manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitOpsDefaults {
    /// `metadata.name`; a fixed literal, not derived from the repository name
    pub application_name: String,
    pub application_namespace: String,
    pub project: String,
    pub source_path: String,
    pub target_revision: String,
    pub destination_server: String,
    pub destination_namespace: String,
}

impl Default for GitOpsDefaults {
    fn default() -> Self {
        GitOpsDefaults {
            application_name: "provisioned-application".to_string(),
            application_namespace: "argocd".to_string(),
            project: "default".to_string(),
            source_path: "k8s".to_string(),
            target_revision: "HEAD".to_string(),
            destination_server: "https://kubernetes.default.svc".to_string(),
            destination_namespace: "default".to_string(),
        }
    }
}

/// Configuration for one provisioning deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Source-control organization root, e.g. `https://dev.azure.com/acme`
    pub organization_url: String,
    /// `api-version` query parameter sent to the source-control REST API
    pub api_version: String,
    pub templates: TemplateCatalog,
    /// In-repo path of the pipeline YAML definition
    pub pipeline_yaml_path: String,
    /// Folder the pipeline definition is created in
    pub pipeline_folder: String,
    /// Branch ref the content is pushed to and the pipeline is bound to
    pub default_branch: String,
    pub commit: CommitIdentity,
    pub gitops: GitOpsDefaults,
    /// Parent directory for working trees; the system temp dir when unset
    pub working_root: Option<PathBuf>,
    pub http_timeout_secs: u64,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        ProvisionConfig {
            organization_url: "https://dev.azure.com/platform".to_string(),
            api_version: "7.1".to_string(),
            templates: TemplateCatalog::default(),
            pipeline_yaml_path: "/azure-pipelines.yml".to_string(),
            pipeline_folder: "\\".to_string(),
            default_branch: "refs/heads/master".to_string(),
            commit: CommitIdentity::default(),
            gitops: GitOpsDefaults::default(),
            working_root: None,
            http_timeout_secs: 60,
        }
    }
}

impl ProvisionConfig {
    /// Defaults overlaid with `PROVISION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Load a JSON configuration file; absent fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ProvisionError::Config(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = value.trim().to_string();
            }
        };

        set(&mut self.organization_url, "PROVISION_ORGANIZATION_URL");
        set(&mut self.api_version, "PROVISION_API_VERSION");
        set(&mut self.templates.project, "PROVISION_TEMPLATE_PROJECT");
        set(&mut self.templates.application, "PROVISION_TEMPLATE_APPLICATION");
        set(
            &mut self.templates.infrastructure,
            "PROVISION_TEMPLATE_INFRASTRUCTURE",
        );
        set(&mut self.templates.gitops, "PROVISION_TEMPLATE_GITOPS");
        set(&mut self.pipeline_yaml_path, "PROVISION_PIPELINE_YAML");
        set(&mut self.default_branch, "PROVISION_DEFAULT_BRANCH");

        if let Some(root) = lookup("PROVISION_WORKING_ROOT").filter(|v| !v.trim().is_empty()) {
            self.working_root = Some(PathBuf::from(root));
        }
        if let Some(secs) = lookup("PROVISION_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = secs.trim().parse().map_err(|_| {
                ProvisionError::Config(format!(
                    "PROVISION_HTTP_TIMEOUT_SECS must be a number of seconds, got '{secs}'"
                ))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check the values the workflow relies on.
    pub fn validate(&self) -> Result<()> {
        match Url::parse(&self.organization_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ProvisionError::Config(format!(
                    "organization URL '{}' is not an http(s) URL",
                    self.organization_url
                )))
            }
        }
        if self.branch_name().is_empty() {
            return Err(ProvisionError::Config(format!(
                "default branch '{}' must be of the form refs/heads/<name>",
                self.default_branch
            )));
        }
        if self.api_version.trim().is_empty() {
            return Err(ProvisionError::Config("api version is required".to_string()));
        }
        Ok(())
    }

    fn organization_root(&self) -> &str {
        self.organization_url.trim_end_matches('/')
    }

    /// Endpoint for repository creation within a project.
    pub fn repositories_endpoint(&self, project: &str) -> String {
        format!(
            "{}/{}/_apis/git/repositories?api-version={}",
            self.organization_root(),
            project,
            self.api_version
        )
    }

    /// Endpoint for pipeline creation within a project.
    pub fn pipelines_endpoint(&self, project: &str) -> String {
        format!(
            "{}/{}/_apis/pipelines?api-version={}",
            self.organization_root(),
            project,
            self.api_version
        )
    }

    /// Unauthenticated git location of a repository in the organization.
    pub fn repository_git_url(&self, project: &str, repo: &str) -> String {
        format!("{}/{}/_git/{}", self.organization_root(), project, repo)
    }

    /// Unauthenticated git location of the template for a repository kind.
    pub fn template_url(&self, repo_type: Option<RepoType>) -> String {
        let entry = self.templates.entry(repo_type);
        if entry.contains("://") || entry.starts_with('/') || entry.starts_with('.') {
            entry.to_string()
        } else {
            self.repository_git_url(&self.templates.project, entry)
        }
    }

    /// Short branch name (`master` for `refs/heads/master`).
    pub fn branch_name(&self) -> &str {
        self.default_branch
            .strip_prefix("refs/heads/")
            .unwrap_or("")
    }

    pub fn working_root(&self) -> PathBuf {
        self.working_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Label written to the README of a new repository.
pub fn readme_label(repo_type: Option<RepoType>) -> &'static str {
    match repo_type {
        Some(RepoType::Application) => "Aplicação",
        Some(RepoType::Infrastructure) => "Infraestrutura",
        None => "Repositório GitOps",
    }
}
