//! Repository Provisioner: creates the empty remote repository.

use std::sync::Arc;

use tracing::info;

use crate::credential::CredentialContext;
use crate::error::{ProvisionError, Result};
use crate::source_control::{RemoteRepository, SourceControlApi};

/// Creates repositories on the source-control host. At most one attempt per call.
pub struct RepositoryProvisioner {
    api: Arc<dyn SourceControlApi>,
}

impl RepositoryProvisioner {
    pub fn new(api: Arc<dyn SourceControlApi>) -> Self {
        Self { api }
    }

    /// Create `repo_name` in `project_name`.
    ///
    /// A name conflict or permission failure surfaces immediately; the caller
    /// must resolve it before trying the same name again.
    pub async fn create_repository(
        &self,
        project_name: &str,
        repo_name: &str,
        credential: &CredentialContext,
    ) -> Result<RemoteRepository> {
        if project_name.trim().is_empty() || repo_name.trim().is_empty() {
            return Err(ProvisionError::Config(
                "project and repository names are required".to_string(),
            ));
        }

        info!(project = %project_name, repo = %repo_name, "Creating repository");
        let repository = self
            .api
            .create_repository(project_name, repo_name, credential)
            .await?;
        info!(
            repository_id = %repository.id,
            project_id = %repository.project_id,
            default_branch = %repository.default_branch_ref,
            "Repository created"
        );
        Ok(repository)
    }
}
