//! Template materialization: seed a new remote with template content.
//!
//! The template is cloned into a private working tree, its history is
//! discarded, and the content is pushed to the new remote as a single
//! commit. The working tree is deleted on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::{readme_label, CommitIdentity};
use crate::credential::redact_url;
use crate::error::{ProvisionError, Result};
use crate::git::{scrub_secrets, GitTransport};
use crate::request::RepoType;

const WORKING_TREE_PREFIX: &str = "provision-";

/// Uniquely named scratch directory owned by one materialization.
///
/// Removed by [`WorkingTree::release`], or on drop if never released.
#[derive(Debug)]
pub struct WorkingTree {
    dir: TempDir,
}

impl WorkingTree {
    /// Create a fresh directory `provision-<random>` under `root`.
    pub fn acquire(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            ProvisionError::GitOperation(format!(
                "failed to create working root {}: {e}",
                root.display()
            ))
        })?;
        let dir = tempfile::Builder::new()
            .prefix(WORKING_TREE_PREFIX)
            .tempdir_in(root)
            .map_err(|e| {
                ProvisionError::GitOperation(format!(
                    "failed to create working tree in {}: {e}",
                    root.display()
                ))
            })?;
        Ok(WorkingTree { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the directory. Failures are logged, never raised.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove working tree");
        } else {
            debug!(path = %path.display(), "Removed working tree");
        }
    }
}

/// Result of a successful materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedContent {
    /// SHA of the single commit pushed to the new remote
    pub commit_sha: String,
    /// Ref the commit was pushed to
    pub branch_ref: String,
}

/// README written into every new repository.
pub fn render_readme(repo_name: &str, repo_type: Option<RepoType>) -> String {
    format!("# {}\n\n{}\n", repo_name, readme_label(repo_type))
}

/// Clones a template and pushes it, history-free, to a new remote.
pub struct TemplateMaterializer {
    git: Arc<dyn GitTransport>,
    identity: CommitIdentity,
    branch_ref: String,
}

impl TemplateMaterializer {
    pub fn new(git: Arc<dyn GitTransport>, identity: CommitIdentity, branch_ref: &str) -> Self {
        TemplateMaterializer {
            git,
            identity,
            branch_ref: branch_ref.to_string(),
        }
    }

    /// Seed `target_url` with the content of `template_url` plus `readme`.
    ///
    /// Not idempotent: pushing again to a remote that already has content
    /// is rejected by the host or duplicates the initial commit.
    pub async fn materialize(
        &self,
        template_url: &str,
        target_url: &str,
        working_root: &Path,
        readme: &str,
    ) -> Result<MaterializedContent> {
        let tree = WorkingTree::acquire(working_root)?;
        info!(
            template = %redact_url(template_url),
            target = %redact_url(target_url),
            working_tree = %tree.path().display(),
            "Materializing template"
        );

        let outcome = self
            .populate(tree.path(), template_url, target_url, readme)
            .await
            .map_err(|e| match e {
                ProvisionError::GitOperation(msg) => ProvisionError::GitOperation(scrub_secrets(
                    &msg,
                    &[template_url, target_url],
                )),
                other => other,
            });
        tree.release();
        outcome
    }

    async fn populate(
        &self,
        dir: &Path,
        template_url: &str,
        target_url: &str,
        readme: &str,
    ) -> Result<MaterializedContent> {
        self.git.clone_repo(template_url, dir).await?;
        strip_history(dir)?;

        let branch = self
            .branch_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.branch_ref);
        self.git.init(dir, branch).await?;

        let readme_path: PathBuf = dir.join("README.md");
        std::fs::write(&readme_path, readme).map_err(|e| {
            ProvisionError::GitOperation(format!("failed to write {}: {e}", readme_path.display()))
        })?;

        self.git.add_remote(dir, "origin", target_url).await?;
        self.git.add_all(dir).await?;
        self.git.commit(dir, &self.identity).await?;
        self.git.push(dir, "origin", &self.branch_ref).await?;

        let commit_sha = self.git.head_sha(dir).await?;
        info!(commit = %commit_sha, branch = %self.branch_ref, "Pushed initial commit");

        Ok(MaterializedContent {
            commit_sha,
            branch_ref: self.branch_ref.clone(),
        })
    }
}

/// Delete the template's version-control metadata.
fn strip_history(dir: &Path) -> Result<()> {
    let git_dir = dir.join(".git");
    let removed = if git_dir.is_dir() {
        std::fs::remove_dir_all(&git_dir)
    } else if git_dir.exists() {
        std::fs::remove_file(&git_dir)
    } else {
        return Ok(());
    };
    removed.map_err(|e| {
        ProvisionError::GitOperation(format!("failed to remove {}: {e}", git_dir.display()))
    })
}
