//! In-memory fakes for the external seams (testing only)
//!
//! Provides `MemorySourceControl`, `MemoryGitTransport`, and
//! `MemoryDeliveryController`, which record every call and can be told to
//! fail, without any network or `git` executable.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::CommitIdentity;
use crate::credential::CredentialContext;
use crate::delivery::{ApplicationManifest, DeliveryController};
use crate::error::{ProvisionError, Result};
use crate::git::GitTransport;
use crate::request::GitOpsTarget;
use crate::source_control::{
    CreatedPipeline, PipelineDefinition, RemoteRepository, SourceControlApi,
};

/// Marker file the fake clone leaves inside `.git` to represent template history.
pub const TEMPLATE_HISTORY_MARKER: &str = "template-history";

// ---------------------------------------------------------------------------
// MemorySourceControl
// ---------------------------------------------------------------------------

/// A call received by `MemorySourceControl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceControlCall {
    CreateRepository { project: String, name: String },
    CreatePipeline { project: String, definition: PipelineDefinition },
}

/// In-memory source-control host.
///
/// Repository names are unique per project; creating an existing one fails
/// with HTTP 409 like the real host.
#[derive(Debug, Default)]
pub struct MemorySourceControl {
    calls: Mutex<Vec<SourceControlCall>>,
    repositories: Mutex<HashSet<(String, String)>>,
    repository_failure: Mutex<Option<(u16, String)>>,
    pipeline_failure: Mutex<Option<(u16, String)>>,
}

impl MemorySourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every repository creation with `status` and `body`.
    pub fn fail_repositories(&self, status: u16, body: &str) {
        *self.repository_failure.lock().unwrap() = Some((status, body.to_string()));
    }

    /// Fail every pipeline creation with `status` and `body`.
    pub fn fail_pipelines(&self, status: u16, body: &str) {
        *self.pipeline_failure.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn calls(&self) -> Vec<SourceControlCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Pipeline definitions received, in order.
    pub fn pipelines(&self) -> Vec<PipelineDefinition> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SourceControlCall::CreatePipeline { definition, .. } => Some(definition),
                _ => None,
            })
            .collect()
    }

    /// Deterministic identity for `project`/`name`.
    pub fn repository_id(project: &str, name: &str) -> String {
        format!("repo-{project}-{name}")
    }

    pub fn project_id(project: &str) -> String {
        format!("project-{project}")
    }
}

#[async_trait]
impl SourceControlApi for MemorySourceControl {
    async fn create_repository(
        &self,
        project: &str,
        name: &str,
        _credential: &CredentialContext,
    ) -> Result<RemoteRepository> {
        self.calls
            .lock()
            .unwrap()
            .push(SourceControlCall::CreateRepository {
                project: project.to_string(),
                name: name.to_string(),
            });

        if let Some((status, body)) = self.repository_failure.lock().unwrap().clone() {
            return Err(ProvisionError::AuthOrApi {
                status: Some(status),
                body,
            });
        }

        let key = (project.to_string(), name.to_string());
        if !self.repositories.lock().unwrap().insert(key) {
            return Err(ProvisionError::AuthOrApi {
                status: Some(409),
                body: format!("repository '{name}' already exists in project '{project}'"),
            });
        }

        Ok(RemoteRepository {
            id: Self::repository_id(project, name),
            project_id: Self::project_id(project),
            name: name.to_string(),
            default_branch_ref: "refs/heads/master".to_string(),
            remote_url: format!("https://memory.invalid/{project}/_git/{name}"),
        })
    }

    async fn create_pipeline(
        &self,
        project: &str,
        definition: &PipelineDefinition,
        _credential: &CredentialContext,
    ) -> Result<CreatedPipeline> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(SourceControlCall::CreatePipeline {
            project: project.to_string(),
            definition: definition.clone(),
        });

        if let Some((status, body)) = self.pipeline_failure.lock().unwrap().clone() {
            return Err(ProvisionError::Registration {
                status: Some(status),
                body,
            });
        }

        Ok(CreatedPipeline {
            id: calls.len() as i64,
            name: definition.name.clone(),
            url: None,
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryGitTransport
// ---------------------------------------------------------------------------

/// A git operation received by `MemoryGitTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitOp {
    Clone { url: String, dest: PathBuf },
    Init { dir: PathBuf, branch: String },
    AddRemote { name: String, url: String },
    AddAll,
    Commit { author: String, message: String },
    Push { remote: String, remote_ref: String },
    HeadSha,
}

impl GitOp {
    pub fn name(&self) -> &'static str {
        match self {
            GitOp::Clone { .. } => "clone",
            GitOp::Init { .. } => "init",
            GitOp::AddRemote { .. } => "add_remote",
            GitOp::AddAll => "add_all",
            GitOp::Commit { .. } => "commit",
            GitOp::Push { .. } => "push",
            GitOp::HeadSha => "head_sha",
        }
    }
}

/// Snapshot of a working tree taken at push time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedTree {
    pub url: String,
    pub remote_ref: String,
    /// Relative paths and contents of every file outside `.git`
    pub files: BTreeMap<String, String>,
    /// Whether the template's history survived into the pushed tree
    pub template_history: bool,
}

/// Fake git that writes template files on clone and snapshots trees on push.
#[derive(Debug)]
pub struct MemoryGitTransport {
    template_files: Vec<(String, String)>,
    ops: Mutex<Vec<GitOp>>,
    remotes: Mutex<BTreeMap<(PathBuf, String), String>>,
    pushes: Mutex<Vec<PushedTree>>,
    fail_on: Mutex<Option<&'static str>>,
}

impl Default for MemoryGitTransport {
    fn default() -> Self {
        Self::with_template_files(&[
            ("README.md", "# template\n"),
            ("azure-pipelines.yml", "trigger:\n  - master\n"),
            ("k8s/deployment.yaml", "kind: Deployment\n"),
        ])
    }
}

impl MemoryGitTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake whose clones produce exactly `files`.
    pub fn with_template_files(files: &[(&str, &str)]) -> Self {
        MemoryGitTransport {
            template_files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            ops: Mutex::new(Vec::new()),
            remotes: Mutex::new(BTreeMap::new()),
            pushes: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
        }
    }

    /// Fail the first operation named `op` (see [`GitOp::name`]).
    pub fn fail_on(&self, op: &'static str) {
        *self.fail_on.lock().unwrap() = Some(op);
    }

    pub fn ops(&self) -> Vec<GitOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn op_names(&self) -> Vec<&'static str> {
        self.ops().iter().map(GitOp::name).collect()
    }

    pub fn pushes(&self) -> Vec<PushedTree> {
        self.pushes.lock().unwrap().clone()
    }

    /// Working directories the fake was asked to clone into.
    pub fn clone_destinations(&self) -> Vec<PathBuf> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                GitOp::Clone { dest, .. } => Some(dest),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: GitOp) -> Result<()> {
        let name = op.name();
        self.ops.lock().unwrap().push(op);
        let mut fail_on = self.fail_on.lock().unwrap();
        if *fail_on == Some(name) {
            *fail_on = None;
            return Err(ProvisionError::GitOperation(format!(
                "simulated {name} failure"
            )));
        }
        Ok(())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> ProvisionError {
    ProvisionError::GitOperation(format!("{}: {e}", path.display()))
}

fn snapshot(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) -> Result<()> {
    for entry in std::fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
        let path = entry.map_err(|e| io_error(dir, e))?.path();
        if path.file_name().is_some_and(|n| n == ".git") {
            continue;
        }
        if path.is_dir() {
            snapshot(root, &path, files)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let content = std::fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            files.insert(relative, content);
        }
    }
    Ok(())
}

#[async_trait]
impl GitTransport for MemoryGitTransport {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.record(GitOp::Clone {
            url: url.to_string(),
            dest: dest.to_path_buf(),
        })?;

        let history = dest.join(".git");
        std::fs::create_dir_all(&history).map_err(|e| io_error(&history, e))?;
        let marker = history.join(TEMPLATE_HISTORY_MARKER);
        std::fs::write(&marker, url).map_err(|e| io_error(&marker, e))?;

        for (relative, content) in &self.template_files {
            let path = dest.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
            std::fs::write(&path, content).map_err(|e| io_error(&path, e))?;
        }
        Ok(())
    }

    async fn init(&self, dir: &Path, branch: &str) -> Result<()> {
        self.record(GitOp::Init {
            dir: dir.to_path_buf(),
            branch: branch.to_string(),
        })?;
        let git_dir = dir.join(".git");
        std::fs::create_dir_all(&git_dir).map_err(|e| io_error(&git_dir, e))
    }

    async fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<()> {
        self.record(GitOp::AddRemote {
            name: name.to_string(),
            url: url.to_string(),
        })?;
        self.remotes
            .lock()
            .unwrap()
            .insert((dir.to_path_buf(), name.to_string()), url.to_string());
        Ok(())
    }

    async fn add_all(&self, _dir: &Path) -> Result<()> {
        self.record(GitOp::AddAll)
    }

    async fn commit(&self, _dir: &Path, identity: &CommitIdentity) -> Result<()> {
        self.record(GitOp::Commit {
            author: format!("{} <{}>", identity.name, identity.email),
            message: identity.message.clone(),
        })
    }

    async fn push(&self, dir: &Path, remote: &str, remote_ref: &str) -> Result<()> {
        self.record(GitOp::Push {
            remote: remote.to_string(),
            remote_ref: remote_ref.to_string(),
        })?;

        let url = self
            .remotes
            .lock()
            .unwrap()
            .get(&(dir.to_path_buf(), remote.to_string()))
            .cloned()
            .ok_or_else(|| ProvisionError::GitOperation(format!("no such remote '{remote}'")))?;

        let mut files = BTreeMap::new();
        snapshot(dir, dir, &mut files)?;
        self.pushes.lock().unwrap().push(PushedTree {
            url,
            remote_ref: remote_ref.to_string(),
            files,
            template_history: dir.join(".git").join(TEMPLATE_HISTORY_MARKER).exists(),
        });
        Ok(())
    }

    async fn head_sha(&self, _dir: &Path) -> Result<String> {
        self.record(GitOp::HeadSha)?;
        let count = self.pushes.lock().unwrap().len();
        Ok(format!("{count:040x}"))
    }
}

// ---------------------------------------------------------------------------
// MemoryDeliveryController
// ---------------------------------------------------------------------------

/// In-memory GitOps controller recording submitted manifests.
#[derive(Debug, Default)]
pub struct MemoryDeliveryController {
    applications: Mutex<Vec<(GitOpsTarget, ApplicationManifest)>>,
    failure: Mutex<Option<(u16, String)>>,
}

impl MemoryDeliveryController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every submission with `status` and `body`.
    pub fn fail_with(&self, status: u16, body: &str) {
        *self.failure.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn applications(&self) -> Vec<(GitOpsTarget, ApplicationManifest)> {
        self.applications.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryController for MemoryDeliveryController {
    async fn create_application(
        &self,
        target: &GitOpsTarget,
        manifest: &ApplicationManifest,
    ) -> Result<()> {
        self.applications
            .lock()
            .unwrap()
            .push((target.clone(), manifest.clone()));

        if let Some((status, body)) = self.failure.lock().unwrap().clone() {
            return Err(ProvisionError::Registration {
                status: Some(status),
                body,
            });
        }
        Ok(())
    }
}
