//! Version-control seam and its `git` executable implementation.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use reqwest::Url;
use tokio::process::Command;
use tracing::debug;

use crate::config::CommitIdentity;
use crate::error::{ProvisionError, Result};

/// Local git operations used to materialize a template.
///
/// Every failure is reported as `ProvisionError::GitOperation`.
#[async_trait]
pub trait GitTransport: Send + Sync {
    /// Clone `url` into the existing, empty directory `dest`.
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Create a fresh repository in `dir` whose unborn HEAD is `branch`.
    async fn init(&self, dir: &Path, branch: &str) -> Result<()>;

    async fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<()>;

    /// Stage every file in the working tree.
    async fn add_all(&self, dir: &Path) -> Result<()>;

    async fn commit(&self, dir: &Path, identity: &CommitIdentity) -> Result<()>;

    /// Push `HEAD` to `remote_ref` on `remote`.
    async fn push(&self, dir: &Path, remote: &str, remote_ref: &str) -> Result<()>;

    /// SHA of the commit at `HEAD`.
    async fn head_sha(&self, dir: &Path) -> Result<String>;
}

/// `GitTransport` backed by the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        GitCli
    }

    async fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
        let shown = args.iter().map(|a| scrub_url(a)).collect::<Vec<_>>();
        debug!(args = ?shown, "git");

        let mut cmd = Command::new("git");
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| ProvisionError::GitOperation(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::GitOperation(format!(
                "git {} failed: {}",
                shown.join(" "),
                scrub_secrets(stderr.trim(), args)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        ProvisionError::GitOperation(format!("path is not valid UTF-8: {}", path.display()))
    })
}

/// Replace the password of a URL argument with `***`.
fn scrub_url(arg: &str) -> String {
    match Url::parse(arg) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => arg.to_string(),
    }
}

/// Remove every URL password found in `args` from `text`.
pub(crate) fn scrub_secrets(text: &str, args: &[&str]) -> String {
    args.iter()
        .filter_map(|a| Url::parse(a).ok())
        .filter_map(|u| u.password().map(str::to_string))
        .filter(|p| !p.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(&secret, "***"))
}

#[async_trait]
impl GitTransport for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.run(None, &["clone", "--quiet", url, path_arg(dest)?])
            .await
            .map(|_| ())
    }

    async fn init(&self, dir: &Path, branch: &str) -> Result<()> {
        self.run(Some(dir), &["init", "--quiet"]).await?;
        let head = format!("refs/heads/{branch}");
        self.run(Some(dir), &["symbolic-ref", "HEAD", &head])
            .await
            .map(|_| ())
    }

    async fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<()> {
        self.run(Some(dir), &["remote", "add", name, url])
            .await
            .map(|_| ())
    }

    async fn add_all(&self, dir: &Path) -> Result<()> {
        self.run(Some(dir), &["add", "--all"]).await.map(|_| ())
    }

    async fn commit(&self, dir: &Path, identity: &CommitIdentity) -> Result<()> {
        let name = format!("user.name={}", identity.name);
        let email = format!("user.email={}", identity.email);
        self.run(
            Some(dir),
            &[
                "-c",
                &name,
                "-c",
                &email,
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--quiet",
                "-m",
                &identity.message,
            ],
        )
        .await
        .map(|_| ())
    }

    async fn push(&self, dir: &Path, remote: &str, remote_ref: &str) -> Result<()> {
        let refspec = format!("HEAD:{remote_ref}");
        self.run(Some(dir), &["push", "--quiet", remote, &refspec])
            .await
            .map(|_| ())
    }

    async fn head_sha(&self, dir: &Path) -> Result<String> {
        let sha = self.run(Some(dir), &["rev-parse", "HEAD"]).await?;
        if sha.is_empty() {
            return Err(ProvisionError::GitOperation(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }
}
