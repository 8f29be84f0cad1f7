//! Source-control credential shared by every step of one workflow run.

use reqwest::Url;

use crate::error::{ProvisionError, Result};

/// Environment variable holding the source-control access token.
pub const TOKEN_ENV: &str = "AZURE_DEVOPS_PAT";

const REDACTED: &str = "***";

/// The source-control access token for one workflow run.
///
/// Built once at workflow entry and passed to every component that talks to
/// the source-control host. The token never appears in `Debug` output.
#[derive(Clone)]
pub struct CredentialContext {
    token: String,
}

impl std::fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialContext")
            .field("token", &REDACTED)
            .finish()
    }
}

impl CredentialContext {
    /// Build a context from an explicit token value.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::resolve(Some(token.into()))
    }

    /// Build a context from an optional value, failing when it is absent or blank.
    pub fn resolve(token: Option<String>) -> Result<Self> {
        match token.map(|t| t.trim().to_string()) {
            Some(token) if !token.is_empty() => Ok(Self { token }),
            _ => Err(ProvisionError::Config(format!(
                "source control access token is missing (set {TOKEN_ENV})"
            ))),
        }
    }

    /// Read the token from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::resolve(std::env::var(TOKEN_ENV).ok())
    }

    /// The raw token, for building Basic-auth headers.
    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    /// Embed the token into an `http(s)` URL for git clone/push.
    ///
    /// Non-HTTP locations (local paths, `file://`) are returned unchanged.
    pub fn authenticated_url(&self, url: &str) -> Result<String> {
        let mut parsed = match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            _ => return Ok(url.to_string()),
        };
        parsed
            .set_username("provision")
            .and_then(|_| parsed.set_password(Some(&self.token)))
            .map_err(|_| ProvisionError::Config(format!("cannot embed credentials in {url}")))?;
        Ok(parsed.to_string())
    }

    /// Replace every occurrence of the token in `text` with `***`.
    pub fn redact(&self, text: &str) -> String {
        text.replace(&self.token, REDACTED)
    }

    /// `error` with the token removed from every message and upstream body.
    pub fn redact_error(&self, error: ProvisionError) -> ProvisionError {
        match error {
            ProvisionError::Config(msg) => ProvisionError::Config(self.redact(&msg)),
            ProvisionError::AuthOrApi { status, body } => ProvisionError::AuthOrApi {
                status,
                body: self.redact(&body),
            },
            ProvisionError::GitOperation(msg) => ProvisionError::GitOperation(self.redact(&msg)),
            ProvisionError::Registration { status, body } => ProvisionError::Registration {
                status,
                body: self.redact(&body),
            },
        }
    }
}

/// Strip any userinfo from a URL so it is safe to log or print.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
