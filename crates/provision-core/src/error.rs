//! Error taxonomy for the provisioning workflow.

use thiserror::Error;

use crate::workflow::{Step, WorkflowState};

/// Errors raised by the individual provisioning steps.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Missing or invalid input, configuration, or credential.
    ///
    /// Always raised before the first external call.
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-success, HTML, or transport failure from the repository API.
    #[error("source control API error{}: {body}", fmt_status(.status))]
    AuthOrApi {
        /// HTTP status, if a response was received at all
        status: Option<u16>,
        /// Response body (or transport error text) for diagnostics
        body: String,
    },

    /// Clone, filesystem, commit or push failure.
    #[error("git operation failed: {0}")]
    GitOperation(String),

    /// Non-success response from the pipeline or delivery-controller API.
    #[error("delivery registration failed{}: {body}", fmt_status(.status))]
    Registration {
        /// HTTP status, if a response was received at all
        status: Option<u16>,
        /// Response body (or transport error text) for diagnostics
        body: String,
    },
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl ProvisionError {
    /// Short machine-friendly kind label, used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::Config(_) => "config",
            ProvisionError::AuthOrApi { .. } => "auth_or_api",
            ProvisionError::GitOperation(_) => "git_operation",
            ProvisionError::Registration { .. } => "registration",
        }
    }
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// A workflow run that stopped before reaching `Registered`.
///
/// `state` is the terminal `Failed` state and records what was already
/// created in the external systems. Nothing is rolled back.
#[derive(Error, Debug)]
#[error("{at} failed: {source}")]
pub struct WorkflowFailure {
    /// Step that raised the error
    pub at: Step,
    /// Final state of the run
    pub state: WorkflowState,
    /// Proximate cause
    #[source]
    pub source: ProvisionError,
}
