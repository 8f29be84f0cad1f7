//! Repository Provisioning Core
//!
//! Creates a repository on the source-control host, seeds it with a template
//! as a single history-free commit, and registers it either as a CI pipeline
//! or as a GitOps application.
//!
//! ## Key Components
//!
//! - `Orchestrator`: drives one run through `Idle -> RepoCreated -> ContentPushed -> Registered`
//! - `RepositoryProvisioner`: creates the empty remote repository
//! - `TemplateMaterializer`: clone, strip history, re-init, commit, push
//! - `DeliveryRegistrar`: pipeline definition or application manifest
//! - `SourceControlApi` / `GitTransport` / `DeliveryController`: external seams,
//!   with in-memory fakes in [`fakes`]

pub mod argocd;
pub mod azure;
pub mod config;
pub mod credential;
pub mod delivery;
mod error;
pub mod fakes;
pub mod git;
mod http;
pub mod materializer;
pub mod orchestrator;
pub mod provisioner;
pub mod registrar;
pub mod request;
pub mod source_control;
pub mod telemetry;
pub mod workflow;

pub use argocd::ArgoCdClient;
pub use azure::AzureDevOpsClient;
pub use config::{CommitIdentity, GitOpsDefaults, ProvisionConfig, TemplateCatalog};
pub use credential::{redact_url, CredentialContext, TOKEN_ENV};
pub use delivery::{ApplicationManifest, DeliveryController};
pub use error::{ProvisionError, Result, WorkflowFailure};
pub use git::{GitCli, GitTransport};
pub use materializer::{render_readme, MaterializedContent, TemplateMaterializer, WorkingTree};
pub use orchestrator::{Orchestrator, PlannedRegistration, ProvisioningPlan, ProvisioningReport};
pub use provisioner::RepositoryProvisioner;
pub use registrar::{DeliveryRegistrar, DeliveryRegistration};
pub use request::{DeliveryMode, GitOpsTarget, ProvisioningRequest, RepoType};
pub use source_control::{
    CreatedPipeline, PipelineDefinition, RemoteRepository, SourceControlApi,
};
pub use workflow::{transition, Step, StepEvent, StepOutput, WorkflowState};
