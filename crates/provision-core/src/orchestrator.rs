//! Workflow Orchestrator: drives one provisioning run through the state machine.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::argocd::ArgoCdClient;
use crate::azure::AzureDevOpsClient;
use crate::config::ProvisionConfig;
use crate::credential::{redact_url, CredentialContext};
use crate::delivery::{ApplicationManifest, DeliveryController};
use crate::error::{ProvisionError, Result, WorkflowFailure};
use crate::git::{GitCli, GitTransport};
use crate::materializer::{render_readme, TemplateMaterializer};
use crate::provisioner::RepositoryProvisioner;
use crate::registrar::{DeliveryRegistrar, DeliveryRegistration};
use crate::request::{DeliveryMode, ProvisioningRequest};
use crate::source_control::{RemoteRepository, SourceControlApi};
use crate::workflow::{transition, Step, StepEvent, StepOutput, WorkflowState};

/// Outcome of a run that reached `Registered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningReport {
    pub run_id: Uuid,
    pub project_name: String,
    pub repository: RemoteRepository,
    pub commit_sha: String,
    pub branch_ref: String,
    pub registration: DeliveryRegistration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProvisioningReport {
    /// Copy safe to print or persist.
    pub fn redacted(&self) -> Self {
        ProvisioningReport {
            registration: self.registration.redacted(),
            ..self.clone()
        }
    }
}

/// Registration a run would perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlannedRegistration {
    Pipeline {
        endpoint: String,
        yaml_path: String,
        branch_ref: String,
    },
    Application {
        endpoint: String,
        manifest: ApplicationManifest,
    },
}

/// What a run would do, computed without touching any service.
///
/// URLs are credential-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPlan {
    pub project_name: String,
    pub repo_name: String,
    pub repositories_endpoint: String,
    pub template_url: String,
    pub target_url: String,
    pub working_root: PathBuf,
    pub readme: String,
    pub registration: PlannedRegistration,
}

/// Per-run values derived during validation.
struct RunContext {
    template_url: String,
    push_url: String,
    readme: String,
    working_root: PathBuf,
}

/// Sequences provisioning, materialization, and registration.
///
/// Holds no per-run state, so independent runs may share one orchestrator.
pub struct Orchestrator {
    config: ProvisionConfig,
    provisioner: RepositoryProvisioner,
    materializer: TemplateMaterializer,
    registrar: DeliveryRegistrar,
}

impl Orchestrator {
    pub fn new(
        config: ProvisionConfig,
        source_control: Arc<dyn SourceControlApi>,
        git: Arc<dyn GitTransport>,
        controller: Arc<dyn DeliveryController>,
    ) -> Self {
        let provisioner = RepositoryProvisioner::new(source_control.clone());
        let materializer =
            TemplateMaterializer::new(git, config.commit.clone(), &config.default_branch);
        let registrar = DeliveryRegistrar::new(source_control, controller, &config);
        Orchestrator {
            config,
            provisioner,
            materializer,
            registrar,
        }
    }

    /// Wire the production clients: Azure DevOps, `git`, and ArgoCD.
    pub fn from_config(config: ProvisionConfig) -> Result<Self> {
        config.validate()?;
        let source_control = Arc::new(AzureDevOpsClient::new(config.clone())?);
        let controller = Arc::new(ArgoCdClient::new(config.http_timeout())?);
        Ok(Self::new(
            config,
            source_control,
            Arc::new(GitCli::new()),
            controller,
        ))
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    fn context(
        &self,
        request: &ProvisioningRequest,
        credential: &CredentialContext,
    ) -> Result<RunContext> {
        request.validate()?;
        let repo_type = request.mode.repo_type();
        let target = self
            .config
            .repository_git_url(request.project_name.trim(), request.repo_name.trim());
        Ok(RunContext {
            template_url: credential.authenticated_url(&self.config.template_url(repo_type))?,
            push_url: credential.authenticated_url(&target)?,
            readme: render_readme(request.repo_name.trim(), repo_type),
            working_root: self.config.working_root(),
        })
    }

    /// Validate `request` and describe the run without side effects.
    pub fn plan(
        &self,
        request: &ProvisioningRequest,
        credential: &CredentialContext,
    ) -> Result<ProvisioningPlan> {
        let ctx = self.context(request, credential)?;
        let project = request.project_name.trim();

        let registration = match &request.mode {
            DeliveryMode::Pipeline { .. } => PlannedRegistration::Pipeline {
                endpoint: self.config.pipelines_endpoint(project),
                yaml_path: self.config.pipeline_yaml_path.clone(),
                branch_ref: self.config.default_branch.clone(),
            },
            DeliveryMode::GitOps(target) => {
                let mut manifest = self.registrar.application_manifest(&ctx.push_url);
                manifest.spec.source.repo_url = redact_url(&manifest.spec.source.repo_url);
                PlannedRegistration::Application {
                    endpoint: ArgoCdClient::applications_endpoint(&target.argocd_url),
                    manifest,
                }
            }
        };

        Ok(ProvisioningPlan {
            project_name: project.to_string(),
            repo_name: request.repo_name.trim().to_string(),
            repositories_endpoint: self.config.repositories_endpoint(project),
            template_url: redact_url(&ctx.template_url),
            target_url: redact_url(&ctx.push_url),
            working_root: ctx.working_root,
            readme: ctx.readme,
            registration,
        })
    }

    /// Execute one provisioning run.
    ///
    /// Steps run strictly in order; the first failure ends the run. Nothing
    /// is retried or rolled back: the returned failure's `state` tells which
    /// external objects already exist.
    pub async fn run(
        &self,
        request: &ProvisioningRequest,
        credential: &CredentialContext,
    ) -> std::result::Result<ProvisioningReport, WorkflowFailure> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "provision",
            run_id = %run_id,
            project = %request.project_name,
            repo = %request.repo_name,
            mode = request.mode.name(),
        );
        self.run_inner(run_id, request, credential)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        request: &ProvisioningRequest,
        credential: &CredentialContext,
    ) -> std::result::Result<ProvisioningReport, WorkflowFailure> {
        let started_at = Utc::now();
        info!("Starting provisioning run");

        let ctx = match self.context(request, credential) {
            Ok(ctx) => ctx,
            Err(source) => {
                return Err(Self::fail(
                    WorkflowState::Idle,
                    Step::Validate,
                    source,
                    credential,
                ));
            }
        };
        let project = request.project_name.trim();

        let state = WorkflowState::Idle;
        info!(step = %Step::CreateRepository, "Running step");
        let repository = match self
            .provisioner
            .create_repository(project, request.repo_name.trim(), credential)
            .await
        {
            Ok(repository) => repository,
            Err(source) => {
                return Err(Self::fail(state, Step::CreateRepository, source, credential));
            }
        };
        let state = Self::advance(state, StepOutput::RepositoryCreated(repository.clone()));

        info!(step = %Step::MaterializeTemplate, "Running step");
        let content = match self
            .materializer
            .materialize(&ctx.template_url, &ctx.push_url, &ctx.working_root, &ctx.readme)
            .await
        {
            Ok(content) => content,
            Err(source) => {
                return Err(Self::fail(state, Step::MaterializeTemplate, source, credential));
            }
        };
        let state = Self::advance(state, StepOutput::ContentPushed(content.clone()));

        info!(step = %Step::RegisterDelivery, "Running step");
        let registered = match &request.mode {
            DeliveryMode::Pipeline { .. } => {
                self.registrar
                    .register_pipeline(project, &repository, credential)
                    .await
            }
            DeliveryMode::GitOps(target) => {
                self.registrar
                    .register_application(target, &ctx.push_url)
                    .await
            }
        };
        let registration = match registered {
            Ok(registration) => registration,
            Err(source) => {
                return Err(Self::fail(state, Step::RegisterDelivery, source, credential));
            }
        };
        Self::advance(state, StepOutput::Registered(registration.clone()));

        info!(
            repository_id = %repository.id,
            commit = %content.commit_sha,
            "Provisioning completed"
        );
        Ok(ProvisioningReport {
            run_id,
            project_name: project.to_string(),
            repository,
            commit_sha: content.commit_sha,
            branch_ref: content.branch_ref,
            registration,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn advance(state: WorkflowState, output: StepOutput) -> WorkflowState {
        let next = transition(state, StepEvent::Succeeded(output));
        info!(state = next.name(), "Step completed");
        next
    }

    /// Terminal failure for `at`; upstream text is scrubbed of the token
    /// before it is logged or returned.
    fn fail(
        state: WorkflowState,
        at: Step,
        source: ProvisionError,
        credential: &CredentialContext,
    ) -> WorkflowFailure {
        let source = credential.redact_error(source);
        let failed = transition(state, StepEvent::Failed(at));
        let repository_id = failed.repository().map(|r| r.id.clone());
        error!(
            step = %at,
            kind = source.kind(),
            repository_id = ?repository_id,
            error = %source,
            "Provisioning failed"
        );
        WorkflowFailure {
            at,
            state: failed,
            source,
        }
    }
}

