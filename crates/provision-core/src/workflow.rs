//! Provisioning state machine.
//!
//! `Idle -> RepoCreated -> ContentPushed -> Registered`, with `Failed`
//! reachable from every non-terminal state. There are no back-edges and no
//! compensating transitions: whatever a failed run created stays created.

use serde::{Deserialize, Serialize};

use crate::materializer::MaterializedContent;
use crate::registrar::DeliveryRegistration;
use crate::source_control::RemoteRepository;

/// Steps of one provisioning run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Validate,
    CreateRepository,
    MaterializeTemplate,
    RegisterDelivery,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Validate => "validate",
            Step::CreateRepository => "create_repository",
            Step::MaterializeTemplate => "materialize_template",
            Step::RegisterDelivery => "register_delivery",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of a successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    RepositoryCreated(RemoteRepository),
    ContentPushed(MaterializedContent),
    Registered(DeliveryRegistration),
}

/// Result of running one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    Succeeded(StepOutput),
    Failed(Step),
}

/// State of one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    RepoCreated {
        repository: RemoteRepository,
    },
    ContentPushed {
        repository: RemoteRepository,
        content: MaterializedContent,
    },
    Registered {
        repository: RemoteRepository,
        content: MaterializedContent,
        registration: DeliveryRegistration,
    },
    /// `repository` is set when the remote repository already exists.
    Failed {
        at: Step,
        repository: Option<RemoteRepository>,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::RepoCreated { .. } => "repo_created",
            WorkflowState::ContentPushed { .. } => "content_pushed",
            WorkflowState::Registered { .. } => "registered",
            WorkflowState::Failed { .. } => "failed",
        }
    }

    /// The step that runs next, `None` once terminal.
    pub fn pending_step(&self) -> Option<Step> {
        match self {
            WorkflowState::Idle => Some(Step::CreateRepository),
            WorkflowState::RepoCreated { .. } => Some(Step::MaterializeTemplate),
            WorkflowState::ContentPushed { .. } => Some(Step::RegisterDelivery),
            WorkflowState::Registered { .. } | WorkflowState::Failed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.pending_step().is_none()
    }

    /// The remote repository, once it exists.
    pub fn repository(&self) -> Option<&RemoteRepository> {
        match self {
            WorkflowState::Idle => None,
            WorkflowState::RepoCreated { repository }
            | WorkflowState::ContentPushed { repository, .. }
            | WorkflowState::Registered { repository, .. } => Some(repository),
            WorkflowState::Failed { repository, .. } => repository.as_ref(),
        }
    }
}

/// Apply `event` to `state`.
///
/// A success only advances when its output belongs to the pending step;
/// anything else fails the run at that step. Terminal states absorb every
/// event.
pub fn transition(state: WorkflowState, event: StepEvent) -> WorkflowState {
    if state.is_terminal() {
        return state;
    }

    match (state, event) {
        (WorkflowState::Idle, StepEvent::Succeeded(StepOutput::RepositoryCreated(repository))) => {
            WorkflowState::RepoCreated { repository }
        }
        (
            WorkflowState::RepoCreated { repository },
            StepEvent::Succeeded(StepOutput::ContentPushed(content)),
        ) => WorkflowState::ContentPushed {
            repository,
            content,
        },
        (
            WorkflowState::ContentPushed {
                repository,
                content,
            },
            StepEvent::Succeeded(StepOutput::Registered(registration)),
        ) => WorkflowState::Registered {
            repository,
            content,
            registration,
        },
        (state, StepEvent::Failed(at)) => WorkflowState::Failed {
            at,
            repository: state.repository().cloned(),
        },
        (state, StepEvent::Succeeded(_)) => WorkflowState::Failed {
            at: state.pending_step().unwrap_or(Step::Validate),
            repository: state.repository().cloned(),
        },
    }
}
