//! Type definition module

mod account;
mod event;
mod workflow;

pub use account::{
    Account, AccountRequest, AccountStatus, IngestResponse, Product, ProvisioningHandle,
};
pub(crate) use account::ValidatedRequest;
pub use event::{ProvisioningOutcome, ProvisioningOutcomeEvent, ReconcileResult};
pub use workflow::{ResumeSignal, WorkflowInstance, WorkflowStatus, WorkflowStep};

// Re-export the gateway's public request types
pub use tenant_orchestrator_gateway::{
    BuildOutcome, BuildStatus, ExecutionRole, InfraBuildRequest, ProvisionAccountRequest,
    ReleaseBuildRequest, UpdateProvisionedAccountRequest,
};
