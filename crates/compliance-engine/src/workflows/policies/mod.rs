//! Policy lifecycle: direct edits, the approval gate, and archival.
//!
//! `lifecycle` decides, `approval` turns decisions into store commands, and
//! `service` runs them against a `PolicyStore` with optimistic concurrency.

pub mod approval;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use approval::{
    plan_policy_save, ApprovalDraft, ApprovalRequestBuilder, ApprovalRequestCommand,
    DirectUpdateCommand, PolicyCommand, SaveKind, SavePlan,
};
pub use domain::{
    ApprovalRequest, ApprovalRequestId, ApprovalResolution, Department, MaterialField, Member,
    Policy, PolicyForm, PolicyId, PolicyPatch, PolicyStatus, ReviewFrequency,
};
pub use error::{ConflictError, LifecycleError, ValidationError};
pub use lifecycle::{
    material_changes, ApprovalReason, ApprovalState, PolicyLifecycle, PolicyState, SaveVerdict,
};
pub use repository::{PolicyRecord, PolicyStore, PolicyView};
pub use router::policy_router;
pub use service::{PolicyApprovalService, PolicyServiceError, SaveOutcome, SavePolicyRequest};
