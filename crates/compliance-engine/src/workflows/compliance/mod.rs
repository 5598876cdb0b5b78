//! Compliance rollups: requirement evaluation, control progress, and framework
//! compliance.
//!
//! Everything below `adapters` works on the normalized [`Requirement`] shape and
//! is pure; the read service composes it with a [`ComplianceStore`].

pub mod adapters;
pub mod domain;
pub mod framework;
pub mod progress;
pub mod repository;
pub mod requirements;
pub mod router;
pub mod service;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use adapters::{
    normalize_artifact, resolve_mapping, ArtifactLink, ControlRecord, EmbeddedPolicy,
    RequirementMapping,
};
pub use domain::{
    ArtifactType, ComplianceStatus, Control, ControlId, ControlProgressResponse, Evidence,
    EvidenceFrequency, EvidenceId, FrameworkInstance, FrameworkInstanceId, LinkedArtifact,
    ManualAttestation, Requirement, RequirementId, Task, TaskEntityType, TaskId, TaskStatus,
    TypeProgress,
};
pub use framework::{
    compute_framework_compliance, ControlAssessment, FrameworkCompliance,
    FrameworkComplianceAggregator,
};
pub use progress::{compute_control_progress, percentage, ControlProgressAggregator, TASK_BUCKET};
pub use repository::ComplianceStore;
pub use requirements::evaluate_requirement;
pub use router::compliance_router;
pub use service::{
    ComplianceReadService, ComplianceServiceError, ControlComplianceRow, ControlProgressView,
    FrameworkComplianceView,
};
pub use snapshot::{ComplianceSnapshot, FileRecord, SnapshotError, TrainingRecord};
