use super::adapters::ControlRecord;
use super::domain::{ControlId, Evidence, EvidenceId, FrameworkInstance, FrameworkInstanceId, Task};
use crate::workflows::context::OrganizationContext;
use crate::workflows::policies::domain::{Policy, PolicyId};
use crate::workflows::store::RepositoryError;

/// Read-side storage abstraction for compliance rollups.
///
/// Controls come back in their stored shape; `adapters` normalizes them. Missing
/// linked records are reported as `Ok(None)`.
pub trait ComplianceStore: Send + Sync {
    fn get_control(
        &self,
        ctx: &OrganizationContext,
        id: &ControlId,
    ) -> Result<Option<ControlRecord>, RepositoryError>;

    fn list_controls_for_framework(
        &self,
        ctx: &OrganizationContext,
        framework_instance_id: &FrameworkInstanceId,
    ) -> Result<Vec<ControlRecord>, RepositoryError>;

    fn get_framework_instance(
        &self,
        ctx: &OrganizationContext,
        id: &FrameworkInstanceId,
    ) -> Result<Option<FrameworkInstance>, RepositoryError>;

    fn tasks_for_control(
        &self,
        ctx: &OrganizationContext,
        control_id: &ControlId,
    ) -> Result<Vec<Task>, RepositoryError>;

    fn get_policy(
        &self,
        ctx: &OrganizationContext,
        id: &PolicyId,
    ) -> Result<Option<Policy>, RepositoryError>;

    fn get_evidence(
        &self,
        ctx: &OrganizationContext,
        id: &EvidenceId,
    ) -> Result<Option<Evidence>, RepositoryError>;

    /// Uploaded file URL for a requirement mapping, if any.
    fn get_file(
        &self,
        ctx: &OrganizationContext,
        requirement_map_id: &str,
    ) -> Result<Option<String>, RepositoryError>;

    /// Published flag of a training or other generic record.
    fn get_training(
        &self,
        ctx: &OrganizationContext,
        id: &str,
    ) -> Result<Option<bool>, RepositoryError>;
}
