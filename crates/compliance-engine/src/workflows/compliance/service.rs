use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::domain::{
    ComplianceStatus, ControlId, ControlProgressResponse, FrameworkInstanceId, ManualAttestation,
};
use super::framework::{compute_framework_compliance, ControlAssessment, FrameworkCompliance};
use super::progress::compute_control_progress;
use super::repository::ComplianceStore;
use crate::workflows::context::OrganizationContext;
use crate::workflows::store::RepositoryError;

/// Control progress as served to the control detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlProgressView {
    pub control_id: ControlId,
    pub control_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_status: Option<ManualAttestation>,
    #[serde(flatten)]
    pub progress: ControlProgressResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlComplianceRow {
    pub control_id: ControlId,
    pub control_name: String,
    pub status: ComplianceStatus,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameworkComplianceView {
    pub framework_instance_id: FrameworkInstanceId,
    pub framework_name: String,
    pub compliance_pct: u8,
    pub status: ComplianceStatus,
    pub compliant_controls: usize,
    pub total_controls: usize,
    /// Sorted by control id.
    pub controls: Vec<ControlComplianceRow>,
}

impl FrameworkComplianceView {
    fn from_parts(compliance: FrameworkCompliance, assessments: &[ControlAssessment]) -> Self {
        let mut controls: Vec<ControlComplianceRow> = assessments
            .iter()
            .map(|assessment| ControlComplianceRow {
                control_id: assessment.control_id.clone(),
                control_name: assessment.control_name.clone(),
                status: assessment.classification(),
                progress: assessment.progress.progress,
            })
            .collect();
        controls.sort_by(|a, b| a.control_id.cmp(&b.control_id));

        Self {
            framework_instance_id: compliance.framework_instance_id,
            framework_name: compliance.framework_name,
            compliance_pct: compliance.compliance_pct,
            status: compliance.status,
            compliant_controls: compliance.compliant_controls,
            total_controls: compliance.total_controls,
            controls,
        }
    }
}

/// Read-only service scoring controls and frameworks from a store.
pub struct ComplianceReadService<S: ?Sized> {
    store: Arc<S>,
}

impl<S> ComplianceReadService<S>
where
    S: ComplianceStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn control_progress(
        &self,
        ctx: &OrganizationContext,
        control_id: &ControlId,
    ) -> Result<ControlProgressView, ComplianceServiceError> {
        let assessment = self.assess(ctx, control_id)?;
        Ok(ControlProgressView {
            control_id: assessment.control_id,
            control_name: assessment.control_name,
            manual_status: assessment.manual_status,
            progress: assessment.progress,
        })
    }

    pub fn framework_compliance(
        &self,
        ctx: &OrganizationContext,
        framework_instance_id: &FrameworkInstanceId,
    ) -> Result<FrameworkComplianceView, ComplianceServiceError> {
        let framework = self
            .store
            .get_framework_instance(ctx, framework_instance_id)?
            .ok_or_else(|| ComplianceServiceError::FrameworkNotFound(framework_instance_id.clone()))?;

        let records = self
            .store
            .list_controls_for_framework(ctx, framework_instance_id)?;

        let mut assessments = Vec::with_capacity(records.len());
        for record in &records {
            let control = record.resolve(ctx, self.store.as_ref())?;
            let tasks = self.store.tasks_for_control(ctx, &control.id)?;
            assessments.push(ControlAssessment::score(&control, &tasks));
        }

        let compliance = compute_framework_compliance(&framework, &assessments);
        debug!(
            framework = %framework.id,
            controls = compliance.total_controls,
            compliant = compliance.compliant_controls,
            pct = compliance.compliance_pct,
            "framework compliance computed"
        );
        Ok(FrameworkComplianceView::from_parts(compliance, &assessments))
    }

    fn assess(
        &self,
        ctx: &OrganizationContext,
        control_id: &ControlId,
    ) -> Result<ControlAssessment, ComplianceServiceError> {
        let record = self
            .store
            .get_control(ctx, control_id)?
            .ok_or_else(|| ComplianceServiceError::ControlNotFound(control_id.clone()))?;
        let control = record.resolve(ctx, self.store.as_ref())?;
        let tasks = self.store.tasks_for_control(ctx, control_id)?;

        let progress = compute_control_progress(&control, &tasks);
        Ok(ControlAssessment {
            control_id: control.id,
            control_name: control.name,
            manual_status: control.manual_status,
            progress,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComplianceServiceError {
    #[error("control {0} not found")]
    ControlNotFound(ControlId),
    #[error("framework instance {0} not found")]
    FrameworkNotFound(FrameworkInstanceId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
