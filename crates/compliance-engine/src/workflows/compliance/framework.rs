use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    ComplianceStatus, Control, ControlId, ControlProgressResponse, FrameworkInstance,
    FrameworkInstanceId, ManualAttestation, Task,
};
use super::progress::{percentage, ControlProgressAggregator};

/// A control already scored by the control aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlAssessment {
    pub control_id: ControlId,
    pub control_name: String,
    pub manual_status: Option<ManualAttestation>,
    pub progress: ControlProgressResponse,
}

impl ControlAssessment {
    pub fn score(control: &Control, tasks: &[Task]) -> Self {
        Self {
            control_id: control.id.clone(),
            control_name: control.name.clone(),
            manual_status: control.manual_status,
            progress: ControlProgressAggregator::aggregate(control, tasks),
        }
    }

    /// Framework-level classification. A manual attestation always wins.
    pub fn classification(&self) -> ComplianceStatus {
        match self.manual_status {
            Some(ManualAttestation::Compliant) => ComplianceStatus::Compliant,
            Some(ManualAttestation::NonCompliant) => ComplianceStatus::NonCompliant,
            None => match self.progress.status {
                ComplianceStatus::Completed | ComplianceStatus::Compliant => {
                    ComplianceStatus::Compliant
                }
                other => other,
            },
        }
    }
}

/// Framework-level rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkCompliance {
    pub framework_instance_id: FrameworkInstanceId,
    pub framework_name: String,
    pub compliance_pct: u8,
    pub status: ComplianceStatus,
    pub compliant_controls: usize,
    pub total_controls: usize,
    pub per_control: BTreeMap<ControlId, ComplianceStatus>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameworkComplianceAggregator;

impl FrameworkComplianceAggregator {
    /// Only classification-compliant controls count; partial progress earns nothing.
    pub fn aggregate(
        framework: &FrameworkInstance,
        controls: &[ControlAssessment],
    ) -> FrameworkCompliance {
        let per_control: BTreeMap<ControlId, ComplianceStatus> = controls
            .iter()
            .map(|assessment| (assessment.control_id.clone(), assessment.classification()))
            .collect();

        let total_controls = per_control.len();
        let compliant_controls = per_control
            .values()
            .filter(|status| **status == ComplianceStatus::Compliant)
            .count();

        let status = if total_controls == 0 {
            ComplianceStatus::NotStarted
        } else if compliant_controls == total_controls {
            ComplianceStatus::Compliant
        } else if per_control
            .values()
            .any(|status| *status != ComplianceStatus::NotStarted)
        {
            ComplianceStatus::InProgress
        } else {
            ComplianceStatus::NotStarted
        };

        FrameworkCompliance {
            framework_instance_id: framework.id.clone(),
            framework_name: framework.framework_name.clone(),
            compliance_pct: percentage(compliant_controls, total_controls),
            status,
            compliant_controls,
            total_controls,
            per_control,
        }
    }
}

pub fn compute_framework_compliance(
    framework: &FrameworkInstance,
    controls: &[ControlAssessment],
) -> FrameworkCompliance {
    FrameworkComplianceAggregator::aggregate(framework, controls)
}
