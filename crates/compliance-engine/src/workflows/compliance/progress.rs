use std::collections::BTreeMap;

use super::domain::{
    ComplianceStatus, Control, ControlProgressResponse, LinkedArtifact, Task, TaskStatus,
    TypeProgress,
};
use super::requirements::evaluate_requirement;
use crate::workflows::policies::domain::PolicyStatus;

/// Bucket key used for tasks in `by_type`.
pub const TASK_BUCKET: &str = "task";

/// Whole percentage of `completed / total`, rounding halves up. Zero when `total` is zero.
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((200 * completed + total) / (2 * total)) as u8
}

/// Rolls requirements and attached tasks up into a control-level response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlProgressAggregator;

impl ControlProgressAggregator {
    pub fn aggregate(control: &Control, tasks: &[Task]) -> ControlProgressResponse {
        let mut by_type: BTreeMap<String, TypeProgress> = BTreeMap::new();
        let mut linked_activity = false;

        for requirement in &control.requirements {
            let satisfied = evaluate_requirement(requirement);
            let bucket = by_type
                .entry(requirement.artifact_type.label().to_string())
                .or_default();
            bucket.total += 1;
            if satisfied {
                bucket.completed += 1;
            }

            if let Some(LinkedArtifact::Policy { status, .. }) = &requirement.linked {
                linked_activity |= *status != PolicyStatus::Draft;
            }
        }

        for task in tasks.iter().filter(|task| task.is_attached_to(&control.id)) {
            let bucket = by_type.entry(TASK_BUCKET.to_string()).or_default();
            bucket.total += 1;
            if task.status == TaskStatus::Done {
                bucket.completed += 1;
            }
            linked_activity |= task.status != TaskStatus::Todo;
        }

        let total: usize = by_type.values().map(|bucket| bucket.total).sum();
        let completed: usize = by_type.values().map(|bucket| bucket.completed).sum();

        ControlProgressResponse {
            total,
            completed,
            progress: percentage(completed, total),
            by_type,
            status: derive_status(total, completed, linked_activity),
        }
    }
}

// Zero credit with in-flight work (a task picked up, a policy out of draft)
// still reads as in progress on dashboards.
fn derive_status(total: usize, completed: usize, linked_activity: bool) -> ComplianceStatus {
    if total == 0 {
        ComplianceStatus::NotStarted
    } else if completed == total {
        ComplianceStatus::Completed
    } else if completed > 0 || linked_activity {
        ComplianceStatus::InProgress
    } else {
        ComplianceStatus::NotStarted
    }
}

/// Control progress for the given snapshot. Tasks linked to other entities are ignored.
pub fn compute_control_progress(control: &Control, tasks: &[Task]) -> ControlProgressResponse {
    ControlProgressAggregator::aggregate(control, tasks)
}
