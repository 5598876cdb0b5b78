use std::sync::Arc;

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::workflows::compliance::adapters::{
    ArtifactLink, ControlRecord, EmbeddedPolicy, RequirementMapping,
};
use crate::workflows::compliance::domain::{
    ArtifactType, Control, ControlId, Evidence, EvidenceId, FrameworkInstance,
    FrameworkInstanceId, LinkedArtifact, ManualAttestation, Requirement, RequirementId, Task,
    TaskEntityType, TaskId, TaskStatus,
};
use crate::workflows::compliance::repository::ComplianceStore;
use crate::workflows::compliance::service::ComplianceReadService;
use crate::workflows::compliance::snapshot::{ComplianceSnapshot, FileRecord, TrainingRecord};
use crate::workflows::context::{OrganizationContext, OrganizationId};
use crate::workflows::policies::domain::{
    Department, Policy, PolicyId, PolicyStatus, ReviewFrequency,
};
use crate::workflows::store::RepositoryError;

pub(super) const ORG: &str = "org-acme";
pub(super) const OTHER_ORG: &str = "org-globex";
pub(super) const FRAMEWORK: &str = "fw-soc2";

pub(super) fn ctx() -> OrganizationContext {
    OrganizationContext::new(ORG, "mem-auditor")
}

pub(super) fn policy_requirement(id: &str, status: PolicyStatus) -> Requirement {
    Requirement {
        id: RequirementId(id.to_string()),
        framework_instance_id: None,
        requirement_id: None,
        artifact_type: ArtifactType::Policy,
        linked: Some(LinkedArtifact::Policy {
            id: PolicyId(format!("pol-{id}")),
            status,
        }),
    }
}

pub(super) fn record_requirement(id: &str, published: bool) -> Requirement {
    Requirement {
        id: RequirementId(id.to_string()),
        framework_instance_id: None,
        requirement_id: None,
        artifact_type: ArtifactType::Training,
        linked: Some(LinkedArtifact::Record { published }),
    }
}

pub(super) fn evidence(id: &str, published: bool) -> Evidence {
    Evidence {
        id: EvidenceId(id.to_string()),
        organization_id: OrganizationId(ORG.to_string()),
        published,
        is_not_relevant: false,
        last_published_at: None,
        frequency: None,
    }
}

pub(super) fn control(id: &str, requirements: Vec<Requirement>) -> Control {
    Control {
        id: ControlId(id.to_string()),
        organization_id: OrganizationId(ORG.to_string()),
        name: format!("Control {id}"),
        description: String::new(),
        requirements,
        manual_status: None,
    }
}

pub(super) fn attested(mut control: Control, attestation: ManualAttestation) -> Control {
    control.manual_status = Some(attestation);
    control
}

pub(super) fn task(id: &str, control_id: &str, status: TaskStatus) -> Task {
    Task {
        id: TaskId(id.to_string()),
        organization_id: OrganizationId(ORG.to_string()),
        title: format!("Task {id}"),
        status,
        entity_type: TaskEntityType::Control,
        entity_id: control_id.to_string(),
    }
}

pub(super) fn framework() -> FrameworkInstance {
    FrameworkInstance {
        id: FrameworkInstanceId(FRAMEWORK.to_string()),
        organization_id: OrganizationId(ORG.to_string()),
        framework_id: "soc2".to_string(),
        framework_name: "SOC 2".to_string(),
    }
}

pub(super) fn stored_policy(id: &str, status: PolicyStatus) -> Policy {
    Policy {
        id: PolicyId(id.to_string()),
        organization_id: OrganizationId(ORG.to_string()),
        name: format!("Policy {id}"),
        description: String::new(),
        status,
        is_archived: false,
        archived_at: None,
        assignee_id: None,
        approver_id: None,
        department: Department::Gov,
        review_frequency: ReviewFrequency::Yearly,
        review_date: Utc
            .with_ymd_and_hms(2025, 1, 15, 0, 0, 0)
            .single()
            .expect("valid timestamp"),
        is_required_to_sign: false,
        version: 1,
    }
}

pub(super) fn mapping(
    id: &str,
    artifact_type: &str,
    linked_id: Option<&str>,
) -> RequirementMapping {
    RequirementMapping {
        id: id.to_string(),
        requirement_id: format!("CC-{id}"),
        framework_instance_id: FrameworkInstanceId(FRAMEWORK.to_string()),
        artifact_type: artifact_type.to_string(),
        linked_id: linked_id.map(str::to_string),
    }
}

pub(super) fn mapped_control(id: &str, mappings: Vec<RequirementMapping>) -> ControlRecord {
    ControlRecord {
        id: ControlId(id.to_string()),
        organization_id: OrganizationId(ORG.to_string()),
        name: format!("Control {id}"),
        description: String::new(),
        manual_status: None,
        artifacts: Vec::new(),
        requirements_mapped: mappings,
        framework_instance_ids: Vec::new(),
    }
}

pub(super) fn legacy_policy_artifact(id: &str, status: PolicyStatus) -> ArtifactLink {
    ArtifactLink {
        id: id.to_string(),
        artifact_type: "policy".to_string(),
        policy: Some(EmbeddedPolicy {
            id: PolicyId(format!("pol-{id}")),
            status,
        }),
        evidence: None,
        file_url: None,
        published: None,
    }
}

/// SOC 2 workspace: ctl-a fully satisfied, ctl-b half done, ctl-c untouched
/// legacy control.
pub(super) fn soc2_snapshot() -> ComplianceSnapshot {
    let mut snapshot = ComplianceSnapshot {
        frameworks: vec![framework()],
        policies: vec![
            stored_policy("pol-access", PolicyStatus::Published),
            stored_policy("pol-backup", PolicyStatus::Draft),
        ],
        evidence: vec![evidence("ev-pentest", true)],
        ..ComplianceSnapshot::default()
    };
    snapshot.files.push(FileRecord {
        organization_id: OrganizationId(ORG.to_string()),
        requirement_map_id: "map-a3".to_string(),
        url: "https://files.example.com/a3.pdf".to_string(),
    });
    snapshot.training.push(TrainingRecord {
        id: "trn-awareness".to_string(),
        organization_id: OrganizationId(ORG.to_string()),
        published: true,
    });

    snapshot.controls = vec![
        mapped_control(
            "ctl-a",
            vec![
                mapping("map-a1", "policy", Some("pol-access")),
                mapping("map-a2", "evidence", Some("ev-pentest")),
                mapping("map-a3", "file", None),
                mapping("map-a4", "training", Some("trn-awareness")),
            ],
        ),
        mapped_control(
            "ctl-b",
            vec![
                mapping("map-b1", "policy", Some("pol-access")),
                mapping("map-b2", "policy", Some("pol-backup")),
            ],
        ),
        ControlRecord {
            artifacts: vec![legacy_policy_artifact("art-c1", PolicyStatus::Draft)],
            framework_instance_ids: vec![FrameworkInstanceId(FRAMEWORK.to_string())],
            ..mapped_control("ctl-c", Vec::new())
        },
    ];
    snapshot
}

pub(super) fn build_service(
    snapshot: ComplianceSnapshot,
) -> ComplianceReadService<ComplianceSnapshot> {
    ComplianceReadService::new(Arc::new(snapshot))
}

/// Store that is reachable for controls but fails on every linked-record lookup.
pub(super) struct FlakyStore {
    pub(super) inner: ComplianceSnapshot,
}

impl ComplianceStore for FlakyStore {
    fn get_control(
        &self,
        ctx: &OrganizationContext,
        id: &ControlId,
    ) -> Result<Option<ControlRecord>, RepositoryError> {
        self.inner.get_control(ctx, id)
    }

    fn list_controls_for_framework(
        &self,
        ctx: &OrganizationContext,
        framework_instance_id: &FrameworkInstanceId,
    ) -> Result<Vec<ControlRecord>, RepositoryError> {
        self.inner.list_controls_for_framework(ctx, framework_instance_id)
    }

    fn get_framework_instance(
        &self,
        ctx: &OrganizationContext,
        id: &FrameworkInstanceId,
    ) -> Result<Option<FrameworkInstance>, RepositoryError> {
        self.inner.get_framework_instance(ctx, id)
    }

    fn tasks_for_control(
        &self,
        ctx: &OrganizationContext,
        control_id: &ControlId,
    ) -> Result<Vec<Task>, RepositoryError> {
        self.inner.tasks_for_control(ctx, control_id)
    }

    fn get_policy(
        &self,
        _ctx: &OrganizationContext,
        _id: &PolicyId,
    ) -> Result<Option<Policy>, RepositoryError> {
        Err(RepositoryError::Unavailable("policy table offline".to_string()))
    }

    fn get_evidence(
        &self,
        _ctx: &OrganizationContext,
        _id: &EvidenceId,
    ) -> Result<Option<Evidence>, RepositoryError> {
        Err(RepositoryError::NotFound)
    }

    fn get_file(
        &self,
        _ctx: &OrganizationContext,
        _requirement_map_id: &str,
    ) -> Result<Option<String>, RepositoryError> {
        Err(RepositoryError::NotFound)
    }

    fn get_training(
        &self,
        _ctx: &OrganizationContext,
        _id: &str,
    ) -> Result<Option<bool>, RepositoryError> {
        Err(RepositoryError::NotFound)
    }
}

pub(super) async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}
