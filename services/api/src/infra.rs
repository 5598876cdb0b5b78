use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use compliance_engine::workflows::compliance::{
    ComplianceSnapshot, ComplianceStore, ControlId, ControlRecord, Evidence, EvidenceId,
    FileRecord, FrameworkInstance, FrameworkInstanceId, RequirementMapping, Task, TaskEntityType,
    TaskId, TaskStatus, TrainingRecord,
};
use compliance_engine::workflows::policies::{
    ApprovalRequest, ApprovalRequestId, ApprovalResolution, Department, Member, Policy,
    PolicyId, PolicyPatch, PolicyStatus, PolicyStore, ReviewFrequency,
};
use compliance_engine::workflows::{
    MemberId, OrganizationContext, OrganizationId, RepositoryError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) const DEMO_ORG: &str = "org-demo";
pub(crate) const DEMO_FRAMEWORK: &str = "fw-soc2";
pub(crate) const DEMO_EDITOR: &str = "mem-dana";
pub(crate) const DEMO_APPROVER: &str = "mem-casey";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct StoreState {
    policies: Vec<Policy>,
    members: Vec<Member>,
    requests: Vec<ApprovalRequest>,
    /// Controls, tasks, evidence and files. Policies live in `policies` so that
    /// approvals show up in compliance rollups immediately.
    records: ComplianceSnapshot,
}

/// Process-local store backing both workflows.
#[derive(Default, Clone)]
pub(crate) struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Store seeded with a small SOC 2 workspace for the demo organization.
    pub(crate) fn seeded() -> Self {
        let org = OrganizationId(DEMO_ORG.to_string());
        let framework = FrameworkInstanceId(DEMO_FRAMEWORK.to_string());

        let members = [
            (DEMO_EDITOR, "Dana Editor", true),
            (DEMO_APPROVER, "Casey CISO", true),
            ("mem-former", "Former Employee", false),
        ]
        .into_iter()
        .map(|(id, name, active)| Member {
            id: MemberId(id.to_string()),
            organization_id: org.clone(),
            name: name.to_string(),
            active,
        })
        .collect();

        let policies = vec![
            demo_policy("pol-access", "Access Control Policy", PolicyStatus::Draft),
            demo_policy(
                "pol-incident",
                "Incident Response Policy",
                PolicyStatus::Published,
            ),
        ];

        let mapping = |id: &str, requirement: &str, kind: &str, linked: Option<&str>| {
            RequirementMapping {
                id: id.to_string(),
                requirement_id: requirement.to_string(),
                framework_instance_id: framework.clone(),
                artifact_type: kind.to_string(),
                linked_id: linked.map(str::to_string),
            }
        };
        let control = |id: &str, name: &str, mappings: Vec<RequirementMapping>| ControlRecord {
            id: ControlId(id.to_string()),
            organization_id: org.clone(),
            name: name.to_string(),
            description: String::new(),
            manual_status: None,
            artifacts: Vec::new(),
            requirements_mapped: mappings,
            framework_instance_ids: Vec::new(),
        };

        let mut records = ComplianceSnapshot {
            frameworks: vec![FrameworkInstance {
                id: framework.clone(),
                organization_id: org.clone(),
                framework_id: "soc2".to_string(),
                framework_name: "SOC 2".to_string(),
            }],
            controls: vec![
                control(
                    "ctl-access",
                    "Logical access is restricted",
                    vec![
                        mapping("map-1", "CC6.1", "policy", Some("pol-access")),
                        mapping("map-2", "CC6.1", "evidence", Some("ev-access-review")),
                    ],
                ),
                control(
                    "ctl-incident",
                    "Incidents are detected and handled",
                    vec![
                        mapping("map-3", "CC7.3", "policy", Some("pol-incident")),
                        mapping("map-4", "CC7.4", "file", None),
                    ],
                ),
                control(
                    "ctl-awareness",
                    "Staff complete security awareness training",
                    vec![mapping("map-5", "CC2.2", "training", Some("trn-2025"))],
                ),
            ],
            tasks: vec![
                demo_task(
                    "task-1",
                    "Run quarterly access review",
                    TaskStatus::Done,
                    "ctl-access",
                ),
                demo_task(
                    "task-2",
                    "Tabletop exercise",
                    TaskStatus::InProgress,
                    "ctl-incident",
                ),
            ],
            evidence: vec![Evidence {
                id: EvidenceId("ev-access-review".to_string()),
                organization_id: org.clone(),
                published: true,
                is_not_relevant: false,
                last_published_at: Some(seed_time(2025, 1, 10)),
                frequency: None,
            }],
            ..ComplianceSnapshot::default()
        };
        records.files.push(FileRecord {
            organization_id: org.clone(),
            requirement_map_id: "map-4".to_string(),
            url: "https://files.example.com/incident-runbook.pdf".to_string(),
        });
        records.training.push(TrainingRecord {
            id: "trn-2025".to_string(),
            organization_id: org,
            published: false,
        });

        Self {
            state: Arc::new(Mutex::new(StoreState {
                policies,
                members,
                requests: Vec::new(),
                records,
            })),
        }
    }
}

fn seed_time(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

fn demo_policy(id: &str, name: &str, status: PolicyStatus) -> Policy {
    Policy {
        id: PolicyId(id.to_string()),
        organization_id: OrganizationId(DEMO_ORG.to_string()),
        name: name.to_string(),
        description: String::new(),
        status,
        is_archived: false,
        archived_at: None,
        assignee_id: Some(MemberId(DEMO_EDITOR.to_string())),
        approver_id: (status == PolicyStatus::Published)
            .then(|| MemberId(DEMO_APPROVER.to_string())),
        department: Department::It,
        review_frequency: ReviewFrequency::Yearly,
        review_date: seed_time(2025, 2, 1),
        is_required_to_sign: false,
        version: 1,
    }
}

fn demo_task(id: &str, title: &str, status: TaskStatus, control_id: &str) -> Task {
    Task {
        id: TaskId(id.to_string()),
        organization_id: OrganizationId(DEMO_ORG.to_string()),
        title: title.to_string(),
        status,
        entity_type: TaskEntityType::Control,
        entity_id: control_id.to_string(),
    }
}

fn apply_write(
    state: &mut StoreState,
    ctx: &OrganizationContext,
    id: &PolicyId,
    expected_version: u64,
    patch: &PolicyPatch,
) -> Result<Policy, RepositoryError> {
    let policy = state
        .policies
        .iter_mut()
        .find(|policy| policy.id == *id && policy.organization_id == ctx.organization_id)
        .ok_or(RepositoryError::NotFound)?;
    if policy.version != expected_version {
        return Err(RepositoryError::Conflict);
    }
    policy.apply(patch);
    policy.version += 1;
    Ok(policy.clone())
}

impl PolicyStore for InMemoryStore {
    fn get_policy(
        &self,
        ctx: &OrganizationContext,
        id: &PolicyId,
    ) -> Result<Option<Policy>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .policies
            .iter()
            .find(|policy| policy.id == *id && policy.organization_id == ctx.organization_id)
            .cloned())
    }

    fn update_policy(
        &self,
        ctx: &OrganizationContext,
        id: &PolicyId,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<Policy, RepositoryError> {
        let mut state = self.lock()?;
        apply_write(&mut state, ctx, id, expected_version, patch)
    }

    // Not scoped: members of other organizations resolve so the approval gate
    // can reject them as ineligible.
    fn find_member(
        &self,
        _ctx: &OrganizationContext,
        id: &MemberId,
    ) -> Result<Option<Member>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.members.iter().find(|member| member.id == *id).cloned())
    }

    fn pending_approval(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .requests
            .iter()
            .find(|request| {
                request.policy_id == *policy_id
                    && request.organization_id == ctx.organization_id
                    && request.is_pending()
            })
            .cloned())
    }

    fn create_approval_request(
        &self,
        ctx: &OrganizationContext,
        request: ApprovalRequest,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<(Policy, ApprovalRequest), RepositoryError> {
        let mut state = self.lock()?;
        if state
            .requests
            .iter()
            .any(|existing| {
                existing.policy_id == request.policy_id
                    && existing.organization_id == ctx.organization_id
                    && existing.is_pending()
            })
        {
            return Err(RepositoryError::Conflict);
        }
        let policy = apply_write(&mut state, ctx, &request.policy_id, expected_version, patch)?;
        state.requests.push(request.clone());
        Ok((policy, request))
    }

    fn resolve_approval_request(
        &self,
        ctx: &OrganizationContext,
        id: &ApprovalRequestId,
        resolution: ApprovalResolution,
        resolved_at: DateTime<Utc>,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<(Policy, ApprovalRequest), RepositoryError> {
        let mut state = self.lock()?;
        let index = state
            .requests
            .iter()
            .position(|request| {
                request.id == *id
                    && request.organization_id == ctx.organization_id
                    && request.is_pending()
            })
            .ok_or(RepositoryError::NotFound)?;
        let policy_id = state.requests[index].policy_id.clone();
        let policy = apply_write(&mut state, ctx, &policy_id, expected_version, patch)?;

        let request = &mut state.requests[index];
        request.resolution = resolution;
        request.resolved_at = Some(resolved_at);
        Ok((policy, request.clone()))
    }
}

impl ComplianceStore for InMemoryStore {
    fn get_control(
        &self,
        ctx: &OrganizationContext,
        id: &ControlId,
    ) -> Result<Option<ControlRecord>, RepositoryError> {
        self.lock()?.records.get_control(ctx, id)
    }

    fn list_controls_for_framework(
        &self,
        ctx: &OrganizationContext,
        framework_instance_id: &FrameworkInstanceId,
    ) -> Result<Vec<ControlRecord>, RepositoryError> {
        self.lock()?
            .records
            .list_controls_for_framework(ctx, framework_instance_id)
    }

    fn get_framework_instance(
        &self,
        ctx: &OrganizationContext,
        id: &FrameworkInstanceId,
    ) -> Result<Option<FrameworkInstance>, RepositoryError> {
        self.lock()?.records.get_framework_instance(ctx, id)
    }

    fn tasks_for_control(
        &self,
        ctx: &OrganizationContext,
        control_id: &ControlId,
    ) -> Result<Vec<Task>, RepositoryError> {
        self.lock()?.records.tasks_for_control(ctx, control_id)
    }

    fn get_policy(
        &self,
        ctx: &OrganizationContext,
        id: &PolicyId,
    ) -> Result<Option<Policy>, RepositoryError> {
        PolicyStore::get_policy(self, ctx, id)
    }

    fn get_evidence(
        &self,
        ctx: &OrganizationContext,
        id: &EvidenceId,
    ) -> Result<Option<Evidence>, RepositoryError> {
        self.lock()?.records.get_evidence(ctx, id)
    }

    fn get_file(
        &self,
        ctx: &OrganizationContext,
        requirement_map_id: &str,
    ) -> Result<Option<String>, RepositoryError> {
        self.lock()?.records.get_file(ctx, requirement_map_id)
    }

    fn get_training(
        &self,
        ctx: &OrganizationContext,
        id: &str,
    ) -> Result<Option<bool>, RepositoryError> {
        self.lock()?.records.get_training(ctx, id)
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
