use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::approval::{plan_policy_save, ApprovalRequestBuilder, PolicyCommand, SavePlan};
use super::domain::{
    ApprovalRequest, ApprovalResolution, Policy, PolicyForm, PolicyId, PolicyPatch,
};
use super::error::{ConflictError, LifecycleError, ValidationError};
use super::lifecycle::PolicyLifecycle;
use super::repository::{PolicyRecord, PolicyStore};
use crate::workflows::context::{MemberId, OrganizationContext};
use crate::workflows::store::RepositoryError;

/// Save request as submitted by the policy form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePolicyRequest {
    pub form: PolicyForm,
    /// Version the editor loaded. A mismatch means the form is stale.
    #[serde(default)]
    pub expected_version: Option<u64>,
    /// Approver chosen in the submit-for-approval dialog.
    #[serde(default)]
    pub approver_id: Option<MemberId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaveOutcome {
    Unchanged {
        policy: Policy,
    },
    Updated {
        policy: Policy,
    },
    ApprovalRequested {
        policy: Policy,
        request: ApprovalRequest,
    },
}

impl SaveOutcome {
    pub fn policy(&self) -> &Policy {
        match self {
            SaveOutcome::Unchanged { policy }
            | SaveOutcome::Updated { policy }
            | SaveOutcome::ApprovalRequested { policy, .. } => policy,
        }
    }
}

/// Service composing the policy lifecycle, the approval builder, and the store.
pub struct PolicyApprovalService<S> {
    store: Arc<S>,
}

impl<S> PolicyApprovalService<S>
where
    S: PolicyStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn get(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
    ) -> Result<PolicyRecord, PolicyServiceError> {
        let policy = self.load(ctx, policy_id)?;
        let pending_approval = self.store.pending_approval(ctx, policy_id)?;
        Ok(PolicyRecord {
            policy,
            pending_approval,
        })
    }

    /// Dry run of a save: what would happen without writing anything.
    pub fn plan(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
        form: &PolicyForm,
    ) -> Result<SavePlan, PolicyServiceError> {
        let record = self.get(ctx, policy_id)?;
        let plan = plan_policy_save(&record.policy, record.pending_approval.as_ref(), form)?;
        Ok(plan)
    }

    /// Save a form edit, writing directly or opening an approval request.
    pub fn save(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
        request: SavePolicyRequest,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, PolicyServiceError> {
        let record = self.get(ctx, policy_id)?;
        let current = record.policy;

        if let Some(expected) = request.expected_version {
            if expected != current.version {
                warn!(%policy_id, expected, found = current.version, "stale policy form");
                return Err(ConflictError::ConcurrentUpdate {
                    policy_id: policy_id.clone(),
                }
                .into());
            }
        }

        let verdict = PolicyLifecycle::evaluate_save(
            &current,
            record.pending_approval.as_ref(),
            &request.form,
        )?;
        let command = ApprovalRequestBuilder::build(&current, verdict, request.approver_id)?;

        match command {
            None => Ok(SaveOutcome::Unchanged { policy: current }),
            Some(PolicyCommand::Direct(command)) => {
                let policy = self
                    .store
                    .update_policy(ctx, policy_id, command.expected_version, &command.changes)
                    .map_err(|err| write_error(policy_id, err))?;
                info!(%policy_id, version = policy.version, "policy updated");
                Ok(SaveOutcome::Updated { policy })
            }
            Some(PolicyCommand::RequestApproval(command)) => {
                let approver = self.store.find_member(ctx, &command.approver_id)?;
                PolicyLifecycle::validate_approver(
                    &ctx.organization_id,
                    Some(&command.approver_id),
                    approver.as_ref(),
                )?;

                let patch = command.submission_patch();
                let expected_version = command.expected_version;
                let approval = command.into_request(&current, ctx.member_id.clone(), now);

                let (policy, request) = self
                    .store
                    .create_approval_request(ctx, approval, expected_version, &patch)
                    .map_err(|err| self.submission_error(ctx, policy_id, err))?;
                info!(
                    %policy_id,
                    request_id = %request.id,
                    approver_id = %request.approver_id,
                    "policy submitted for approval"
                );
                Ok(SaveOutcome::ApprovalRequested { policy, request })
            }
        }
    }

    /// Accept the pending approval and publish the proposed values.
    pub fn confirm_approval(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
        approver_id: Option<&MemberId>,
        now: DateTime<Utc>,
    ) -> Result<Policy, PolicyServiceError> {
        let approver_id = approver_id.ok_or(ValidationError::ApproverRequired)?;
        if ctx.member_id != *approver_id {
            warn!(
                %policy_id,
                %approver_id,
                member_id = %ctx.member_id,
                "approval confirmed by someone other than the approver"
            );
            return Err(ValidationError::ApproverMismatch {
                expected: approver_id.clone(),
                found: ctx.member_id.clone(),
            }
            .into());
        }
        let record = self.get(ctx, policy_id)?;
        let approver = self.store.find_member(ctx, approver_id)?;

        let patch = PolicyLifecycle::confirm(
            &ctx.organization_id,
            record.pending_approval.as_ref(),
            Some(approver_id),
            approver.as_ref(),
        )?;

        let policy = self.resolve(
            ctx,
            policy_id,
            &record,
            ApprovalResolution::Accepted,
            now,
            &patch,
        )?;
        info!(%policy_id, %approver_id, "policy approval confirmed");
        Ok(policy)
    }

    /// Abandon the pending approval, restoring the state before submission.
    pub fn cancel_approval(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
        now: DateTime<Utc>,
    ) -> Result<Policy, PolicyServiceError> {
        let record = self.get(ctx, policy_id)?;
        let patch = PolicyLifecycle::cancel(record.pending_approval.as_ref())?;

        let policy = self.resolve(
            ctx,
            policy_id,
            &record,
            ApprovalResolution::Cancelled,
            now,
            &patch,
        )?;
        info!(%policy_id, status = %policy.status, "policy approval cancelled");
        Ok(policy)
    }

    pub fn archive(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
        now: DateTime<Utc>,
    ) -> Result<Policy, PolicyServiceError> {
        let current = self.load(ctx, policy_id)?;
        match PolicyLifecycle::archive(&current, now) {
            Some(patch) => self.write(ctx, policy_id, current.version, &patch),
            None => Ok(current),
        }
    }

    pub fn restore(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
    ) -> Result<Policy, PolicyServiceError> {
        let current = self.load(ctx, policy_id)?;
        match PolicyLifecycle::restore(&current) {
            Some(patch) => self.write(ctx, policy_id, current.version, &patch),
            None => Ok(current),
        }
    }

    fn load(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
    ) -> Result<Policy, PolicyServiceError> {
        self.store
            .get_policy(ctx, policy_id)?
            .ok_or_else(|| PolicyServiceError::NotFound(policy_id.clone()))
    }

    fn write(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<Policy, PolicyServiceError> {
        let policy = self
            .store
            .update_policy(ctx, policy_id, expected_version, patch)
            .map_err(|err| write_error(policy_id, err))?;
        info!(%policy_id, archived = policy.is_archived, "policy archive flag updated");
        Ok(policy)
    }

    /// A conflict on submission is either a stale version or a request that
    /// another editor opened after this one read the policy.
    fn submission_error(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
        err: RepositoryError,
    ) -> PolicyServiceError {
        if err == RepositoryError::Conflict {
            if let Ok(Some(_)) = self.store.pending_approval(ctx, policy_id) {
                warn!(%policy_id, "approval request opened concurrently");
                return ConflictError::ApprovalPending {
                    policy_id: policy_id.clone(),
                }
                .into();
            }
        }
        write_error(policy_id, err)
    }

    fn resolve(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
        record: &PolicyRecord,
        resolution: ApprovalResolution,
        now: DateTime<Utc>,
        patch: &PolicyPatch,
    ) -> Result<Policy, PolicyServiceError> {
        let request = record
            .pending_approval
            .as_ref()
            .ok_or(ValidationError::NoPendingApproval)?;

        let (policy, _) = self
            .store
            .resolve_approval_request(
                ctx,
                &request.id,
                resolution,
                now,
                record.policy.version,
                patch,
            )
            .map_err(|err| write_error(policy_id, err))?;
        Ok(policy)
    }
}

fn write_error(policy_id: &PolicyId, err: RepositoryError) -> PolicyServiceError {
    match err {
        RepositoryError::Conflict => {
            warn!(%policy_id, "policy write rejected by concurrency check");
            ConflictError::ConcurrentUpdate {
                policy_id: policy_id.clone(),
            }
            .into()
        }
        RepositoryError::NotFound => PolicyServiceError::NotFound(policy_id.clone()),
        other => PolicyServiceError::Repository(other),
    }
}

/// Error raised by the policy approval service.
#[derive(Debug, thiserror::Error)]
pub enum PolicyServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("policy {0} not found")]
    NotFound(PolicyId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<LifecycleError> for PolicyServiceError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::Validation(err) => Self::Validation(err),
            LifecycleError::Conflict(err) => Self::Conflict(err),
        }
    }
}
