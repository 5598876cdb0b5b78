use std::fmt;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::context::{MemberId, OrganizationId};

/// Identifier wrapper for policies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub String);

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for approval requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApprovalRequestId(pub String);

impl fmt::Display for ApprovalRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted lifecycle status of a policy. Archival is tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Draft,
    NeedsReview,
    Published,
}

impl PolicyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PolicyStatus::Draft => "draft",
            PolicyStatus::NeedsReview => "needs_review",
            PolicyStatus::Published => "published",
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Owning department recorded on a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    None,
    Admin,
    Gov,
    Hr,
    It,
    Itsm,
    Qms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewFrequency {
    Monthly,
    Quarterly,
    Yearly,
}

impl ReviewFrequency {
    pub const fn months(self) -> u32 {
        match self {
            ReviewFrequency::Monthly => 1,
            ReviewFrequency::Quarterly => 3,
            ReviewFrequency::Yearly => 12,
        }
    }

    /// Next review date after `reviewed_on`, clamped to the end of shorter months.
    pub fn next_review_from(self, reviewed_on: NaiveDate) -> Option<NaiveDate> {
        reviewed_on.checked_add_months(Months::new(self.months()))
    }
}

/// Organization member as seen by the approval gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub active: bool,
}

/// Persisted policy snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: String,
    pub status: PolicyStatus,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub assignee_id: Option<MemberId>,
    pub approver_id: Option<MemberId>,
    pub department: Department,
    pub review_frequency: ReviewFrequency,
    pub review_date: DateTime<Utc>,
    pub is_required_to_sign: bool,
    /// Optimistic concurrency token bumped by the store on every write.
    #[serde(default)]
    pub version: u64,
}

impl Policy {
    /// Editable fields as a form would present them.
    pub fn form(&self) -> PolicyForm {
        PolicyForm {
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status,
            assignee_id: self.assignee_id.clone(),
            department: self.department,
            review_frequency: self.review_frequency,
            review_date: self.review_date,
            is_required_to_sign: self.is_required_to_sign,
        }
    }

    pub fn review_overdue(&self, today: NaiveDate) -> bool {
        today > self.review_date.date_naive()
    }

    pub fn next_review_due(&self) -> Option<NaiveDate> {
        self.review_frequency
            .next_review_from(self.review_date.date_naive())
    }

    /// Apply a patch in place. Stores call this inside their write transaction.
    pub fn apply(&mut self, patch: &PolicyPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(assignee_id) = &patch.assignee_id {
            self.assignee_id = assignee_id.clone();
        }
        if let Some(approver_id) = &patch.approver_id {
            self.approver_id = approver_id.clone();
        }
        if let Some(department) = patch.department {
            self.department = department;
        }
        if let Some(review_frequency) = patch.review_frequency {
            self.review_frequency = review_frequency;
        }
        if let Some(review_date) = patch.review_date {
            self.review_date = review_date;
        }
        if let Some(is_required_to_sign) = patch.is_required_to_sign {
            self.is_required_to_sign = is_required_to_sign;
        }
        if let Some(is_archived) = patch.is_archived {
            self.is_archived = is_archived;
        }
        if let Some(archived_at) = patch.archived_at {
            self.archived_at = archived_at;
        }
    }
}

/// Full set of user-editable fields submitted by the policy form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyForm {
    pub name: String,
    pub description: String,
    pub status: PolicyStatus,
    pub assignee_id: Option<MemberId>,
    pub department: Department,
    pub review_frequency: ReviewFrequency,
    pub review_date: DateTime<Utc>,
    pub is_required_to_sign: bool,
}

/// Field-level write. `None` leaves the persisted value untouched; nested options
/// distinguish "clear" (`Some(None)`) from "keep".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PolicyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Option<MemberId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<Option<MemberId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_frequency: Option<ReviewFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required_to_sign: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<Option<DateTime<Utc>>>,
}

impl PolicyPatch {
    /// Changed editable fields between the persisted policy and a submitted form.
    pub fn diff(current: &Policy, form: &PolicyForm) -> Self {
        Self {
            name: (form.name != current.name).then(|| form.name.clone()),
            description: (form.description != current.description)
                .then(|| form.description.clone()),
            status: (form.status != current.status).then_some(form.status),
            assignee_id: (form.assignee_id != current.assignee_id)
                .then(|| form.assignee_id.clone()),
            approver_id: None,
            department: (form.department != current.department).then_some(form.department),
            review_frequency: (form.review_frequency != current.review_frequency)
                .then_some(form.review_frequency),
            review_date: (form.review_date != current.review_date).then_some(form.review_date),
            is_required_to_sign: (form.is_required_to_sign != current.is_required_to_sign)
                .then_some(form.is_required_to_sign),
            is_archived: None,
            archived_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Tracked field whose change on a published policy forces re-approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialField {
    Status,
    Assignee,
    Department,
    ReviewFrequency,
    ReviewDate,
    RequiredToSign,
}

impl MaterialField {
    pub const fn label(self) -> &'static str {
        match self {
            MaterialField::Status => "status",
            MaterialField::Assignee => "assignee",
            MaterialField::Department => "department",
            MaterialField::ReviewFrequency => "review frequency",
            MaterialField::ReviewDate => "review date",
            MaterialField::RequiredToSign => "signature requirement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalResolution {
    Pending,
    Accepted,
    Cancelled,
}

/// Pending or resolved request to publish a set of proposed policy values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub policy_id: PolicyId,
    pub organization_id: OrganizationId,
    pub approver_id: MemberId,
    pub requested_by: MemberId,
    pub proposed: PolicyPatch,
    pub previous_status: PolicyStatus,
    pub previous_approver_id: Option<MemberId>,
    pub created_at: DateTime<Utc>,
    pub resolution: ApprovalResolution,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    pub fn is_pending(&self) -> bool {
        self.resolution == ApprovalResolution::Pending
    }

    /// Write committed when the approver accepts: every proposed value, the approver,
    /// and `published`.
    pub fn confirmation_patch(&self) -> PolicyPatch {
        PolicyPatch {
            status: Some(PolicyStatus::Published),
            approver_id: Some(Some(self.approver_id.clone())),
            ..self.proposed.clone()
        }
    }

    /// Write that puts the policy back where it was before submission.
    pub fn cancellation_patch(&self) -> PolicyPatch {
        PolicyPatch {
            status: Some(self.previous_status),
            approver_id: Some(self.previous_approver_id.clone()),
            ..PolicyPatch::default()
        }
    }
}
