use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::context::OrganizationId;
use crate::workflows::policies::domain::{PolicyId, PolicyStatus};

/// Identifier wrapper for controls.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControlId(pub String);

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for an organization's adoption of a framework.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameworkInstanceId(pub String);

impl fmt::Display for FrameworkInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequirementId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EvidenceId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

/// Declared kind of artifact satisfying a requirement.
///
/// Serialized as its lowercase tag. Tags the engine does not recognize are kept
/// verbatim so they still show up in per-type breakdowns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArtifactType {
    Policy,
    File,
    Evidence,
    Training,
    Other,
    Unknown(String),
}

impl ArtifactType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "policy" => Self::Policy,
            "file" => Self::File,
            "evidence" => Self::Evidence,
            "training" => Self::Training,
            "other" => Self::Other,
            _ => Self::Unknown(tag.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Policy => "policy",
            Self::File => "file",
            Self::Evidence => "evidence",
            Self::Training => "training",
            Self::Other => "other",
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<String> for ArtifactType {
    fn from(value: String) -> Self {
        Self::from_tag(&value)
    }
}

impl From<ArtifactType> for String {
    fn from(value: ArtifactType) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

/// Evidence record. Not-relevant evidence is never published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: EvidenceId,
    pub organization_id: OrganizationId,
    pub published: bool,
    pub is_not_relevant: bool,
    #[serde(default)]
    pub last_published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub frequency: Option<EvidenceFrequency>,
}

impl Evidence {
    /// Flip relevance. Marking evidence not relevant force-unpublishes it.
    pub fn set_not_relevant(&mut self, not_relevant: bool) {
        self.is_not_relevant = not_relevant;
        if not_relevant {
            self.published = false;
        }
    }

    /// Publish the evidence. Returns `false` and leaves it untouched while it is
    /// marked not relevant.
    pub fn publish(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_not_relevant {
            return false;
        }
        self.published = true;
        self.last_published_at = Some(at);
        true
    }

    pub fn counts_as_published(&self) -> bool {
        self.published && !self.is_not_relevant
    }
}

/// Concrete record a requirement points at, already resolved by the adapter layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkedArtifact {
    Policy {
        id: PolicyId,
        status: PolicyStatus,
    },
    File {
        url: Option<String>,
    },
    Evidence(Evidence),
    /// Training and other generic records only expose a published flag.
    Record {
        published: bool,
    },
}

/// Normalized requirement link, independent of the stored shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    #[serde(default)]
    pub framework_instance_id: Option<FrameworkInstanceId>,
    #[serde(default)]
    pub requirement_id: Option<String>,
    pub artifact_type: ArtifactType,
    #[serde(default)]
    pub linked: Option<LinkedArtifact>,
}

/// Manual attestation recorded on a control. Overrides the computed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualAttestation {
    Compliant,
    NonCompliant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub id: ControlId,
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub manual_status: Option<ManualAttestation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    NotRelevant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEntityType {
    Control,
    Policy,
    Vendor,
    Risk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub organization_id: OrganizationId,
    pub title: String,
    pub status: TaskStatus,
    pub entity_type: TaskEntityType,
    pub entity_id: String,
}

impl Task {
    pub fn is_attached_to(&self, control_id: &ControlId) -> bool {
        self.entity_type == TaskEntityType::Control && self.entity_id == control_id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkInstance {
    pub id: FrameworkInstanceId,
    pub organization_id: OrganizationId,
    pub framework_id: String,
    pub framework_name: String,
}

/// Derived status shared by controls and frameworks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    NotStarted,
    InProgress,
    Completed,
    Compliant,
    NonCompliant,
}

impl ComplianceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ComplianceStatus::NotStarted => "not_started",
            ComplianceStatus::InProgress => "in_progress",
            ComplianceStatus::Completed => "completed",
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::NonCompliant => "non_compliant",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeProgress {
    pub total: usize,
    pub completed: usize,
}

/// Control-level rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlProgressResponse {
    pub total: usize,
    pub completed: usize,
    /// Whole percentage, 0..=100.
    pub progress: u8,
    pub by_type: BTreeMap<String, TypeProgress>,
    pub status: ComplianceStatus,
}
