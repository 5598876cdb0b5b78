//! Store-shape adapters.
//!
//! Controls are persisted either with embedded `artifacts` (legacy) or with
//! `requirementsMapped` rows pointing at records elsewhere in the store. Both
//! shapes are folded into the normalized [`Requirement`] here so the evaluator and
//! aggregators only ever see one representation.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{
    ArtifactType, Control, ControlId, Evidence, EvidenceId, FrameworkInstanceId, LinkedArtifact,
    ManualAttestation, Requirement, RequirementId,
};
use super::repository::ComplianceStore;
use crate::workflows::context::{OrganizationContext, OrganizationId};
use crate::workflows::policies::domain::{PolicyId, PolicyStatus};
use crate::workflows::store::RepositoryError;

/// Policy reference embedded in a legacy artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedPolicy {
    pub id: PolicyId,
    pub status: PolicyStatus,
}

/// Legacy artifact row with its linked record embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLink {
    pub id: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    #[serde(default)]
    pub policy: Option<EmbeddedPolicy>,
    #[serde(default)]
    pub evidence: Option<Evidence>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// Requirement-map row referencing its linked record by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementMapping {
    pub id: String,
    pub requirement_id: String,
    pub framework_instance_id: FrameworkInstanceId,
    #[serde(rename = "type")]
    pub artifact_type: String,
    #[serde(default)]
    pub linked_id: Option<String>,
}

/// Control as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRecord {
    pub id: ControlId,
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub manual_status: Option<ManualAttestation>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactLink>,
    #[serde(default, alias = "requirementsMapped")]
    pub requirements_mapped: Vec<RequirementMapping>,
    /// Framework membership for legacy controls, which carry no mapping rows.
    #[serde(default)]
    pub framework_instance_ids: Vec<FrameworkInstanceId>,
}

impl ControlRecord {
    pub fn belongs_to(&self, framework_instance_id: &FrameworkInstanceId) -> bool {
        self.framework_instance_ids.contains(framework_instance_id)
            || self
                .requirements_mapped
                .iter()
                .any(|mapping| mapping.framework_instance_id == *framework_instance_id)
    }

    /// Normalize into a [`Control`], resolving mapped rows through the store.
    pub fn resolve<S>(
        &self,
        ctx: &OrganizationContext,
        store: &S,
    ) -> Result<Control, RepositoryError>
    where
        S: ComplianceStore + ?Sized,
    {
        let mut requirements: Vec<Requirement> =
            self.artifacts.iter().map(normalize_artifact).collect();

        for mapping in &self.requirements_mapped {
            requirements.push(resolve_mapping(ctx, mapping, store)?);
        }

        Ok(Control {
            id: self.id.clone(),
            organization_id: self.organization_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            requirements,
            manual_status: self.manual_status,
        })
    }
}

pub fn normalize_artifact(link: &ArtifactLink) -> Requirement {
    let artifact_type = ArtifactType::from_tag(&link.artifact_type);
    let linked = match &artifact_type {
        ArtifactType::Policy => link.policy.as_ref().map(|policy| LinkedArtifact::Policy {
            id: policy.id.clone(),
            status: policy.status,
        }),
        ArtifactType::Evidence => link.evidence.clone().map(LinkedArtifact::Evidence),
        ArtifactType::File => link.file_url.as_ref().map(|url| LinkedArtifact::File {
            url: Some(url.clone()),
        }),
        ArtifactType::Training | ArtifactType::Other => link
            .published
            .map(|published| LinkedArtifact::Record { published }),
        ArtifactType::Unknown(_) => None,
    };

    Requirement {
        id: RequirementId(link.id.clone()),
        framework_instance_id: None,
        requirement_id: None,
        artifact_type,
        linked,
    }
}

/// Resolve a mapping row. Dangling links become `linked: None`; only store
/// outages are errors.
pub fn resolve_mapping<S>(
    ctx: &OrganizationContext,
    mapping: &RequirementMapping,
    store: &S,
) -> Result<Requirement, RepositoryError>
where
    S: ComplianceStore + ?Sized,
{
    let artifact_type = ArtifactType::from_tag(&mapping.artifact_type);
    let linked_id = mapping.linked_id.as_deref();

    let lookup = match (&artifact_type, linked_id) {
        (ArtifactType::Policy, Some(id)) => store
            .get_policy(ctx, &PolicyId(id.to_string()))
            .map(|policy| {
                policy.map(|policy| LinkedArtifact::Policy {
                    id: policy.id,
                    status: policy.status,
                })
            }),
        (ArtifactType::Evidence, Some(id)) => store
            .get_evidence(ctx, &EvidenceId(id.to_string()))
            .map(|evidence| evidence.map(LinkedArtifact::Evidence)),
        (ArtifactType::File, _) => store
            .get_file(ctx, &mapping.id)
            .map(|url| url.map(|url| LinkedArtifact::File { url: Some(url) })),
        (ArtifactType::Training | ArtifactType::Other, Some(id)) => store
            .get_training(ctx, id)
            .map(|published| published.map(|published| LinkedArtifact::Record { published })),
        _ => Ok(None),
    };

    let linked = match lookup {
        Ok(linked) => linked,
        Err(RepositoryError::NotFound) => None,
        Err(err) => return Err(err),
    };

    if linked.is_none() {
        warn!(
            mapping = %mapping.id,
            requirement = %mapping.requirement_id,
            artifact_type = artifact_type.label(),
            "requirement mapping has no resolvable artifact"
        );
    }

    Ok(Requirement {
        id: RequirementId(mapping.id.clone()),
        framework_instance_id: Some(mapping.framework_instance_id.clone()),
        requirement_id: Some(mapping.requirement_id.clone()),
        artifact_type,
        linked,
    })
}
