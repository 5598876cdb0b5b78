use tracing::debug;

use super::domain::{ArtifactType, LinkedArtifact, Requirement};
use crate::workflows::policies::domain::PolicyStatus;

/// Whether the artifact linked to a requirement satisfies it.
///
/// Fails closed: unknown types, missing links, and links whose shape does not
/// match the declared type are all unsatisfied.
pub fn evaluate_requirement(requirement: &Requirement) -> bool {
    let linked = match &requirement.linked {
        Some(linked) => linked,
        None => {
            debug!(
                requirement = %requirement.id.0,
                artifact_type = requirement.artifact_type.label(),
                "requirement has no linked artifact"
            );
            return false;
        }
    };

    match (&requirement.artifact_type, linked) {
        (ArtifactType::Policy, LinkedArtifact::Policy { status, .. }) => {
            *status == PolicyStatus::Published
        }
        (ArtifactType::File, LinkedArtifact::File { url }) => url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false),
        (ArtifactType::Evidence, LinkedArtifact::Evidence(evidence)) => {
            evidence.counts_as_published()
        }
        (ArtifactType::Training | ArtifactType::Other, LinkedArtifact::Record { published }) => {
            *published
        }
        (artifact_type, _) => {
            debug!(
                requirement = %requirement.id.0,
                artifact_type = artifact_type.label(),
                "requirement link does not match its declared type"
            );
            false
        }
    }
}
