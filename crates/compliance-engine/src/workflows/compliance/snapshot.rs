use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::adapters::ControlRecord;
use super::domain::{ControlId, Evidence, EvidenceId, FrameworkInstance, FrameworkInstanceId, Task};
use super::repository::ComplianceStore;
use crate::workflows::context::{OrganizationContext, OrganizationId};
use crate::workflows::policies::domain::{Policy, PolicyId};
use crate::workflows::store::RepositoryError;

/// Point-in-time export of an organization's compliance records.
///
/// Implements [`ComplianceStore`] directly so exports can be scored offline with
/// the same read service the HTTP layer uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSnapshot {
    #[serde(default)]
    pub frameworks: Vec<FrameworkInstance>,
    #[serde(default)]
    pub controls: Vec<ControlRecord>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub training: Vec<TrainingRecord>,
}

/// File uploaded against a requirement mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub organization_id: OrganizationId,
    pub requirement_map_id: String,
    pub url: String,
}

/// Training or other generic record; only its published flag matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub id: String,
    pub organization_id: OrganizationId,
    pub published: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ComplianceSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }
}

impl ComplianceStore for ComplianceSnapshot {
    fn get_control(
        &self,
        ctx: &OrganizationContext,
        id: &ControlId,
    ) -> Result<Option<ControlRecord>, RepositoryError> {
        Ok(self
            .controls
            .iter()
            .find(|control| control.id == *id && control.organization_id == ctx.organization_id)
            .cloned())
    }

    fn list_controls_for_framework(
        &self,
        ctx: &OrganizationContext,
        framework_instance_id: &FrameworkInstanceId,
    ) -> Result<Vec<ControlRecord>, RepositoryError> {
        Ok(self
            .controls
            .iter()
            .filter(|control| control.organization_id == ctx.organization_id)
            .filter(|control| control.belongs_to(framework_instance_id))
            .cloned()
            .collect())
    }

    fn get_framework_instance(
        &self,
        ctx: &OrganizationContext,
        id: &FrameworkInstanceId,
    ) -> Result<Option<FrameworkInstance>, RepositoryError> {
        Ok(self
            .frameworks
            .iter()
            .find(|framework| {
                framework.id == *id && framework.organization_id == ctx.organization_id
            })
            .cloned())
    }

    fn tasks_for_control(
        &self,
        ctx: &OrganizationContext,
        control_id: &ControlId,
    ) -> Result<Vec<Task>, RepositoryError> {
        Ok(self
            .tasks
            .iter()
            .filter(|task| task.organization_id == ctx.organization_id)
            .filter(|task| task.is_attached_to(control_id))
            .cloned()
            .collect())
    }

    fn get_policy(
        &self,
        ctx: &OrganizationContext,
        id: &PolicyId,
    ) -> Result<Option<Policy>, RepositoryError> {
        Ok(self
            .policies
            .iter()
            .find(|policy| policy.id == *id && policy.organization_id == ctx.organization_id)
            .cloned())
    }

    fn get_evidence(
        &self,
        ctx: &OrganizationContext,
        id: &EvidenceId,
    ) -> Result<Option<Evidence>, RepositoryError> {
        Ok(self
            .evidence
            .iter()
            .find(|evidence| evidence.id == *id && evidence.organization_id == ctx.organization_id)
            .cloned())
    }

    fn get_file(
        &self,
        ctx: &OrganizationContext,
        requirement_map_id: &str,
    ) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .files
            .iter()
            .find(|file| {
                file.requirement_map_id == requirement_map_id
                    && file.organization_id == ctx.organization_id
            })
            .map(|file| file.url.clone()))
    }

    fn get_training(
        &self,
        ctx: &OrganizationContext,
        id: &str,
    ) -> Result<Option<bool>, RepositoryError> {
        Ok(self
            .training
            .iter()
            .find(|record| record.id == id && record.organization_id == ctx.organization_id)
            .map(|record| record.published))
    }
}
