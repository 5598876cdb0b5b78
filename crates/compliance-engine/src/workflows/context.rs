use std::fmt;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const MEMBER_HEADER: &str = "x-member-id";

/// Identifier wrapper for tenant organizations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub String);

/// Identifier wrapper for organization members (assignees, approvers, editors).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub String);

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tenant scope threaded into every store call.
///
/// Session and tenant resolution happen upstream; the engine only ever sees the
/// resolved organization and the member acting on its behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationContext {
    pub organization_id: OrganizationId,
    pub member_id: MemberId,
}

impl OrganizationContext {
    pub fn new(organization_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            organization_id: OrganizationId(organization_id.into()),
            member_id: MemberId(member_id.into()),
        }
    }

    /// Resolve the context from the headers set by the session layer.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ContextError> {
        let organization_id = header_value(headers, ORGANIZATION_HEADER)?;
        let member_id = header_value(headers, MEMBER_HEADER)?;
        Ok(Self::new(organization_id, member_id))
    }
}

fn header_value(headers: &HeaderMap, name: &'static str) -> Result<String, ContextError> {
    let value = headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if value.is_empty() {
        return Err(ContextError::MissingHeader(name));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("missing or empty `{0}` header")]
    MissingHeader(&'static str),
}
