//! Policy approval lifecycle and compliance rollups for multi-tenant GRC workspaces.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
