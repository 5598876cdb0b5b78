pub mod compliance;
pub mod context;
pub mod policies;
pub mod store;

pub use context::{ContextError, MemberId, OrganizationContext, OrganizationId};
pub use store::RepositoryError;
