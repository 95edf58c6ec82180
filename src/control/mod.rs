//! Fabric control plane: the only way the planner talks to switches.
//!
//! Requests are structured (scope, object kind, attributes) and responses
//! are parsed records. How a request reaches a switch is up to the
//! implementation.

#[cfg(test)]
pub mod memory;
pub mod netvisor;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Attributes, ObjectKind, Record, Scope};

pub use netvisor::{CliSession, NetvisorCli};

/// Switch-scoped query/mutate capability.
///
/// Calls are issued strictly one at a time by the orchestrator.
#[async_trait]
pub trait FabricControlPlane: Send + Sync {
    /// Show objects of `kind`, keeping only rows that match `filters`
    async fn query(&self, scope: &Scope, kind: ObjectKind, filters: &Attributes) -> Result<Vec<Record>>;

    async fn create(&self, scope: &Scope, kind: ObjectKind, attrs: &Attributes) -> Result<()>;

    async fn modify(&self, scope: &Scope, kind: ObjectKind, attrs: &Attributes) -> Result<()>;

    async fn delete(&self, scope: &Scope, kind: ObjectKind, attrs: &Attributes) -> Result<()>;
}
