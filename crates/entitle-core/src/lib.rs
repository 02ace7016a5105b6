//! Entitle Core Library
//!
//! Enables subscription-gated services on a host: precondition checks,
//! host-wide locking, catalog-driven activation and reconciliation of the
//! services that changed state as a side effect.

pub mod api;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod context;
pub mod entitlement;
pub mod error;
pub mod host;
pub mod lock;
pub mod orchestration;
pub mod progress;
pub mod state;
pub mod status;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Requests and results
    pub use crate::error::EnableError;
    pub use crate::types::{EnableRequest, EnableResult, FailureReason};

    // Orchestration
    pub use crate::entitlement::{Activation, ActivationReport, EntitlementResolver};
    pub use crate::orchestration::{EnableOrchestrator, EnablePolicy, StateDiff};
    pub use crate::progress::{ProgressRelay, ProgressSink};

    // Collaborators
    pub use crate::host::{HostFacts, SystemFacts};
    pub use crate::lock::{FileLockManager, LockGuard, LockManager, RetryLock};
    pub use crate::state::HostStateStore;
    pub use crate::status::{FileStatusCache, StatusCache};

    // Configuration and catalog
    pub use crate::catalog::{Catalog, CatalogResolver, CommandRunner};
    pub use crate::config::EntitleConfig;
    pub use crate::context::AppContext;

    // Frontend entry points
    pub use crate::api::{ApiOptions, ApiResponse};
    pub use crate::commands::{EnableCommand, StatusCommand};
}
