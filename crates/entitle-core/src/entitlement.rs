//! Capability interface between the orchestrator and activation strategies.
//!
//! The orchestrator only ever sees `dyn Activation`; how a service is turned on,
//! and which other services it enables or disables on the way, stays inside the
//! implementation.

use crate::error::EnableError;
use crate::progress::ProgressRelay;
use crate::types::FailureReason;

/// Outcome of [`Activation::enable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub success: bool,
    pub failure: Option<FailureReason>,
}

impl ActivationReport {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            failure: None,
        }
    }

    pub fn failed(reason: Option<FailureReason>) -> Self {
        Self {
            success: false,
            failure: reason,
        }
    }
}

/// Per-call activation handle for one service.
pub trait Activation {
    /// Number of progress steps `enable` will report.
    fn total_enable_steps(&self) -> usize;

    /// Perform the activation.
    ///
    /// An `Err` means something unexpected went wrong; an unsuccessful
    /// [`ActivationReport`] means the service could not be enabled.
    fn enable(&mut self, progress: &mut ProgressRelay<'_>) -> anyhow::Result<ActivationReport>;

    /// Informational messages to show after a successful enable.
    ///
    /// Entries may be structured; only JSON strings are surfaced to callers.
    fn post_enable_messages(&self) -> Vec<serde_json::Value>;

    fn reboot_required(&self) -> bool;
}

/// Maps a service name and optional variant to an activation handle.
pub trait EntitlementResolver {
    /// Fails with [`EnableError::EntitlementNotFound`] for unknown names or variants.
    fn resolve(
        &self,
        service: &str,
        variant: Option<&str>,
        access_only: bool,
    ) -> Result<Box<dyn Activation + '_>, EnableError>;
}
