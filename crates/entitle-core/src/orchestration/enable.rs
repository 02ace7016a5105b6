//! Enable one service: preconditions, idempotency, locked activation,
//! reconciliation and result assembly.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::entitlement::{Activation, ActivationReport, EntitlementResolver};
use crate::error::{EnableError, GENERIC_UNKNOWN_ISSUE};
use crate::host::HostFacts;
use crate::lock::{LockManager, RetryLock};
use crate::orchestration::precondition::{EnablePolicy, check_preconditions};
use crate::orchestration::reconcile::StateDiff;
use crate::orchestration::result::assemble_result;
use crate::progress::{ProgressRelay, ProgressSink};
use crate::status::StatusCache;
use crate::types::{EnableRequest, EnableResult};

/// Lock holder tag recorded while an enable is in progress.
pub const ENABLE_LOCK_HOLDER: &str = "u.pro.services.enable.v1";

/// Runs the enable operation against borrowed collaborators.
pub struct EnableOrchestrator<'a> {
    facts: &'a dyn HostFacts,
    lock: &'a dyn LockManager,
    status: &'a dyn StatusCache,
    resolver: &'a dyn EntitlementResolver,
    policy: EnablePolicy,
    retry: RetryLock,
}

impl<'a> EnableOrchestrator<'a> {
    pub fn new(
        facts: &'a dyn HostFacts,
        lock: &'a dyn LockManager,
        status: &'a dyn StatusCache,
        resolver: &'a dyn EntitlementResolver,
    ) -> Self {
        Self {
            facts,
            lock,
            status,
            resolver,
            policy: EnablePolicy::default(),
            retry: RetryLock::new(ENABLE_LOCK_HOLDER),
        }
    }

    pub fn with_policy(mut self, policy: EnablePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the lock retry window.
    pub fn with_lock_retry(mut self, retry_interval: Duration, max_retries: u32) -> Self {
        self.retry = self
            .retry
            .with_retry_interval(retry_interval)
            .with_max_retries(max_retries);
        self
    }

    pub fn policy(&self) -> &EnablePolicy {
        &self.policy
    }

    /// Enable the requested service.
    ///
    /// Returns the services whose state changed as a side effect. A service
    /// that is already enabled yields an empty result without taking the lock.
    pub fn enable(
        &self,
        request: &EnableRequest,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<EnableResult, EnableError> {
        let mut progress = ProgressRelay::new(sink);

        check_preconditions(self.facts, &self.policy, request)?;

        let before = self.status.enabled_service_names()?;
        if before.contains(request.service()) {
            info!(service = request.service(), "service already enabled");
            return Ok(EnableResult::unchanged());
        }

        let (activation, report) = self.activate_locked(request, &mut progress)?;

        if !report.success {
            let reason = report
                .failure
                .and_then(|failure| failure.message)
                .unwrap_or_else(|| GENERIC_UNKNOWN_ISSUE.to_string());
            warn!(service = request.service(), %reason, "service could not be enabled");
            return Err(EnableError::EntitlementNotEnabled {
                service: request.service().to_string(),
                reason,
            });
        }

        let after = self.status.enabled_service_names()?;
        let result = self.reconcile(&before, &after, activation.as_ref())?;
        progress.finish();

        info!(
            service = request.service(),
            enabled = ?result.enabled,
            disabled = ?result.disabled,
            reboot_required = result.reboot_required,
            "service enabled"
        );
        Ok(result)
    }

    /// Resolve and run the activation while holding the host-wide lock.
    ///
    /// Any error raised in the critical section clears the lock before it
    /// propagates; a panic releases it through the guard's `Drop`.
    fn activate_locked(
        &self,
        request: &EnableRequest,
        progress: &mut ProgressRelay<'_>,
    ) -> Result<(Box<dyn Activation + 'a>, ActivationReport), EnableError> {
        let guard = self.retry.acquire(self.lock)?;

        match self.activate(request, progress) {
            Ok(outcome) => {
                guard.release()?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(clear_err) = guard.clear() {
                    warn!(error = %clear_err, "failed to clear lock after error");
                }
                Err(err)
            }
        }
    }

    fn activate(
        &self,
        request: &EnableRequest,
        progress: &mut ProgressRelay<'_>,
    ) -> Result<(Box<dyn Activation + 'a>, ActivationReport), EnableError> {
        let mut activation =
            self.resolver
                .resolve(request.service(), request.variant(), request.access_only())?;

        let total = activation.total_enable_steps();
        progress.set_total(total);
        debug!(service = request.service(), total_steps = total, "activating");

        let report = activation.enable(progress)?;
        Ok((activation, report))
    }

    fn reconcile(
        &self,
        before: &BTreeSet<String>,
        after: &BTreeSet<String>,
        activation: &dyn Activation,
    ) -> Result<EnableResult, EnableError> {
        let diff = StateDiff::between(before, after);
        let result = assemble_result(diff, activation);
        self.status.refresh()?;
        Ok(result)
    }
}
