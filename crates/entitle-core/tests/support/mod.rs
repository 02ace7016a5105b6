//! Test doubles for the enable orchestrator's collaborators.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;

use entitle_core::entitlement::{Activation, ActivationReport, EntitlementResolver};
use entitle_core::error::EnableError;
use entitle_core::host::HostFacts;
use entitle_core::lock::{FileLockManager, LockAttempt, LockHolder, LockManager};
use entitle_core::progress::ProgressRelay;
use entitle_core::status::StatusCache;
use entitle_core::types::FailureReason;

/// Enabled services shared between the status fake and activations.
#[derive(Debug, Clone, Default)]
pub struct SharedHost {
    enabled: Arc<Mutex<BTreeSet<String>>>,
}

impl SharedHost {
    pub fn with_enabled(names: &[&str]) -> Self {
        let host = Self::default();
        for name in names {
            host.enable(name);
        }
        host
    }

    pub fn enable(&self, name: &str) {
        self.enabled
            .lock()
            .expect("host mutex should not be poisoned")
            .insert(name.to_string());
    }

    pub fn disable(&self, name: &str) {
        self.enabled
            .lock()
            .expect("host mutex should not be poisoned")
            .remove(name);
    }

    pub fn enabled(&self) -> BTreeSet<String> {
        self.enabled
            .lock()
            .expect("host mutex should not be poisoned")
            .clone()
    }
}

/// Privilege and attachment flags, counting attachment lookups.
#[derive(Debug, Default)]
pub struct FakeFacts {
    pub privileged: bool,
    pub attached: bool,
    pub attachment_checks: AtomicUsize,
}

impl FakeFacts {
    pub fn ready() -> Self {
        Self::new(true, true)
    }

    pub fn new(privileged: bool, attached: bool) -> Self {
        Self {
            privileged,
            attached,
            attachment_checks: AtomicUsize::new(0),
        }
    }
}

impl HostFacts for FakeFacts {
    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn is_attached(&self) -> anyhow::Result<bool> {
        self.attachment_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.attached)
    }
}

/// Status cache reading from a [`SharedHost`].
#[derive(Debug, Default)]
pub struct FakeStatus {
    pub host: SharedHost,
    pub reads: AtomicUsize,
    pub refreshes: AtomicUsize,
}

impl FakeStatus {
    pub fn new(host: SharedHost) -> Self {
        Self {
            host,
            reads: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }
}

impl StatusCache for FakeStatus {
    fn enabled_service_names(&self) -> anyhow::Result<BTreeSet<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.host.enabled())
    }

    fn refresh(&self) -> anyhow::Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// File lock that counts acquisition attempts.
pub struct CountingLock {
    pub inner: FileLockManager,
    pub attempts: AtomicUsize,
}

impl CountingLock {
    pub fn new(inner: FileLockManager) -> Self {
        Self {
            inner,
            attempts: AtomicUsize::new(0),
        }
    }
}

impl LockManager for CountingLock {
    fn try_acquire(&self, holder: &str) -> anyhow::Result<LockAttempt> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.try_acquire(holder)
    }

    fn release(&self, holder: &str) -> anyhow::Result<()> {
        self.inner.release(holder)
    }

    fn clear_if_present(&self) -> anyhow::Result<()> {
        self.inner.clear_if_present()
    }

    fn holder(&self) -> anyhow::Result<Option<LockHolder>> {
        self.inner.holder()
    }
}

/// What a [`FakeActivation`] does when enabled.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Enable the target plus `also_enable`, disable `disable`.
    Succeed {
        also_enable: Vec<String>,
        disable: Vec<String>,
        messages: Vec<serde_json::Value>,
        reboot_required: bool,
        steps: usize,
    },
    /// Report failure with the given reason.
    Fail(Option<String>),
    /// Return an unexpected error.
    Error(String),
    /// Panic mid-activation.
    Panic,
}

impl Behavior {
    pub fn succeed() -> Self {
        Behavior::Succeed {
            also_enable: Vec::new(),
            disable: Vec::new(),
            messages: Vec::new(),
            reboot_required: false,
            steps: 1,
        }
    }
}

/// Resolver over a fixed set of known services.
pub struct FakeResolver {
    pub host: SharedHost,
    pub known: BTreeSet<String>,
    pub behavior: Behavior,
    pub resolve_calls: AtomicUsize,
    /// Lock holder observed while each activation ran.
    pub observed_holders: Mutex<Vec<Option<LockHolder>>>,
    pub lock_probe: Option<FileLockManager>,
    pub hold_for: Duration,
    /// Activations currently inside `enable`, and the most seen at once.
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeResolver {
    pub fn new(host: SharedHost, known: &[&str], behavior: Behavior) -> Self {
        Self {
            host,
            known: known.iter().map(|s| s.to_string()).collect(),
            behavior,
            resolve_calls: AtomicUsize::new(0),
            observed_holders: Mutex::new(Vec::new()),
            lock_probe: None,
            hold_for: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_lock_probe(mut self, probe: FileLockManager) -> Self {
        self.lock_probe = Some(probe);
        self
    }

    pub fn with_hold_for(mut self, hold_for: Duration) -> Self {
        self.hold_for = hold_for;
        self
    }

    pub fn resolve_count(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Counts one activation as in flight until dropped, panics included.
struct InFlight<'a>(&'a FakeResolver);

impl<'a> InFlight<'a> {
    fn enter(resolver: &'a FakeResolver) -> Self {
        let now = resolver.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        resolver.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(resolver)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EntitlementResolver for FakeResolver {
    fn resolve(
        &self,
        service: &str,
        variant: Option<&str>,
        _access_only: bool,
    ) -> Result<Box<dyn Activation + '_>, EnableError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if !self.known.contains(service) || variant.is_some_and(|v| v != "default") {
            return Err(EnableError::EntitlementNotFound {
                service: service.to_string(),
                variant: variant.map(str::to_string),
            });
        }
        Ok(Box::new(FakeActivation {
            resolver: self,
            service: service.to_string(),
        }))
    }
}

pub struct FakeActivation<'a> {
    resolver: &'a FakeResolver,
    service: String,
}

impl Activation for FakeActivation<'_> {
    fn total_enable_steps(&self) -> usize {
        match &self.resolver.behavior {
            Behavior::Succeed { steps, .. } => *steps,
            _ => 1,
        }
    }

    fn enable(&mut self, progress: &mut ProgressRelay<'_>) -> anyhow::Result<ActivationReport> {
        let _in_flight = InFlight::enter(self.resolver);
        if let Some(probe) = &self.resolver.lock_probe {
            let holder = probe.holder()?;
            self.resolver
                .observed_holders
                .lock()
                .expect("observed mutex should not be poisoned")
                .push(holder);
        }
        if !self.resolver.hold_for.is_zero() {
            std::thread::sleep(self.resolver.hold_for);
        }

        match &self.resolver.behavior {
            Behavior::Succeed {
                also_enable,
                disable,
                steps,
                ..
            } => {
                for step in 0..*steps {
                    progress.step(&format!("step {} of {}", step + 1, self.service));
                }
                for name in disable {
                    self.resolver.host.disable(name);
                }
                self.resolver.host.enable(&self.service);
                for name in also_enable {
                    self.resolver.host.enable(name);
                }
                Ok(ActivationReport::succeeded())
            }
            Behavior::Fail(reason) => Ok(ActivationReport::failed(
                reason.clone().map(FailureReason::new),
            )),
            Behavior::Error(message) => Err(anyhow!("{message}")),
            Behavior::Panic => panic!("activation exploded"),
        }
    }

    fn post_enable_messages(&self) -> Vec<serde_json::Value> {
        match &self.resolver.behavior {
            Behavior::Succeed { messages, .. } => messages.clone(),
            _ => Vec::new(),
        }
    }

    fn reboot_required(&self) -> bool {
        matches!(
            &self.resolver.behavior,
            Behavior::Succeed {
                reboot_required: true,
                ..
            }
        )
    }
}
