//! Catalog-driven activation strategy.
//!
//! Resolving a service builds a plan against the current host state: disable
//! enabled incompatible services, enable missing requirements (recursively),
//! run the service's commands, then record it as enabled. Each plan step is one
//! progress step.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::runner::CommandRunner;
use super::schema::{Argv, Catalog};
use crate::entitlement::{Activation, ActivationReport, EntitlementResolver};
use crate::error::EnableError;
use crate::progress::ProgressRelay;
use crate::state::{EnabledService, HostState, HostStateStore};
use crate::types::FailureReason;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PlanStep {
    Disable {
        service: String,
    },
    Run {
        service: String,
        argv: Argv,
    },
    Record {
        service: String,
        variant: Option<String>,
        access_only: bool,
    },
}

impl PlanStep {
    fn message(&self, catalog: &Catalog) -> String {
        match self {
            PlanStep::Disable { service } => {
                format!("Disabling incompatible service: {}", title(catalog, service))
            }
            PlanStep::Run { argv, .. } => format!("Running: {}", argv.join(" ")),
            PlanStep::Record { service, .. } => format!("Enabling {}", title(catalog, service)),
        }
    }
}

fn title<'a>(catalog: &'a Catalog, service: &'a str) -> &'a str {
    catalog
        .get(service)
        .and_then(|d| d.title.as_deref())
        .unwrap_or(service)
}

/// Resolves services from a [`Catalog`].
pub struct CatalogResolver {
    catalog: Catalog,
    host_state: HostStateStore,
    runner: Box<dyn CommandRunner>,
}

impl CatalogResolver {
    pub fn new(catalog: Catalog, host_state: HostStateStore, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            catalog,
            host_state,
            runner,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl EntitlementResolver for CatalogResolver {
    fn resolve(
        &self,
        service: &str,
        variant: Option<&str>,
        access_only: bool,
    ) -> Result<Box<dyn Activation + '_>, EnableError> {
        if self.catalog.effective(service, variant).is_none() {
            return Err(EnableError::EntitlementNotFound {
                service: service.to_string(),
                variant: variant
                    .filter(|_| self.catalog.get(service).is_some())
                    .map(str::to_string),
            });
        }

        let state = self.host_state.load()?;
        let mut planner = Planner {
            catalog: &self.catalog,
            state: &state,
            enabling: BTreeSet::new(),
            disabling: BTreeSet::new(),
            steps: Vec::new(),
        };
        planner.plan_enable(service, variant, access_only);
        debug!(service, steps = planner.steps.len(), "activation planned");

        Ok(Box::new(CatalogEntitlement {
            catalog: &self.catalog,
            host_state: &self.host_state,
            runner: self.runner.as_ref(),
            service: service.to_string(),
            variant: variant.map(str::to_string),
            plan: planner.steps,
            reboot_required: false,
        }))
    }
}

struct Planner<'a> {
    catalog: &'a Catalog,
    state: &'a HostState,
    enabling: BTreeSet<String>,
    disabling: BTreeSet<String>,
    steps: Vec<PlanStep>,
}

impl Planner<'_> {
    fn will_be_enabled(&self, service: &str) -> bool {
        self.enabling.contains(service)
            || (self.state.is_enabled(service) && !self.disabling.contains(service))
    }

    fn plan_enable(&mut self, service: &str, variant: Option<&str>, access_only: bool) {
        if self.will_be_enabled(service) {
            return;
        }
        let Some(effective) = self.catalog.effective(service, variant) else {
            return;
        };
        // Marked before recursing so dependency cycles terminate.
        self.enabling.insert(service.to_string());

        for incompatible in &effective.definition.incompatible {
            if self.will_be_enabled(incompatible) {
                self.disabling.insert(incompatible.clone());
                self.enabling.remove(incompatible);
                self.steps.push(PlanStep::Disable {
                    service: incompatible.clone(),
                });
            }
        }

        for required in &effective.definition.requires {
            self.plan_enable(required, None, false);
        }

        let skip_commands = access_only && effective.definition.supports_access_only;
        if !skip_commands {
            for argv in effective.commands {
                self.steps.push(PlanStep::Run {
                    service: service.to_string(),
                    argv: argv.clone(),
                });
            }
        }

        self.steps.push(PlanStep::Record {
            service: service.to_string(),
            variant: variant.map(str::to_string),
            access_only: skip_commands,
        });
    }
}

/// Activation handle produced by [`CatalogResolver`].
pub struct CatalogEntitlement<'a> {
    catalog: &'a Catalog,
    host_state: &'a HostStateStore,
    runner: &'a dyn CommandRunner,
    service: String,
    variant: Option<String>,
    plan: Vec<PlanStep>,
    reboot_required: bool,
}

impl CatalogEntitlement<'_> {
    fn run_commands(&self, argvs: &[Argv]) -> anyhow::Result<Option<FailureReason>> {
        for argv in argvs {
            if let Some(reason) = self.run_command(argv)? {
                return Ok(Some(reason));
            }
        }
        Ok(None)
    }

    fn run_command(&self, argv: &[String]) -> anyhow::Result<Option<FailureReason>> {
        let outcome = match self.runner.run(argv) {
            Ok(outcome) => outcome,
            Err(err) => {
                return Ok(Some(FailureReason::new(format!(
                    "failed to run '{}': {:#}",
                    argv.join(" "),
                    err
                ))));
            }
        };
        if outcome.success {
            return Ok(None);
        }
        let mut message = format!("command '{}' exited with {}", argv.join(" "), outcome.status);
        if !outcome.stderr.is_empty() {
            message.push_str(": ");
            message.push_str(&outcome.stderr);
        }
        Ok(Some(FailureReason::new(message)))
    }

    fn service_reboot_required(&self, service: &str, variant: Option<&str>) -> bool {
        self.catalog
            .effective(service, variant)
            .map(|effective| effective.reboot_required)
            .unwrap_or(false)
    }
}

impl Activation for CatalogEntitlement<'_> {
    fn total_enable_steps(&self) -> usize {
        self.plan.len()
    }

    fn enable(&mut self, progress: &mut ProgressRelay<'_>) -> anyhow::Result<ActivationReport> {
        let plan = std::mem::take(&mut self.plan);
        for step in &plan {
            progress.step(&step.message(self.catalog));
            match step {
                PlanStep::Disable { service } => {
                    let disable_commands = self
                        .catalog
                        .get(service)
                        .map(|d| d.disable_commands.as_slice())
                        .unwrap_or_default();
                    if let Some(reason) = self.run_commands(disable_commands)? {
                        return Ok(ActivationReport::failed(Some(reason)));
                    }
                    self.host_state.mark_disabled(service)?;
                    info!(service = %service, "disabled incompatible service");
                }
                PlanStep::Run { argv, .. } => {
                    if let Some(reason) = self.run_command(argv)? {
                        return Ok(ActivationReport::failed(Some(reason)));
                    }
                }
                PlanStep::Record {
                    service,
                    variant,
                    access_only,
                } => {
                    self.host_state.mark_enabled(
                        service,
                        EnabledService::new(variant.clone(), *access_only),
                    )?;
                    if self.service_reboot_required(service, variant.as_deref()) {
                        self.reboot_required = true;
                    }
                    debug!(service = %service, "recorded service as enabled");
                }
            }
        }
        self.plan = plan;
        Ok(ActivationReport::succeeded())
    }

    fn post_enable_messages(&self) -> Vec<serde_json::Value> {
        self.catalog
            .effective(&self.service, self.variant.as_deref())
            .map(|effective| effective.post_enable.to_vec())
            .unwrap_or_default()
    }

    fn reboot_required(&self) -> bool {
        self.reboot_required
    }
}
