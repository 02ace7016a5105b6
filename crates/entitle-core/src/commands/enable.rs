//! Enable command implementation.
//!
//! Wires the file-backed collaborators from an [`AppContext`] into an
//! [`EnableOrchestrator`].

use crate::context::AppContext;
use crate::error::EnableError;
use crate::host::HostFacts;
use crate::orchestration::EnableOrchestrator;
use crate::progress::ProgressSink;
use crate::types::{EnableRequest, EnableResult};

pub struct EnableCommand {
    ctx: AppContext,
    facts: Box<dyn HostFacts>,
}

impl EnableCommand {
    pub fn new(ctx: AppContext) -> Self {
        let facts = Box::new(ctx.host_facts());
        Self { ctx, facts }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(AppContext::with_defaults()?))
    }

    /// Replace the privilege/attachment source.
    pub fn with_facts(mut self, facts: Box<dyn HostFacts>) -> Self {
        self.facts = facts;
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn execute(
        &self,
        request: &EnableRequest,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<EnableResult, EnableError> {
        let lock = self.ctx.lock_manager();
        let status = self.ctx.status_cache();
        let resolver = self.ctx.lazy_resolver();
        let lock_config = &self.ctx.config().lock;

        EnableOrchestrator::new(self.facts.as_ref(), &lock, &status, &resolver)
            .with_policy(self.ctx.policy())
            .with_lock_retry(lock_config.retry_interval(), lock_config.max_retries)
            .enable(request, progress)
    }
}
