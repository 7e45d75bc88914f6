//! Lifecycle hooks. Every hook is best-effort: returned errors and panics
//! are swallowed and never reach the caller.

use crate::error::EnvironmentError;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

pub type Hook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&EnvironmentError) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    pub before_init: Option<Hook>,
    pub on_success: Option<Hook>,
    pub on_error: Option<ErrorHook>,
}

impl Hooks {
    pub fn new() -> Self { Self::default() }

    pub fn with_before_init<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_init = Some(Arc::new(f));
        self
    }

    pub fn with_on_success<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn with_on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&EnvironmentError) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn run_before_init(&self) {
        if let Some(hook) = &self.before_init {
            best_effort("before_init", || hook());
        }
    }

    pub(crate) fn run_on_success(&self) {
        if let Some(hook) = &self.on_success {
            best_effort("on_success", || hook());
        }
    }

    pub(crate) fn run_on_error(&self, error: &EnvironmentError) {
        if let Some(hook) = &self.on_error {
            best_effort("on_error", || hook(error));
        }
    }
}

fn best_effort(name: &'static str, f: impl FnOnce() -> anyhow::Result<()>) {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(hook = name, error = %e, "hook failed, ignored"),
        Err(_) => debug!(hook = name, "hook panicked, ignored"),
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_init", &self.before_init.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
