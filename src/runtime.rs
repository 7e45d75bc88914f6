//! Runtime - Managed environments: build, run, always finalize
//!
//! ```text
//! with_environment(params, action)
//!     │
//!     ├── before_init hook (best-effort)
//!     ├── ContractEnv::build ── backends ‖ wallet
//!     ├── action(env)  (spawned task, aborted if the caller goes away)
//!     ├── finalize     (every exit path, exactly once)
//!     └── Ok  → discard suppressed logs, on_success hook, return value
//!         Err → flush suppressed logs, on_error hook, return original error
//! ```

use crate::backend::BackendConnector;
use crate::env::{ContractEnv, EnvironmentParams};
use crate::error::EnvironmentError;
use crate::wallet::{NoWallets, WalletProvider};
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

/// Lifecycle manager. Holds the collaborators environments are built with.
#[derive(Clone)]
pub struct ContractRuntime {
    connector: Arc<dyn BackendConnector>,
    wallets: Arc<dyn WalletProvider>,
}

impl ContractRuntime {
    pub fn new(connector: Arc<dyn BackendConnector>, wallets: Arc<dyn WalletProvider>) -> Self {
        Self { connector, wallets }
    }

    /// Runtime whose environments never carry a wallet
    pub fn without_wallets(connector: Arc<dyn BackendConnector>) -> Self {
        Self::new(connector, Arc::new(NoWallets))
    }

    /// Build an environment, run `action` against it and finalize it on
    /// every exit path before returning.
    ///
    /// Action failures come back as [`EnvironmentError::Action`] carrying the
    /// action's own error. If this future is dropped, the action is aborted
    /// and finalization is spawned onto the current runtime.
    pub async fn with_environment<T, F, Fut>(
        &self,
        params: EnvironmentParams,
        action: F,
    ) -> Result<T, EnvironmentError>
    where
        F: FnOnce(ContractEnv) -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        params.hooks.run_before_init();
        let env = self.build_environment(&params).await?;

        let mut finalizer = FinalizeOnDrop(Some(env.clone()));
        let task = AbortOnDrop(tokio::spawn(action(env.clone())));
        let outcome = task.join().await;
        finalizer.finalize().await;

        match outcome {
            Ok(value) => {
                env.logger().discard_buffered();
                env.hooks().run_on_success();
                Ok(value)
            }
            Err(e) => {
                env.logger().flush_buffered();
                env.hooks().run_on_error(&e);
                Err(e)
            }
        }
    }

    /// Build, run one action, finalize
    pub async fn run_managed<T, F, Fut>(&self, params: EnvironmentParams, action: F) -> Result<T, EnvironmentError>
    where
        F: FnOnce(ContractEnv) -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.with_environment(params, action).await
    }

    /// Build an environment the caller will hold for many actions.
    /// Pair with [`stop_environment`](Self::stop_environment).
    pub async fn build_environment(&self, params: &EnvironmentParams) -> Result<ContractEnv, EnvironmentError> {
        ContractEnv::build(params, self.connector.as_ref(), self.wallets.as_ref()).await
    }

    /// Abort supervised tasks and close every connection. Idempotent.
    pub async fn stop_environment(&self, env: &ContractEnv) {
        env.logger().discard_buffered();
        env.finalize().await;
    }
}

/// Run `action` against an environment owned elsewhere. Never finalizes it.
///
/// Suppressed logs are buffered per call: flushed if this action fails,
/// discarded if it succeeds.
pub async fn run_in_environment<T, F, Fut>(env: &ContractEnv, action: F) -> anyhow::Result<T>
where
    F: FnOnce(ContractEnv) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let scoped = env.with_log_scope();
    let result = action(scoped.clone()).await;
    match &result {
        Ok(_) => scoped.logger().discard_buffered(),
        Err(_) => scoped.logger().flush_buffered(),
    }
    result
}

struct AbortOnDrop<T>(JoinHandle<anyhow::Result<T>>);

impl<T> AbortOnDrop<T> {
    async fn join(mut self) -> Result<T, EnvironmentError> {
        match (&mut self.0).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(EnvironmentError::Action(e)),
            Err(e) => Err(join_failure(e)),
        }
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn join_failure(e: JoinError) -> EnvironmentError {
    if e.is_cancelled() {
        return EnvironmentError::ActionCancelled;
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    EnvironmentError::ActionPanicked(message)
}

/// Finalizes the environment if `with_environment` is dropped mid-action
struct FinalizeOnDrop(Option<ContractEnv>);

impl FinalizeOnDrop {
    /// Finalization runs as its own task so dropping the caller cannot cut it short
    async fn finalize(&mut self) {
        if let Some(env) = self.0.take() {
            join_finalizer(tokio::spawn(async move { env.finalize().await })).await;
        }
    }
}

async fn join_finalizer(handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!(error = %e, "environment finalization task failed");
    }
}

impl Drop for FinalizeOnDrop {
    fn drop(&mut self) {
        let Some(env) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("managed action cancelled, finalizing in background");
                handle.spawn(async move { env.finalize().await });
            }
            Err(_) => warn!("managed action cancelled outside a runtime, environment not finalized"),
        }
    }
}
