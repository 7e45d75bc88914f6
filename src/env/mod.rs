//! Env - The contract environment shared by concurrently running actions
//!
//! A [`ContractEnv`] bundles configuration with the live resources built
//! from it: backend connections, the optional wallet, the contract logger,
//! cached ledger constants and the [`UsedTxOuts`] registry. Cloning is
//! cheap; clones share every live resource.
//!
//! Construction and teardown belong to [`ContractRuntime`](crate::ContractRuntime).

pub mod config;
pub mod hooks;
pub mod logger;

pub use config::{
    BackendParams, BackendsParams, BlockfrostBackendParams, ConfigError, CtlBackendParams,
    EnvironmentParams, LogLevel, ServerConfig, WalletSpec,
};
pub use hooks::Hooks;
pub use logger::{ContractLogger, LogRecord, LogSink, LoggerError};

use crate::backend::bootstrap::{bootstrap_backends, close_connections, OpenedConnections};
use crate::backend::{BackendConnector, QueryBackend, QueryBackends};
use crate::core::ledger::{LedgerConstants, ProtocolParameters, SystemStart};
use crate::core::types::{NetworkId, OutputId};
use crate::error::{EnvironmentError, QueryError};
use crate::used_tx_outs::UsedTxOuts;
use crate::wallet::{bootstrap_wallet, Wallet, WalletProvider};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinSet};
use tracing::info;

#[derive(Clone)]
pub struct ContractEnv {
    backends: Arc<QueryBackends>,
    ctl_server: Option<ServerConfig>,
    network_id: NetworkId,
    wallet_spec: Option<WalletSpec>,
    wallet: Option<Arc<dyn Wallet>>,
    logger: Arc<ContractLogger>,
    hooks: Hooks,
    used_tx_outs: Arc<UsedTxOuts>,
    ledger_constants: Option<Arc<LedgerConstants>>,
    supervised: Arc<Mutex<JoinSet<()>>>,
    finalized: Arc<AtomicBool>,
}

impl ContractEnv {
    /// Build all live resources. All-or-nothing: on failure every connection
    /// opened so far is closed before the error is returned.
    pub(crate) async fn build(
        params: &EnvironmentParams,
        connector: &dyn BackendConnector,
        wallets: &dyn WalletProvider,
    ) -> Result<Self, EnvironmentError> {
        params.validate()?;
        info!(
            network = params.network_id.as_str(),
            backends = params.backends.backends.len(),
            default = %params.backends.default,
            "building contract environment"
        );

        let opened = OpenedConnections::new();
        let built = tokio::try_join!(
            bootstrap_backends(connector, &params.backends, &opened),
            bootstrap_wallet(wallets, params.wallet.as_ref()),
        );
        let ((backends, ledger_constants), wallet) = match built {
            Ok(parts) => parts,
            Err(e) => {
                opened.close_all().await;
                return Err(e);
            }
        };
        opened.disarm();

        Ok(Self {
            backends: Arc::new(backends),
            ctl_server: params.ctl_server.clone(),
            network_id: params.network_id,
            wallet_spec: params.wallet.clone(),
            wallet,
            logger: Arc::new(ContractLogger::new(
                params.log_level,
                params.custom_logger.clone(),
                params.suppress_logs,
            )),
            hooks: params.hooks.clone(),
            used_tx_outs: Arc::new(UsedTxOuts::new()),
            ledger_constants: ledger_constants.map(Arc::new),
            supervised: Arc::new(Mutex::new(JoinSet::new())),
            finalized: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Release live resources. Runs once; later calls return immediately.
    pub(crate) async fn finalize(&self) {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        self.supervised.lock().abort_all();
        let connections: Vec<_> = self
            .backends
            .connections()
            .map(|(label, connection)| (label.clone(), connection.clone()))
            .collect();
        info!(connections = connections.len(), "finalizing contract environment");
        close_connections(connections).await;
    }

    pub fn is_finalized(&self) -> bool { self.finalized.load(Ordering::Acquire) }

    pub fn backends(&self) -> &QueryBackends { &self.backends }
    pub fn default_backend(&self) -> &QueryBackend { self.backends.default_backend() }
    pub fn backend(&self, label: &str) -> Option<&QueryBackend> { self.backends.get(label) }
    pub fn ctl_server(&self) -> Option<&ServerConfig> { self.ctl_server.as_ref() }
    pub fn network_id(&self) -> NetworkId { self.network_id }
    pub fn log_level(&self) -> LogLevel { self.logger.level() }
    pub fn logger(&self) -> &ContractLogger { &self.logger }
    pub fn suppress_logs(&self) -> bool { self.logger.is_suppressing() }
    pub fn hooks(&self) -> &Hooks { &self.hooks }
    pub fn used_tx_outs(&self) -> &UsedTxOuts { &self.used_tx_outs }
    pub fn wallet_spec(&self) -> Option<&WalletSpec> { self.wallet_spec.as_ref() }
    pub fn wallet(&self) -> Option<&Arc<dyn Wallet>> { self.wallet.as_ref() }

    /// Copy of this environment whose contract logger buffers separately
    pub(crate) fn with_log_scope(&self) -> Self {
        Self { logger: Arc::new(self.logger.scoped()), ..self.clone() }
    }

    /// Copy of this environment using `wallet` instead; everything else is shared
    pub fn with_wallet(&self, wallet: Option<Arc<dyn Wallet>>) -> Self {
        Self { wallet, ..self.clone() }
    }

    pub fn ledger_constants(&self) -> Result<&LedgerConstants, QueryError> {
        self.ledger_constants.as_deref().ok_or(QueryError::Unsupported {
            backend: self.default_backend().kind().as_str(),
        })
    }

    pub fn protocol_parameters(&self) -> Result<&ProtocolParameters, QueryError> {
        Ok(&self.ledger_constants()?.protocol_parameters)
    }

    pub fn system_start(&self) -> Result<SystemStart, QueryError> {
        Ok(self.ledger_constants()?.system_start)
    }

    pub fn slot_length(&self) -> Result<Duration, QueryError> {
        Ok(self.ledger_constants()?.slot_length)
    }

    /// Hold `ids` in this environment's registry while `action` runs
    pub async fn with_locked<T, F, Fut>(&self, ids: BTreeSet<OutputId>, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.used_tx_outs.with_locked(ids, action).await
    }

    /// Spawn a background task owned by this environment; it is aborted at finalization.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_supervised<F>(&self, task: F) -> AbortHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.supervised.lock().spawn(task)
    }
}

impl fmt::Debug for ContractEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractEnv")
            .field("backends", &self.backends)
            .field("ctl_server", &self.ctl_server)
            .field("network_id", &self.network_id)
            .field("wallet", &self.wallet.as_ref().map(|w| w.name()))
            .field("logger", &self.logger)
            .field("used_tx_outs", &self.used_tx_outs)
            .field("finalized", &self.is_finalized())
            .finish_non_exhaustive()
    }
}
