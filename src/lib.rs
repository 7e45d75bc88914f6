//! Contract Runtime: managed environments for off-chain contract actions.
//!
//! # Architecture
//!
//! ```text
//! ContractRuntime (lifecycle manager)
//!   │
//!   ├── Backend bootstrap ──┐  (concurrent, all-or-nothing)
//!   ├── Wallet bootstrap  ──┘
//!   │
//!   ▼
//! ContractEnv (shared by every concurrent action)
//!   ├── QueryBackends      default + labelled backends, live connections
//!   ├── LedgerConstants    protocol parameters, system start, slot length
//!   ├── Wallet             optional signing agent
//!   ├── ContractLogger     level filter, custom sink, suppress-until-failure
//!   └── UsedTxOuts         outputs reserved by in-flight transactions
//!
//! Actions ── with_locked(ids, build → balance(BalanceTxConstraints) → sign → submit)
//! ```
//!
//! # Entry points
//!
//! | Operation | Function |
//! |-----------|----------|
//! | Managed run | [`ContractRuntime::with_environment`], [`ContractRuntime::run_managed`] |
//! | Shared environment | [`ContractRuntime::build_environment`], [`run_in_environment`], [`ContractRuntime::stop_environment`] |
//! | Output locking | [`UsedTxOuts::with_locked`], [`ContractEnv::with_locked`] |
//! | Balancer constraints | [`balance`] constructors, [`balance::build_balance_tx_constraints`] |
//!
//! # Usage
//!
//! ```ignore
//! use contract_runtime::*;
//!
//! let runtime = ContractRuntime::new(connector, wallets);
//! let params = EnvironmentParams::new(BackendsParams::new(
//!     "local",
//!     BackendParams::Ctl(CtlBackendParams::default()),
//! ));
//!
//! let fee_coefficient = runtime
//!     .with_environment(params, |env| async move {
//!         Ok(env.protocol_parameters()?.min_fee_coefficient)
//!     })
//!     .await?;
//! ```

pub mod backend;
pub mod balance;
pub mod core;
pub mod env;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod used_tx_outs;
pub mod wallet;

pub use backend::{BackendConnector, BackendKind, BackendLabel, LedgerConnection, QueryBackend, QueryBackends};
pub use crate::core::ledger::{EraBound, EraParameters, EraSummary, LedgerConstants, ProtocolParameters, SystemStart};
pub use crate::core::types::{Address, Datum, NetworkId, OutputId, TransactionOutput, TxHash, TypesError, UtxoMap};
pub use env::{
    BackendParams, BackendsParams, BlockfrostBackendParams, ContractEnv, ContractLogger,
    CtlBackendParams, EnvironmentParams, Hooks, LogLevel, LogRecord, LogSink, ServerConfig, WalletSpec,
};
pub use error::{ConstructionError, EnvironmentError, QueryError};
pub use runtime::{run_in_environment, ContractRuntime};
pub use used_tx_outs::{LockedTxOuts, UsedTxOuts};
pub use wallet::{NoWallets, Wallet, WalletProvider};
