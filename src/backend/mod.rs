//! Backend - Query backends and the connections behind them
//!
//! # Architecture
//!
//! ```text
//! BackendsParams (pure data)
//!     │
//!     ▼
//! bootstrap_backends ── BackendConnector::connect (one per Ctl backend, concurrent)
//!     │
//!     ├── Ctl        → LedgerConnection (live; closed at finalization)
//!     └── Blockfrost → stateless, kept as-is
//!     │
//!     ▼
//! QueryBackends { default, backends } + LedgerConstants (from the default Ctl backend)
//! ```
//!
//! Wire protocols are not implemented here: connectors and connections are
//! supplied by the embedding application through the traits below.

pub(crate) mod bootstrap;

use crate::core::ledger::{EraSummary, ProtocolParameters, SystemStart};
use crate::env::config::{BlockfrostBackendParams, CtlBackendParams};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Logical backend name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendLabel(String);

impl BackendLabel {
    pub fn new(label: impl Into<String>) -> Self { Self(label.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for BackendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for BackendLabel {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for BackendLabel {
    fn from(s: String) -> Self { Self(s) }
}

impl Borrow<str> for BackendLabel {
    fn borrow(&self) -> &str { &self.0 }
}

/// A live ledger connection
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    async fn protocol_parameters(&self) -> anyhow::Result<ProtocolParameters>;
    async fn system_start(&self) -> anyhow::Result<SystemStart>;
    async fn era_summaries(&self) -> anyhow::Result<Vec<EraSummary>>;

    /// Best-effort teardown. An error here is logged, never propagated.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Opens connections for connection-based backends
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(
        &self,
        label: &BackendLabel,
        params: &CtlBackendParams,
    ) -> anyhow::Result<Arc<dyn LedgerConnection>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ctl,
    Blockfrost,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ctl => "ctl",
            BackendKind::Blockfrost => "blockfrost",
        }
    }
}

#[derive(Clone)]
pub struct CtlBackend {
    pub params: CtlBackendParams,
    connection: Arc<dyn LedgerConnection>,
}

impl CtlBackend {
    pub(crate) fn new(params: CtlBackendParams, connection: Arc<dyn LedgerConnection>) -> Self {
        Self { params, connection }
    }

    pub fn connection(&self) -> &Arc<dyn LedgerConnection> { &self.connection }
}

impl fmt::Debug for CtlBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtlBackend").field("params", &self.params).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct BlockfrostBackend {
    pub params: BlockfrostBackendParams,
}

#[derive(Debug, Clone)]
pub enum QueryBackend {
    Ctl(CtlBackend),
    Blockfrost(BlockfrostBackend),
}

impl QueryBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            QueryBackend::Ctl(_) => BackendKind::Ctl,
            QueryBackend::Blockfrost(_) => BackendKind::Blockfrost,
        }
    }

    pub fn connection(&self) -> Option<&Arc<dyn LedgerConnection>> {
        match self {
            QueryBackend::Ctl(b) => Some(b.connection()),
            QueryBackend::Blockfrost(_) => None,
        }
    }
}

/// Built backends; `default` is always a key of `backends`
#[derive(Debug, Clone)]
pub struct QueryBackends {
    default: BackendLabel,
    backends: BTreeMap<BackendLabel, QueryBackend>,
}

impl QueryBackends {
    pub(crate) fn new(default: BackendLabel, backends: BTreeMap<BackendLabel, QueryBackend>) -> Option<Self> {
        backends.contains_key(&default).then_some(Self { default, backends })
    }

    pub fn default_label(&self) -> &BackendLabel { &self.default }

    pub fn default_backend(&self) -> &QueryBackend {
        &self.backends[&self.default]
    }

    pub fn get(&self, label: &str) -> Option<&QueryBackend> { self.backends.get(label) }

    pub fn iter(&self) -> impl Iterator<Item = (&BackendLabel, &QueryBackend)> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize { self.backends.len() }
    pub fn is_empty(&self) -> bool { self.backends.is_empty() }

    pub(crate) fn connections(&self) -> impl Iterator<Item = (&BackendLabel, &Arc<dyn LedgerConnection>)> {
        self.backends
            .iter()
            .filter_map(|(label, backend)| backend.connection().map(|c| (label, c)))
    }
}
