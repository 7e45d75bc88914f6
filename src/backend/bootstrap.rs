//! Backend bootstrap: concurrent connects, ledger constants, partial-failure teardown

use super::{BackendConnector, BackendLabel, BlockfrostBackend, CtlBackend, LedgerConnection, QueryBackend, QueryBackends};
use crate::core::ledger::LedgerConstants;
use crate::env::config::{BackendParams, BackendsParams, ConfigError};
use crate::error::{ConstructionError, EnvironmentError, QueryError};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

type Opened = (BackendLabel, Arc<dyn LedgerConnection>);

/// Connections opened during one construction attempt.
///
/// Until [`disarm`](Self::disarm) hands them to the environment, they are
/// closed on failure, and on drop if construction itself was cancelled.
#[derive(Default)]
pub(crate) struct OpenedConnections {
    opened: Mutex<Vec<Opened>>,
}

impl OpenedConnections {
    pub(crate) fn new() -> Self { Self::default() }

    fn record(&self, label: BackendLabel, connection: Arc<dyn LedgerConnection>) {
        self.opened.lock().push((label, connection));
    }

    pub(crate) async fn close_all(&self) {
        let opened = std::mem::take(&mut *self.opened.lock());
        close_connections(opened).await;
    }

    pub(crate) fn disarm(&self) {
        self.opened.lock().clear();
    }
}

impl Drop for OpenedConnections {
    fn drop(&mut self) {
        let opened = std::mem::take(self.opened.get_mut());
        if opened.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(close_connections(opened));
            }
            Err(_) => warn!(count = opened.len(), "construction cancelled outside a runtime, connections not closed"),
        }
    }
}

/// Close every connection independently; one failing close never stops the rest
pub(crate) async fn close_connections(connections: Vec<Opened>) {
    let closes = connections.into_iter().map(|(label, connection)| async move {
        match AssertUnwindSafe(connection.close()).catch_unwind().await {
            Ok(Ok(())) => debug!(backend = %label, "connection closed"),
            Ok(Err(e)) => warn!(backend = %label, error = %e, "failed to close connection"),
            Err(_) => warn!(backend = %label, "connection close panicked"),
        }
    });
    join_all(closes).await;
}

/// Connect every backend concurrently and derive ledger constants from the
/// default one when it is connection-based.
///
/// The first failed connect cancels the ones still in flight. Connections
/// that did open are left in `opened` for the caller to close.
pub(crate) async fn bootstrap_backends(
    connector: &dyn BackendConnector,
    params: &BackendsParams,
    opened: &OpenedConnections,
) -> Result<(QueryBackends, Option<LedgerConstants>), EnvironmentError> {
    let mut backends = BTreeMap::new();
    let mut pending = FuturesUnordered::new();

    for (label, spec) in &params.backends {
        match spec {
            BackendParams::Blockfrost(p) => {
                debug!(backend = %label, url = %p.server.http_url(), "stateless backend, no connection");
                backends.insert(label.clone(), QueryBackend::Blockfrost(BlockfrostBackend { params: p.clone() }));
            }
            BackendParams::Ctl(p) => {
                pending.push(async move { (label, p, connector.connect(label, p).await) });
            }
        }
    }

    while let Some((label, p, result)) = pending.next().await {
        let connection = result.map_err(|source| ConstructionError::Backend { label: label.clone(), source })?;
        debug!(backend = %label, ogmios = %p.ogmios.ws_url(), kupo = %p.kupo.http_url(), "backend connected");
        opened.record(label.clone(), connection.clone());
        backends.insert(label.clone(), QueryBackend::Ctl(CtlBackend::new(p.clone(), connection)));
    }

    let backends = QueryBackends::new(params.default.clone(), backends)
        .ok_or_else(|| ConfigError::UnknownDefault(params.default.clone()))?;

    let constants = match backends.default_backend() {
        QueryBackend::Ctl(b) => Some(fetch_ledger_constants(b.connection().as_ref()).await?),
        QueryBackend::Blockfrost(_) => {
            debug!(backend = %backends.default_label(), "default backend is stateless, ledger constants not fetched");
            None
        }
    };

    Ok((backends, constants))
}

async fn fetch_ledger_constants(connection: &dyn LedgerConnection) -> Result<LedgerConstants, QueryError> {
    let (protocol_parameters, system_start, era_summaries) = tokio::try_join!(
        async {
            connection
                .protocol_parameters()
                .await
                .map_err(|source| QueryError::Failed { query: "protocol parameters", source })
        },
        async {
            connection
                .system_start()
                .await
                .map_err(|source| QueryError::Failed { query: "system start", source })
        },
        async {
            connection
                .era_summaries()
                .await
                .map_err(|source| QueryError::Failed { query: "era summaries", source })
        },
    )?;
    LedgerConstants::from_queries(protocol_parameters, system_start, era_summaries)
}
