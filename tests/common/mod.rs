//! Shared mocks: an in-memory connector that counts opened and closed
//! connections, and a wallet provider.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use contract_runtime::logging::init_logging_with_level;
use contract_runtime::{
    Address, BackendConnector, BackendLabel, BackendParams, BackendsParams, BlockfrostBackendParams,
    CtlBackendParams, EraBound, EraParameters, EraSummary, LedgerConnection, LogLevel, LogRecord, LogSink,
    ProtocolParameters, ServerConfig, SystemStart, Wallet, WalletProvider, WalletSpec,
};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

static TRACING: Lazy<()> = Lazy::new(|| init_logging_with_level(LogLevel::Debug));

/// Route library diagnostics to stderr once per test binary
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

pub fn pparams() -> ProtocolParameters {
    ProtocolParameters {
        min_fee_coefficient: 44,
        min_fee_constant: 155_381,
        max_tx_size: 16_384,
        max_value_size: 5_000,
        coins_per_utxo_byte: 4_310,
        collateral_percentage: 150,
        max_collateral_inputs: 3,
    }
}

pub fn system_start() -> SystemStart {
    SystemStart(Utc.with_ymd_and_hms(2022, 10, 25, 0, 0, 0).unwrap())
}

/// One open-ended era with one-second slots
pub fn eras() -> Vec<EraSummary> {
    vec![EraSummary {
        start: EraBound { time: Duration::ZERO, slot: 0, epoch: 0 },
        end: None,
        parameters: EraParameters {
            epoch_length: 86_400,
            slot_length: Duration::from_secs(1),
            safe_zone: Some(25_920),
        },
    }]
}

#[derive(Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub live: AtomicUsize,
}

impl Counters {
    pub fn connects(&self) -> usize { self.connects.load(Ordering::SeqCst) }
    pub fn closes(&self) -> usize { self.closes.load(Ordering::SeqCst) }
    pub fn live(&self) -> usize { self.live.load(Ordering::SeqCst) }
}

#[derive(Default)]
pub struct MockConnector {
    pub counters: Arc<Counters>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    empty_eras: bool,
    failing_close: bool,
}

impl MockConnector {
    pub fn new() -> Self { Self::default() }

    pub fn failing_on(mut self, label: &str) -> Self {
        self.failing.insert(label.to_string());
        self
    }

    pub fn delayed(mut self, label: &str, delay: Duration) -> Self {
        self.delays.insert(label.to_string(), delay);
        self
    }

    pub fn with_empty_eras(mut self) -> Self {
        self.empty_eras = true;
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.failing_close = true;
        self
    }
}

#[async_trait]
impl BackendConnector for MockConnector {
    async fn connect(
        &self,
        label: &BackendLabel,
        _params: &CtlBackendParams,
    ) -> anyhow::Result<Arc<dyn LedgerConnection>> {
        if let Some(delay) = self.delays.get(label.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(label.as_str()) {
            anyhow::bail!("connection refused for {label}");
        }
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            counters: self.counters.clone(),
            empty_eras: self.empty_eras,
            failing_close: self.failing_close,
        }))
    }
}

pub struct MockConnection {
    counters: Arc<Counters>,
    empty_eras: bool,
    failing_close: bool,
}

#[async_trait]
impl LedgerConnection for MockConnection {
    async fn protocol_parameters(&self) -> anyhow::Result<ProtocolParameters> { Ok(pparams()) }

    async fn system_start(&self) -> anyhow::Result<SystemStart> { Ok(system_start()) }

    async fn era_summaries(&self) -> anyhow::Result<Vec<EraSummary>> {
        Ok(if self.empty_eras { Vec::new() } else { eras() })
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
        if self.failing_close {
            anyhow::bail!("socket already gone");
        }
        Ok(())
    }
}

pub struct MockWallet {
    name: String,
}

impl MockWallet {
    pub fn named(name: &str) -> Arc<dyn Wallet> {
        Arc::new(Self { name: name.to_string() })
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn name(&self) -> &str { &self.name }

    async fn addresses(&self) -> anyhow::Result<Vec<Address>> {
        Ok(vec![Address::new(format!("addr_test1{}", self.name))])
    }

    async fn sign_transaction(&self, tx: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(tx.iter().rev().copied().collect())
    }
}

#[derive(Default)]
pub struct MockWalletProvider {
    pub fail: bool,
    pub delay: Option<Duration>,
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    async fn build_wallet(&self, spec: &WalletSpec) -> anyhow::Result<Arc<dyn Wallet>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            anyhow::bail!("key file unreadable");
        }
        match spec {
            WalletSpec::Extension { name } => Ok(MockWallet::named(name)),
            _ => Ok(MockWallet::named("keys")),
        }
    }
}

#[derive(Default)]
pub struct MemorySink(pub Mutex<Vec<LogRecord>>);

impl LogSink for MemorySink {
    fn log(&self, record: &LogRecord) {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).push(record.clone());
    }
}

impl MemorySink {
    pub fn messages(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }
}

pub fn ctl() -> BackendParams {
    BackendParams::Ctl(CtlBackendParams::default())
}

pub fn blockfrost() -> BackendParams {
    BackendParams::Blockfrost(BlockfrostBackendParams {
        server: ServerConfig::new("cardano-preview.blockfrost.io", 443).secure().with_path("/api/v0"),
        api_key: Some("previewKey".into()),
        confirm_tx_delay_secs: None,
    })
}

/// Ctl backends under `labels`; the first one is the default
pub fn ctl_backends(labels: &[&str]) -> BackendsParams {
    let (first, rest) = labels.split_first().expect("at least one label");
    rest.iter()
        .fold(BackendsParams::new(*first, ctl()), |params, label| params.with(*label, ctl()))
}

/// Poll `condition` for up to a second
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
