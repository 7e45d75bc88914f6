//! Environment Configuration - declarative input to environment construction
//!
//! Pure data: nothing here opens a socket. Loadable from JSON; hooks and the
//! custom log sink are code-only and set through the builder methods.

use crate::backend::BackendLabel;
use crate::core::types::NetworkId;
use crate::env::hooks::Hooks;
use crate::env::logger::LogSink;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No backends configured")]
    NoBackends,

    #[error("Default backend `{0}` is not among the configured backends")]
    UnknownDefault(BackendLabel),

    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub path: Option<String>,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, secure: false, path: None }
    }
    pub fn secure(mut self) -> Self { self.secure = true; self }
    pub fn with_path(mut self, path: impl Into<String>) -> Self { self.path = Some(path.into()); self }

    pub fn http_url(&self) -> String { self.url(if self.secure { "https" } else { "http" }) }
    pub fn ws_url(&self) -> String { self.url(if self.secure { "wss" } else { "ws" }) }

    fn url(&self, scheme: &str) -> String {
        let path = self.path.as_deref().unwrap_or("").trim_start_matches('/');
        if path.is_empty() {
            format!("{}://{}:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, path)
        }
    }

    pub fn default_ogmios() -> Self { Self::new("127.0.0.1", 1337) }
    pub fn default_kupo() -> Self { Self::new("127.0.0.1", 1442) }
}

/// Connection-based backend: Ogmios websocket plus Kupo indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtlBackendParams {
    pub ogmios: ServerConfig,
    pub kupo: ServerConfig,
}

impl Default for CtlBackendParams {
    fn default() -> Self {
        Self { ogmios: ServerConfig::default_ogmios(), kupo: ServerConfig::default_kupo() }
    }
}

/// Stateless HTTP backend, accepted as-is without a connect step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockfrostBackendParams {
    pub server: ServerConfig,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub confirm_tx_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendParams {
    Ctl(CtlBackendParams),
    Blockfrost(BlockfrostBackendParams),
}

/// Labelled backend specs with exactly one default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendsParams {
    pub default: BackendLabel,
    pub backends: BTreeMap<BackendLabel, BackendParams>,
}

impl BackendsParams {
    pub fn new(default: impl Into<BackendLabel>, params: BackendParams) -> Self {
        let default = default.into();
        Self { backends: BTreeMap::from([(default.clone(), params)]), default }
    }

    pub fn with(mut self, label: impl Into<BackendLabel>, params: BackendParams) -> Self {
        self.backends.insert(label.into(), params);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }
        if !self.backends.contains_key(&self.default) {
            return Err(ConfigError::UnknownDefault(self.default.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalletSpec {
    UseKeys { payment_key_path: PathBuf, stake_key_path: Option<PathBuf> },
    UseMnemonic { phrase: String, #[serde(default)] account_index: u32 },
    /// A named external signing agent
    Extension { name: String },
}

/// Environment parameters. Higher layers construct this.
#[derive(Clone, Deserialize)]
pub struct EnvironmentParams {
    pub backends: BackendsParams,
    #[serde(default)]
    pub ctl_server: Option<ServerConfig>,
    #[serde(default)]
    pub network_id: NetworkId,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub wallet: Option<WalletSpec>,
    #[serde(default)]
    pub suppress_logs: bool,
    #[serde(skip)]
    pub custom_logger: Option<Arc<dyn LogSink>>,
    #[serde(skip)]
    pub hooks: Hooks,
}

impl EnvironmentParams {
    pub fn new(backends: BackendsParams) -> Self {
        Self {
            backends,
            ctl_server: None,
            network_id: NetworkId::default(),
            log_level: LogLevel::default(),
            wallet: None,
            suppress_logs: false,
            custom_logger: None,
            hooks: Hooks::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&contents)
    }

    pub fn with_network(mut self, id: NetworkId) -> Self { self.network_id = id; self }
    pub fn with_log_level(mut self, level: LogLevel) -> Self { self.log_level = level; self }
    pub fn with_wallet(mut self, spec: WalletSpec) -> Self { self.wallet = Some(spec); self }
    pub fn with_ctl_server(mut self, server: ServerConfig) -> Self { self.ctl_server = Some(server); self }
    pub fn with_custom_logger(mut self, sink: Arc<dyn LogSink>) -> Self { self.custom_logger = Some(sink); self }
    pub fn with_hooks(mut self, hooks: Hooks) -> Self { self.hooks = hooks; self }
    pub fn suppress_logs(mut self) -> Self { self.suppress_logs = true; self }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backends.validate()
    }
}

impl fmt::Debug for EnvironmentParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentParams")
            .field("backends", &self.backends)
            .field("ctl_server", &self.ctl_server)
            .field("network_id", &self.network_id)
            .field("log_level", &self.log_level)
            .field("wallet", &self.wallet)
            .field("suppress_logs", &self.suppress_logs)
            .field("custom_logger", &self.custom_logger.is_some())
            .field("hooks", &self.hooks)
            .finish()
    }
}
