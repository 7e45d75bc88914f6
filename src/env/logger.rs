//! Contract logger - level filter, optional custom sink, suppress-until-failure buffer

use crate::env::config::LogLevel;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Destination for contract log records, replacing the default `tracing` output
pub trait LogSink: Send + Sync {
    fn log(&self, record: &LogRecord);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoggerError {
    #[error("Log sink was already rebound")]
    AlreadyRebound,
}

pub struct ContractLogger {
    level: LogLevel,
    sink: Option<Arc<dyn LogSink>>,
    rebound: Arc<OnceLock<Arc<dyn LogSink>>>,
    /// Present while logs are suppressed
    buffer: Option<Mutex<Vec<LogRecord>>>,
}

impl ContractLogger {
    pub fn new(level: LogLevel, sink: Option<Arc<dyn LogSink>>, suppress: bool) -> Self {
        Self {
            level,
            sink,
            rebound: Arc::new(OnceLock::new()),
            buffer: suppress.then(|| Mutex::new(Vec::new())),
        }
    }

    /// Logger for one action: same level and sinks (rebinding included), but
    /// a buffer of its own while suppressing
    pub(crate) fn scoped(&self) -> Self {
        Self {
            level: self.level,
            sink: self.sink.clone(),
            rebound: self.rebound.clone(),
            buffer: self.buffer.as_ref().map(|_| Mutex::new(Vec::new())),
        }
    }

    pub fn level(&self) -> LogLevel { self.level }
    pub fn is_suppressing(&self) -> bool { self.buffer.is_some() }

    /// Replace the sink. Allowed once per logger.
    pub fn rebind_sink(&self, sink: Arc<dyn LogSink>) -> Result<(), LoggerError> {
        self.rebound.set(sink).map_err(|_| LoggerError::AlreadyRebound)
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if level < self.level {
            return;
        }
        let record = LogRecord { level, message: message.into(), timestamp: Utc::now() };
        match &self.buffer {
            Some(buffer) => buffer.lock().push(record),
            None => self.emit(&record),
        }
    }

    pub fn trace(&self, message: impl Into<String>) { self.log(LogLevel::Trace, message) }
    pub fn debug(&self, message: impl Into<String>) { self.log(LogLevel::Debug, message) }
    pub fn info(&self, message: impl Into<String>) { self.log(LogLevel::Info, message) }
    pub fn warn(&self, message: impl Into<String>) { self.log(LogLevel::Warn, message) }
    pub fn error(&self, message: impl Into<String>) { self.log(LogLevel::Error, message) }

    /// Emit everything buffered while suppressed
    pub(crate) fn flush_buffered(&self) {
        if let Some(buffer) = &self.buffer {
            let records = std::mem::take(&mut *buffer.lock());
            for record in &records {
                self.emit(record);
            }
        }
    }

    pub(crate) fn discard_buffered(&self) {
        if let Some(buffer) = &self.buffer {
            buffer.lock().clear();
        }
    }

    fn emit(&self, record: &LogRecord) {
        if let Some(sink) = self.rebound.get().or(self.sink.as_ref()) {
            sink.log(record);
            return;
        }
        let msg = &record.message;
        match record.level {
            LogLevel::Trace => tracing::trace!(target: "contract", "{}", msg),
            LogLevel::Debug => tracing::debug!(target: "contract", "{}", msg),
            LogLevel::Info => tracing::info!(target: "contract", "{}", msg),
            LogLevel::Warn => tracing::warn!(target: "contract", "{}", msg),
            LogLevel::Error => tracing::error!(target: "contract", "{}", msg),
        }
    }
}

impl std::fmt::Debug for ContractLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractLogger")
            .field("level", &self.level)
            .field("custom_sink", &self.sink.is_some())
            .field("rebound", &self.rebound.get().is_some())
            .field("suppressing", &self.buffer.is_some())
            .finish()
    }
}
