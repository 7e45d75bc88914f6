//! Error taxonomy for environment construction, ledger queries and managed actions.
//!
//! Collaborator and user-action failures travel as `anyhow::Error` and are
//! wrapped here without being rewritten, so callers can still downcast them.

use crate::backend::BackendLabel;
use crate::env::config::ConfigError;
use thiserror::Error;

/// A ledger-constants query failed or returned nothing usable
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{query} query failed: {source}")]
    Failed {
        query: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("era summaries query returned no eras")]
    NoEraSummaries,

    #[error("ledger constants are not available from a {backend} backend")]
    Unsupported { backend: &'static str },

    #[error("slot {slot} is outside the known era summaries")]
    SlotOutOfRange { slot: u64 },
}

/// A backend or the wallet failed to initialize
#[derive(Error, Debug)]
pub enum ConstructionError {
    #[error("backend `{label}` failed to connect: {source}")]
    Backend {
        label: BackendLabel,
        #[source]
        source: anyhow::Error,
    },

    #[error("wallet failed to initialize: {source}")]
    Wallet {
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Query(#[from] QueryError),

    /// The managed action failed; the original error is kept as-is
    #[error(transparent)]
    Action(anyhow::Error),

    #[error("contract action panicked: {0}")]
    ActionPanicked(String),

    #[error("contract action was cancelled")]
    ActionCancelled,
}

impl EnvironmentError {
    /// The action's own error, if this failure came from the action
    pub fn action_error(&self) -> Option<&anyhow::Error> {
        match self {
            EnvironmentError::Action(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_action_error(self) -> Result<anyhow::Error, Self> {
        match self {
            EnvironmentError::Action(e) => Ok(e),
            other => Err(other),
        }
    }
}
