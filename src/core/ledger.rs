//! Ledger constants fetched once per environment: protocol parameters,
//! system start and era summaries (slot length comes from the first era).

use crate::error::QueryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    pub min_fee_coefficient: u64,
    pub min_fee_constant: u64,
    pub max_tx_size: u32,
    pub max_value_size: u32,
    pub coins_per_utxo_byte: u64,
    pub collateral_percentage: u32,
    pub max_collateral_inputs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemStart(pub DateTime<Utc>);

/// Era boundary. `time` is relative to system start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraBound {
    pub time: Duration,
    pub slot: u64,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraParameters {
    pub epoch_length: u64,
    pub slot_length: Duration,
    pub safe_zone: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraSummary {
    pub start: EraBound,
    pub end: Option<EraBound>,
    pub parameters: EraParameters,
}

impl EraSummary {
    fn contains(&self, slot: u64) -> bool {
        slot >= self.start.slot && self.end.map_or(true, |end| slot < end.slot)
    }
}

/// Constants every later computation needs, cached on the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConstants {
    pub protocol_parameters: ProtocolParameters,
    pub system_start: SystemStart,
    pub slot_length: Duration,
    pub era_summaries: Vec<EraSummary>,
}

impl LedgerConstants {
    pub fn from_queries(
        protocol_parameters: ProtocolParameters,
        system_start: SystemStart,
        era_summaries: Vec<EraSummary>,
    ) -> Result<Self, QueryError> {
        let slot_length = era_summaries
            .first()
            .map(|era| era.parameters.slot_length)
            .ok_or(QueryError::NoEraSummaries)?;
        Ok(Self { protocol_parameters, system_start, slot_length, era_summaries })
    }

    /// Wall-clock start of `slot`, resolved against the era it falls into
    pub fn slot_to_time(&self, slot: u64) -> Result<DateTime<Utc>, QueryError> {
        let era = self
            .era_summaries
            .iter()
            .find(|era| era.contains(slot))
            .ok_or(QueryError::SlotOutOfRange { slot })?;

        let slot_ms = u64::try_from(era.parameters.slot_length.as_millis())
            .map_err(|_| QueryError::SlotOutOfRange { slot })?;
        let since_era = (slot - era.start.slot)
            .checked_mul(slot_ms)
            .map(Duration::from_millis)
            .ok_or(QueryError::SlotOutOfRange { slot })?;
        let since_start = era
            .start
            .time
            .checked_add(since_era)
            .ok_or(QueryError::SlotOutOfRange { slot })?;
        let offset = chrono::Duration::from_std(since_start).map_err(|_| QueryError::SlotOutOfRange { slot })?;

        self.system_start
            .0
            .checked_add_signed(offset)
            .ok_or(QueryError::SlotOutOfRange { slot })
    }
}
