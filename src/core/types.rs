//! Ledger primitives shared by every layer: output references, addresses, outputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Parse errors for ledger primitives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("Invalid output reference `{0}`, expected <tx-hash>#<index>")]
    InvalidOutputId(String),
}

/// Transaction hash (32 bytes, hex on the wire)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self { Self(bytes) }
    pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

impl FromStr for TxHash {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| TypesError::InvalidTxHash(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TypesError::InvalidTxHash(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for TxHash {
    type Error = TypesError;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self { hash.to_string() }
}

/// Reference to a transaction output: source transaction + output index.
///
/// This is what the lock registry and the non-spendable constraint track;
/// the output's contents never matter for either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutputId {
    pub tx_hash: TxHash,
    pub index: u32,
}

impl OutputId {
    pub fn new(tx_hash: TxHash, index: u32) -> Self { Self { tx_hash, index } }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.index)
    }
}

impl FromStr for OutputId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, index) = s
            .split_once('#')
            .ok_or_else(|| TypesError::InvalidOutputId(s.to_string()))?;
        let tx_hash = hash.parse().map_err(|_| TypesError::InvalidOutputId(s.to_string()))?;
        let index = index.parse().map_err(|_| TypesError::InvalidOutputId(s.to_string()))?;
        Ok(Self { tx_hash, index })
    }
}

/// Bech32 address, kept opaque
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(bech32: impl Into<String>) -> Self { Self(bech32.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Hex-encoded datum attached to an output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datum(String);

impl Datum {
    pub fn new(hex: impl Into<String>) -> Self { Self(hex.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub address: Address,
    pub lovelace: u64,
    /// `<policy-id>.<asset-name>` → quantity
    #[serde(default)]
    pub assets: BTreeMap<String, u64>,
    #[serde(default)]
    pub datum: Option<Datum>,
}

impl TransactionOutput {
    pub fn ada_only(address: Address, lovelace: u64) -> Self {
        Self { address, lovelace, assets: BTreeMap::new(), datum: None }
    }
}

pub type UtxoMap = BTreeMap<OutputId, TransactionOutput>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Mainnet,
    #[default]
    Testnet,
}

impl NetworkId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkId::Mainnet => "mainnet",
            NetworkId::Testnet => "testnet",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Some(NetworkId::Mainnet),
            "testnet" | "preview" | "preprod" => Some(NetworkId::Testnet),
            _ => None,
        }
    }
}
