//! Balancer constraints as an explicit, composable value.
//!
//! A [`BalanceTxConstraintsBuilder`] is an ordered list of field updates.
//! Builders combine with `+` (list concatenation, so associative, with the
//! empty builder as identity) and are applied left to right onto
//! [`BalanceTxConstraints::default`].
//!
//! Field semantics:
//!
//! | Field | Combination |
//! |-------|-------------|
//! | `additional_utxos` | overwrite |
//! | `max_change_output_token_quantity` | overwrite |
//! | `non_spendable_inputs` | **union** |
//! | `src_addresses` | overwrite |
//! | `change_address` | overwrite |
//! | `change_datum` | overwrite |
//! | `selection_strategy` | overwrite |

use crate::core::types::{Address, Datum, OutputId, UtxoMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    Optimal,
    Minimal,
}

/// Configuration consumed by the (external) balancing algorithm
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BalanceTxConstraints {
    pub additional_utxos: UtxoMap,
    pub max_change_output_token_quantity: Option<u64>,
    pub non_spendable_inputs: BTreeSet<OutputId>,
    pub src_addresses: Option<Vec<Address>>,
    pub change_address: Option<Address>,
    pub change_datum: Option<Datum>,
    pub selection_strategy: SelectionStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Constraint {
    AdditionalUtxos(UtxoMap),
    MaxChangeOutputTokenQuantity(u64),
    NonSpendable(BTreeSet<OutputId>),
    SrcAddresses(Vec<Address>),
    ChangeAddress(Address),
    ChangeDatum(Datum),
    Strategy(SelectionStrategy),
}

impl Constraint {
    fn apply(self, constraints: &mut BalanceTxConstraints) {
        match self {
            Constraint::AdditionalUtxos(utxos) => constraints.additional_utxos = utxos,
            Constraint::MaxChangeOutputTokenQuantity(q) => constraints.max_change_output_token_quantity = Some(q),
            Constraint::NonSpendable(ids) => constraints.non_spendable_inputs.extend(ids),
            Constraint::SrcAddresses(addrs) => constraints.src_addresses = Some(addrs),
            Constraint::ChangeAddress(addr) => constraints.change_address = Some(addr),
            Constraint::ChangeDatum(datum) => constraints.change_datum = Some(datum),
            Constraint::Strategy(s) => constraints.selection_strategy = s,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceTxConstraintsBuilder {
    constraints: Vec<Constraint>,
}

impl BalanceTxConstraintsBuilder {
    /// The identity builder
    pub fn new() -> Self { Self::default() }

    fn single(constraint: Constraint) -> Self {
        Self { constraints: vec![constraint] }
    }

    pub fn is_empty(&self) -> bool { self.constraints.is_empty() }

    /// Same as `self + other`
    pub fn and(mut self, other: Self) -> Self {
        self.constraints.extend(other.constraints);
        self
    }

    pub fn build(self) -> BalanceTxConstraints {
        let mut constraints = BalanceTxConstraints::default();
        for c in self.constraints {
            c.apply(&mut constraints);
        }
        constraints
    }
}

impl Add for BalanceTxConstraintsBuilder {
    type Output = Self;
    fn add(self, rhs: Self) -> Self { self.and(rhs) }
}

impl AddAssign for BalanceTxConstraintsBuilder {
    fn add_assign(&mut self, rhs: Self) {
        self.constraints.extend(rhs.constraints);
    }
}

impl Sum for BalanceTxConstraintsBuilder {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(), Add::add)
    }
}

impl FromIterator<BalanceTxConstraintsBuilder> for BalanceTxConstraintsBuilder {
    fn from_iter<I: IntoIterator<Item = Self>>(iter: I) -> Self {
        iter.into_iter().sum()
    }
}

pub fn build_balance_tx_constraints(builder: BalanceTxConstraintsBuilder) -> BalanceTxConstraints {
    builder.build()
}

/// Send change to `address` instead of the wallet's change address
pub fn must_send_change_to_address(address: Address) -> BalanceTxConstraintsBuilder {
    BalanceTxConstraintsBuilder::single(Constraint::ChangeAddress(address))
}

/// Attach `datum` to every generated change output
pub fn must_send_change_with_datum(datum: Datum) -> BalanceTxConstraintsBuilder {
    BalanceTxConstraintsBuilder::single(Constraint::ChangeDatum(datum))
}

pub fn must_use_utxos_at_address(address: Address) -> BalanceTxConstraintsBuilder {
    must_use_utxos_at_addresses(vec![address])
}

/// Restrict coin selection to outputs sitting at `addresses`
pub fn must_use_utxos_at_addresses(addresses: Vec<Address>) -> BalanceTxConstraintsBuilder {
    BalanceTxConstraintsBuilder::single(Constraint::SrcAddresses(addresses))
}

/// Split change so no output carries more than `quantity` of any token.
/// Values below one are raised to one.
pub fn must_gen_change_outs_with_max_token_quantity(quantity: u64) -> BalanceTxConstraintsBuilder {
    BalanceTxConstraintsBuilder::single(Constraint::MaxChangeOutputTokenQuantity(quantity.max(1)))
}

pub fn must_not_spend_utxo_with_out_ref(id: OutputId) -> BalanceTxConstraintsBuilder {
    must_not_spend_utxos_with_out_refs(BTreeSet::from([id]))
}

/// Accumulates: composing several of these forbids all listed outputs
pub fn must_not_spend_utxos_with_out_refs(ids: BTreeSet<OutputId>) -> BalanceTxConstraintsBuilder {
    BalanceTxConstraintsBuilder::single(Constraint::NonSpendable(ids))
}

/// Outputs not owned by the wallet that coin selection may also use
pub fn must_use_additional_utxos(utxos: UtxoMap) -> BalanceTxConstraintsBuilder {
    BalanceTxConstraintsBuilder::single(Constraint::AdditionalUtxos(utxos))
}

pub fn must_use_coin_selection_strategy(strategy: SelectionStrategy) -> BalanceTxConstraintsBuilder {
    BalanceTxConstraintsBuilder::single(Constraint::Strategy(strategy))
}
