//! Balance - Inputs to the external balancer and coin selection
//!
//! The balancing algorithm itself lives outside this crate. What lives here
//! is its configuration contract: [`BalanceTxConstraints`] and the builder
//! algebra that produces it.
//!
//! ```ignore
//! use contract_runtime::balance::*;
//!
//! let constraints = build_balance_tx_constraints(
//!     must_send_change_to_address(change)
//!         + must_not_spend_utxo_with_out_ref(collateral)
//!         + must_use_coin_selection_strategy(SelectionStrategy::Minimal),
//! );
//! ```

mod constraints;

pub use constraints::{
    build_balance_tx_constraints, must_gen_change_outs_with_max_token_quantity,
    must_not_spend_utxo_with_out_ref, must_not_spend_utxos_with_out_refs,
    must_send_change_to_address, must_send_change_with_datum, must_use_additional_utxos,
    must_use_coin_selection_strategy, must_use_utxos_at_address, must_use_utxos_at_addresses,
    BalanceTxConstraints, BalanceTxConstraintsBuilder, SelectionStrategy,
};
