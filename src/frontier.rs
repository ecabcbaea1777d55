use crate::types::Address;
use alloy_primitives::U256;
use rustc_hash::FxHashMap;

/// Post-prepare projection of pending account state, consulted by mempool
/// admission: latest nonce, latest balance, and cumulative gas used so far
/// in the block.
///
/// Produced once at the end of prepare and then only mutated through the
/// setters by external consumers. An empty frontier (the empty-block path)
/// answers "not present" for every query.
#[derive(Clone, Debug, Default)]
pub struct Frontier {
    nonces: FxHashMap<Address, u64>,
    balances: FxHashMap<Address, U256>,
    total_gas: FxHashMap<Address, u64>,
}

impl Frontier {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn latest_nonce(&self, addr: &Address) -> Option<u64> {
        self.nonces.get(addr).copied()
    }

    pub fn set_latest_nonce(&mut self, addr: Address, nonce: u64) {
        self.nonces.insert(addr, nonce);
    }

    pub fn latest_balance(&self, addr: &Address) -> Option<U256> {
        self.balances.get(addr).copied()
    }

    pub fn set_latest_balance(&mut self, addr: Address, balance: U256) {
        self.balances.insert(addr, balance);
    }

    pub fn latest_total_gas(&self, addr: &Address) -> Option<u64> {
        self.total_gas.get(addr).copied()
    }

    pub fn set_latest_total_gas(&mut self, addr: Address, gas: u64) {
        self.total_gas.insert(addr, gas);
    }

    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty() && self.balances.is_empty() && self.total_gas.is_empty()
    }
}
