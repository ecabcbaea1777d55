use super::Address;
use serde::{Deserialize, Serialize};

/// Block metadata handed to `execute` and forwarded to the EVM collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub coinbase: Address,
    pub number: i64,
    pub timestamp: i64,
    pub hash: [u8; 32],
}

impl BlockInfo {
    pub fn new(coinbase: Address, number: i64, timestamp: i64, hash: [u8; 32]) -> Self {
        Self {
            coinbase,
            number,
            timestamp,
            hash,
        }
    }
}
