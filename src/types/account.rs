use crate::error::{EngineError, EngineResult};
use alloy_primitives::U256;

/// Serialized account layout in the trunk store:
/// - 8 bytes: nonce (big-endian u64)
/// - 32 bytes: balance (big-endian u256)
pub const ACCOUNT_BYTES_LEN: usize = 8 + 32;

/// World-state view of an account: nonce plus native-token balance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountInfo {
    nonce: u64,
    balance: U256,
}

impl AccountInfo {
    pub fn new(nonce: u64, balance: U256) -> Self {
        Self { nonce, balance }
    }

    /// Fresh account with zero nonce and zero balance, used for lazy
    /// initialization when crediting an absent account.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    pub fn balance(&self) -> U256 {
        self.balance
    }

    pub fn update_balance(&mut self, balance: U256) {
        self.balance = balance;
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ACCOUNT_BYTES_LEN);
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.balance.to_be_bytes::<32>());
        buf
    }

    pub fn from_bytes(data: &[u8]) -> EngineResult<Self> {
        if data.len() < ACCOUNT_BYTES_LEN {
            return Err(EngineError::Serialization(
                "account bytes too short".to_string(),
            ));
        }
        let nonce = u64::from_be_bytes(data[0..8].try_into().expect("8-byte slice"));
        let mut balance = [0u8; 32];
        balance.copy_from_slice(&data[8..40]);
        Ok(Self {
            nonce,
            balance: U256::from_be_bytes(balance),
        })
    }
}
