use crate::types::Address;
use alloy_consensus::transaction::SignerRecoverable;
use alloy_consensus::{Transaction as _, TxEnvelope};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SignerError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("wrong chain id")]
    WrongChainId,
}

/// Recovers the 20-byte signer of a signed transaction. The engine treats
/// this as a collaborator so hosts can plug in cached or batched recovery.
pub trait Signer: Send + Sync {
    fn sender(&self, tx: &TxEnvelope) -> Result<Address, SignerError>;
}

/// secp256k1 public-key recovery with a chain-id check. Legacy transactions
/// without a chain id are accepted.
pub struct RecoverySigner {
    chain_id: u64,
}

impl RecoverySigner {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }
}

impl Signer for RecoverySigner {
    fn sender(&self, tx: &TxEnvelope) -> Result<Address, SignerError> {
        if let Some(chain_id) = tx.chain_id() {
            if chain_id != self.chain_id {
                return Err(SignerError::WrongChainId);
            }
        }
        let sender = tx
            .recover_signer()
            .map_err(|_| SignerError::InvalidSignature)?;
        Ok(Address(sender.into_array()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::{SignableTransaction, TxLegacy};
    use alloy_primitives::{Address as AlloyAddress, TxKind, U256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    fn signed_legacy(key: &PrivateKeySigner, chain_id: u64) -> TxEnvelope {
        let tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce: 0,
            gas_price: 1,
            gas_limit: 21_000,
            to: TxKind::Call(AlloyAddress::ZERO),
            value: U256::from(1u64),
            input: Default::default(),
        };
        let sig = key.sign_hash_sync(&tx.signature_hash()).unwrap();
        TxEnvelope::Legacy(tx.into_signed(sig))
    }

    #[test]
    fn test_recovers_signer_address() {
        let key = PrivateKeySigner::random();
        let tx = signed_legacy(&key, 1);
        let signer = RecoverySigner::new(1);
        let sender = signer.sender(&tx).unwrap();
        assert_eq!(sender.0, key.address().into_array());
    }

    #[test]
    fn test_rejects_wrong_chain_id() {
        let key = PrivateKeySigner::random();
        let tx = signed_legacy(&key, 2);
        let signer = RecoverySigner::new(1);
        assert_eq!(signer.sender(&tx), Err(SignerError::WrongChainId));
    }
}
