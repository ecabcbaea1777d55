use super::Address;
use alloy_consensus::{Transaction as _, TxEnvelope};
use alloy_primitives::{TxKind, U256};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// The parsed, signature-verified transaction form consumed by the engine.
///
/// This is the wire form stored in the standby queue. Retries across rounds
/// reuse the same serialized bytes, so every field is a plain value.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct TxToRun {
    /// Transaction digest, unique within a block
    pub hash_id: [u8; 32],
    /// Recovered sender
    pub from: Address,
    /// Recipient; the zero address means contract creation
    pub to: Address,
    pub nonce: u64,
    /// Transferred amount, 256-bit big-endian
    pub value: [u8; 32],
    /// Gas price, 256-bit big-endian
    pub gas_price: [u8; 32],
    /// Gas limit
    pub gas: u64,
    pub data: Vec<u8>,
    pub block_height: u64,
}

impl TxToRun {
    pub fn from_envelope(tx: &TxEnvelope, sender: Address, block_height: u64) -> Self {
        let to = match tx.kind() {
            TxKind::Call(addr) => Address(addr.into_array()),
            TxKind::Create => Address::ZERO,
        };
        let gas_price = tx.gas_price().unwrap_or_else(|| tx.max_fee_per_gas());
        Self {
            hash_id: tx.tx_hash().0,
            from: sender,
            to,
            nonce: tx.nonce(),
            value: tx.value().to_be_bytes::<32>(),
            gas_price: U256::from(gas_price).to_be_bytes::<32>(),
            gas: tx.gas_limit(),
            data: tx.input().to_vec(),
            block_height,
        }
    }

    pub fn value_u256(&self) -> U256 {
        U256::from_be_bytes(self.value)
    }

    pub fn gas_price_u256(&self) -> U256 {
        U256::from_be_bytes(self.gas_price)
    }

    /// The fee debited during prepare: `gas * gas_price`, 256-bit wide.
    pub fn gas_fee(&self) -> U256 {
        U256::from(self.gas) * self.gas_price_u256()
    }
}

/// A log record emitted by the EVM collaborator, enriched with block
/// placement by the committed-tx collector.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub block_hash: [u8; 32],
    pub tx_hash: [u8; 32],
    pub tx_index: u32,
    pub log_index: u32,
    pub removed: bool,
}

/// Call trace reported by the EVM collaborator for one internal call frame.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct InternalTxCall {
    pub sender: Address,
    pub to: Address,
    pub gas: u64,
    pub value: [u8; 32],
    pub input: Vec<u8>,
}

#[derive(
    Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct InternalTxReturn {
    pub out_data: Vec<u8>,
    pub status: u32,
}

/// Binary receipt status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum ReceiptStatus {
    Failed,
    Successful,
}

impl Default for ReceiptStatus {
    fn default() -> Self {
        ReceiptStatus::Successful
    }
}

/// A committed transaction with its receipt fields, assembled by the
/// committed-tx collector (or directly by prepare for rejected txs).
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub struct CommittedTx {
    pub hash: [u8; 32],
    pub transaction_index: i64,
    pub nonce: u64,
    pub block_hash: [u8; 32],
    pub block_number: i64,
    pub from: Address,
    pub to: Address,
    pub value: [u8; 32],
    pub gas_price: [u8; 32],
    pub gas: u64,
    pub input: Vec<u8>,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    /// The created contract address for a creation tx, zero otherwise
    pub contract_address: Address,
    pub out_data: Vec<u8>,
    pub status: ReceiptStatus,
    pub status_str: String,
    pub logs: Vec<Log>,
    pub logs_bloom: [u8; 256],
    pub internal_tx_calls: Vec<InternalTxCall>,
    pub internal_tx_returns: Vec<InternalTxReturn>,
}

// not derivable: [u8; 256] carries no Default impl
impl Default for CommittedTx {
    fn default() -> Self {
        Self {
            hash: [0u8; 32],
            transaction_index: 0,
            nonce: 0,
            block_hash: [0u8; 32],
            block_number: 0,
            from: Address::ZERO,
            to: Address::ZERO,
            value: [0u8; 32],
            gas_price: [0u8; 32],
            gas: 0,
            input: Vec::new(),
            cumulative_gas_used: 0,
            gas_used: 0,
            contract_address: Address::ZERO,
            out_data: Vec::new(),
            status: ReceiptStatus::Successful,
            status_str: String::new(),
            logs: Vec::new(),
            logs_bloom: [0u8; 256],
            internal_tx_calls: Vec::new(),
            internal_tx_returns: Vec::new(),
        }
    }
}

/// Export form consumed by the MoDB indexer.
#[derive(Clone, Debug, Default)]
pub struct ModbTx {
    pub hash_id: [u8; 32],
    pub src_addr: Address,
    pub dst_addr: Address,
    pub content: Vec<u8>,
    pub log_list: Vec<ModbLog>,
}

#[derive(Clone, Debug, Default)]
pub struct ModbLog {
    pub address: Address,
    pub topics: Vec<[u8; 32]>,
}
