use super::preload::PreparedInfo;
use super::TxEngine;
use crate::error::{EngineError, EngineResult, PrepareError};
use crate::runner::{EvmRunner, TxRunner};
use crate::signer::Signer;
use crate::types::{CommittedTx, Log, ModbLog, ModbTx, ReceiptStatus};
use alloy_primitives::{Bloom, BloomInput};
use log::debug;

/// 2048-bit, k = 3 log bloom over each log's address and topics, in the
/// standard blockchain log-bloom encoding.
pub fn logs_bloom(logs: &[Log]) -> [u8; 256] {
    let mut bloom = Bloom::ZERO;
    for log in logs {
        bloom.accrue(BloomInput::Raw(log.address.as_ref()));
        for topic in &log.topics {
            bloom.accrue(BloomInput::Raw(topic));
        }
    }
    let mut out = [0u8; 256];
    out.copy_from_slice(bloom.as_slice());
    out
}

impl<S: Signer, E: EvmRunner> TxEngine<S, E> {
    /// Emit an immediate FAIL receipt for a transaction rejected during
    /// prepare. It never enters the standby queue and is charged no gas.
    pub(crate) fn record_invalid_tx(&mut self, info: &PreparedInfo, err: PrepareError) {
        let mut tx = CommittedTx {
            hash: info.tx.hash_id,
            transaction_index: self.committed_txs.len() as i64,
            nonce: info.tx.nonce,
            block_number: self.current_height() as i64,
            from: info.tx.from,
            to: info.tx.to,
            value: info.tx.value,
            gas_price: info.tx.gas_price,
            gas: info.tx.gas,
            input: info.tx.data.clone(),
            cumulative_gas_used: self.cumulative_gas_used,
            gas_used: 0,
            status: ReceiptStatus::Failed,
            status_str: err.to_string(),
            ..Default::default()
        };
        if let Some(block) = &self.current_block {
            tx.block_hash = block.hash;
        }
        self.committed_txs.push(tx);
    }

    /// Assemble the ordered committed-tx list: per-block transaction
    /// indexes, running cumulative counters, block-global log indexes and
    /// the per-receipt logs bloom.
    pub(crate) fn collect_committable_txs(&mut self, runners: Vec<TxRunner>) {
        let (block_number, block_hash) = match &self.current_block {
            Some(block) => (block.number, block.hash),
            None => (0, [0u8; 32]),
        };
        let mut log_index: u32 = 0;
        for (idx, runner) in runners.into_iter().enumerate() {
            self.cumulative_gas_used += runner.gas_used;
            self.cumulative_fee_refund += runner.fee_refund;
            self.cumulative_gas_fee += runner.gas_fee();

            let mut logs = runner.logs;
            for log in logs.iter_mut() {
                log.block_number = block_number as u64;
                log.block_hash = block_hash;
                log.tx_hash = runner.tx.hash_id;
                log.tx_index = idx as u32;
                log.log_index = log_index;
                log_index += 1;
                log.removed = false;
            }
            let status = if runner.status.is_failure() {
                ReceiptStatus::Failed
            } else {
                ReceiptStatus::Successful
            };
            debug!(
                "collect: status {} tx 0x{}",
                runner.status.as_str(),
                hex::encode(runner.tx.hash_id)
            );
            let bloom = logs_bloom(&logs);
            self.committed_txs.push(CommittedTx {
                hash: runner.tx.hash_id,
                transaction_index: idx as i64,
                nonce: runner.tx.nonce,
                block_hash,
                block_number,
                from: runner.tx.from,
                to: runner.tx.to,
                value: runner.tx.value,
                gas_price: runner.tx.gas_price,
                gas: runner.tx.gas,
                input: runner.tx.data,
                cumulative_gas_used: self.cumulative_gas_used,
                gas_used: runner.gas_used,
                contract_address: runner.created_contract_address,
                out_data: runner.out_data,
                status,
                status_str: runner.status.as_str().to_string(),
                logs,
                logs_bloom: bloom,
                internal_tx_calls: runner.internal_tx_calls,
                internal_tx_returns: runner.internal_tx_returns,
            });
        }
    }

    /// Export the committed transactions in the form the MoDB indexer
    /// ingests. A serialization failure here is a violated invariant and
    /// aborts the block.
    pub fn committed_txs_for_modb(&self) -> EngineResult<Vec<ModbTx>> {
        let mut out = Vec::with_capacity(self.committed_txs.len());
        for tx in &self.committed_txs {
            let content =
                borsh::to_vec(tx).map_err(|e| EngineError::Serialization(e.to_string()))?;
            out.push(ModbTx {
                hash_id: tx.hash,
                src_addr: tx.from,
                dst_addr: tx.to,
                content,
                log_list: tx
                    .logs
                    .iter()
                    .map(|log| ModbLog {
                        address: log.address,
                        topics: log.topics.clone(),
                    })
                    .collect(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    #[test]
    fn test_bloom_of_no_logs_is_zero() {
        assert_eq!(logs_bloom(&[]), [0u8; 256]);
    }

    #[test]
    fn test_bloom_contains_address_and_topics() {
        let log = Log {
            address: Address::new([0xAA; 20]),
            topics: vec![[0x11; 32], [0x22; 32]],
            ..Default::default()
        };
        let bloom = Bloom::from_slice(&logs_bloom(&[log.clone()]));

        assert!(bloom.contains_input(BloomInput::Raw(log.address.as_ref())));
        assert!(bloom.contains_input(BloomInput::Raw(&log.topics[0])));
        assert!(bloom.contains_input(BloomInput::Raw(&log.topics[1])));
        assert!(!bloom.contains_input(BloomInput::Raw(b"absent-entry")));
    }

    #[test]
    fn test_bloom_is_cumulative_over_logs() {
        let log_a = Log {
            address: Address::new([1u8; 20]),
            ..Default::default()
        };
        let log_b = Log {
            address: Address::new([2u8; 20]),
            ..Default::default()
        };
        let combined = Bloom::from_slice(&logs_bloom(&[log_a.clone(), log_b.clone()]));
        assert!(combined.contains_input(BloomInput::Raw(log_a.address.as_ref())));
        assert!(combined.contains_input(BloomInput::Raw(log_b.address.as_ref())));
    }
}
