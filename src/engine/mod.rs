//! Parallel block transaction execution engine.
//!
//! One engine instance serves a chain. Per block the host drives it as:
//! `set_context` → `execute(block)` (drains the standby queue filled by the
//! previous prepare) → `collect_tx`* → `set_context` → `prepare(..)`
//! (validates, deducts fees, refills the queue, returns the frontier).
//!
//! For a fixed trunk state and input, the committed transactions, the final
//! trunk state and the frontier are identical regardless of `parallel_num`
//! and worker interleaving.

mod collect;
pub mod fees;
mod preload;
mod reorder;
mod round;

pub use collect::logs_bloom;

use crate::error::{EngineError, EngineResult, PrepareError};
use crate::frontier::Frontier;
use crate::runner::{EvmRunner, TxRunner};
use crate::signer::Signer;
use crate::standby::{encode_range, standby_key, StandbyQueue, STANDBY_QUEUE_KEY};
use crate::store::Context;
use crate::types::{Address, BlockInfo, CommittedTx};
use alloy_consensus::TxEnvelope;
use alloy_primitives::U256;
use log::debug;
use preload::PreparedInfo;
use std::sync::Arc;

pub const DEFAULT_TX_GAS_LIMIT: u64 = 10_000_000;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// How many parallel execution rounds are performed for each block
    /// (consensus parameter)
    pub round_num: usize,
    /// How many runners execute transactions in parallel for each round
    /// (consensus parameter)
    pub runner_number: usize,
    /// How many worker threads drive the runners (per-node parameter)
    pub parallel_num: usize,
    /// Capacity hint for the collected-tx list
    pub default_tx_list_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            round_num: 8,
            runner_number: 256,
            parallel_num: num_cpus::get(),
            default_tx_list_cap: 4096,
        }
    }
}

pub struct TxEngine<S: Signer, E: EvmRunner> {
    round_num: usize,
    runner_number: usize,
    parallel_num: usize,
    pool: rayon::ThreadPool,
    /// A clean context over the trunk. Must be set before `execute`;
    /// `prepare` consumes it.
    clean_ctx: Option<Context>,
    /// `collect_tx` fills this list; `prepare` drains it
    tx_list: Vec<TxEnvelope>,
    committed_txs: Vec<CommittedTx>,
    signer: S,
    evm: E,
    current_block: Option<BlockInfo>,
    cumulative_gas_used: u64,
    cumulative_fee_refund: U256,
    cumulative_gas_fee: U256,
}

impl<S: Signer, E: EvmRunner> TxEngine<S, E> {
    pub fn new(config: EngineConfig, signer: S, evm: E) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_num)
            .build()
            .expect("failed to build worker pool");
        Self {
            round_num: config.round_num,
            runner_number: config.runner_number,
            parallel_num: config.parallel_num,
            pool,
            clean_ctx: None,
            tx_list: Vec::with_capacity(config.default_tx_list_cap),
            committed_txs: Vec::with_capacity(config.default_tx_list_cap),
            signer,
            evm,
            current_block: None,
            cumulative_gas_used: 0,
            cumulative_fee_refund: U256::ZERO,
            cumulative_gas_fee: U256::ZERO,
        }
    }

    pub fn set_context(&mut self, ctx: Context) {
        self.clean_ctx = Some(ctx);
    }

    pub fn context(&self) -> Option<&Context> {
        self.clean_ctx.as_ref()
    }

    pub fn collect_tx(&mut self, tx: TxEnvelope) {
        self.tx_list.push(tx);
    }

    pub fn collected_txs_count(&self) -> usize {
        self.tx_list.len()
    }

    pub(crate) fn current_height(&self) -> u64 {
        self.current_block
            .as_ref()
            .map(|b| b.number as u64)
            .unwrap_or(0)
    }

    /// Check the collected transactions' signatures, reorder them, deduct
    /// gas fees and insert the accepted ones into the standby queue.
    /// Consumes the engine context and returns the pending-state frontier.
    pub fn prepare(
        &mut self,
        reorder_seed: i64,
        min_gas_price: u64,
        max_tx_gas_limit: u64,
    ) -> EngineResult<Frontier> {
        let clean_ctx = self.clean_ctx.take().ok_or(EngineError::NoContext)?;
        clean_ctx.trunk().prepare_for_update(&STANDBY_QUEUE_KEY);
        if self.tx_list.is_empty() {
            clean_ctx.close(false);
            return Ok(Frontier::empty());
        }

        let tx_list = std::mem::take(&mut self.tx_list);
        let (info_list, mut ctx_aa) = preload::parallel_read_accounts(
            &self.pool,
            self.parallel_num,
            &clean_ctx,
            &self.signer,
            &tx_list,
            self.current_height(),
            min_gas_price,
            max_tx_gas_limit,
        );
        let addr_to_worker = preload::address_to_worker(&ctx_aa, tx_list.len());
        let (addr_order, mut groups) = reorder::reorder_infos(info_list, reorder_seed);

        let queue = StandbyQueue::new(clean_ctx.trunk());
        let mut queue_range = queue.get_range();
        let queue_end = queue_range.end;

        // hand each sender group to the worker owning the address; groups
        // whose sender never preloaded stay behind, fully error-tagged
        let total_txs = tx_list.len();
        let mut assignments: Vec<Vec<(Address, Vec<PreparedInfo>)>> =
            (0..self.parallel_num).map(|_| Vec::new()).collect();
        for addr in &addr_order {
            if let Some(&worker) = addr_to_worker.get(addr) {
                if let Some(infos) = groups.remove(addr) {
                    assignments[worker].push((*addr, infos));
                }
            }
        }

        // deduct gas fees per sender. The insertion order into the standby
        // queue must not depend on parallel_num or on worker speeds.
        let warm_up_len = total_txs / self.parallel_num + 1;
        self.pool.scope(|s| {
            for (worker_id, (entry, batch)) in
                ctx_aa.iter_mut().zip(assignments.iter_mut()).enumerate()
            {
                s.spawn(move |_| {
                    let lo = worker_id * warm_up_len;
                    let hi = ((worker_id + 1) * warm_up_len).min(total_txs);
                    for i in lo..hi {
                        // warm up the standby slots this block will write
                        entry
                            .ctx
                            .trunk()
                            .prepare_for_update(&standby_key(queue_end + i as u64));
                    }
                    for (_, infos) in batch.iter_mut() {
                        for info in infos.iter_mut() {
                            if info.error.is_some() {
                                continue;
                            }
                            let sender = info.tx.from;
                            match entry.nonces.get_mut(&sender) {
                                Some(nonce) if *nonce == info.tx.nonce => *nonce += 1,
                                _ => {
                                    debug!(
                                        "prepare: incorrect nonce, tx 0x{}",
                                        hex::encode(info.tx.hash_id)
                                    );
                                    info.error = Some(PrepareError::IncorrectNonce);
                                    continue;
                                }
                            }
                            if fees::deduct_gas_fee(entry, info).is_err() {
                                continue;
                            }
                            entry.changed = true;
                            info.tx_bytes =
                                borsh::to_vec(&info.tx).expect("serialize TxToRun");
                        }
                    }
                });
            }
        });

        // close worker views, sum their fees, keep the caches for the frontier
        let mut total_gas_fee = U256::ZERO;
        let mut worker_maps = Vec::with_capacity(ctx_aa.len());
        for entry in ctx_aa {
            entry.ctx.close(entry.changed);
            total_gas_fee += entry.total_gas_fee;
            worker_maps.push((entry.nonces, entry.balances));
        }

        // the block's fees reach the system account as one lump credit
        let mut ctx = clean_ctx.with_copy();
        let _ = fees::add_system_balance(&mut ctx, total_gas_fee);
        ctx.close(true);

        for batch in assignments {
            for (addr, infos) in batch {
                groups.insert(addr, infos);
            }
        }

        // slot writes and the range pointer land in one update section
        let trunk = Arc::clone(clean_ctx.trunk());
        let mut end = queue_end;
        trunk.update(|b| {
            for addr in &addr_order {
                let Some(infos) = groups.get(addr) else {
                    continue;
                };
                for info in infos {
                    if info.error.is_some() {
                        continue;
                    }
                    b.set(&standby_key(end), &info.tx_bytes);
                    end += 1;
                }
            }
            queue_range.end = end;
            b.set(&STANDBY_QUEUE_KEY, &encode_range(queue_range));
        });
        // an honest proposer produces no rejected transactions; each one
        // still gets an immediate FAIL receipt
        for addr in &addr_order {
            let Some(infos) = groups.get(addr) else {
                continue;
            };
            for info in infos {
                if let Some(err) = info.error {
                    self.record_invalid_tx(info, err);
                }
            }
        }

        clean_ctx.close(false);
        Ok(preload::build_frontier(&worker_maps, &addr_to_worker))
    }

    /// Fetch transactions from the standby queue and execute them in up to
    /// `round_num` parallel rounds. Each round publishes its commits, so
    /// retried transactions can make progress against the widened state.
    pub fn execute(&mut self, block: BlockInfo) -> EngineResult<()> {
        let trunk = match &self.clean_ctx {
            Some(ctx) => Arc::clone(ctx.trunk()),
            None => return Err(EngineError::NoContext),
        };
        self.committed_txs.clear();
        self.cumulative_gas_used = 0;
        self.cumulative_fee_refund = U256::ZERO;
        self.cumulative_gas_fee = U256::ZERO;
        self.current_block = Some(block.clone());

        let queue = StandbyQueue::new(&trunk);
        let mut range = queue.get_range();
        if range.is_empty() {
            return Ok(());
        }

        let mut committable: Vec<TxRunner> = Vec::new();
        for _ in 0..self.round_num {
            if range.is_empty() {
                break;
            }
            let (runners, stats) = round::execute_one_round(
                &self.pool,
                &trunk,
                &self.evm,
                &block,
                &mut range,
                self.runner_number,
            )?;
            self.cumulative_gas_used += stats.dropped_gas;
            self.cumulative_gas_fee += stats.dropped_gas_fee;
            committable.extend(runners.into_iter().flatten());
        }
        queue.set_range(range);
        self.collect_committable_txs(committable);
        Ok(())
    }

    pub fn committed_txs(&self) -> &[CommittedTx] {
        &self.committed_txs
    }

    pub fn committed_tx_ids(&self) -> Vec<[u8; 32]> {
        self.committed_txs.iter().map(|tx| tx.hash).collect()
    }

    pub fn standby_q_len(&self) -> EngineResult<usize> {
        let ctx = self.clean_ctx.as_ref().ok_or(EngineError::NoContext)?;
        Ok(StandbyQueue::new(ctx.trunk()).len())
    }

    pub fn gas_used_info(&self) -> (u64, U256, U256) {
        (
            self.cumulative_gas_used,
            self.cumulative_fee_refund,
            self.cumulative_gas_fee,
        )
    }
}
