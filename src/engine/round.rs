use crate::error::{EngineError, EngineResult};
use crate::runner::{EvmRunner, ExecStatus, TxRunner};
use crate::standby::{standby_key, StandbyQueue, TxRange};
use crate::store::{Context, TrunkStore};
use crate::types::BlockInfo;
use alloy_primitives::U256;
use crossbeam_channel::bounded;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Depth of the writer handoff channel between the resolver and the task
/// closing runner contexts.
const WRITER_CHANNEL_CAP: usize = 10;

/// Gas totals charged for permanently invalid transactions dropped by the
/// resolver.
#[derive(Debug, Default)]
pub(crate) struct RoundStats {
    pub dropped_gas: u64,
    pub dropped_gas_fee: U256,
}

/// Load up to `runner_number` transactions off the standby queue, run them
/// speculatively in parallel, then resolve conflicts serially in slot
/// order. Committable runners are returned in their slots; retried and
/// dropped slots come back as `None`.
pub(crate) fn execute_one_round<E: EvmRunner>(
    pool: &rayon::ThreadPool,
    trunk: &Arc<TrunkStore>,
    evm: &E,
    block: &BlockInfo,
    range: &mut TxRange,
    runner_number: usize,
) -> EngineResult<(Vec<Option<TxRunner>>, RoundStats)> {
    let count = (range.len()).min(runner_number as u64);
    let bundle = StandbyQueue::new(trunk).load(range.start, count)?;
    let (mut runners, kv_count) = run_txs_in_parallel(pool, trunk, evm, block, range, &bundle);
    let stats = resolve_conflicts(trunk, range, &mut runners, kv_count)?;
    Ok((runners, stats))
}

/// Dispatch one runner per bundle slot across the worker pool. A slot whose
/// predecessor has the same sender is tagged `NonceTooLarge` without
/// executing; same-sender transactions cannot run in the same round.
fn run_txs_in_parallel<E: EvmRunner>(
    pool: &rayon::ThreadPool,
    trunk: &Arc<TrunkStore>,
    evm: &E,
    block: &BlockInfo,
    range: &TxRange,
    bundle: &[crate::types::TxToRun],
) -> (Vec<Option<TxRunner>>, usize) {
    let kv_count = AtomicUsize::new(0);
    let start = range.start;
    let end = range.end;
    let runners = pool.install(|| {
        (0..bundle.len())
            .into_par_iter()
            .map(|idx| {
                let ctx = Context::new(Arc::clone(trunk));
                let mut runner = TxRunner::new(ctx, bundle[idx].clone());
                // warm up the slot's own key and its retry destination
                trunk.prepare_for_deletion(&standby_key(start + idx as u64));
                trunk.prepare_for_update(&standby_key(end + idx as u64));
                if idx > 0 && bundle[idx - 1].from == bundle[idx].from {
                    runner.status = ExecStatus::NonceTooLarge;
                } else {
                    evm.run_tx(&mut runner, block);
                    if let Some(ctx) = runner.ctx.as_ref() {
                        kv_count.fetch_add(ctx.cached_entry_count(), Ordering::Relaxed);
                    }
                }
                Some(runner)
            })
            .collect()
    });
    (runners, kv_count.into_inner())
}

/// Scan per-slot touched-key sets in slot order; earlier slots win. Every
/// slot's context is handed to the writer task through a bounded channel in
/// slot order, so commits land in slot order too. Afterwards one trunk
/// update consumes the processed slots and re-appends retryable ones.
fn resolve_conflicts(
    trunk: &Arc<TrunkStore>,
    range: &mut TxRange,
    runners: &mut [Option<TxRunner>],
    kv_hint: usize,
) -> EngineResult<RoundStats> {
    let (decisions, writer_inbox) = bounded::<(Context, bool)>(WRITER_CHANNEL_CAP);
    thread::scope(|s| {
        let writer = s.spawn(move || {
            for (ctx, can_commit) in writer_inbox {
                ctx.close(can_commit);
            }
        });

        let mut touched: FxHashSet<u64> =
            FxHashSet::with_capacity_and_hasher(kv_hint, Default::default());
        for slot in runners.iter_mut() {
            let Some(runner) = slot.as_mut() else {
                continue;
            };
            let mut can_commit = true;
            if let Some(ctx) = runner.ctx.as_ref() {
                ctx.scan_short_keys(|key, _| {
                    if touched.contains(&key) {
                        can_commit = false;
                        return true;
                    }
                    false
                });
                if can_commit {
                    // only dirty keys of a committed slot pollute the set
                    ctx.scan_short_keys(|key, dirty| {
                        if dirty {
                            touched.insert(key);
                        }
                        false
                    });
                }
            }
            if !can_commit {
                runner.status = ExecStatus::FailedToCommit;
            }
            if let Some(ctx) = runner.ctx.take() {
                decisions
                    .send((ctx, can_commit))
                    .expect("writer task alive until senders drop");
            }
        }
        drop(decisions);
        writer.join().expect("writer task never panics");
    });

    // pre-serialize retried transactions: retries reuse the exact wire form
    let mut retry_bytes: Vec<Option<Vec<u8>>> = Vec::with_capacity(runners.len());
    for slot in runners.iter() {
        match slot {
            Some(runner) if runner.status.is_retryable() => {
                let bytes = borsh::to_vec(&runner.tx)
                    .map_err(|e| EngineError::Serialization(e.to_string()))?;
                retry_bytes.push(Some(bytes));
            }
            _ => retry_bytes.push(None),
        }
    }

    let mut stats = RoundStats::default();
    trunk.update(|batch| {
        for (idx, slot) in runners.iter_mut().enumerate() {
            batch.delete(&standby_key(range.start));
            range.start += 1;
            let Some(runner) = slot.as_ref() else {
                continue;
            };
            if runner.status.is_retryable() {
                if let Some(bytes) = &retry_bytes[idx] {
                    batch.set(&standby_key(range.end), bytes);
                    range.end += 1;
                }
                *slot = None;
            } else if runner.status.is_dropped() {
                // permanently invalid: charge the full gas limit
                stats.dropped_gas += runner.tx.gas;
                stats.dropped_gas_fee += runner.gas_fee();
                *slot = None;
            }
        }
    });
    Ok(stats)
}
