use crate::error::PrepareError;
use crate::frontier::Frontier;
use crate::signer::Signer;
use crate::store::Context;
use crate::types::{Address, TxToRun};
use alloy_consensus::{Transaction as _, TxEnvelope};
use alloy_primitives::U256;
use crossbeam_channel::unbounded;
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-transaction prepare output. Exactly one of `tx_bytes` (serialized
/// wire form) or `error` is populated by the end of prepare.
pub(crate) struct PreparedInfo {
    pub tx: TxToRun,
    pub tx_bytes: Vec<u8>,
    pub error: Option<PrepareError>,
}

/// Per-worker scratch area during prepare: an isolated store view, the
/// senders first touched by this worker, and cached pending nonce/balance
/// per sender. Maps are owned exclusively by the worker until the join.
pub(crate) struct CtxAndAccounts {
    pub ctx: Context,
    pub accounts: Vec<Address>,
    /// The view holds buffered writes and must be written back on close
    pub changed: bool,
    pub total_gas_fee: U256,
    pub nonces: FxHashMap<Address, u64>,
    pub balances: FxHashMap<Address, U256>,
}

/// Read account state for every collected transaction in parallel, while
/// checking signatures and the static limits. Workers claim transaction
/// indexes off a shared atomic counter; which worker handles an index is
/// nondeterministic, but the produced info list is not.
pub(crate) fn parallel_read_accounts<S: Signer>(
    pool: &rayon::ThreadPool,
    parallel_num: usize,
    clean_ctx: &Context,
    signer: &S,
    tx_list: &[TxEnvelope],
    block_height: u64,
    min_gas_price: u64,
    max_tx_gas_limit: u64,
) -> (Vec<PreparedInfo>, Vec<CtxAndAccounts>) {
    let estimated = tx_list.len() / parallel_num + 1;
    let mut ctx_aa: Vec<CtxAndAccounts> = (0..parallel_num)
        .map(|_| CtxAndAccounts {
            ctx: clean_ctx.with_copy(),
            accounts: Vec::with_capacity(estimated),
            changed: false,
            total_gas_fee: U256::ZERO,
            nonces: FxHashMap::default(),
            balances: FxHashMap::default(),
        })
        .collect();

    let next = AtomicUsize::new(0);
    let (out, results) = unbounded();
    pool.scope(|s| {
        for entry in ctx_aa.iter_mut() {
            let out = out.clone();
            let next = &next;
            s.spawn(move |_| loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                if idx >= tx_list.len() {
                    return;
                }
                let info = preload_one(
                    entry,
                    signer,
                    &tx_list[idx],
                    block_height,
                    min_gas_price,
                    max_tx_gas_limit,
                );
                out.send((idx, info)).expect("preload collector alive");
            });
        }
    });
    drop(out);

    let mut info_list: Vec<Option<PreparedInfo>> = (0..tx_list.len()).map(|_| None).collect();
    for (idx, info) in results {
        info_list[idx] = Some(info);
    }
    let info_list = info_list
        .into_iter()
        .map(|info| info.expect("every claimed index produced an info"))
        .collect();
    (info_list, ctx_aa)
}

fn preload_one<S: Signer>(
    entry: &mut CtxAndAccounts,
    signer: &S,
    tx: &TxEnvelope,
    block_height: u64,
    min_gas_price: u64,
    max_tx_gas_limit: u64,
) -> PreparedInfo {
    // recovering the sender is the expensive part of this loop
    let recovered = signer.sender(tx);
    let sender = recovered.as_ref().copied().unwrap_or(Address::ZERO);
    let mut info = PreparedInfo {
        tx: TxToRun::from_envelope(tx, sender, block_height),
        tx_bytes: Vec::new(),
        error: None,
    };
    if recovered.is_err() {
        debug!("prepare: invalid signature, tx 0x{}", hex::encode(info.tx.hash_id));
        info.error = Some(PrepareError::InvalidSignature);
        return info;
    }
    let gas_price = tx.gas_price().unwrap_or_else(|| tx.max_fee_per_gas());
    if gas_price > i64::MAX as u128 || gas_price < min_gas_price as u128 {
        info.error = Some(PrepareError::InvalidGasPrice);
        return info;
    }
    if tx.gas_limit() > max_tx_gas_limit {
        info.error = Some(PrepareError::InvalidGasLimit);
        return info;
    }
    // access the store to fetch the account's detail
    let acc = match entry.ctx.get_account(&sender) {
        Some(acc) => acc,
        None => {
            info.error = Some(PrepareError::NonExistentAccount);
            return info;
        }
    };
    if !entry.nonces.contains_key(&sender) {
        entry.accounts.push(sender);
        entry.nonces.insert(sender, acc.nonce());
        entry.balances.insert(sender, acc.balance());
    }
    info
}

/// Map each preloaded sender to the lowest-indexed worker that touched it.
/// That worker alone may process the sender's transactions later, which
/// gives exactly-one-worker-per-sender without locking.
pub(crate) fn address_to_worker(
    ctx_aa: &[CtxAndAccounts],
    capacity: usize,
) -> FxHashMap<Address, usize> {
    let mut map = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
    for (idx, entry) in ctx_aa.iter().enumerate() {
        for addr in &entry.accounts {
            map.entry(*addr).or_insert(idx);
        }
    }
    map
}

/// Build the frontier from the owning worker's post-deduction caches. A
/// missing balance defaults to zero; cumulative gas starts empty.
pub(crate) fn build_frontier(
    worker_maps: &[(FxHashMap<Address, u64>, FxHashMap<Address, U256>)],
    addr_to_worker: &FxHashMap<Address, usize>,
) -> Frontier {
    let mut frontier = Frontier::empty();
    for (&addr, &idx) in addr_to_worker {
        let (nonces, balances) = &worker_maps[idx];
        if let Some(&nonce) = nonces.get(&addr) {
            frontier.set_latest_nonce(addr, nonce);
            frontier.set_latest_balance(addr, balances.get(&addr).copied().unwrap_or(U256::ZERO));
        }
    }
    frontier
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::RecoverySigner;
    use crate::store::TrunkStore;
    use crate::types::AccountInfo;
    use alloy_consensus::{SignableTransaction, TxLegacy};
    use alloy_primitives::{Address as AlloyAddress, TxKind};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use std::sync::Arc;

    const CHAIN_ID: u64 = 1;

    fn signed_transfer(key: &PrivateKeySigner, nonce: u64, gas_price: u128, gas: u64) -> TxEnvelope {
        let tx = TxLegacy {
            chain_id: Some(CHAIN_ID),
            nonce,
            gas_price,
            gas_limit: gas,
            to: TxKind::Call(AlloyAddress::with_last_byte(9)),
            value: U256::from(10u64),
            input: Default::default(),
        };
        let sig = key.sign_hash_sync(&tx.signature_hash()).unwrap();
        TxEnvelope::Legacy(tx.into_signed(sig))
    }

    fn test_pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_preload_static_checks() {
        let trunk = Arc::new(TrunkStore::new());
        let key = PrivateKeySigner::random();
        let sender = Address(key.address().into_array());

        let mut ctx = Context::new(Arc::clone(&trunk));
        ctx.set_account(&sender, &AccountInfo::new(3, U256::from(1_000_000u64)));
        ctx.close(true);

        let clean_ctx = Context::new(Arc::clone(&trunk));
        let txs = vec![
            signed_transfer(&key, 3, 10, 21_000),    // fine
            signed_transfer(&key, 4, 0, 21_000),     // gas price below floor
            signed_transfer(&key, 5, 10, 99_999_999), // gas limit too high
            signed_transfer(&PrivateKeySigner::random(), 0, 10, 21_000), // unknown account
        ];
        let (infos, ctx_aa) = parallel_read_accounts(
            &test_pool(),
            2,
            &clean_ctx,
            &RecoverySigner::new(CHAIN_ID),
            &txs,
            1,
            5,
            10_000_000,
        );

        assert_eq!(infos[0].error, None);
        assert_eq!(infos[1].error, Some(PrepareError::InvalidGasPrice));
        assert_eq!(infos[2].error, Some(PrepareError::InvalidGasLimit));
        assert_eq!(infos[3].error, Some(PrepareError::NonExistentAccount));
        assert_eq!(infos[0].tx.from, sender);

        // exactly one worker cached the sender's snapshot
        let map = address_to_worker(&ctx_aa, txs.len());
        let owner = map[&sender];
        assert_eq!(ctx_aa[owner].nonces[&sender], 3);
        assert_eq!(ctx_aa[owner].balances[&sender], U256::from(1_000_000u64));
    }

    #[test]
    fn test_build_frontier_defaults_balance_to_zero() {
        let addr = Address::new([8u8; 20]);
        let mut nonces = FxHashMap::default();
        nonces.insert(addr, 4u64);
        let maps = vec![(nonces, FxHashMap::default())];
        let mut a2w = FxHashMap::default();
        a2w.insert(addr, 0usize);

        let frontier = build_frontier(&maps, &a2w);
        assert_eq!(frontier.latest_nonce(&addr), Some(4));
        assert_eq!(frontier.latest_balance(&addr), Some(U256::ZERO));
        assert_eq!(frontier.latest_total_gas(&addr), None);
    }
}
