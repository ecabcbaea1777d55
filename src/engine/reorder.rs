use super::preload::PreparedInfo;
use crate::types::Address;
use rand_mt::Mt64;
use rustc_hash::FxHashMap;

/// `[0, 2^63-1]` draw from the 64-bit Mersenne Twister, matching the
/// reference `genrand64_int63`.
fn next_int63(rng: &mut Mt64) -> i64 {
    (rng.next_u64() >> 1) as i64
}

/// Deterministically reorder the prepared infos at the address level.
///
/// Senders are listed in order of first appearance, then shuffled with an
/// MT19937-64 seeded by the block-derived seed: `len` iterations each
/// drawing two independent indexes and swapping them. The swap scheme and
/// the generator are consensus-critical and must not be changed. Infos of
/// the same sender keep their original relative order, preserving nonce
/// monotonicity.
///
/// Returns the shuffled address order plus the per-sender info groups.
pub(crate) fn reorder_infos(
    info_list: Vec<PreparedInfo>,
    seed: i64,
) -> (Vec<Address>, FxHashMap<Address, Vec<PreparedInfo>>) {
    let mut groups: FxHashMap<Address, Vec<PreparedInfo>> =
        FxHashMap::with_capacity_and_hasher(info_list.len(), Default::default());
    let mut addr_list: Vec<Address> = Vec::with_capacity(info_list.len());
    for info in info_list {
        let from = info.tx.from;
        match groups.get_mut(&from) {
            Some(group) => group.push(info),
            None => {
                groups.insert(from, vec![info]);
                addr_list.push(from);
            }
        }
    }

    let mut rng = Mt64::new(seed as u64);
    let n = addr_list.len() as i64;
    for _ in 0..n {
        let r0 = (next_int63(&mut rng) % n) as usize;
        let r1 = (next_int63(&mut rng) % n) as usize;
        addr_list.swap(r0, r1);
    }
    (addr_list, groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxToRun;

    fn info(from: Address, nonce: u64) -> PreparedInfo {
        PreparedInfo {
            tx: TxToRun {
                from,
                nonce,
                ..Default::default()
            },
            tx_bytes: Vec::new(),
            error: None,
        }
    }

    fn addrs(n: u8) -> Vec<Address> {
        (1..=n).map(|i| Address::new([i; 20])).collect()
    }

    #[test]
    fn test_reorder_is_deterministic() {
        let build = || {
            addrs(6)
                .into_iter()
                .flat_map(|a| (0..3).map(move |n| info(a, n)))
                .collect::<Vec<_>>()
        };
        let (order_a, _) = reorder_infos(build(), 42);
        let (order_b, _) = reorder_infos(build(), 42);
        assert_eq!(order_a, order_b);
    }

    #[test]
    fn test_reorder_keeps_all_addresses() {
        let infos: Vec<_> = addrs(9).into_iter().map(|a| info(a, 0)).collect();
        let (order, groups) = reorder_infos(infos, 7);
        assert_eq!(order.len(), 9);
        let mut sorted = order.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 9);
        assert_eq!(groups.len(), 9);
    }

    #[test]
    fn test_same_sender_keeps_original_order() {
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);
        let infos = vec![info(a, 0), info(b, 5), info(a, 1), info(a, 2), info(b, 6)];
        let (_, groups) = reorder_infos(infos, 1234);

        let a_nonces: Vec<u64> = groups[&a].iter().map(|i| i.tx.nonce).collect();
        let b_nonces: Vec<u64> = groups[&b].iter().map(|i| i.tx.nonce).collect();
        assert_eq!(a_nonces, vec![0, 1, 2]);
        assert_eq!(b_nonces, vec![5, 6]);
    }

    #[test]
    fn test_empty_list() {
        let (order, groups) = reorder_infos(Vec::new(), 99);
        assert!(order.is_empty());
        assert!(groups.is_empty());
    }
}
