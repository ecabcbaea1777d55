use super::preload::{CtxAndAccounts, PreparedInfo};
use crate::error::{BalanceError, PrepareError};
use crate::store::Context;
use crate::types::{AccountInfo, Address, BLACKHOLE_ADDRESS, SEP206_ADDRESS, SYSTEM_ADDRESS};
use alloy_primitives::U256;
use log::debug;

/// Debit `amount` from `sender`. The account is guaranteed to exist by the
/// preloader.
pub fn sub_sender_balance(
    ctx: &mut Context,
    sender: &Address,
    amount: U256,
) -> Result<(), BalanceError> {
    update_balance(ctx, sender, amount, false)
}

/// Credit pre-deducted gas fees to the system account.
pub fn add_system_balance(ctx: &mut Context, amount: U256) -> Result<(), BalanceError> {
    update_balance(ctx, &SYSTEM_ADDRESS, amount, true)
}

pub fn sub_system_balance(ctx: &mut Context, amount: U256) -> Result<(), BalanceError> {
    update_balance(ctx, &SYSTEM_ADDRESS, amount, false)
}

/// Burn: move `amount` from `sender` to the blackhole account.
pub fn transfer_to_blackhole(
    ctx: &mut Context,
    sender: &Address,
    amount: U256,
) -> Result<(), BalanceError> {
    update_balance(ctx, sender, amount, false)?;
    update_balance(ctx, &BLACKHOLE_ADDRESS, amount, true)
}

pub fn system_balance(ctx: &mut Context) -> U256 {
    ctx.get_account(&SYSTEM_ADDRESS)
        .unwrap_or_else(AccountInfo::zero)
        .balance()
}

pub fn blackhole_balance(ctx: &mut Context) -> U256 {
    ctx.get_account(&BLACKHOLE_ADDRESS)
        .unwrap_or_else(AccountInfo::zero)
        .balance()
}

/// Credits lazily initialize an absent account; debits on an absent or
/// short account fail without touching the store.
fn update_balance(
    ctx: &mut Context,
    address: &Address,
    amount: U256,
    is_add: bool,
) -> Result<(), BalanceError> {
    let mut acc = ctx.get_account(address).unwrap_or_else(AccountInfo::zero);
    let balance = acc.balance();
    if is_add {
        acc.update_balance(balance.wrapping_add(amount));
    } else {
        if balance < amount {
            return Err(BalanceError::NotEnough);
        }
        acc.update_balance(balance - amount);
    }
    ctx.set_account(address, &acc);
    Ok(())
}

/// Project `address`'s balance after a hypothetical transfer of `value`;
/// an absent account or a short balance projects to zero.
pub(crate) fn balance_after_transfer(ctx: &mut Context, address: &Address, value: U256) -> U256 {
    let Some(acc) = ctx.get_account(address) else {
        return U256::ZERO;
    };
    let balance = acc.balance();
    if balance < value {
        return U256::ZERO;
    }
    balance - value
}

/// Deduct `gas * gas_price` for one accepted transaction and maintain the
/// worker's cached pending balance for the frontier.
///
/// On a failed debit the cached balance is forced to zero even though the
/// store was not changed, so the frontier reports zero for such senders.
/// Senders calling the SEP206 precompile also get a zero cache, since that
/// contract rewrites balances out of band.
pub(crate) fn deduct_gas_fee(
    entry: &mut CtxAndAccounts,
    info: &mut PreparedInfo,
) -> Result<(), BalanceError> {
    let sender = info.tx.from;
    let gas_fee = info.tx.gas_fee();
    if let Err(e) = sub_sender_balance(&mut entry.ctx, &sender, gas_fee) {
        debug!(
            "prepare: deduct gas fee failed, tx 0x{}",
            hex::encode(info.tx.hash_id)
        );
        entry.balances.insert(sender, U256::ZERO);
        info.error = Some(PrepareError::InsufficientBalanceForGas);
        return Err(e);
    }
    if info.tx.to == SEP206_ADDRESS {
        entry.balances.insert(sender, U256::ZERO);
    } else {
        match entry.balances.get(&sender).copied() {
            None => {
                let projected = balance_after_transfer(&mut entry.ctx, &sender, info.tx.value_u256());
                entry.balances.insert(sender, projected);
            }
            Some(balance) if balance < gas_fee => {
                entry.balances.insert(sender, U256::ZERO);
            }
            Some(balance) => {
                let balance = balance - gas_fee;
                let value = info.tx.value_u256();
                if balance < value {
                    entry.balances.insert(sender, U256::ZERO);
                } else {
                    entry.balances.insert(sender, balance - value);
                }
            }
        }
    }
    entry.total_gas_fee += gas_fee;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TrunkStore;
    use crate::types::TxToRun;
    use alloy_primitives::U256;
    use rustc_hash::FxHashMap;
    use std::sync::Arc;

    fn funded_ctx(addr: &Address, balance: u64) -> Context {
        let trunk = Arc::new(TrunkStore::new());
        let mut ctx = Context::new(Arc::clone(&trunk));
        ctx.set_account(addr, &AccountInfo::new(0, U256::from(balance)));
        ctx.close(true);
        Context::new(trunk)
    }

    fn entry_for(ctx: Context, addr: Address, cached_balance: u64) -> CtxAndAccounts {
        let mut balances = FxHashMap::default();
        balances.insert(addr, U256::from(cached_balance));
        let mut nonces = FxHashMap::default();
        nonces.insert(addr, 0u64);
        CtxAndAccounts {
            ctx,
            accounts: vec![addr],
            changed: false,
            total_gas_fee: U256::ZERO,
            nonces,
            balances,
        }
    }

    fn transfer_info(from: Address, to: Address, value: u64, gas: u64, gas_price: u64) -> PreparedInfo {
        PreparedInfo {
            tx: TxToRun {
                hash_id: [1u8; 32],
                from,
                to,
                value: U256::from(value).to_be_bytes::<32>(),
                gas_price: U256::from(gas_price).to_be_bytes::<32>(),
                gas,
                ..Default::default()
            },
            tx_bytes: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn test_deduct_updates_cached_balance() {
        let sender = Address::new([1u8; 20]);
        let ctx = funded_ctx(&sender, 1_000_000);
        let mut entry = entry_for(ctx, sender, 1_000_000);
        let mut info = transfer_info(sender, Address::new([2u8; 20]), 100, 21_000, 1);

        deduct_gas_fee(&mut entry, &mut info).unwrap();
        assert_eq!(info.error, None);
        assert_eq!(entry.balances[&sender], U256::from(978_900u64));
        assert_eq!(entry.total_gas_fee, U256::from(21_000u64));

        // live balance only lost the fee; the value moves at execution
        assert_eq!(
            entry.ctx.get_account(&sender).unwrap().balance(),
            U256::from(979_000u64)
        );
    }

    #[test]
    fn test_deduct_insufficient_fee_zeroes_cache() {
        let sender = Address::new([1u8; 20]);
        let ctx = funded_ctx(&sender, 1000);
        let mut entry = entry_for(ctx, sender, 1000);
        let mut info = transfer_info(sender, Address::new([2u8; 20]), 0, 21_000, 1);

        assert!(deduct_gas_fee(&mut entry, &mut info).is_err());
        assert_eq!(info.error, Some(PrepareError::InsufficientBalanceForGas));
        assert_eq!(entry.balances[&sender], U256::ZERO);
        assert_eq!(entry.total_gas_fee, U256::ZERO);
        // nothing was debited from the live account
        assert_eq!(
            entry.ctx.get_account(&sender).unwrap().balance(),
            U256::from(1000u64)
        );
    }

    #[test]
    fn test_deduct_sep206_treats_balance_as_unknown() {
        let sender = Address::new([1u8; 20]);
        let ctx = funded_ctx(&sender, 1_000_000);
        let mut entry = entry_for(ctx, sender, 1_000_000);
        let mut info = transfer_info(sender, SEP206_ADDRESS, 500, 21_000, 1);

        deduct_gas_fee(&mut entry, &mut info).unwrap();
        assert_eq!(entry.balances[&sender], U256::ZERO);
        assert_eq!(entry.total_gas_fee, U256::from(21_000u64));
    }

    #[test]
    fn test_deduct_short_value_forces_zero_cache() {
        let sender = Address::new([1u8; 20]);
        let ctx = funded_ctx(&sender, 1_000_000);
        // cached balance covers the fee but not fee + value
        let mut entry = entry_for(ctx, sender, 22_000);
        let mut info = transfer_info(sender, Address::new([2u8; 20]), 5_000, 21_000, 1);

        deduct_gas_fee(&mut entry, &mut info).unwrap();
        assert_eq!(entry.balances[&sender], U256::ZERO);
    }

    #[test]
    fn test_balance_after_transfer() {
        let addr = Address::new([3u8; 20]);
        let mut ctx = funded_ctx(&addr, 1000);
        assert_eq!(
            balance_after_transfer(&mut ctx, &addr, U256::from(400u64)),
            U256::from(600u64)
        );
        assert_eq!(
            balance_after_transfer(&mut ctx, &addr, U256::from(4000u64)),
            U256::ZERO
        );
        let absent = Address::new([9u8; 20]);
        assert_eq!(
            balance_after_transfer(&mut ctx, &absent, U256::ZERO),
            U256::ZERO
        );
    }

    #[test]
    fn test_system_and_blackhole_accounts() {
        let sender = Address::new([4u8; 20]);
        let mut ctx = funded_ctx(&sender, 10_000);

        add_system_balance(&mut ctx, U256::from(700u64)).unwrap();
        assert_eq!(system_balance(&mut ctx), U256::from(700u64));
        sub_system_balance(&mut ctx, U256::from(200u64)).unwrap();
        assert_eq!(system_balance(&mut ctx), U256::from(500u64));
        assert!(sub_system_balance(&mut ctx, U256::from(10_000u64)).is_err());

        transfer_to_blackhole(&mut ctx, &sender, U256::from(1_000u64)).unwrap();
        assert_eq!(blackhole_balance(&mut ctx), U256::from(1_000u64));
        assert_eq!(
            ctx.get_account(&sender).unwrap().balance(),
            U256::from(9_000u64)
        );
    }
}
