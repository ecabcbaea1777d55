use crate::store::Context;
use crate::types::{Address, BlockInfo, InternalTxCall, InternalTxReturn, Log, TxToRun};
use alloy_primitives::U256;

/// Terminal status of one speculative execution slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecStatus {
    #[default]
    Success,
    Reverted,
    AccountNotExist,
    NonceTooSmall,
    NonceTooLarge,
    FailedToCommit,
    OtherFailure,
}

impl ExecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecStatus::Success => "success",
            ExecStatus::Reverted => "reverted",
            ExecStatus::AccountNotExist => "account-not-exist",
            ExecStatus::NonceTooSmall => "tx-nonce-too-small",
            ExecStatus::NonceTooLarge => "tx-nonce-too-large",
            ExecStatus::FailedToCommit => "failed-to-commit",
            ExecStatus::OtherFailure => "other-failure",
        }
    }

    /// Binary receipt mapping: execution that ran to a terminal counts as
    /// success, including reverts.
    pub fn is_failure(&self) -> bool {
        !matches!(self, ExecStatus::Success | ExecStatus::Reverted)
    }

    /// Retryable slots are re-appended to the standby queue for the next
    /// round.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecStatus::FailedToCommit | ExecStatus::NonceTooLarge)
    }

    /// Permanently invalid: dropped with the full gas limit charged.
    pub fn is_dropped(&self) -> bool {
        matches!(self, ExecStatus::AccountNotExist | ExecStatus::NonceTooSmall)
    }
}

/// A live execution slot: the speculative store view plus everything the
/// EVM collaborator reports back.
pub struct TxRunner {
    /// Taken by the conflict resolver when the slot is handed to the writer
    pub ctx: Option<Context>,
    pub tx: TxToRun,
    pub status: ExecStatus,
    pub gas_used: u64,
    pub fee_refund: U256,
    /// Created contract address for a creation tx, zero otherwise
    pub created_contract_address: Address,
    pub out_data: Vec<u8>,
    pub logs: Vec<Log>,
    pub internal_tx_calls: Vec<InternalTxCall>,
    pub internal_tx_returns: Vec<InternalTxReturn>,
}

impl TxRunner {
    pub fn new(ctx: Context, tx: TxToRun) -> Self {
        Self {
            ctx: Some(ctx),
            tx,
            status: ExecStatus::default(),
            gas_used: 0,
            fee_refund: U256::ZERO,
            created_contract_address: Address::ZERO,
            out_data: Vec::new(),
            logs: Vec::new(),
            internal_tx_calls: Vec::new(),
            internal_tx_returns: Vec::new(),
        }
    }

    /// The fee pre-deducted for this transaction during prepare.
    pub fn gas_fee(&self) -> U256 {
        self.tx.gas_fee()
    }
}

/// The EVM collaborator. `run_tx` executes `runner.tx` against `runner.ctx`
/// and writes back status, gas used, refund, created address, output, logs
/// and call traces. The engine treats it as a black box.
pub trait EvmRunner: Send + Sync {
    fn run_tx(&self, runner: &mut TxRunner, block: &BlockInfo);
}
