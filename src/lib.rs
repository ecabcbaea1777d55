pub mod engine;
pub mod error;
pub mod frontier;
pub mod runner;
pub mod signer;
pub mod standby;
pub mod store;
pub mod types;

pub use engine::fees;
pub use engine::{logs_bloom, EngineConfig, TxEngine, DEFAULT_TX_GAS_LIMIT};
pub use error::{BalanceError, EngineError, EngineResult, PrepareError};
pub use frontier::Frontier;
pub use runner::{EvmRunner, ExecStatus, TxRunner};
pub use signer::{RecoverySigner, Signer, SignerError};
pub use standby::{standby_key, StandbyQueue, TxRange, STANDBY_QUEUE_KEY};
pub use store::{account_key, Context, TrunkStore};
pub use types::{
    AccountInfo, Address, BlockInfo, CommittedTx, InternalTxCall, InternalTxReturn, Log, ModbLog,
    ModbTx, ReceiptStatus, TxToRun, BLACKHOLE_ADDRESS, SEP206_ADDRESS, SYSTEM_ADDRESS,
};
