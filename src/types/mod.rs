mod account;
mod address;
mod block;
mod transaction;

pub use account::{AccountInfo, ACCOUNT_BYTES_LEN};
pub use address::{Address, AddressError, BLACKHOLE_ADDRESS, SEP206_ADDRESS, SYSTEM_ADDRESS};
pub use block::BlockInfo;
pub use transaction::{
    CommittedTx, InternalTxCall, InternalTxReturn, Log, ModbLog, ModbTx, ReceiptStatus, TxToRun,
};
