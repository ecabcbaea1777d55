mod context;
mod trunk;

pub use context::{account_key, short_key, Context};
pub use trunk::{TrunkBatch, TrunkStore};
