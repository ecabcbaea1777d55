use crate::error::{EngineError, EngineResult};
use crate::store::TrunkStore;
use crate::types::TxToRun;

/// Control key holding the queue range as `start || end`, two big-endian u64s.
pub const STANDBY_QUEUE_KEY: [u8; 1] = [b'Q'];

const STANDBY_SLOT_PREFIX: u8 = b'q';

/// Store key of standby slot `index`. Stable and injective; slot keys never
/// collide with the control key because of the distinct prefix.
pub fn standby_key(index: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = STANDBY_SLOT_PREFIX;
    key[1..].copy_from_slice(&index.to_be_bytes());
    key
}

/// Valid slots are `[start, end)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxRange {
    pub start: u64,
    pub end: u64,
}

impl TxRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

pub fn encode_range(range: TxRange) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[..8].copy_from_slice(&range.start.to_be_bytes());
    buf[8..].copy_from_slice(&range.end.to_be_bytes());
    buf
}

pub fn decode_range(bytes: &[u8]) -> TxRange {
    if bytes.len() < 16 {
        return TxRange::default();
    }
    TxRange {
        start: u64::from_be_bytes(bytes[..8].try_into().expect("8-byte slice")),
        end: u64::from_be_bytes(bytes[8..16].try_into().expect("8-byte slice")),
    }
}

/// The persistent FIFO of prepared, not-yet-executed transactions, embedded
/// in the trunk store.
pub struct StandbyQueue<'a> {
    trunk: &'a TrunkStore,
}

impl<'a> StandbyQueue<'a> {
    pub fn new(trunk: &'a TrunkStore) -> Self {
        Self { trunk }
    }

    /// Missing control key means an empty queue at (0, 0).
    pub fn get_range(&self) -> TxRange {
        match self.trunk.get(&STANDBY_QUEUE_KEY) {
            Some(bytes) => decode_range(&bytes),
            None => TxRange::default(),
        }
    }

    pub fn set_range(&self, range: TxRange) {
        self.trunk.update(|batch| {
            batch.set(&STANDBY_QUEUE_KEY, &encode_range(range));
        });
    }

    pub fn len(&self) -> usize {
        self.get_range().len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.get_range().is_empty()
    }

    /// Append one serialized transaction; slot write and range update land
    /// in the same update section.
    pub fn append(&self, tx_bytes: &[u8]) {
        let mut range = self.get_range();
        self.trunk.update(|batch| {
            batch.set(&standby_key(range.end), tx_bytes);
            range.end += 1;
            batch.set(&STANDBY_QUEUE_KEY, &encode_range(range));
        });
    }

    /// Pop up to `n` transactions off the front, deleting their slots and
    /// advancing `start` atomically.
    pub fn pop(&self, n: u64) -> EngineResult<Vec<TxToRun>> {
        let mut range = self.get_range();
        let count = n.min(range.len());
        let txs = self.load(range.start, count)?;
        self.trunk.update(|batch| {
            for _ in 0..count {
                batch.delete(&standby_key(range.start));
                range.start += 1;
            }
            batch.set(&STANDBY_QUEUE_KEY, &encode_range(range));
        });
        Ok(txs)
    }

    /// Read and deserialize `count` slots starting at `start` without
    /// consuming them.
    pub fn load(&self, start: u64, count: u64) -> EngineResult<Vec<TxToRun>> {
        let mut txs = Vec::with_capacity(count as usize);
        for i in start..start + count {
            let bytes = self
                .trunk
                .get(&standby_key(i))
                .ok_or_else(|| EngineError::Store(format!("standby slot {} missing", i)))?;
            let tx = borsh::from_slice::<TxToRun>(&bytes)
                .map_err(|e| EngineError::Serialization(format!("standby slot {}: {}", i, e)))?;
            txs.push(tx);
        }
        Ok(txs)
    }
}
