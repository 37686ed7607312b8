use serde::{Deserialize, Serialize};

/// Downsample tier of a chunk.  Discriminants are single-bit flags so a tier
/// maps to a slot by bit position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChunkResolution {
    Full = 1,
    Half = 2,
    Quarter = 4,
    Eighth = 8,
}

impl ChunkResolution {
    pub const ALL: [ChunkResolution; 4] = [
        ChunkResolution::Full,
        ChunkResolution::Half,
        ChunkResolution::Quarter,
        ChunkResolution::Eighth,
    ];

    /// Bit flag value (1, 2, 4, 8).
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// log2 of the downsample factor.
    pub fn shift(self) -> u32 {
        self.bit().trailing_zeros()
    }

    /// Slot index 0..4.
    #[inline]
    pub fn index(self) -> usize {
        self.shift() as usize
    }

    /// Full-resolution pixels covered by one pixel of this tier along each axis.
    pub fn step(self) -> i32 {
        1 << self.shift()
    }

    pub fn multiplier(self) -> f64 {
        1.0 / self.step() as f64
    }

    /// Side length in pixels of a chunk at this tier.  Never below 1.
    pub fn pixel_size(self, chunk_size: u32) -> u32 {
        (chunk_size >> self.shift()).max(1)
    }

    pub fn from_index(index: usize) -> Option<ChunkResolution> {
        ChunkResolution::ALL.get(index).copied()
    }
}

/// Fixed four-slot map keyed by [`ChunkResolution`].
#[derive(Clone, Debug)]
pub struct MultiResStore<T> {
    slots: [Option<T>; 4],
}

impl<T> Default for MultiResStore<T> {
    fn default() -> Self {
        Self { slots: [None, None, None, None] }
    }
}

impl<T> MultiResStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every slot filled from `f`.
    pub fn from_fn(mut f: impl FnMut(ChunkResolution) -> T) -> Self {
        Self {
            slots: ChunkResolution::ALL.map(|res| Some(f(res))),
        }
    }

    pub fn contains(&self, res: ChunkResolution) -> bool {
        self.slots[res.index()].is_some()
    }

    pub fn get(&self, res: ChunkResolution) -> Option<&T> {
        self.slots[res.index()].as_ref()
    }

    pub fn get_mut(&mut self, res: ChunkResolution) -> Option<&mut T> {
        self.slots[res.index()].as_mut()
    }

    pub fn insert(&mut self, res: ChunkResolution, value: T) -> Option<T> {
        self.slots[res.index()].replace(value)
    }

    pub fn remove(&mut self, res: ChunkResolution) -> Option<T> {
        self.slots[res.index()].take()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChunkResolution, &T)> {
        ChunkResolution::ALL
            .into_iter()
            .zip(self.slots.iter())
            .filter_map(|(res, slot)| slot.as_ref().map(|v| (res, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ChunkResolution, &mut T)> {
        ChunkResolution::ALL
            .into_iter()
            .zip(self.slots.iter_mut())
            .filter_map(|(res, slot)| slot.as_mut().map(|v| (res, v)))
    }
}

impl<T> std::ops::Index<ChunkResolution> for MultiResStore<T> {
    type Output = T;

    /// Panics on an empty slot; use on stores built with [`MultiResStore::from_fn`].
    fn index(&self, res: ChunkResolution) -> &T {
        match self.get(res) {
            Some(v) => v,
            None => panic!("MultiResStore: no value for {:?}", res),
        }
    }
}

impl<T> std::ops::IndexMut<ChunkResolution> for MultiResStore<T> {
    fn index_mut(&mut self, res: ChunkResolution) -> &mut T {
        match self.get_mut(res) {
            Some(v) => v,
            None => panic!("MultiResStore: no value for {:?}", res),
        }
    }
}
