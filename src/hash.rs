//! Byte-content hashing and the open-addressing table used for vertex deduplication

use crate::INVALID_INDEX;

/// Word-at-a-time MurmurHash2 over raw bytes.
///
/// Trailing bytes that don't fill a whole 4-byte word are ignored; vertex records are expected to be 4-byte aligned.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u32 {
    const M: u32 = 0x5bd1e995;
    const R: u32 = 24;

    let mut h: u32 = 0;

    for k4 in bytes.chunks_exact(4) {
        let mut k = u32::from_ne_bytes([k4[0], k4[1], k4[2], k4[3]]);

        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h = h.wrapping_mul(M);
        h ^= k;
    }

    h
}

/// Open-addressing table storing vertex indices, keyed by the content those indices refer to.
///
/// The table never owns keys; equality is decided by the caller through the `eq` callback of [HashTable::find_or_insert].
pub(crate) struct HashTable {
    slots: Vec<u32>,
}

impl HashTable {
    /// Creates a table for up to `count` entries, with a power of two bucket count of at least `1.25 * count` (rounded up).
    pub fn with_capacity(count: usize) -> Self {
        let mut buckets = 1;

        while buckets < count + count.div_ceil(4) {
            buckets *= 2;
        }

        Self {
            slots: vec![INVALID_INDEX; buckets],
        }
    }

    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.slots.len()
    }

    /// Looks up an entry equal to `key`; inserts `key` if there is none.
    ///
    /// Returns the stored index of the equal entry, or `None` if `key` was inserted.
    pub fn find_or_insert<E>(&mut self, key: u32, hash: u32, eq: E) -> Option<u32>
    where
        E: Fn(u32) -> bool,
    {
        assert!(key != INVALID_INDEX);

        let buckets = self.slots.len();
        let hashmod = buckets - 1;
        let mut bucket = hash as usize & hashmod;

        for _ in 0..buckets {
            let item = self.slots[bucket];

            if item == INVALID_INDEX {
                self.slots[bucket] = key;
                return None;
            }

            if eq(item) {
                return Some(item);
            }

            // try the next bucket
            bucket = (bucket + 1) & hashmod;
        }

        unreachable!("hash table is full")
    }
}
