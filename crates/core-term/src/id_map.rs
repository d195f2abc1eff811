//! Two-way map between small integer ids and deduplicated values.
//!
//! Reference counting is explicit: every `use_id` must be balanced by a
//! `drop_id`. Keeping the counts external to the cells is what lets a cell
//! stay a bundle of small integers.

use std::collections::HashMap;
use std::hash::Hash;

/// Values stored in an [`IdMap`] nominate the key they deduplicate on.
pub trait IdMapValue: Clone {
    type Key: Eq + Hash + Clone;

    fn id_map_key(&self) -> Self::Key;
}

const MAX_ID: u16 = u16::MAX;
const BITSET_WORDS: usize = (MAX_ID as usize).div_ceil(64);

struct RefCounted<T> {
    value: T,
    ref_count: u32,
}

/// Id 0 is reserved to mean "default"/"none" and is never allocated.
pub struct IdMap<T: IdMapValue> {
    entries: HashMap<u16, RefCounted<T>>,
    lookup: HashMap<T::Key, u16>,
    // Bit i set means id i+1 is in use.
    used: Vec<u64>,
}

impl<T: IdMapValue> Default for IdMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IdMapValue> IdMap<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            lookup: HashMap::new(),
            used: vec![0; BITSET_WORDS],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the value for an allocated id.
    pub fn lookup_id(&self, id: u16) -> Option<&T> {
        self.entries.get(&id).map(|entry| &entry.value)
    }

    /// Reference count of an id, for invariant checking.
    pub fn ref_count(&self, id: u16) -> u32 {
        self.entries.get(&id).map(|entry| entry.ref_count).unwrap_or(0)
    }

    /// Find the id already allocated for a value, if any.
    pub fn lookup_key(&self, key: &T::Key) -> Option<u16> {
        self.lookup.get(key).copied()
    }

    /// Allocate a fresh id for a value with an initial reference count of
    /// one. Returns `None` when every id is live.
    pub fn allocate(&mut self, value: T) -> Option<u16> {
        let id = self.allocate_id()?;
        let key = value.id_map_key();
        debug_assert!(!self.lookup.contains_key(&key));
        self.lookup.insert(key, id);
        self.entries.insert(
            id,
            RefCounted {
                value,
                ref_count: 1,
            },
        );
        Some(id)
    }

    /// Mark an id as permanently unavailable for allocation, for callers
    /// that give certain ids an implicit meaning.
    pub fn reserve(&mut self, id: u16) {
        debug_assert!(id != 0 && !self.entries.contains_key(&id));
        let bit = (id - 1) as usize;
        self.used[bit / 64] |= 1u64 << (bit % 64);
    }

    /// Increment the reference count of a live id.
    pub fn use_id(&mut self, id: u16) -> u16 {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.ref_count += 1;
        } else {
            debug_assert!(false, "use_id on unallocated id {id}");
        }
        id
    }

    /// Decrement the reference count, freeing the id when it reaches zero.
    pub fn drop_id(&mut self, id: u16) {
        let Some(entry) = self.entries.get_mut(&id) else {
            debug_assert!(false, "drop_id on unallocated id {id}");
            return;
        };
        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            let entry = self.entries.remove(&id).unwrap();
            self.lookup.remove(&entry.value.id_map_key());
            let bit = (id - 1) as usize;
            self.used[bit / 64] &= !(1u64 << (bit % 64));
        }
    }

    fn allocate_id(&mut self) -> Option<u16> {
        for (word_index, word) in self.used.iter_mut().enumerate() {
            if *word != u64::MAX {
                let bit = word.trailing_ones() as usize;
                let id = word_index * 64 + bit + 1;
                if id > MAX_ID as usize {
                    return None;
                }
                *word |= 1u64 << bit;
                return Some(id as u16);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Value(u32);

    impl IdMapValue for Value {
        type Key = Value;

        fn id_map_key(&self) -> Value {
            self.clone()
        }
    }

    #[test]
    fn allocate_lookup_drop() {
        let mut map = IdMap::new();
        let id = map.allocate(Value(7)).unwrap();
        assert_eq!(id, 1);
        assert_eq!(map.lookup_id(id), Some(&Value(7)));
        assert_eq!(map.lookup_key(&Value(7)), Some(id));

        map.drop_id(id);
        assert_eq!(map.lookup_id(id), None);
        assert_eq!(map.lookup_key(&Value(7)), None);
        assert!(map.is_empty());
    }

    #[test]
    fn ref_counting_frees_on_zero() {
        let mut map = IdMap::new();
        let id = map.allocate(Value(1)).unwrap();
        map.use_id(id);
        map.drop_id(id);
        assert_eq!(map.lookup_id(id), Some(&Value(1)));
        map.drop_id(id);
        assert_eq!(map.lookup_id(id), None);
    }

    #[test]
    fn freed_ids_are_reused() {
        let mut map = IdMap::new();
        let a = map.allocate(Value(1)).unwrap();
        let b = map.allocate(Value(2)).unwrap();
        assert_eq!((a, b), (1, 2));
        map.drop_id(a);
        assert_eq!(map.allocate(Value(3)), Some(1));
    }

    #[test]
    fn zero_is_never_allocated() {
        let mut map = IdMap::new();
        for i in 0..100 {
            let id = map.allocate(Value(i)).unwrap();
            assert_ne!(id, 0);
        }
    }
}
