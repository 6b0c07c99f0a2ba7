//! Fixed-arity tuple interning. `PACK` and record-typed columns store a
//! [`RecordId`] — an index into a per-arity table — rather than the fields
//! themselves, so that a record behaves as a single 32-bit cell everywhere
//! a relation's other columns do.
//!
//! # Architecture
//!
//! ```text
//! RecordStore
//!   `-- DashMap<usize, ArityStore>      (arity -> per-arity interning table)
//!         `-- ArityStore
//!               |-- DashMap<Vec<i32>, i32>   (forward: fields -> id)
//!               `-- RwLock<Vec<Vec<i32>>>    (reverse: id -> fields)
//! ```
//!
//! Splitting by arity keeps the forward map's key type uniform within a
//! shard and confines each critical region to records of one arity, per the
//! spec's "single critical region per arity" contract.

use dashmap::DashMap;
use parking_lot::RwLock;

/// A 32-bit handle to an interned fixed-arity tuple. `0` means "absent"
/// (e.g. a record-typed column that was never populated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub i32);

impl RecordId {
    pub const NULL: RecordId = RecordId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Default)]
struct ArityStore {
    forward: DashMap<Vec<i32>, i32>,
    reverse: RwLock<Vec<Vec<i32>>>,
}

impl ArityStore {
    fn new() -> Self {
        // index 0 is the null sentinel.
        ArityStore {
            forward: DashMap::new(),
            reverse: RwLock::new(vec![Vec::new()]),
        }
    }

    fn intern(&self, fields: &[i32]) -> RecordId {
        if let Some(id) = self.forward.get(fields) {
            return RecordId(*id);
        }
        let mut reverse = self.reverse.write();
        if let Some(id) = self.forward.get(fields) {
            return RecordId(*id);
        }
        let id = i32::try_from(reverse.len()).expect("record store overflowed i32 id space");
        reverse.push(fields.to_vec());
        self.forward.insert(fields.to_vec(), id);
        RecordId(id)
    }

    fn resolve(&self, id: RecordId) -> Option<Vec<i32>> {
        if id.is_null() {
            return None;
        }
        self.reverse.read().get(id.0 as usize).cloned()
    }
}

/// Interns fixed-arity integer tuples into 32-bit record references,
/// deduplicating within each arity independently.
#[derive(Debug, Default)]
pub struct RecordStore {
    arities: DashMap<usize, ArityStore>,
}

impl RecordStore {
    pub fn new() -> Self {
        RecordStore::default()
    }

    /// Interns `fields`, returning its existing id within its arity's table
    /// or allocating a fresh one.
    pub fn pack(&self, fields: &[i32]) -> RecordId {
        let arity = fields.len();
        self.arities
            .entry(arity)
            .or_insert_with(ArityStore::new)
            .intern(fields)
    }

    /// Resolves a record id back to its fields, given the arity it was
    /// packed with (the id space is not shared across arities).
    pub fn unpack(&self, arity: usize, id: RecordId) -> Option<Vec<i32>> {
        self.arities.get(&arity).and_then(|store| store.resolve(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_identical_fields_returns_the_same_id() {
        let store = RecordStore::new();
        let a = store.pack(&[1, 2, 3]);
        let b = store.pack(&[1, 2, 3]);
        assert_eq!(a, b);
    }

    #[test]
    fn packing_distinct_fields_returns_distinct_ids() {
        let store = RecordStore::new();
        let a = store.pack(&[1, 2]);
        let b = store.pack(&[1, 3]);
        assert_ne!(a, b);
    }

    #[test]
    fn same_fields_in_different_arities_are_independent() {
        let store = RecordStore::new();
        let a = store.pack(&[1, 2]);
        let b = store.pack(&[1, 2, 3]);
        // ids are allocated per-arity, so equal raw ids are expected here
        // and must not be confused without the arity tag.
        assert_eq!(store.unpack(2, a), Some(vec![1, 2]));
        assert_eq!(store.unpack(3, b), Some(vec![1, 2, 3]));
    }

    #[test]
    fn unpack_of_null_is_none() {
        let store = RecordStore::new();
        assert_eq!(store.unpack(2, RecordId::NULL), None);
    }

    #[test]
    fn unpack_round_trips_through_pack() {
        let store = RecordStore::new();
        let id = store.pack(&[10, 20, 30]);
        assert_eq!(store.unpack(3, id), Some(vec![10, 20, 30]));
    }
}
