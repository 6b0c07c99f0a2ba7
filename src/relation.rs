//! The indexed relation store: an append-only multiset of fixed-arity
//! tuples with lazily-created ordered indices over column-prefix sort
//! orders.
//!
//! # Architecture
//!
//! ```text
//! Relation
//!   |-- RwLock<Vec<Tuple>>                 (block log: append-only)
//!   |-- RwLock<HashMap<SortOrder, RwLock<Index>>>
//!   |       `-- Index: BTreeSet<IndexKey>  (offsets into the block log)
//!   `-- Mutex<()>                          (serializes inserts)
//! ```
//!
//! Every index stores a total order over all columns (the column order
//! varies; the *set* of columns never shrinks), so a single index can both
//! answer a prefix-bound range query and, read in full, enumerate every
//! tuple. This mirrors Soufflé's `RamIndexOrder`: indices are always
//! complete permutations, and a search's *mask* (the bound-column set) need
//! only be a prefix of one index's order to be servable by it.
//!
//! A `BTreeSet` over tuple offsets (rather than raw tuple pointers) keeps
//! the whole module free of `unsafe`: ownership of tuple data stays with
//! the append-only log, and indices only ever hold `usize` handles into it.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

/// An owned, fixed-arity integer tuple with a cached hash.
#[derive(Debug, Clone)]
pub struct Tuple {
    values: Vec<i32>,
    hash: u64,
}

impl Tuple {
    pub fn new(values: Vec<i32>) -> Self {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        values.hash(&mut hasher);
        let hash = hasher.finish();
        Tuple { values, hash }
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.values
    }

    pub fn get(&self, column: usize) -> i32 {
        self.values[column]
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.values == other.values
    }
}
impl Eq for Tuple {}

impl Hash for Tuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

/// A permutation of `0..arity` describing the column order a particular
/// index is sorted by. Always covers every column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortOrder(pub Vec<usize>);

impl SortOrder {
    pub fn identity(arity: usize) -> Self {
        SortOrder((0..arity).collect())
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// True iff `mask`'s bound columns form a prefix of this order — the
    /// condition under which this index can serve a search restricted to
    /// exactly those columns.
    pub fn is_compatible_with(&self, mask: &SearchMask) -> bool {
        let k = mask.columns.len();
        if self.0.len() < k {
            return false;
        }
        let prefix: std::collections::BTreeSet<usize> = self.0[..k].iter().copied().collect();
        prefix == mask.columns
    }

    fn project(&self, tuple: &[i32]) -> Vec<i32> {
        self.0.iter().map(|&c| tuple[c]).collect()
    }
}

/// The set of columns a search binds before scanning a relation; used to
/// pick a compatible index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchMask {
    pub columns: std::collections::BTreeSet<usize>,
}

impl SearchMask {
    pub fn new(columns: impl IntoIterator<Item = usize>) -> Self {
        SearchMask {
            columns: columns.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IndexKey(Vec<i32>, usize);

#[derive(Debug)]
struct Index {
    order: SortOrder,
    entries: BTreeSet<IndexKey>,
}

impl Index {
    fn new(order: SortOrder) -> Self {
        Index {
            order,
            entries: BTreeSet::new(),
        }
    }

    fn insert(&mut self, offset: usize, tuple: &[i32]) {
        self.entries.insert(IndexKey(self.order.project(tuple), offset));
    }

    /// `pattern[c] = Some(v)` binds column `c` to `v`; `None` leaves it
    /// free. Bound columns must form a prefix of `self.order` (the caller
    /// is expected to have selected a compatible index via
    /// [`SortOrder::is_compatible_with`]).
    fn equal_range(&self, pattern: &[Option<i32>]) -> Vec<usize> {
        let mut lower = Vec::with_capacity(self.order.arity());
        let mut upper = Vec::with_capacity(self.order.arity());
        let mut bound = 0;
        for &col in &self.order.0 {
            match pattern[col] {
                Some(v) => {
                    lower.push(v);
                    upper.push(v);
                    bound += 1;
                }
                None => break,
            }
        }
        for _ in bound..self.order.arity() {
            lower.push(i32::MIN);
            upper.push(i32::MAX);
        }
        let lower_key = IndexKey(lower, usize::MIN);
        let upper_key = IndexKey(upper, usize::MAX);
        self.entries
            .range(lower_key..=upper_key)
            .map(|k| k.1)
            .collect()
    }
}

/// An append-only, multiply-indexed relation. Cloning a `Relation` handle
/// is not supported; callers share it behind an `Arc` (see
/// [`crate::catalog`]).
#[derive(Debug)]
pub struct Relation {
    name: String,
    arity: usize,
    log: RwLock<Vec<Tuple>>,
    indices: RwLock<HashMap<SortOrder, RwLock<Index>>>,
    insert_lock: Mutex<()>,
}

impl Relation {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        let total = SortOrder::identity(arity);
        let mut indices = HashMap::new();
        indices.insert(total, RwLock::new(Index::new(SortOrder::identity(arity))));
        Relation {
            name: name.into(),
            arity,
            log: RwLock::new(Vec::new()),
            indices: RwLock::new(indices),
            insert_lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn len(&self) -> usize {
        self.log.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ensures an index with the given sort order exists, building it from
    /// the current log contents if it does not. Called by the auto-indexer
    /// once per relation per realized chain, and by the translator for any
    /// order the generated plan additionally requires.
    pub fn ensure_index(&self, order: SortOrder) {
        debug_assert_eq!(order.arity(), self.arity);
        {
            let indices = self.indices.read();
            if indices.contains_key(&order) {
                return;
            }
        }
        let _guard = self.insert_lock.lock();
        let mut indices = self.indices.write();
        if indices.contains_key(&order) {
            return;
        }
        let mut index = Index::new(order.clone());
        let log = self.log.read();
        for (offset, tuple) in log.iter().enumerate() {
            index.insert(offset, tuple.as_slice());
        }
        drop(log);
        indices.insert(order, RwLock::new(index));
    }

    fn total_order(&self) -> SortOrder {
        SortOrder::identity(self.arity)
    }

    pub fn contains(&self, values: &[i32]) -> bool {
        debug_assert_eq!(values.len(), self.arity);
        let indices = self.indices.read();
        let total = indices
            .get(&self.total_order())
            .expect("total index always present");
        let index = total.read();
        let pattern: Vec<Option<i32>> = values.iter().map(|&v| Some(v)).collect();
        !index.equal_range(&pattern).is_empty()
    }

    /// Inserts `tuple`, returning `true` if it was newly added (not
    /// already present). A single `Mutex` serializes the membership check
    /// and the subsequent append/index-update so inserts cannot race each
    /// other; concurrent readers proceed unimpeded since the log only ever
    /// grows and existing offsets never move.
    pub fn insert(&self, values: Vec<i32>) -> bool {
        debug_assert_eq!(values.len(), self.arity);
        let _guard = self.insert_lock.lock();
        if self.contains(&values) {
            return false;
        }
        let tuple = Tuple::new(values);
        let offset = {
            let mut log = self.log.write();
            log.push(tuple.clone());
            log.len() - 1
        };
        let indices = self.indices.read();
        for index_lock in indices.values() {
            index_lock.write().insert(offset, tuple.as_slice());
        }
        true
    }

    /// Returns the offsets of tuples matching `pattern`. Follows 4.C's
    /// index-selection algorithm: reuse an existing index whose order has
    /// `pattern`'s bound columns as a prefix; otherwise build one on demand
    /// (the bound columns ascending, followed by the remaining columns
    /// ascending) and use that.
    pub fn equal_range(&self, pattern: &[Option<i32>]) -> Vec<usize> {
        debug_assert_eq!(pattern.len(), self.arity);
        let mask = SearchMask::new(
            pattern
                .iter()
                .enumerate()
                .filter_map(|(c, v)| v.is_some().then_some(c)),
        );
        if mask.is_empty() {
            let indices = self.indices.read();
            let total = indices
                .get(&self.total_order())
                .expect("total index always present");
            return total.read().equal_range(pattern);
        }
        {
            let indices = self.indices.read();
            if let Some(index) = indices.iter().find(|(order, _)| order.is_compatible_with(&mask)) {
                return index.1.read().equal_range(pattern);
            }
        }
        let mut columns: Vec<usize> = mask.columns.iter().copied().collect();
        for col in 0..self.arity {
            if !mask.columns.contains(&col) {
                columns.push(col);
            }
        }
        let order = SortOrder(columns);
        self.ensure_index(order.clone());
        let indices = self.indices.read();
        indices
            .get(&order)
            .expect("index just created by ensure_index")
            .read()
            .equal_range(pattern)
    }

    pub fn tuple_at(&self, offset: usize) -> Tuple {
        self.log.read()[offset].clone()
    }

    pub fn all_rows(&self) -> Vec<Tuple> {
        self.log.read().clone()
    }

    pub fn clear(&self) {
        let _guard = self.insert_lock.lock();
        self.log.write().clear();
        let indices = self.indices.read();
        for index_lock in indices.values() {
            index_lock.write().entries.clear();
        }
    }

    /// Merges every tuple of `other` into `self`, skipping duplicates.
    /// Returns the number of tuples newly inserted.
    pub fn merge_from(&self, other: &Relation) -> usize {
        debug_assert_eq!(self.arity, other.arity);
        let mut inserted = 0;
        for tuple in other.all_rows() {
            if self.insert(tuple.as_slice().to_vec()) {
                inserted += 1;
            }
        }
        inserted
    }

    /// The set of sort orders currently realized as indices.
    pub fn index_orders(&self) -> Vec<SortOrder> {
        self.indices.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates_identical_tuples() {
        let rel = Relation::new("edge", 2);
        assert!(rel.insert(vec![1, 2]));
        assert!(!rel.insert(vec![1, 2]));
        assert_eq!(rel.len(), 1);
    }

    #[test]
    fn contains_reflects_inserted_tuples() {
        let rel = Relation::new("edge", 2);
        rel.insert(vec![1, 2]);
        assert!(rel.contains(&[1, 2]));
        assert!(!rel.contains(&[2, 1]));
    }

    #[test]
    fn equal_range_on_total_index_finds_prefix_matches() {
        let rel = Relation::new("edge", 2);
        rel.insert(vec![1, 2]);
        rel.insert(vec![1, 3]);
        rel.insert(vec![2, 4]);
        let matches = rel.equal_range(&[Some(1), None]);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn ensure_index_backfills_existing_tuples() {
        let rel = Relation::new("edge", 2);
        rel.insert(vec![1, 2]);
        rel.insert(vec![2, 1]);
        rel.ensure_index(SortOrder(vec![1, 0]));
        let matches = rel.equal_range(&[None, Some(1)]);
        assert_eq!(matches.len(), 1);
        assert_eq!(rel.tuple_at(matches[0]).as_slice(), &[2, 1]);
    }

    #[test]
    fn merge_from_skips_duplicates_and_reports_new_count() {
        let a = Relation::new("a", 1);
        let b = Relation::new("b", 1);
        a.insert(vec![1]);
        b.insert(vec![1]);
        b.insert(vec![2]);
        let added = a.merge_from(&b);
        assert_eq!(added, 1);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn sort_order_compatibility_requires_prefix_match_as_a_set() {
        let order = SortOrder(vec![0, 2, 1]);
        assert!(order.is_compatible_with(&SearchMask::new([0])));
        assert!(order.is_compatible_with(&SearchMask::new([0, 2])));
        assert!(!order.is_compatible_with(&SearchMask::new([1])));
        assert!(!order.is_compatible_with(&SearchMask::new([0, 1])));
    }

    #[test]
    fn clear_empties_log_and_indices() {
        let rel = Relation::new("edge", 2);
        rel.insert(vec![1, 2]);
        rel.clear();
        assert!(rel.is_empty());
        assert!(!rel.contains(&[1, 2]));
    }
}
