//! Concurrent string interning. Every relation cell that holds a string
//! value holds a [`SymbolId`] instead — an index into this table — so that
//! tuple comparisons, hashing, and storage stay fixed-width 32-bit integers
//! regardless of string length.
//!
//! # Architecture
//!
//! ```text
//! SymbolTable
//!   |-- DashMap<Arc<str>, i32>        (forward: string -> id)
//!   `-- RwLock<Vec<Arc<str>>>         (reverse: id -> string, index 0 unused)
//! ```
//!
//! Id `0` is never allocated to a real string, so a `SymbolId(0)` can
//! double as an explicit "absent" sentinel anywhere a cell is optional.
//!
//! # Example
//!
//! ```
//! use ram_datalog::symbol::SymbolTable;
//!
//! let table = SymbolTable::new();
//! let a = table.intern("alice");
//! let b = table.intern("bob");
//! assert_eq!(table.intern("alice"), a);
//! assert_ne!(a, b);
//! assert_eq!(table.resolve(a).as_deref(), Some("alice"));
//! ```

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// A 32-bit handle to an interned string. `0` is reserved and never
/// returned by [`SymbolTable::intern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub i32);

impl SymbolId {
    pub const NULL: SymbolId = SymbolId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Thread-safe string interning table.
#[derive(Debug, Default)]
pub struct SymbolTable {
    forward: DashMap<Arc<str>, i32>,
    reverse: RwLock<Vec<Arc<str>>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        // index 0 is the null sentinel and is never resolved to a string.
        SymbolTable {
            forward: DashMap::new(),
            reverse: RwLock::new(vec![Arc::from("")]),
        }
    }

    /// Interns `s`, returning its existing id or allocating a fresh one.
    pub fn intern(&self, s: &str) -> SymbolId {
        if let Some(id) = self.forward.get(s) {
            return SymbolId(*id);
        }
        // Re-check under the reverse-map write lock to avoid a duplicate
        // allocation if two callers race past the read above.
        let mut reverse = self.reverse.write();
        if let Some(id) = self.forward.get(s) {
            return SymbolId(*id);
        }
        let interned: Arc<str> = Arc::from(s);
        let id = i32::try_from(reverse.len()).expect("symbol table overflowed i32 id space");
        reverse.push(interned.clone());
        self.forward.insert(interned, id);
        SymbolId(id)
    }

    /// Resolves a previously-interned id back to its string, or `None` if
    /// the id is null or out of range.
    pub fn resolve(&self, id: SymbolId) -> Option<Arc<str>> {
        if id.is_null() {
            return None;
        }
        let reverse = self.reverse.read();
        reverse.get(id.0 as usize).cloned()
    }

    /// Returns the id of `s` if it has already been interned, without
    /// allocating a new one.
    pub fn lookup(&self, s: &str) -> Option<SymbolId> {
        self.forward.get(s).map(|id| SymbolId(*id))
    }

    /// Interns every string in `list`, in order, returning their ids.
    /// Equivalent to mapping [`SymbolTable::intern`] over the slice, but
    /// named separately per `spec.md` 4.A's `insert_batch` operation (a
    /// host seeding the table with a program's constant pool calls this
    /// once rather than looping over `intern`).
    pub fn insert_batch(&self, list: &[&str]) -> Vec<SymbolId> {
        list.iter().map(|s| self.intern(s)).collect()
    }

    pub fn len(&self) -> usize {
        self.reverse.read().len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
