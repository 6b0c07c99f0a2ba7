//! Property tests for the two interning stores: [`SymbolTable`] (strings to
//! 32-bit ids) and [`RecordStore`] (fixed-arity integer tuples to 32-bit
//! ids). Both are expected to round-trip exactly and to be deterministic
//! under repeated interning of the same key.

use proptest::prelude::*;
use ram_datalog::record::RecordStore;
use ram_datalog::symbol::SymbolTable;

proptest! {
    #[test]
    fn interned_strings_resolve_back_to_themselves(strings in proptest::collection::vec(".*", 0..32)) {
        let table = SymbolTable::new();
        let ids: Vec<_> = strings.iter().map(|s| table.intern(s)).collect();
        for (s, id) in strings.iter().zip(ids.iter()) {
            prop_assert_eq!(table.resolve(*id), Some(s.clone()));
        }
    }

    #[test]
    fn interning_the_same_string_twice_returns_the_same_id(a in ".*", b in ".*") {
        let table = SymbolTable::new();
        let first = table.intern(&a);
        let second = table.intern(&a);
        prop_assert_eq!(first, second);

        let other = table.intern(&b);
        if a == b {
            prop_assert_eq!(first, other);
        } else {
            prop_assert_ne!(first, other);
        }
    }

    #[test]
    fn packed_tuples_unpack_to_exactly_the_fields_they_were_packed_with(
        tuples in proptest::collection::vec(proptest::collection::vec(any::<i32>(), 3), 0..32)
    ) {
        let store = RecordStore::new();
        let ids: Vec<_> = tuples.iter().map(|t| store.pack(t)).collect();
        for (t, id) in tuples.iter().zip(ids.iter()) {
            prop_assert_eq!(store.unpack(3, *id), Some(t.clone()));
        }
    }

    #[test]
    fn packed_ids_agree_iff_the_source_tuples_are_equal(a in proptest::collection::vec(any::<i32>(), 2), b in proptest::collection::vec(any::<i32>(), 2)) {
        let store = RecordStore::new();
        let id_a = store.pack(&a);
        let id_b = store.pack(&b);
        prop_assert_eq!(id_a == id_b, a == b);
    }
}

#[test]
fn the_null_symbol_id_never_aliases_an_interned_string() {
    let table = SymbolTable::new();
    let id = table.intern("anything");
    assert!(!id.is_null());
}

#[test]
fn looking_up_an_uninterned_string_does_not_intern_it() {
    let table = SymbolTable::new();
    assert_eq!(table.lookup("missing"), None);
    assert_eq!(table.len(), 0);
}
