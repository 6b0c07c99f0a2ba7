//! Relation environment: the runtime catalog mapping relation names to
//! their descriptor and backing storage, and to the `full`/`delta`/`new`
//! triples a semi-naive loop needs for each recursive relation.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use datalog_ast::{ColumnKind, RelationDecl, StructuralKind};
use parking_lot::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::record::RecordStore;
use crate::relation::Relation;
use crate::symbol::SymbolTable;

/// Suffix convention for a recursive relation's `delta` shadow storage: the
/// tuples newly derived in the previous semi-naive round.
pub const DELTA_SUFFIX: &str = "#delta";
/// Suffix convention for a recursive relation's `new` shadow storage: the
/// tuples being derived in the current semi-naive round.
pub const NEW_SUFFIX: &str = "#new";

/// A relation's runtime descriptor: arity, column types, and role, carried
/// over from its [`datalog_ast::RelationDecl`].
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    pub name: String,
    pub arity: usize,
    pub column_kinds: Vec<ColumnKind>,
    pub attribute_names: Vec<String>,
    pub input: bool,
    pub output: bool,
    pub computed: bool,
    pub temporary: bool,
    pub structural_kind: StructuralKind,
}

impl From<&RelationDecl> for RelationDescriptor {
    fn from(decl: &RelationDecl) -> Self {
        RelationDescriptor {
            name: decl.name.clone(),
            arity: decl.arity(),
            column_kinds: decl.column_kinds.clone(),
            attribute_names: decl.attribute_names.clone(),
            input: decl.input,
            output: decl.output,
            computed: decl.computed,
            temporary: decl.temporary,
            structural_kind: decl.structural_kind,
        }
    }
}

/// The `full`/`delta`/`new` triple a recursive relation needs during
/// semi-naive evaluation: `full` accumulates every derived tuple across
/// rounds, `delta` holds the tuples discovered in the previous round (the
/// only ones a recursive rule body needs to re-join against), and `new`
/// accumulates the current round's freshly derived output before being
/// merged into `full` and swapped into `delta` for the next round.
#[derive(Debug, Clone)]
pub struct RelationTriple {
    pub full: Arc<Relation>,
    pub delta: Arc<Relation>,
    pub new: Arc<Relation>,
}

impl RelationTriple {
    fn swap_new_into_delta(&mut self) {
        mem::swap(&mut self.delta, &mut self.new);
    }
}

/// Runtime catalog: relation descriptors plus their backing storage, shared
/// by the translator (to resolve variable positions and relation arities)
/// and the interpreter (to resolve relation handles while walking the RAM
/// tree).
#[derive(Debug)]
pub struct Environment {
    descriptors: HashMap<String, RelationDescriptor>,
    relations: HashMap<String, Arc<Relation>>,
    triples: RwLock<HashMap<String, RelationTriple>>,
    symbols: SymbolTable,
    records: RecordStore,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            descriptors: HashMap::new(),
            relations: HashMap::new(),
            triples: RwLock::new(HashMap::new()),
            symbols: SymbolTable::new(),
            records: RecordStore::new(),
        }
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn record_store(&self) -> &RecordStore {
        &self.records
    }

    /// Registers a relation and allocates its backing storage.
    pub fn declare(&mut self, descriptor: RelationDescriptor) {
        let relation = Arc::new(Relation::new(descriptor.name.clone(), descriptor.arity));
        self.relations.insert(descriptor.name.clone(), relation);
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }

    pub fn descriptor(&self, name: &str) -> Option<&RelationDescriptor> {
        self.descriptors.get(name)
    }

    pub fn relation(&self, name: &str) -> Option<Arc<Relation>> {
        self.relations.get(name).cloned()
    }

    pub fn relation_or_err(&self, name: &str) -> EngineResult<Arc<Relation>> {
        self.relation(name)
            .ok_or_else(|| EngineError::Integrity(format!("undeclared relation '{name}'")))
    }

    /// Allocates the `delta`/`new` shadow relations for a recursive
    /// relation, used by the translator's `LOOP` lowering. Idempotent:
    /// calling this more than once for the same relation is a no-op after
    /// the first call.
    pub fn ensure_triple(&self, name: &str) -> EngineResult<()> {
        if self.triples.read().contains_key(name) {
            return Ok(());
        }
        let arity = self
            .descriptor(name)
            .ok_or_else(|| EngineError::Integrity(format!("undeclared relation '{name}'")))?
            .arity;
        let full = self.relation_or_err(name)?;
        let mut triples = self.triples.write();
        triples.entry(name.to_string()).or_insert_with(|| {
            let delta = Arc::new(Relation::new(format!("{name}#delta"), arity));
            let new = Arc::new(Relation::new(format!("{name}#new"), arity));
            RelationTriple { full, delta, new }
        });
        Ok(())
    }

    pub fn triple(&self, name: &str) -> Option<RelationTriple> {
        self.triples.read().get(name).cloned()
    }

    /// Swaps a recursive relation's `new` relation into `delta`, ready for
    /// the next semi-naive round. Called at the end of each `LOOP`
    /// iteration, after `new` has been merged into `full`.
    pub fn swap_triple(&self, name: &str) -> EngineResult<()> {
        let mut triples = self.triples.write();
        let triple = triples
            .get_mut(name)
            .ok_or_else(|| EngineError::Integrity(format!("no triple allocated for '{name}'")))?;
        triple.swap_new_into_delta();
        Ok(())
    }

    /// Resolves a storage name to its backing [`Relation`], understanding
    /// the `#delta`/`#new` shadow-relation suffixes the translator uses for
    /// semi-naive evaluation: `"path#delta"` resolves to `path`'s delta
    /// relation rather than a literally-named relation `path#delta`.
    pub fn resolve(&self, name: &str) -> EngineResult<Arc<Relation>> {
        if let Some(base) = name.strip_suffix(DELTA_SUFFIX) {
            let triple = self
                .triple(base)
                .ok_or_else(|| EngineError::Integrity(format!("no delta/new triple for '{base}'")))?;
            Ok(triple.delta)
        } else if let Some(base) = name.strip_suffix(NEW_SUFFIX) {
            let triple = self
                .triple(base)
                .ok_or_else(|| EngineError::Integrity(format!("no delta/new triple for '{base}'")))?;
            Ok(triple.new)
        } else {
            self.relation_or_err(name)
        }
    }

    pub fn all_descriptors(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.descriptors.values()
    }

    pub fn relation_names(&self) -> Vec<String> {
        self.descriptors.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_ast::ColumnKind;

    fn descriptor(name: &str, arity: usize) -> RelationDescriptor {
        RelationDescriptor {
            name: name.to_string(),
            arity,
            column_kinds: vec![ColumnKind::Number; arity],
            attribute_names: (0..arity).map(|i| format!("arg{i}")).collect(),
            input: false,
            output: false,
            computed: false,
            temporary: false,
            structural_kind: StructuralKind::default(),
        }
    }

    #[test]
    fn declared_relation_is_retrievable() {
        let mut env = Environment::new();
        env.declare(descriptor("edge", 2));
        assert!(env.relation("edge").is_some());
        assert_eq!(env.descriptor("edge").unwrap().arity, 2);
    }

    #[test]
    fn undeclared_relation_is_an_integrity_error() {
        let env = Environment::new();
        let err = env.relation_or_err("missing").unwrap_err();
        assert!(matches!(err, EngineError::Integrity(_)));
    }

    #[test]
    fn ensure_triple_is_idempotent_and_shares_full_with_base_relation() {
        let mut env = Environment::new();
        env.declare(descriptor("path", 2));
        let base = env.relation("path").unwrap();
        env.ensure_triple("path").unwrap();
        env.ensure_triple("path").unwrap();
        let triple = env.triple("path").unwrap();
        assert!(Arc::ptr_eq(&triple.full, &base));
        assert_eq!(triple.delta.arity(), 2);
        assert_eq!(triple.new.arity(), 2);
    }

    #[test]
    fn swap_triple_exchanges_delta_and_new() {
        let mut env = Environment::new();
        env.declare(descriptor("path", 2));
        env.ensure_triple("path").unwrap();
        let before = env.triple("path").unwrap();
        env.swap_triple("path").unwrap();
        let after = env.triple("path").unwrap();
        assert!(Arc::ptr_eq(&before.new, &after.delta));
        assert!(Arc::ptr_eq(&before.delta, &after.new));
    }

    #[test]
    fn swap_triple_on_unallocated_relation_is_an_integrity_error() {
        let mut env = Environment::new();
        env.declare(descriptor("path", 2));
        let err = env.swap_triple("path").unwrap_err();
        assert!(matches!(err, EngineError::Integrity(_)));
    }
}
