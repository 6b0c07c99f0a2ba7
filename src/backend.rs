//! Compiled-backend interface.
//!
//! The interpreter in [`crate::interpreter`] is one way to run a RAM
//! [`Statement`] tree; a host may instead want to hand the tree to a
//! program that emits a self-contained source file whose observable
//! behaviour on `run` matches the interpreter's (e.g. a generated Rust
//! module compiled ahead of time). This module defines the seam a such a
//! back end plugs into and a small registry for naming/retrieving
//! back ends, without implementing one itself — code generation is the
//! named-out external collaborator.
//!
//! ## Registration
//!
//! ```ignore
//! let mut registry = ProgramRegistry::new();
//! registry.register("interpreter", Box::new(InterpreterProgramFactory));
//! registry.run_all(&program, &config)?;
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use datalog_ast::Program;

use crate::config::EngineConfig;
use crate::driver;
use crate::error::EngineResult;

/// A named backend: given a program and its translator-produced statement,
/// produces a runnable artifact and evaluates it.
///
/// Implementations may interpret the statement directly (as
/// [`InterpreterProgramFactory`] does) or compile it ahead of time into a
/// self-contained source file and invoke that instead; either is expected
/// to produce the same observable tuples in every output relation.
pub trait ProgramFactory: Send + Sync {
    /// A short identifier used in diagnostics (e.g. the generated file's
    /// module name).
    fn target_name(&self) -> &str;

    /// Runs `program` to a fixpoint, returning the populated environment.
    fn run(&self, program: &Program, config: &EngineConfig) -> EngineResult<crate::catalog::Environment>;
}

/// The default, always-registered factory: runs the program through
/// [`crate::interpreter::Interpreter`] directly, with no intermediate
/// source generation step.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpreterProgramFactory;

impl ProgramFactory for InterpreterProgramFactory {
    fn target_name(&self) -> &str {
        "interpreter"
    }

    fn run(&self, program: &Program, config: &EngineConfig) -> EngineResult<crate::catalog::Environment> {
        driver::run(program, config)
    }
}

/// Registry of named [`ProgramFactory`] back ends. Concurrent-read-safe via
/// [`DashMap`], matching the symbol table and record store's sharding
/// strategy for shared, rarely-mutated lookup tables.
pub struct ProgramRegistry {
    factories: DashMap<String, Arc<dyn ProgramFactory>>,
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        ProgramRegistry::new()
    }
}

impl ProgramRegistry {
    /// A registry seeded with [`InterpreterProgramFactory`] under the name
    /// `"interpreter"`.
    pub fn new() -> Self {
        let registry = ProgramRegistry {
            factories: DashMap::new(),
        };
        registry.register("interpreter", Arc::new(InterpreterProgramFactory));
        registry
    }

    pub fn register(&self, name: impl Into<String>, factory: Arc<dyn ProgramFactory>) {
        self.factories.insert(name.into(), factory);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProgramFactory>> {
        self.factories.get(name).map(|entry| entry.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Runs `program` through every registered back end, returning each
    /// back end's populated environment alongside its name. A caller
    /// comparing back ends for equivalence can diff the returned
    /// environments' relations directly.
    pub fn run_all(
        &self,
        program: &Program,
        config: &EngineConfig,
    ) -> EngineResult<Vec<(String, crate::catalog::Environment)>> {
        self.factories
            .iter()
            .map(|entry| {
                let env = entry.value().run(program, config)?;
                Ok((entry.key().clone(), env))
            })
            .collect()
    }

    /// Prints every registered back end's output relations to stdout,
    /// prefixed with the back end's name — a debugging aid, not a stable
    /// wire format.
    pub fn print_all(&self, program: &Program, config: &EngineConfig) -> EngineResult<()> {
        for (name, env) in self.run_all(program, config)? {
            for relation in env.relation_names() {
                if let Some(rel) = env.relation(&relation) {
                    println!("[{name}] {relation}: {} tuples", rel.len());
                }
            }
        }
        Ok(())
    }

    /// Dumps the tuples of every `input`-flagged relation for a single
    /// back end, prefixed with its name.
    pub fn dump_inputs(&self, name: &str, env: &crate::catalog::Environment) {
        self.dump_by_role(name, env, true);
    }

    /// Dumps the tuples of every `output`-flagged relation for a single
    /// back end, prefixed with its name.
    pub fn dump_outputs(&self, name: &str, env: &crate::catalog::Environment) {
        self.dump_by_role(name, env, false);
    }

    fn dump_by_role(&self, name: &str, env: &crate::catalog::Environment, inputs: bool) {
        for descriptor in env.all_descriptors() {
            let selected = if inputs { descriptor.input } else { descriptor.output };
            if !selected {
                continue;
            }
            if let Some(rel) = env.relation(&descriptor.name) {
                for tuple in rel.all_rows() {
                    println!("[{name}] {}: {:?}", descriptor.name, tuple.as_slice());
                }
            }
        }
    }
}
