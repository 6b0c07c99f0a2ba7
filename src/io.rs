//! The I/O interface `LOAD`/`STORE` statements consume. Concrete readers
//! and writers (CSV, a database driver, a network source) are an external
//! collaborator this crate does not implement; it defines the trait
//! boundary and ships only [`NullIoProvider`], which refuses every request.

use std::io::{Read, Write};

use crate::error::{EngineError, EngineResult};

/// Supplies readers/writers for named relations, keyed by an
/// implementation-defined directive string (e.g. a file path or a table
/// name) carried on the `LOAD`/`STORE` statement.
pub trait IoProvider: Send + Sync {
    fn reader(&self, relation: &str) -> EngineResult<Box<dyn Read>>;
    fn writer(&self, relation: &str) -> EngineResult<Box<dyn Write>>;
}

/// The default provider: every `LOAD`/`STORE` against it fails with a
/// `UserRuntime` error, since no concrete I/O backend is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIoProvider;

impl IoProvider for NullIoProvider {
    fn reader(&self, relation: &str) -> EngineResult<Box<dyn Read>> {
        Err(EngineError::UserRuntime(format!(
            "no I/O provider configured for LOAD {relation}"
        )))
    }

    fn writer(&self, relation: &str) -> EngineResult<Box<dyn Write>> {
        Err(EngineError::UserRuntime(format!(
            "no I/O provider configured for STORE {relation}"
        )))
    }
}
