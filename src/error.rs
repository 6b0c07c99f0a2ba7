//! Engine error types.
//!
//! Three tiers, matching the error-handling design: [`EngineError::Integrity`]
//! marks a translator/interpreter bug (malformed RAM, an out-of-range level
//! reference) and should abort the run; [`EngineError::UserRuntime`] covers
//! conditions a well-typed-but-misbehaving program can trigger at runtime
//! (a regex that fails to compile, a STORE against a provider that refuses
//! it) and is logged via [`crate::diagnostics::DiagnosticSink`] rather than
//! unwound, treating the triggering condition as false or its aggregate as
//! empty and continuing;
//! [`EngineError::External`] wraps failures from an I/O collaborator
//! ([`crate::io::IoProvider`]) and is propagated to the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The RAM tree or its environment is internally inconsistent — a bug
    /// in the translator or the caller, not in the evaluated program.
    #[error("internal error: {0}")]
    Integrity(String),

    /// A condition or operation failed in a way the program's own logic
    /// triggered; per the error-handling design this is logged and treated
    /// as false/empty rather than aborting the run.
    #[error("runtime error: {0}")]
    UserRuntime(String),

    /// An I/O collaborator (LOAD/STORE backing store) failed.
    #[error("external error: {0}")]
    External(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
