//! Fixpoint driver: the thin entry point that turns a stratified program
//! into a populated [`Environment`]. Owns no state of its own beyond what
//! it threads through to [`translator::translate`] and
//! [`Interpreter::run`]; the actual recursive evaluation of
//! `SEQUENCE`/`LOOP`/`PARALLEL` nodes lives in [`crate::interpreter`].

use datalog_ast::Program;

use crate::catalog::Environment;
use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::EngineResult;
use crate::indexer;
use crate::interpreter::{CancelToken, Interpreter, ProfileHook};
use crate::io::{IoProvider, NullIoProvider};
use crate::translator;

pub use crate::interpreter::CancelToken as DriverCancelToken;

/// Optional collaborators a host may wire into a run beyond the defaults
/// (a [`NullIoProvider`] and a [`TracingSink`]).
#[derive(Default)]
pub struct RunOptions<'a> {
    pub io: Option<&'a dyn IoProvider>,
    pub diagnostics: Option<&'a dyn DiagnosticSink>,
    pub profile_hook: Option<&'a dyn ProfileHook>,
    pub cancel_token: Option<&'a CancelToken>,
}

/// Translates `program` to RAM and evaluates it to a fixpoint, using
/// `config` for worker-pool sizing. Returns the populated [`Environment`]
/// so a caller can read back output relations.
pub fn run(program: &Program, config: &EngineConfig) -> EngineResult<Environment> {
    run_with_options(program, config, RunOptions::default())
}

/// As [`run`], but lets a host supply an I/O provider, diagnostic sink,
/// profile hook, and/or cancellation token.
pub fn run_with_options(
    program: &Program,
    config: &EngineConfig,
    options: RunOptions<'_>,
) -> EngineResult<Environment> {
    let mut env = Environment::new();
    let statement = translator::translate(program, &mut env)?;
    indexer::precompute_indices(&statement, &env)?;

    let null_io = NullIoProvider;
    let tracing_sink = TracingSink;

    let mut interpreter = Interpreter::new(&env)
        .with_io(options.io.unwrap_or(&null_io))
        .with_diagnostics(options.diagnostics.unwrap_or(&tracing_sink))
        .with_worker_threads(config.worker_threads());
    if let Some(hook) = options.profile_hook {
        interpreter = interpreter.with_profile_hook(hook);
    }
    if let Some(token) = options.cancel_token {
        interpreter = interpreter.with_cancel_token(token);
    }

    interpreter.run(&statement)?;
    Ok(env)
}
