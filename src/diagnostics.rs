//! The append-only diagnostic channel auto-index reports, debug traces, and
//! `UserRuntime` errors are written to. Backed by `tracing`, the same
//! logging crate the rest of the engine's ambient stack uses, so a host can
//! route engine diagnostics through whatever subscriber it already has
//! configured (file, JSON, stderr).

use tracing::{debug, warn};

/// Severity of a single diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// A non-fatal runtime condition (division by zero, a regex compile
    /// failure) that gets logged and treated as a saturated/empty result
    /// rather than propagated.
    Warning,
    /// Auto-index selection reports, timing traces, and other informational
    /// output useful when tuning a program but not indicative of a problem.
    Debug,
}

/// Sink for engine diagnostics. The default implementation forwards to
/// `tracing`; a host embedding the engine can implement this trait itself
/// to capture diagnostics in-process (e.g. for a REPL's `--debug` flag).
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, level: DiagnosticLevel, message: &str);
}

/// Forwards every diagnostic to the `tracing` subscriber currently
/// installed by the embedding host.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, level: DiagnosticLevel, message: &str) {
        match level {
            DiagnosticLevel::Warning => warn!(target: "ram_datalog::diagnostics", "{message}"),
            DiagnosticLevel::Debug => debug!(target: "ram_datalog::diagnostics", "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<(DiagnosticLevel, String)>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn emit(&self, level: DiagnosticLevel, message: &str) {
            self.messages.lock().unwrap().push((level, message.to_string()));
        }
    }

    #[test]
    fn custom_sink_records_emitted_diagnostics() {
        let sink = RecordingSink::default();
        sink.emit(DiagnosticLevel::Warning, "division by zero saturated to 0");
        let recorded = sink.messages.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, DiagnosticLevel::Warning);
    }
}
