//! Walks a [`datalog_ir::Statement`] tree against an [`Environment`],
//! evaluating [`datalog_ir::Value`]/[`datalog_ir::Condition`] expressions
//! and driving the nested [`datalog_ir::Operation`] search tree that backs
//! each `INSERT`.
//!
//! A [`rayon::ThreadPool`] backs `PARALLEL` statements; its size comes from
//! [`crate::config::EngineConfig`], defaulting to `num_cpus::get()`. A
//! per-insert [`ProfileHook`] is an optional trait object threaded through;
//! when absent, dispatch costs nothing beyond a branch.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use datalog_ir::{AggregateFunction, BinaryOp, BinaryRelOp, Condition, Operation, Statement, UnaryOp, Value};
use rayon::ThreadPool;
use regex::Regex;

use crate::catalog::Environment;
use crate::diagnostics::{DiagnosticLevel, DiagnosticSink, TracingSink};
use crate::error::{EngineError, EngineResult};
use crate::io::{IoProvider, NullIoProvider};
use crate::record::RecordId;

/// Polled at `LOOP` and `PARALLEL` boundaries so a host can cooperatively
/// cancel a long-running evaluation without the core owning a timer.
#[derive(Debug, Default)]
pub struct CancelToken(AtomicBool);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(AtomicBool::new(false))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Optional per-insert cost observer, for a host that wants to profile
/// which rule bodies produce the most tuples.
pub trait ProfileHook: Send + Sync {
    fn on_insert(&self, relation: &str, tuples_emitted: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlFlow {
    Continue,
    Exit,
}

/// Evaluates a RAM [`Statement`] tree against an [`Environment`].
pub struct Interpreter<'a> {
    env: &'a Environment,
    io: &'a dyn IoProvider,
    diagnostics: &'a dyn DiagnosticSink,
    profile: Option<&'a dyn ProfileHook>,
    pool: Option<ThreadPool>,
    cancel: Option<&'a CancelToken>,
    autoinc: AtomicI64,
}

impl<'a> Interpreter<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Interpreter {
            env,
            io: &NullIoProvider,
            diagnostics: &TracingSink,
            profile: None,
            pool: None,
            cancel: None,
            autoinc: AtomicI64::new(1),
        }
    }

    pub fn with_io(mut self, io: &'a dyn IoProvider) -> Self {
        self.io = io;
        self
    }

    pub fn with_diagnostics(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn with_profile_hook(mut self, hook: &'a dyn ProfileHook) -> Self {
        self.profile = Some(hook);
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .ok();
        self
    }

    pub fn with_cancel_token(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn run(&self, statement: &Statement) -> EngineResult<()> {
        self.execute_statement(statement)?;
        Ok(())
    }

    fn execute_statement(&self, statement: &Statement) -> EngineResult<ControlFlow> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Ok(ControlFlow::Exit);
        }
        match statement {
            Statement::Create(_) | Statement::Drop(_) => {
                // Relation storage is allocated when the environment is
                // built from the program's type declarations; these nodes
                // exist for fidelity with the diagnostic trace.
                Ok(ControlFlow::Continue)
            }
            Statement::Clear(name) => {
                self.env.relation_or_err(base_name(name))?;
                self.resolve(name)?.clear();
                Ok(ControlFlow::Continue)
            }
            Statement::Fact { relation, tuple } => {
                self.resolve(relation)?.insert(tuple.clone());
                Ok(ControlFlow::Continue)
            }
            Statement::Load(relation) => {
                let _reader = self.io.reader(relation)?;
                self.diagnostics.emit(
                    DiagnosticLevel::Debug,
                    &format!("LOAD {relation}: no concrete reader consumed the stream"),
                );
                Ok(ControlFlow::Continue)
            }
            Statement::Store(relation) => {
                let _writer = self.io.writer(relation)?;
                Ok(ControlFlow::Continue)
            }
            Statement::Insert { relation, op } => {
                let target = self.resolve(relation)?;
                let mut levels: Vec<Vec<i32>> = Vec::new();
                let mut emitted = 0usize;
                self.execute_operation(op, &mut levels, &mut |tuple| {
                    target.insert(tuple);
                    emitted += 1;
                    Ok(())
                })?;
                if let Some(hook) = self.profile {
                    hook.on_insert(relation, emitted);
                }
                Ok(ControlFlow::Continue)
            }
            Statement::Merge { source, target } => {
                let source_rel = self.resolve(source)?;
                let target_rel = self.resolve(target)?;
                target_rel.merge_from(&source_rel);
                Ok(ControlFlow::Continue)
            }
            Statement::Swap(a, b) => {
                self.swap(a, b)?;
                Ok(ControlFlow::Continue)
            }
            Statement::Sequence(stmts) => {
                for stmt in stmts {
                    if self.execute_statement(stmt)? == ControlFlow::Exit {
                        return Ok(ControlFlow::Exit);
                    }
                }
                Ok(ControlFlow::Continue)
            }
            Statement::Parallel(stmts) => {
                let results: Vec<EngineResult<ControlFlow>> = match &self.pool {
                    Some(pool) => pool.install(|| {
                        use rayon::prelude::*;
                        stmts.par_iter().map(|s| self.execute_statement(s)).collect()
                    }),
                    None => stmts.iter().map(|s| self.execute_statement(s)).collect(),
                };
                let mut any_exit = false;
                for result in results {
                    if result? == ControlFlow::Exit {
                        any_exit = true;
                    }
                }
                Ok(if any_exit { ControlFlow::Exit } else { ControlFlow::Continue })
            }
            Statement::Loop(body) => {
                loop {
                    if self.cancel.is_some_and(CancelToken::is_cancelled) {
                        break;
                    }
                    if self.execute_statement(body)? == ControlFlow::Exit {
                        break;
                    }
                }
                Ok(ControlFlow::Continue)
            }
            Statement::Exit(condition) => {
                let levels: Vec<Vec<i32>> = Vec::new();
                if self.eval_condition(condition, &levels)? {
                    Ok(ControlFlow::Exit)
                } else {
                    Ok(ControlFlow::Continue)
                }
            }
            Statement::LogTimer { label, body } => {
                let start = std::time::Instant::now();
                let result = self.execute_statement(body)?;
                self.diagnostics.emit(
                    DiagnosticLevel::Debug,
                    &format!("{label}: {:?}", start.elapsed()),
                );
                Ok(result)
            }
            Statement::DebugInfo { message, body } => {
                self.diagnostics.emit(DiagnosticLevel::Debug, message);
                self.execute_statement(body)
            }
            Statement::LogSize(relation) => {
                let rel = self.resolve(relation)?;
                self.diagnostics.emit(
                    DiagnosticLevel::Debug,
                    &format!("{relation}: {} tuples", rel.len()),
                );
                Ok(ControlFlow::Continue)
            }
            Statement::PrintSize(relation) => {
                let rel = self.resolve(relation)?;
                println!("{relation}: {}", rel.len());
                Ok(ControlFlow::Continue)
            }
        }
    }

    /// Resolves a relation name through the `#delta`/`#new` shadow-relation
    /// convention the translator uses for semi-naive evaluation.
    fn resolve(&self, name: &str) -> EngineResult<std::sync::Arc<crate::relation::Relation>> {
        self.env.resolve(name)
    }

    fn swap(&self, a: &str, b: &str) -> EngineResult<()> {
        // Shadow-relation swaps (`new` <-> `delta` of the same base
        // relation) only ever rename which Arc a name resolves to; the
        // underlying data is never copied. A swap between two top-level
        // relations is not needed by anything the translator emits today
        // and is rejected as an integrity error rather than silently
        // reinterpreted.
        let a_base = a.strip_suffix(crate::translator::NEW_SUFFIX);
        let b_base = b.strip_suffix(crate::translator::DELTA_SUFFIX);
        match (a_base, b_base) {
            (Some(base_a), Some(base_b)) if base_a == base_b => {
                self.env.swap_triple(base_a)
            }
            _ => Err(EngineError::Integrity(format!(
                "unsupported SWAP between '{a}' and '{b}'"
            ))),
        }
    }

    fn execute_operation(
        &self,
        op: &Operation,
        levels: &mut Vec<Vec<i32>>,
        emit: &mut dyn FnMut(Vec<i32>) -> EngineResult<()>,
    ) -> EngineResult<()> {
        match op {
            Operation::Scan {
                relation,
                level,
                pattern,
                condition,
                pure_existence,
                body,
            } => {
                let rel = self.resolve(relation)?;
                ensure_level(levels, *level);
                let bound = self.eval_pattern(pattern, levels)?;
                let candidates: Vec<Vec<i32>> = if bound.iter().any(Option::is_some) {
                    rel.equal_range(&bound)
                        .into_iter()
                        .map(|offset| rel.tuple_at(offset).as_slice().to_vec())
                        .collect()
                } else {
                    rel.all_rows().iter().map(|t| t.as_slice().to_vec()).collect()
                };
                for candidate in candidates {
                    levels[*level] = candidate;
                    let matches = match condition {
                        Some(cond) => self.eval_condition(cond, levels)?,
                        None => true,
                    };
                    if matches {
                        self.execute_operation(body, levels, emit)?;
                        if *pure_existence {
                            break;
                        }
                    }
                }
                Ok(())
            }
            Operation::Lookup {
                ref_level,
                ref_pos,
                arity,
                level,
                body,
            } => {
                let record_ref = levels[*ref_level][*ref_pos];
                if record_ref == 0 {
                    // A null record reference (unpopulated record column)
                    // matches nothing, mirroring an empty record store slot.
                    return Ok(());
                }
                let fields = self
                    .env
                    .record_store()
                    .unpack(*arity, RecordId(record_ref))
                    .ok_or_else(|| {
                        EngineError::Integrity(format!("dangling record reference {record_ref}"))
                    })?;
                ensure_level(levels, *level);
                levels[*level] = fields;
                self.execute_operation(body, levels, emit)
            }
            Operation::Aggregate {
                relation,
                pattern,
                function,
                target_column,
                level,
                body,
            } => {
                let rel = self.resolve(relation)?;
                let bound_pattern = self.eval_pattern(pattern, levels)?;
                let offsets = rel.equal_range(&bound_pattern);
                if offsets.is_empty()
                    && matches!(function, AggregateFunction::Min | AggregateFunction::Max)
                {
                    // MIN/MAX of an empty range is undefined; the enclosing
                    // body never runs rather than binding a synthetic 0.
                    return Ok(());
                }
                let values: Vec<i32> = offsets
                    .iter()
                    .map(|&offset| rel.tuple_at(offset).get(*target_column))
                    .collect();
                let result = reduce(*function, &values);
                ensure_level(levels, *level);
                levels[*level] = vec![result];
                self.execute_operation(body, levels, emit)
            }
            Operation::Filter { condition, body } => {
                if self.eval_condition(condition, levels)? {
                    self.execute_operation(body, levels, emit)?;
                }
                Ok(())
            }
            Operation::Project {
                values,
                filter_relation,
            } => {
                let tuple: Vec<i32> = values
                    .iter()
                    .map(|v| self.eval_value(v, levels))
                    .collect::<EngineResult<_>>()?;
                if let Some(filter) = filter_relation {
                    let full = self.resolve(filter)?;
                    if full.contains(&tuple) {
                        return Ok(());
                    }
                }
                emit(tuple)
            }
        }
    }

    fn eval_pattern(&self, pattern: &[Option<Value>], levels: &[Vec<i32>]) -> EngineResult<Vec<Option<i32>>> {
        pattern
            .iter()
            .map(|cell| cell.as_ref().map(|v| self.eval_value(v, levels)).transpose())
            .collect()
    }

    fn eval_value(&self, value: &Value, levels: &[Vec<i32>]) -> EngineResult<i32> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::ElementAccess { level, column } => levels
                .get(*level)
                .and_then(|row| row.get(*column))
                .copied()
                .ok_or_else(|| EngineError::Integrity(format!("unbound element access t{level}.{column}"))),
            Value::UnaryOp { op, operand } => {
                let v = self.eval_value(operand, levels)?;
                self.apply_unary(*op, v)
            }
            Value::BinaryOp { op, lhs, rhs } => {
                let l = self.eval_value(lhs, levels)?;
                let r = self.eval_value(rhs, levels)?;
                self.apply_binary(*op, l, r)
            }
            Value::Substr { s, i, n } => {
                let s_id = self.eval_value(s, levels)?;
                let i_val = self.eval_value(i, levels)? as usize;
                let n_val = self.eval_value(n, levels)? as usize;
                let text = self
                    .env
                    .symbol_table()
                    .resolve(crate::symbol::SymbolId(s_id))
                    .unwrap_or_default();
                let substring: String = text.chars().skip(i_val).take(n_val).collect();
                Ok(self.env.symbol_table().intern(&substring).0)
            }
            Value::AutoInc => Ok(self.autoinc.fetch_add(1, Ordering::Relaxed) as i32),
            Value::Pack(fields) => {
                let values: Vec<i32> = fields
                    .iter()
                    .map(|f| self.eval_value(f, levels))
                    .collect::<EngineResult<_>>()?;
                Ok(self.env.record_store().pack(&values).0)
            }
        }
    }

    fn apply_unary(&self, op: UnaryOp, v: i32) -> EngineResult<i32> {
        match op {
            UnaryOp::Neg => Ok(v.wrapping_neg()),
            UnaryOp::BNot => Ok(!v),
            UnaryOp::LNot => Ok(i32::from(v == 0)),
            UnaryOp::Ord => Ok(v),
            UnaryOp::StrLen => {
                let text = self.env.symbol_table().resolve(crate::symbol::SymbolId(v));
                match text {
                    Some(s) => Ok(s.chars().count() as i32),
                    None => {
                        self.diagnostics.emit(
                            DiagnosticLevel::Warning,
                            &format!("strlen() of unresolvable symbol {v}; saturating to 0"),
                        );
                        Ok(0)
                    }
                }
            }
            UnaryOp::Sin => Ok(fixed_point_unary(v, f64::sin)),
            UnaryOp::Cos => Ok(fixed_point_unary(v, f64::cos)),
            UnaryOp::Tan => Ok(fixed_point_unary(v, f64::tan)),
            UnaryOp::Log => Ok(fixed_point_unary(v, f64::ln)),
            UnaryOp::Exp => Ok(fixed_point_unary(v, f64::exp)),
        }
    }

    fn apply_binary(&self, op: BinaryOp, l: i32, r: i32) -> EngineResult<i32> {
        match op {
            BinaryOp::Add => Ok(l.wrapping_add(r)),
            BinaryOp::Sub => Ok(l.wrapping_sub(r)),
            BinaryOp::Mul => Ok(l.wrapping_mul(r)),
            BinaryOp::Div => {
                if r == 0 {
                    self.diagnostics
                        .emit(DiagnosticLevel::Warning, "division by zero; saturating to 0");
                    Ok(0)
                } else {
                    Ok(l.wrapping_div(r))
                }
            }
            BinaryOp::Mod => {
                if r == 0 {
                    self.diagnostics
                        .emit(DiagnosticLevel::Warning, "modulo by zero; saturating to 0");
                    Ok(0)
                } else {
                    Ok(l.wrapping_rem(r))
                }
            }
            BinaryOp::Exp => Ok(if r < 0 { 0 } else { l.wrapping_pow(r as u32) }),
            BinaryOp::BAnd => Ok(l & r),
            BinaryOp::BOr => Ok(l | r),
            BinaryOp::BXor => Ok(l ^ r),
            BinaryOp::LAnd => Ok(i32::from(l != 0 && r != 0)),
            BinaryOp::LOr => Ok(i32::from(l != 0 || r != 0)),
            BinaryOp::Cat => {
                let left = self.env.symbol_table().resolve(crate::symbol::SymbolId(l)).unwrap_or_default();
                let right = self.env.symbol_table().resolve(crate::symbol::SymbolId(r)).unwrap_or_default();
                let joined = format!("{left}{right}");
                Ok(self.env.symbol_table().intern(&joined).0)
            }
        }
    }

    fn eval_condition(&self, condition: &Condition, levels: &[Vec<i32>]) -> EngineResult<bool> {
        match condition {
            Condition::And(a, b) => Ok(self.eval_condition(a, levels)? && self.eval_condition(b, levels)?),
            Condition::BinaryRel { op, lhs, rhs } => self.eval_binary_rel(*op, lhs, rhs, levels),
            Condition::Empty(relation) => Ok(self.resolve(relation)?.is_empty()),
            Condition::NotExists { relation, pattern } => {
                let rel = self.resolve(relation)?;
                let bound = self.eval_pattern(pattern, levels)?;
                Ok(rel.equal_range(&bound).is_empty())
            }
        }
    }

    fn eval_binary_rel(
        &self,
        op: BinaryRelOp,
        lhs: &Value,
        rhs: &Value,
        levels: &[Vec<i32>],
    ) -> EngineResult<bool> {
        let l = self.eval_value(lhs, levels)?;
        let r = self.eval_value(rhs, levels)?;
        match op {
            BinaryRelOp::Eq => Ok(l == r),
            BinaryRelOp::Ne => Ok(l != r),
            BinaryRelOp::Lt => Ok(l < r),
            BinaryRelOp::Le => Ok(l <= r),
            BinaryRelOp::Gt => Ok(l > r),
            BinaryRelOp::Ge => Ok(l >= r),
            BinaryRelOp::Match | BinaryRelOp::NotMatch => {
                let text = self.env.symbol_table().resolve(crate::symbol::SymbolId(l)).unwrap_or_default();
                let pattern = self.env.symbol_table().resolve(crate::symbol::SymbolId(r)).unwrap_or_default();
                let is_match = match Regex::new(&pattern) {
                    Ok(re) => re.is_match(&text),
                    Err(e) => {
                        self.diagnostics.emit(
                            DiagnosticLevel::Warning,
                            &format!("invalid MATCH pattern '{pattern}': {e}"),
                        );
                        false
                    }
                };
                Ok(if op == BinaryRelOp::Match { is_match } else { !is_match })
            }
            BinaryRelOp::Contains | BinaryRelOp::NotContains => {
                let text = self.env.symbol_table().resolve(crate::symbol::SymbolId(l)).unwrap_or_default();
                let needle = self.env.symbol_table().resolve(crate::symbol::SymbolId(r)).unwrap_or_default();
                let contains = text.contains(needle.as_ref());
                Ok(if op == BinaryRelOp::Contains { contains } else { !contains })
            }
        }
    }
}

/// Applies a transcendental `f64` function to a cell reinterpreted as a
/// fixed-point value scaled by 1000, rescaling the result back to `i32`. A
/// result outside `i32`'s range (e.g. `ln` of a non-positive operand)
/// saturates rather than panics.
fn fixed_point_unary(v: i32, f: fn(f64) -> f64) -> i32 {
    let scaled = f(v as f64 / 1000.0) * 1000.0;
    if scaled.is_nan() {
        0
    } else {
        scaled.clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }
}

fn ensure_level(levels: &mut Vec<Vec<i32>>, level: usize) {
    if levels.len() <= level {
        levels.resize(level + 1, Vec::new());
    }
}

fn base_name(name: &str) -> &str {
    name.strip_suffix(crate::translator::DELTA_SUFFIX)
        .or_else(|| name.strip_suffix(crate::translator::NEW_SUFFIX))
        .unwrap_or(name)
}

fn reduce(function: AggregateFunction, values: &[i32]) -> i32 {
    match function {
        AggregateFunction::Count => values.len() as i32,
        AggregateFunction::Sum => values.iter().fold(0i32, |acc, v| acc.wrapping_add(*v)),
        AggregateFunction::Min => values.iter().copied().min().unwrap_or(0),
        AggregateFunction::Max => values.iter().copied().max().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RelationDescriptor;
    use datalog_ast::{ColumnKind, StructuralKind};

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
    fn insert_runs_a_scan_and_projects_matching_tuples() {
        let mut env = Environment::new();
        env.declare(descriptor("edge", 2));
        env.declare(descriptor("swapped", 2));
        env.relation("edge").unwrap().insert(vec![1, 2]);
        env.relation("edge").unwrap().insert(vec![3, 4]);

        let op = Operation::Scan {
            relation: "edge".to_string(),
            level: 0,
            pattern: vec![None, None],
            condition: None,
            pure_existence: false,
            body: Box::new(Operation::Project {
                values: vec![Value::element(0, 1), Value::element(0, 0)],
                filter_relation: None,
            }),
        };
        let stmt = Statement::Insert {
            relation: "swapped".to_string(),
            op,
        };

        let interpreter = Interpreter::new(&env);
        interpreter.run(&stmt).unwrap();

        let swapped = env.relation("swapped").unwrap();
        assert_eq!(swapped.len(), 2);
        assert!(swapped.contains(&[2, 1]));
        assert!(swapped.contains(&[4, 3]));
    }

    #[test]
    fn project_with_filter_relation_drops_tuples_already_in_full() {
        let mut env = Environment::new();
        env.declare(descriptor("path", 2));
        env.declare(descriptor("out", 2));
        env.relation("path").unwrap().insert(vec![1, 2]);

        let op = Operation::Project {
            values: vec![Value::number(1), Value::number(2)],
            filter_relation: Some("path".to_string()),
        };
        let stmt = Statement::Insert {
            relation: "out".to_string(),
            op,
        };
        Interpreter::new(&env).run(&stmt).unwrap();
        assert_eq!(env.relation("out").unwrap().len(), 0);
    }

    #[test]
    fn division_by_zero_saturates_to_zero() {
        let env = Environment::new();
        let interpreter = Interpreter::new(&env);
        let levels: Vec<Vec<i32>> = Vec::new();
        let result = interpreter
            .eval_value(
                &Value::binary(BinaryOp::Div, Value::number(10), Value::number(0)),
                &levels,
            )
            .unwrap();
        assert_eq!(result, 0);
    }

    #[test]
    fn sin_of_zero_is_fixed_point_zero() {
        let env = Environment::new();
        let interpreter = Interpreter::new(&env);
        let levels: Vec<Vec<i32>> = Vec::new();
        let result = interpreter
            .eval_value(&Value::unary(UnaryOp::Sin, Value::number(0)), &levels)
            .unwrap();
        assert_eq!(result, 0);
    }

    #[test]
    fn log_of_nonpositive_saturates_to_zero_instead_of_nan() {
        let env = Environment::new();
        let interpreter = Interpreter::new(&env);
        let levels: Vec<Vec<i32>> = Vec::new();
        let result = interpreter
            .eval_value(&Value::unary(UnaryOp::Log, Value::number(0)), &levels)
            .unwrap();
        assert_eq!(result, 0);
    }

    #[test]
    fn exit_statement_stops_the_enclosing_loop() {
        let mut env = Environment::new();
        env.declare(descriptor("counter", 1));
        let counter = env.relation("counter").unwrap();
        counter.insert(vec![0]);

        // A loop whose body always inserts the same tuple (so `new` is
        // always empty, since insert() dedups) paired with an
        // unconditional EXIT must terminate rather than spin forever.
        let stmt = Statement::Loop(Box::new(Statement::Sequence(vec![Statement::Exit(
            Condition::BinaryRel {
                op: BinaryRelOp::Eq,
                lhs: Value::number(1),
                rhs: Value::number(1),
            },
        )])));

        let interpreter = Interpreter::new(&env);
        interpreter.run(&stmt).unwrap();
    }

    #[test]
    fn aggregate_counts_matching_tuples() {
        let mut env = Environment::new();
        env.declare(descriptor("edge", 2));
        env.declare(descriptor("out", 1));
        let edge = env.relation("edge").unwrap();
        edge.insert(vec![1, 10]);
        edge.insert(vec![1, 20]);
        edge.insert(vec![2, 30]);

        let op = Operation::Aggregate {
            relation: "edge".to_string(),
            pattern: vec![Some(Value::number(1)), None],
            function: AggregateFunction::Count,
            target_column: 1,
            level: 0,
            body: Box::new(Operation::Project {
                values: vec![Value::element(0, 0)],
                filter_relation: None,
            }),
        };
        let stmt = Statement::Insert {
            relation: "out".to_string(),
            op,
        };
        Interpreter::new(&env).run(&stmt).unwrap();
        let out = env.relation("out").unwrap();
        assert!(out.contains(&[2]));
    }
}
