//! # Datalog IR
//!
//! The Relational Algebra Machine (RAM) intermediate representation: the
//! output of the Datalog-to-RAM translator and the input the bottom-up
//! interpreter walks.
//!
//! A RAM program is a tree of four node families, from the leaves up:
//!
//! - [`Value`] — scalar expressions evaluated against the current binding
//!   environment (the stack of nesting levels a search has opened).
//! - [`Condition`] — boolean guards: relational comparisons, emptiness
//!   checks, and existence checks.
//! - [`Operation`] — the nested search tree: `Scan`/`Lookup`/`Aggregate`
//!   open a binding level and recurse into a body; `Project` is a leaf that
//!   emits one tuple into the statement's target relation.
//! - [`Statement`] — control flow and relation-level effects: creation,
//!   clearing, insertion, merging, the semi-naive loop, and diagnostics.

use std::fmt::Write as _;

// ============================================================================
// Value
// ============================================================================

/// Unary scalar operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    BNot,
    LNot,
    /// `ord(x)`: the raw integer encoding of a symbol or record cell.
    Ord,
    StrLen,
    /// Transcendental functions. The cell model has no float type, so the
    /// operand is reinterpreted as a fixed-point value with three decimal
    /// digits of scale (`cell / 1000.0`), the function is evaluated in
    /// `f64`, and the result is rescaled and truncated back to `i32`. This
    /// trades precision for staying inside the engine's all-integer tuple
    /// representation; a program needing real floating point belongs in an
    /// external collaborator, not this engine.
    Sin,
    Cos,
    Tan,
    Log,
    Exp,
}

/// Binary scalar operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BAnd,
    BOr,
    BXor,
    LAnd,
    LOr,
    /// String concatenation, operating on symbol ids via the symbol table.
    Cat,
}

/// A scalar expression evaluated against the current nesting environment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A literal 32-bit cell value.
    Number(i32),
    /// The value bound at `level`, column `column`, of the enclosing search.
    ElementAccess { level: usize, column: usize },
    UnaryOp { op: UnaryOp, operand: Box<Value> },
    BinaryOp {
        op: BinaryOp,
        lhs: Box<Value>,
        rhs: Box<Value>,
    },
    /// `substr(s, i, n)`.
    Substr {
        s: Box<Value>,
        i: Box<Value>,
        n: Box<Value>,
    },
    /// A fresh counter value, monotonically increasing for the lifetime of
    /// the enclosing program run.
    AutoInc,
    /// Construct a record from its field values, interning it into a record
    /// reference via the record store.
    Pack(Vec<Value>),
}

impl Value {
    pub fn number(n: i32) -> Self {
        Value::Number(n)
    }

    pub fn element(level: usize, column: usize) -> Self {
        Value::ElementAccess { level, column }
    }

    pub fn unary(op: UnaryOp, operand: Value) -> Self {
        Value::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Self {
        Value::BinaryOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn pretty(&self) -> String {
        match self {
            Value::Number(n) => n.to_string(),
            Value::ElementAccess { level, column } => format!("t{level}.{column}"),
            Value::UnaryOp { op, operand } => format!("{}({})", unary_symbol(*op), operand.pretty()),
            Value::BinaryOp { op, lhs, rhs } => {
                format!("({} {} {})", lhs.pretty(), binary_symbol(*op), rhs.pretty())
            }
            Value::Substr { s, i, n } => {
                format!("substr({}, {}, {})", s.pretty(), i.pretty(), n.pretty())
            }
            Value::AutoInc => "autoinc()".to_string(),
            Value::Pack(fields) => {
                let inner: Vec<String> = fields.iter().map(Value::pretty).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::BNot => "bnot",
        UnaryOp::LNot => "lnot",
        UnaryOp::Ord => "ord",
        UnaryOp::StrLen => "strlen",
        UnaryOp::Sin => "sin",
        UnaryOp::Cos => "cos",
        UnaryOp::Tan => "tan",
        UnaryOp::Log => "log",
        UnaryOp::Exp => "exp",
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Exp => "^",
        BinaryOp::BAnd => "band",
        BinaryOp::BOr => "bor",
        BinaryOp::BXor => "bxor",
        BinaryOp::LAnd => "land",
        BinaryOp::LOr => "lor",
        BinaryOp::Cat => "cat",
    }
}

// ============================================================================
// Condition
// ============================================================================

/// Relational comparison operators for [`Condition::BinaryRel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryRelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Regex match: the right-hand side is a symbol holding the pattern.
    Match,
    NotMatch,
    /// Substring containment.
    Contains,
    NotContains,
}

/// A boolean guard attached to a [`Operation::Scan`] or standalone filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Box<Condition>, Box<Condition>),
    BinaryRel {
        op: BinaryRelOp,
        lhs: Value,
        rhs: Value,
    },
    /// True iff the named relation holds no tuples.
    Empty(String),
    /// True iff no tuple in `relation` matches `pattern`; `None` entries are
    /// wildcard columns, `Some(v)` entries must equal `v`.
    NotExists {
        relation: String,
        pattern: Vec<Option<Value>>,
    },
}

impl Condition {
    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    /// Flattens a left-associated chain of `And` nodes into its conjuncts.
    pub fn conjuncts(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Condition::And(l, r) => {
                l.collect_conjuncts(out);
                r.collect_conjuncts(out);
            }
            other => out.push(other),
        }
    }

    fn pretty(&self) -> String {
        match self {
            Condition::And(l, r) => format!("({} AND {})", l.pretty(), r.pretty()),
            Condition::BinaryRel { op, lhs, rhs } => {
                format!("{} {} {}", lhs.pretty(), rel_symbol(*op), rhs.pretty())
            }
            Condition::Empty(rel) => format!("{rel} = ∅"),
            Condition::NotExists { relation, pattern } => {
                let inner: Vec<String> = pattern
                    .iter()
                    .map(|cell| cell.as_ref().map_or("_".to_string(), Value::pretty))
                    .collect();
                format!("!∃ {relation}({})", inner.join(", "))
            }
        }
    }
}

fn rel_symbol(op: BinaryRelOp) -> &'static str {
    match op {
        BinaryRelOp::Eq => "=",
        BinaryRelOp::Ne => "!=",
        BinaryRelOp::Lt => "<",
        BinaryRelOp::Le => "<=",
        BinaryRelOp::Gt => ">",
        BinaryRelOp::Ge => ">=",
        BinaryRelOp::Match => "match",
        BinaryRelOp::NotMatch => "!match",
        BinaryRelOp::Contains => "contains",
        BinaryRelOp::NotContains => "!contains",
    }
}

// ============================================================================
// Operation
// ============================================================================

/// One node of the nested search tree a single `Insert` statement walks.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Iterate `relation`, binding each matching tuple at `level`.
    /// `pattern[c] = Some(v)` pins column `c` to the value `v` evaluates to
    /// *before* the scan starts (a constant, or a variable already bound at
    /// an earlier level): a compatible index serves these columns as an
    /// equal-range lookup instead of a full scan. `None` entries are free.
    /// `condition` (if present) is a residual check a pattern cannot
    /// express (e.g. two columns of the same atom required to be equal) and
    /// is evaluated per-tuple before recursing into `body`. `pure_existence`
    /// marks a scan whose bound variables are never read past an emptiness
    /// check, letting the interpreter short-circuit after the first match.
    Scan {
        relation: String,
        level: usize,
        pattern: Vec<Option<Value>>,
        condition: Option<Condition>,
        pure_existence: bool,
        body: Box<Operation>,
    },
    /// Unpack the record bound at `(ref_level, ref_pos)` of the given
    /// `arity`, binding its fields at a fresh `level`.
    Lookup {
        ref_level: usize,
        ref_pos: usize,
        arity: usize,
        level: usize,
        body: Box<Operation>,
    },
    /// Group every tuple of `relation` matching `pattern` (a partial key,
    /// `None` entries free), reduce `target_column` with `function`, bind
    /// the single result at `level`.
    Aggregate {
        relation: String,
        pattern: Vec<Option<Value>>,
        function: AggregateFunction,
        target_column: usize,
        level: usize,
        body: Box<Operation>,
    },
    /// Evaluate `condition` against the bindings opened so far and recurse
    /// into `body` only if it holds. Used for constraints that do not
    /// naturally attach to a single `Scan` (cross-level comparisons).
    Filter {
        condition: Condition,
        body: Box<Operation>,
    },
    /// The leaf of a search tree: emit one tuple, built from `values`, into
    /// the enclosing statement's target relation. During semi-naive
    /// evaluation into a `new` relation, `filter_relation` names the
    /// recursive relation's `full` relation; a tuple already present there
    /// is dropped instead of re-derived, which is what lets `new` eventually
    /// go empty and the surrounding `LOOP` terminate.
    Project {
        values: Vec<Value>,
        filter_relation: Option<String>,
    },
}

/// Aggregation functions available to [`Operation::Aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
}

impl Operation {
    fn pretty(&self, indent: usize, out: &mut String) {
        let pad = "\t".repeat(indent);
        match self {
            Operation::Scan {
                relation,
                level,
                pattern,
                condition,
                pure_existence,
                body,
            } => {
                let marker = if *pure_existence { " [existence]" } else { "" };
                if pattern.iter().any(Option::is_some) {
                    let inner: Vec<String> = pattern
                        .iter()
                        .map(|cell| cell.as_ref().map_or("_".to_string(), Value::pretty))
                        .collect();
                    let _ = writeln!(
                        out,
                        "{pad}SCAN {relation}({}) AS t{level}{marker}",
                        inner.join(", ")
                    );
                } else {
                    let _ = writeln!(out, "{pad}SCAN {relation} AS t{level}{marker}");
                }
                if let Some(cond) = condition {
                    let _ = writeln!(out, "{pad}\tIF {}", cond.pretty());
                }
                body.pretty(indent + 1, out);
            }
            Operation::Lookup {
                ref_level,
                ref_pos,
                arity,
                level,
                body,
            } => {
                let _ = writeln!(
                    out,
                    "{pad}LOOKUP t{level} = *t{ref_level}.{ref_pos} (arity {arity})"
                );
                body.pretty(indent + 1, out);
            }
            Operation::Aggregate {
                relation,
                function,
                target_column,
                level,
                pattern,
                body,
            } => {
                let inner: Vec<String> = pattern
                    .iter()
                    .map(|cell| cell.as_ref().map_or("_".to_string(), Value::pretty))
                    .collect();
                let _ = writeln!(
                    out,
                    "{pad}t{level} = {function:?}(t{target_column}) FOR {relation}({})",
                    inner.join(", ")
                );
                body.pretty(indent + 1, out);
            }
            Operation::Filter { condition, body } => {
                let _ = writeln!(out, "{pad}IF {}", condition.pretty());
                body.pretty(indent + 1, out);
            }
            Operation::Project {
                values,
                filter_relation,
            } => {
                let inner: Vec<String> = values.iter().map(Value::pretty).collect();
                match filter_relation {
                    Some(rel) => {
                        let _ = writeln!(
                            out,
                            "{pad}PROJECT ({}) UNLESS IN {rel}",
                            inner.join(", ")
                        );
                    }
                    None => {
                        let _ = writeln!(out, "{pad}PROJECT ({})", inner.join(", "));
                    }
                }
            }
        }
    }

    pub fn is_scan(&self) -> bool {
        matches!(self, Operation::Scan { .. })
    }

    pub fn is_project(&self) -> bool {
        matches!(self, Operation::Project { .. })
    }
}

// ============================================================================
// Statement
// ============================================================================

/// A RAM statement: relation-level effects and control flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Create(String),
    Clear(String),
    Drop(String),
    /// Insert a single ground tuple directly (a fact), bypassing `Operation`.
    Fact { relation: String, tuple: Vec<i32> },
    Load(String),
    Store(String),
    /// Run the nested search tree in `op`, projecting into `relation`.
    Insert { relation: String, op: Operation },
    /// `target |= source`; used to fold `new` into `full` each semi-naive round.
    Merge { source: String, target: String },
    Swap(String, String),
    Sequence(Vec<Statement>),
    Parallel(Vec<Statement>),
    Loop(Box<Statement>),
    /// Break out of the enclosing `Loop` once `condition` holds.
    Exit(Condition),
    LogTimer {
        label: String,
        body: Box<Statement>,
    },
    DebugInfo {
        message: String,
        body: Box<Statement>,
    },
    LogSize(String),
    PrintSize(String),
}

impl Statement {
    pub fn sequence(stmts: Vec<Statement>) -> Statement {
        Statement::Sequence(stmts)
    }

    /// Render the tab-indented diagnostic form of this statement tree.
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        self.pretty(0, &mut out);
        out
    }

    fn pretty(&self, indent: usize, out: &mut String) {
        let pad = "\t".repeat(indent);
        match self {
            Statement::Create(rel) => {
                let _ = writeln!(out, "{pad}CREATE {rel}");
            }
            Statement::Clear(rel) => {
                let _ = writeln!(out, "{pad}CLEAR {rel}");
            }
            Statement::Drop(rel) => {
                let _ = writeln!(out, "{pad}DROP {rel}");
            }
            Statement::Fact { relation, tuple } => {
                let inner: Vec<String> = tuple.iter().map(i32::to_string).collect();
                let _ = writeln!(out, "{pad}FACT {relation}({})", inner.join(", "));
            }
            Statement::Load(rel) => {
                let _ = writeln!(out, "{pad}LOAD {rel}");
            }
            Statement::Store(rel) => {
                let _ = writeln!(out, "{pad}STORE {rel}");
            }
            Statement::Insert { relation, op } => {
                let _ = writeln!(out, "{pad}INSERT INTO {relation}");
                op.pretty(indent + 1, out);
            }
            Statement::Merge { source, target } => {
                let _ = writeln!(out, "{pad}MERGE {source} INTO {target}");
            }
            Statement::Swap(a, b) => {
                let _ = writeln!(out, "{pad}SWAP {a}, {b}");
            }
            Statement::Sequence(stmts) => {
                let _ = writeln!(out, "{pad}SEQUENCE");
                for stmt in stmts {
                    stmt.pretty(indent + 1, out);
                }
            }
            Statement::Parallel(stmts) => {
                let _ = writeln!(out, "{pad}PARALLEL");
                for stmt in stmts {
                    stmt.pretty(indent + 1, out);
                }
            }
            Statement::Loop(body) => {
                let _ = writeln!(out, "{pad}LOOP");
                body.pretty(indent + 1, out);
            }
            Statement::Exit(cond) => {
                let _ = writeln!(out, "{pad}EXIT {}", cond.pretty());
            }
            Statement::LogTimer { label, body } => {
                let _ = writeln!(out, "{pad}LOGTIMER \"{label}\"");
                body.pretty(indent + 1, out);
            }
            Statement::DebugInfo { message, body } => {
                let _ = writeln!(out, "{pad}DEBUG \"{message}\"");
                body.pretty(indent + 1, out);
            }
            Statement::LogSize(rel) => {
                let _ = writeln!(out, "{pad}LOGSIZE {rel}");
            }
            Statement::PrintSize(rel) => {
                let _ = writeln!(out, "{pad}PRINTSIZE {rel}");
            }
        }
    }
}

// ============================================================================
// Visitor
// ============================================================================

/// Depth-first pre/post dispatch over a [`Statement`] tree.
///
/// Default method bodies do nothing, so implementors override only the
/// hooks they need; `visit_statement` drives recursion and need not be
/// overridden.
pub trait Visitor {
    fn pre_statement(&mut self, _stmt: &Statement) {}
    fn post_statement(&mut self, _stmt: &Statement) {}
    fn pre_operation(&mut self, _op: &Operation) {}
    fn post_operation(&mut self, _op: &Operation) {}

    fn visit_statement(&mut self, stmt: &Statement) {
        self.pre_statement(stmt);
        match stmt {
            Statement::Insert { op, .. } => self.visit_operation(op),
            Statement::Sequence(stmts) | Statement::Parallel(stmts) => {
                for s in stmts {
                    self.visit_statement(s);
                }
            }
            Statement::Loop(body) | Statement::LogTimer { body, .. } | Statement::DebugInfo { body, .. } => {
                self.visit_statement(body);
            }
            Statement::Create(_)
            | Statement::Clear(_)
            | Statement::Drop(_)
            | Statement::Fact { .. }
            | Statement::Load(_)
            | Statement::Store(_)
            | Statement::Merge { .. }
            | Statement::Swap(_, _)
            | Statement::Exit(_)
            | Statement::LogSize(_)
            | Statement::PrintSize(_) => {}
        }
        self.post_statement(stmt);
    }

    fn visit_operation(&mut self, op: &Operation) {
        self.pre_operation(op);
        match op {
            Operation::Scan { body, .. } | Operation::Lookup { body, .. } | Operation::Aggregate { body, .. } | Operation::Filter { body, .. } => {
                self.visit_operation(body);
            }
            Operation::Project { .. } => {}
        }
        self.post_operation(op);
    }
}
