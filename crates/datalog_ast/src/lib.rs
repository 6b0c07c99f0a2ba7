//! # Datalog AST
//!
//! Abstract Syntax Tree types for Datalog programs: typed relation
//! declarations, Horn-clause rules, atoms, and arguments.
//!
//! This crate is the stable interface a surface-language parser and its
//! semantic-analysis passes (alias resolution, aggregation materialisation,
//! stratification) hand off to a bottom-up evaluator. Parsing itself is not
//! part of this crate — callers build `Program` values directly.

use std::collections::{HashMap, HashSet};

// ============================================================================
// Relation declarations
// ============================================================================

/// Static column type carried on a relation's declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// A raw numeric column, stored as-is in a tuple cell.
    Number,
    /// A string column; cells hold a symbol-table id rather than raw bytes.
    Symbol,
}

/// Physical storage strategy requested for a relation.
///
/// `Brie` and `EqRel` are accepted for source fidelity but are backed by the
/// same ordered-index implementation as `BTree` (see `SPEC_FULL.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StructuralKind {
    #[default]
    BTree,
    Brie,
    EqRel,
    Auto,
}

/// A relation's type declaration: name, arity, column types, and role.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDecl {
    pub name: String,
    pub column_kinds: Vec<ColumnKind>,
    pub attribute_names: Vec<String>,
    pub input: bool,
    pub output: bool,
    pub computed: bool,
    pub temporary: bool,
    pub structural_kind: StructuralKind,
}

impl RelationDecl {
    pub fn new(name: impl Into<String>, column_kinds: Vec<ColumnKind>) -> Self {
        let column_kinds_len = column_kinds.len();
        RelationDecl {
            name: name.into(),
            attribute_names: (0..column_kinds_len).map(|i| format!("arg{i}")).collect(),
            column_kinds,
            input: false,
            output: false,
            computed: false,
            temporary: false,
            structural_kind: StructuralKind::default(),
        }
    }

    pub fn arity(&self) -> usize {
        self.column_kinds.len()
    }

    pub fn with_input(mut self, input: bool) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: bool) -> Self {
        self.output = output;
        self
    }

    pub fn with_attribute_names(mut self, names: Vec<String>) -> Self {
        self.attribute_names = names;
        self
    }
}

// ============================================================================
// Aggregates and arithmetic
// ============================================================================

/// Aggregation function usable in a body literal's aggregate term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "count" => Some(AggregateFunc::Count),
            "sum" => Some(AggregateFunc::Sum),
            "min" => Some(AggregateFunc::Min),
            "max" => Some(AggregateFunc::Max),
            _ => None,
        }
    }
}

/// Arithmetic operators usable in computed-column expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(ArithOp::Add),
            "-" => Some(ArithOp::Sub),
            "*" => Some(ArithOp::Mul),
            "/" => Some(ArithOp::Div),
            "%" => Some(ArithOp::Mod),
            _ => None,
        }
    }
}

/// Arithmetic expression tree over variables and integer constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArithExpr {
    Variable(String),
    Constant(i32),
    Binary {
        op: ArithOp,
        left: Box<ArithExpr>,
        right: Box<ArithExpr>,
    },
}

impl ArithExpr {
    pub fn variables(&self) -> HashSet<String> {
        let mut vars = HashSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut HashSet<String>) {
        match self {
            ArithExpr::Variable(name) => {
                vars.insert(name.clone());
            }
            ArithExpr::Constant(_) => {}
            ArithExpr::Binary { left, right, .. } => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
        }
    }
}

// ============================================================================
// Terms, atoms, rules
// ============================================================================

/// A single argument position within an atom.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Variable(String),
    Constant(i32),
    StringConstant(String),
    /// The `_` wildcard: matches anything, binds nothing.
    Placeholder,
    /// `count<x>`, `sum<y>`, `min<z>`, `max<z>`.
    Aggregate(AggregateFunc, String),
    /// `d + 1`, `x * y + z`, used for computed head columns.
    Arithmetic(ArithExpr),
    /// A record literal (head, producing) or pattern (body, consuming):
    /// `[a, b]` in `p(x, [a, b])`.
    Record(Vec<Term>),
}

impl Term {
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Term::Aggregate(_, _))
    }

    pub fn as_variable(&self) -> Option<&str> {
        if let Term::Variable(name) = self {
            Some(name)
        } else {
            None
        }
    }

    pub fn as_aggregate(&self) -> Option<(AggregateFunc, &str)> {
        if let Term::Aggregate(func, var) = self {
            Some((*func, var))
        } else {
            None
        }
    }

    /// All variables referenced by this term, including nested ones.
    pub fn variables(&self) -> HashSet<String> {
        match self {
            Term::Variable(name) => HashSet::from([name.clone()]),
            Term::Aggregate(_, var) => HashSet::from([var.clone()]),
            Term::Arithmetic(expr) => expr.variables(),
            Term::Record(terms) => terms.iter().flat_map(Term::variables).collect(),
            Term::Constant(_) | Term::StringConstant(_) | Term::Placeholder => HashSet::new(),
        }
    }
}

/// An atom such as `edge(x, y)` or `path(x, [a, b])`.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub relation: String,
    pub args: Vec<Term>,
}

impl Atom {
    pub fn new(relation: impl Into<String>, args: Vec<Term>) -> Self {
        Atom {
            relation: relation.into(),
            args,
        }
    }

    pub fn variables(&self) -> HashSet<String> {
        self.args.iter().flat_map(Term::variables).collect()
    }

    pub fn has_aggregates(&self) -> bool {
        self.args.iter().any(Term::is_aggregate)
    }

    pub fn aggregates(&self) -> Vec<(AggregateFunc, &str)> {
        self.args.iter().filter_map(Term::as_aggregate).collect()
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// A comparison constraint appearing in a rule body: `x != y`, `x < 10`.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    NotEqual(Term, Term),
    LessThan(Term, Term),
    LessOrEqual(Term, Term),
    GreaterThan(Term, Term),
    GreaterOrEqual(Term, Term),
    Equal(Term, Term),
}

impl Constraint {
    pub fn variables(&self) -> HashSet<String> {
        let (left, right) = match self {
            Constraint::NotEqual(l, r)
            | Constraint::LessThan(l, r)
            | Constraint::LessOrEqual(l, r)
            | Constraint::GreaterThan(l, r)
            | Constraint::GreaterOrEqual(l, r)
            | Constraint::Equal(l, r) => (l, r),
        };
        let mut vars = term_variable(left);
        vars.extend(term_variable(right));
        vars
    }
}

fn term_variable(t: &Term) -> HashSet<String> {
    if let Term::Variable(name) = t {
        HashSet::from([name.clone()])
    } else {
        HashSet::new()
    }
}

/// A body literal: a positive atom, or a negated one (stratified negation).
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPredicate {
    Positive(Atom),
    Negated(Atom),
}

impl BodyPredicate {
    pub fn atom(&self) -> &Atom {
        match self {
            BodyPredicate::Positive(atom) | BodyPredicate::Negated(atom) => atom,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, BodyPredicate::Positive(_))
    }

    pub fn is_negated(&self) -> bool {
        matches!(self, BodyPredicate::Negated(_))
    }

    pub fn variables(&self) -> HashSet<String> {
        self.atom().variables()
    }
}

/// A single Horn clause: `head :- body1, body2, ..., constraints`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub head: Atom,
    pub body: Vec<BodyPredicate>,
    pub constraints: Vec<Constraint>,
}

impl Rule {
    pub fn new(head: Atom, body: Vec<BodyPredicate>, constraints: Vec<Constraint>) -> Self {
        Rule {
            head,
            body,
            constraints,
        }
    }

    pub fn fact(head: Atom) -> Self {
        Rule {
            head,
            body: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// A rule is recursive if its head relation appears (positively) in its body.
    pub fn is_recursive(&self) -> bool {
        self.body
            .iter()
            .any(|pred| pred.atom().relation == self.head.relation)
    }

    pub fn positive_body_atoms(&self) -> Vec<&Atom> {
        self.body
            .iter()
            .filter_map(|pred| match pred {
                BodyPredicate::Positive(atom) => Some(atom),
                BodyPredicate::Negated(_) => None,
            })
            .collect()
    }

    pub fn negated_body_atoms(&self) -> Vec<&Atom> {
        self.body
            .iter()
            .filter_map(|pred| match pred {
                BodyPredicate::Negated(atom) => Some(atom),
                BodyPredicate::Positive(_) => None,
            })
            .collect()
    }

    pub fn body_relations(&self) -> HashSet<String> {
        self.body
            .iter()
            .map(|pred| pred.atom().relation.clone())
            .collect()
    }
}

// ============================================================================
// Program, dependency graph, stratification
// ============================================================================

/// A complete Datalog program: relation declarations plus rules (including
/// fact rules with an empty body).
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub type_decls: Vec<RelationDecl>,
    pub rules: Vec<Rule>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn add_type_decl(&mut self, decl: RelationDecl) {
        self.type_decls.push(decl);
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn decl(&self, relation: &str) -> Option<&RelationDecl> {
        self.type_decls.iter().find(|d| d.name == relation)
    }

    /// Relations that are the head of at least one non-fact rule.
    pub fn idbs(&self) -> Vec<String> {
        let mut idbs: Vec<String> = self
            .rules
            .iter()
            .filter(|r| !r.is_fact())
            .map(|rule| rule.head.relation.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        idbs.sort();
        idbs
    }

    /// Relations referenced in a body but never the head of a non-fact rule.
    pub fn edbs(&self) -> Vec<String> {
        let idb_set: HashSet<String> = self.idbs().into_iter().collect();
        let mut body_relations: HashSet<String> = HashSet::new();
        for rule in &self.rules {
            body_relations.extend(rule.body_relations());
        }
        let mut edbs: Vec<String> = body_relations.difference(&idb_set).cloned().collect();
        edbs.sort();
        edbs
    }

    pub fn all_relations(&self) -> HashSet<String> {
        let mut relations: HashSet<String> = self.idbs().into_iter().collect();
        relations.extend(self.edbs());
        relations
    }

    pub fn is_safe(&self) -> bool {
        self.rules.iter().all(|rule| {
            let head_vars = rule.head.variables();
            let mut bound = HashSet::new();
            for pred in rule.positive_body_atoms() {
                bound.extend(pred.variables());
            }
            head_vars.is_subset(&bound)
        })
    }

    pub fn recursive_rules(&self) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.is_recursive()).collect()
    }

    pub fn non_recursive_rules(&self) -> Vec<&Rule> {
        self.rules.iter().filter(|r| !r.is_recursive()).collect()
    }

    /// Stratify the program's non-fact rules into SCCs of the head-relation
    /// dependency graph, returned in a topological (safe evaluation) order.
    ///
    /// This mirrors the "post-optimisation AST grouped by SCC" the core
    /// evaluator consumes: computing strata is the job of the AST-level
    /// passes upstream of the core, not the core itself.
    pub fn strata(&self) -> Vec<Stratum> {
        let graph = DependencyGraph::from_program(self);
        let sccs = graph.tarjan_sccs();
        sccs.into_iter()
            .map(|relations| {
                let rule_indices: Vec<usize> = self
                    .rules
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| relations.contains(&r.head.relation))
                    .map(|(i, _)| i)
                    .collect();
                // A Tarjan component only ever holds more than one relation
                // when a cycle actually links them, so that case is always
                // a genuine back-edge. A singleton component needs its own
                // check: it is recursive only if that one relation has a
                // positive edge back to itself, not merely because two or
                // more (non-recursive) rules happen to define it — an EDB
                // with several FACT rules is a singleton component with no
                // edges at all.
                let recursive = relations.len() > 1 || graph.has_positive_self_edge(&relations[0]);
                Stratum {
                    relations,
                    rule_indices,
                    recursive,
                }
            })
            .collect()
    }
}

/// One strongly-connected component of the rule dependency graph, in the
/// order the fixpoint driver must evaluate it.
#[derive(Debug, Clone)]
pub struct Stratum {
    pub relations: Vec<String>,
    pub rule_indices: Vec<usize>,
    pub recursive: bool,
}

/// Kind of dependency edge between two relations' head/body relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyType {
    /// `head` depends positively on the dependency; may be mutually recursive.
    Positive,
    /// `head` negates the dependency; the dependency must be fully
    /// evaluated in a strictly earlier stratum.
    Negative,
}

/// Dependency graph over relation names, used to compute SCCs/strata.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub edges: HashMap<String, Vec<(String, DependencyType)>>,
    pub relations: HashSet<String>,
}

impl DependencyGraph {
    /// True iff `relation` has a positive dependency edge on itself —
    /// the condition under which a singleton SCC is still genuinely
    /// recursive (e.g. `path(x,y) :- edge(x,y). path(x,z) :- path(x,y), edge(y,z).`
    /// collapses `path` to a component of size one, but that one relation
    /// depends positively on itself).
    fn has_positive_self_edge(&self, relation: &str) -> bool {
        self.edges.get(relation).is_some_and(|edges| {
            edges
                .iter()
                .any(|(w, kind)| w == relation && *kind == DependencyType::Positive)
        })
    }

    pub fn from_program(program: &Program) -> Self {
        let mut graph = DependencyGraph::default();
        for rule in &program.rules {
            if rule.is_fact() {
                graph.relations.insert(rule.head.relation.clone());
                continue;
            }
            graph.relations.insert(rule.head.relation.clone());
            let entry = graph.edges.entry(rule.head.relation.clone()).or_default();
            for pred in &rule.body {
                let rel = pred.atom().relation.clone();
                graph.relations.insert(rel.clone());
                let kind = if pred.is_negated() {
                    DependencyType::Negative
                } else {
                    DependencyType::Positive
                };
                entry.push((rel, kind));
            }
        }
        graph
    }

    /// Tarjan's SCC algorithm, returning components in reverse-postorder
    /// (i.e. a valid topological evaluation order: dependencies first).
    pub fn tarjan_sccs(&self) -> Vec<Vec<String>> {
        struct State<'g> {
            graph: &'g DependencyGraph,
            index_counter: usize,
            stack: Vec<String>,
            on_stack: HashSet<String>,
            indices: HashMap<String, usize>,
            lowlink: HashMap<String, usize>,
            result: Vec<Vec<String>>,
        }

        impl<'g> State<'g> {
            fn strongconnect(&mut self, v: &str) {
                self.indices.insert(v.to_string(), self.index_counter);
                self.lowlink.insert(v.to_string(), self.index_counter);
                self.index_counter += 1;
                self.stack.push(v.to_string());
                self.on_stack.insert(v.to_string());

                if let Some(edges) = self.graph.edges.get(v) {
                    for (w, _) in edges.clone() {
                        if !self.indices.contains_key(&w) {
                            self.strongconnect(&w);
                            let w_low = self.lowlink[&w];
                            let v_low = self.lowlink[v];
                            self.lowlink.insert(v.to_string(), v_low.min(w_low));
                        } else if self.on_stack.contains(&w) {
                            let w_idx = self.indices[&w];
                            let v_low = self.lowlink[v];
                            self.lowlink.insert(v.to_string(), v_low.min(w_idx));
                        }
                    }
                }

                if self.lowlink[v] == self.indices[v] {
                    let mut component = Vec::new();
                    loop {
                        let w = self.stack.pop().expect("SCC stack non-empty");
                        self.on_stack.remove(&w);
                        let is_v = w == v;
                        component.push(w);
                        if is_v {
                            break;
                        }
                    }
                    self.result.push(component);
                }
            }
        }

        let mut relations: Vec<&String> = self.relations.iter().collect();
        relations.sort();

        let mut state = State {
            graph: self,
            index_counter: 0,
            stack: Vec::new(),
            on_stack: HashSet::new(),
            indices: HashMap::new(),
            lowlink: HashMap::new(),
            result: Vec::new(),
        };
        for relation in relations {
            if !state.indices.contains_key(relation) {
                state.strongconnect(relation);
            }
        }

        // Tarjan yields components in reverse topological order (sinks
        // first); reverse so dependencies are evaluated before dependents.
        state.result.reverse();
        state.result
    }
}
