//! Translates a stratified [`datalog_ast::Program`] into a [`datalog_ir::Statement`]
//! tree: one flat `SEQUENCE` per non-recursive stratum, one semi-naive
//! `LOOP` per recursive stratum, visited in the topological order
//! [`datalog_ast::Program::strata`] already established.
//!
//! Variable-to-level binding bookkeeping during clause lowering is this
//! module's only mutable state; everything else is a pure function of the
//! rule being lowered and the bindings accumulated so far.

use std::collections::HashMap;

use datalog_ast::{
    AggregateFunc as AstAggregateFunc, ArithExpr, ArithOp as AstArithOp, Atom, Constraint, Program,
    Rule, Term,
};
use datalog_ir::{AggregateFunction, BinaryOp, BinaryRelOp, Condition, Operation, Statement, Value};

use crate::catalog::{Environment, RelationDescriptor};
use crate::error::{EngineError, EngineResult};

/// Suffix convention the interpreter uses to resolve a relation name to its
/// `delta`/`new` shadow storage rather than its `full` storage.
pub use crate::catalog::{DELTA_SUFFIX, NEW_SUFFIX};

/// Populates `env` from `program`'s type declarations (inferring a
/// `Number`-only, inferred-arity descriptor for any relation referenced
/// but never declared) and lowers `program` to a single top-level
/// [`Statement`].
pub fn translate(program: &Program, env: &mut Environment) -> EngineResult<Statement> {
    declare_relations(program, env)?;

    let mut top = Vec::new();
    for name in program.all_relations() {
        top.push(Statement::Create(name));
    }

    for stratum in program.strata() {
        if stratum.rule_indices.is_empty() {
            continue;
        }
        if stratum.recursive {
            top.push(lower_recursive_stratum(program, &stratum.rule_indices, &stratum.relations, env)?);
        } else {
            top.push(lower_flat_stratum(program, &stratum.rule_indices, env)?);
        }
    }

    Ok(Statement::Sequence(top))
}

fn declare_relations(program: &Program, env: &mut Environment) -> EngineResult<()> {
    for decl in &program.type_decls {
        env.declare(RelationDescriptor::from(decl));
    }
    for relation in program.all_relations() {
        if env.descriptor(&relation).is_some() {
            continue;
        }
        let arity = infer_arity(program, &relation).ok_or_else(|| {
            EngineError::Integrity(format!("cannot infer arity for undeclared relation '{relation}'"))
        })?;
        env.declare(RelationDescriptor {
            name: relation.clone(),
            arity,
            column_kinds: vec![datalog_ast::ColumnKind::Number; arity],
            attribute_names: (0..arity).map(|i| format!("arg{i}")).collect(),
            input: false,
            output: false,
            computed: false,
            temporary: false,
            structural_kind: datalog_ast::StructuralKind::default(),
        });
    }
    Ok(())
}

fn infer_arity(program: &Program, relation: &str) -> Option<usize> {
    for rule in &program.rules {
        if rule.head.relation == relation {
            return Some(rule.head.arity());
        }
        for pred in &rule.body {
            if pred.atom().relation == relation {
                return Some(pred.atom().arity());
            }
        }
    }
    None
}

fn lower_flat_stratum(
    program: &Program,
    rule_indices: &[usize],
    _env: &mut Environment,
) -> EngineResult<Statement> {
    let mut inserts = Vec::new();
    for &idx in rule_indices {
        let rule = &program.rules[idx];
        let lowering = Lowering {
            pivot: None,
            filter_relation: None,
        };
        let op = lowering.lower_rule(rule)?;
        inserts.push(Statement::Insert {
            relation: rule.head.relation.clone(),
            op,
        });
    }
    if inserts.len() > 1 {
        Ok(Statement::Parallel(inserts))
    } else {
        Ok(Statement::Sequence(inserts))
    }
}

fn lower_recursive_stratum(
    program: &Program,
    rule_indices: &[usize],
    relations: &[String],
    env: &mut Environment,
) -> EngineResult<Statement> {
    for relation in relations {
        env.ensure_triple(relation)?;
    }

    let mut init = Vec::new();
    for &idx in rule_indices {
        let rule = &program.rules[idx];
        let lowering = Lowering {
            pivot: None,
            filter_relation: None,
        };
        let op = lowering.lower_rule(rule)?;
        init.push(Statement::Insert {
            relation: rule.head.relation.clone(),
            op,
        });
    }
    for relation in relations {
        init.push(Statement::Merge {
            source: relation.clone(),
            target: format!("{relation}{DELTA_SUFFIX}"),
        });
    }

    let mut loop_body = Vec::new();
    for &idx in rule_indices {
        let rule = &program.rules[idx];
        let pivots = pivot_relations(rule, relations);
        let filter_relation = Some(rule.head.relation.clone());
        if pivots.is_empty() {
            let lowering = Lowering {
                pivot: None,
                filter_relation: filter_relation.clone(),
            };
            let op = lowering.lower_rule(rule)?;
            loop_body.push(Statement::Insert {
                relation: format!("{}{NEW_SUFFIX}", rule.head.relation),
                op,
            });
        } else {
            for pivot in pivots {
                let lowering = Lowering {
                    pivot: Some(pivot.clone()),
                    filter_relation: filter_relation.clone(),
                };
                let op = lowering.lower_rule(rule)?;
                loop_body.push(Statement::Insert {
                    relation: format!("{}{NEW_SUFFIX}", rule.head.relation),
                    op,
                });
            }
        }
    }

    let exit_condition = relations
        .iter()
        .map(|r| Condition::Empty(format!("{r}{NEW_SUFFIX}")))
        .reduce(Condition::and)
        .unwrap_or(Condition::Empty(String::new()));
    loop_body.push(Statement::Exit(exit_condition));

    for relation in relations {
        loop_body.push(Statement::Merge {
            source: format!("{relation}{NEW_SUFFIX}"),
            target: relation.clone(),
        });
    }
    for relation in relations {
        loop_body.push(Statement::Swap(
            format!("{relation}{NEW_SUFFIX}"),
            format!("{relation}{DELTA_SUFFIX}"),
        ));
        loop_body.push(Statement::Clear(format!("{relation}{NEW_SUFFIX}")));
    }

    init.push(Statement::Loop(Box::new(Statement::Sequence(loop_body))));
    Ok(Statement::Sequence(init))
}

/// The distinct relations (among `stratum_relations`) that `rule`'s
/// positive body references — each becomes a semi-naive rewriting of the
/// rule pivoted on that relation's `delta`.
fn pivot_relations(rule: &Rule, stratum_relations: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for atom in rule.positive_body_atoms() {
        if stratum_relations.iter().any(|r| r == &atom.relation) && !seen.contains(&atom.relation) {
            seen.push(atom.relation.clone());
        }
    }
    seen
}

type Bindings = HashMap<String, (usize, usize)>;

struct Lowering {
    /// When set, scans of this relation read its `delta` shadow instead of
    /// its `full` storage (the semi-naive rewriting for one recursive atom).
    pivot: Option<String>,
    /// When set, names the relation a `PROJECT` should check before
    /// emitting: a tuple already present there is dropped. Set to the head
    /// relation's full storage for recursive-stratum `new` inserts so a
    /// semi-naive round only ever derives genuinely fresh tuples; `None`
    /// for flat-stratum inserts, which never loop and need no filtering.
    filter_relation: Option<String>,
}

impl Lowering {
    fn relation_for_atom(&self, relation: &str) -> String {
        if self.pivot.as_deref() == Some(relation) {
            format!("{relation}{DELTA_SUFFIX}")
        } else {
            relation.to_string()
        }
    }

    fn lower_rule(&self, rule: &Rule) -> EngineResult<Operation> {
        let positive = rule.positive_body_atoms();
        let mut bindings = Bindings::new();
        let mut next_level = 0usize;
        self.lower_atoms(&positive, 0, &mut next_level, &mut bindings, rule)
    }

    fn lower_atoms(
        &self,
        positive: &[&Atom],
        idx: usize,
        next_level: &mut usize,
        bindings: &mut Bindings,
        rule: &Rule,
    ) -> EngineResult<Operation> {
        if idx == positive.len() {
            return self.lower_tail(rule, next_level, bindings);
        }
        let atom = positive[idx];
        let level = *next_level;
        *next_level += 1;

        let (pattern, condition) = build_atom_pattern(atom, bindings, level);

        let mut record_cols = Vec::new();
        for (col, term) in atom.args.iter().enumerate() {
            match term {
                Term::Variable(name) => {
                    bindings.entry(name.clone()).or_insert((level, col));
                }
                Term::Record(subterms) => record_cols.push((col, subterms.clone())),
                _ => {}
            }
        }

        let relation_name = self.relation_for_atom(&atom.relation);
        let body = self.lower_record_lookups(&record_cols, 0, level, next_level, bindings, positive, idx, rule)?;
        Ok(Operation::Scan {
            relation: relation_name,
            level,
            pattern,
            condition,
            pure_existence: false,
            body: Box::new(body),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_record_lookups(
        &self,
        record_cols: &[(usize, Vec<Term>)],
        i: usize,
        ref_level: usize,
        next_level: &mut usize,
        bindings: &mut Bindings,
        positive: &[&Atom],
        atom_idx: usize,
        rule: &Rule,
    ) -> EngineResult<Operation> {
        if i == record_cols.len() {
            return self.lower_atoms(positive, atom_idx + 1, next_level, bindings, rule);
        }
        let (ref_pos, subterms) = &record_cols[i];
        let level = *next_level;
        *next_level += 1;
        for (subcol, subterm) in subterms.iter().enumerate() {
            if let Term::Variable(name) = subterm {
                bindings.entry(name.clone()).or_insert((level, subcol));
            }
        }
        let body = self.lower_record_lookups(record_cols, i + 1, ref_level, next_level, bindings, positive, atom_idx, rule)?;
        Ok(Operation::Lookup {
            ref_level,
            ref_pos: *ref_pos,
            arity: subterms.len(),
            level,
            body: Box::new(body),
        })
    }

    fn lower_tail(&self, rule: &Rule, next_level: &mut usize, bindings: &Bindings) -> EngineResult<Operation> {
        let filter_condition = build_filter_condition(rule, bindings);

        let agg = rule
            .head
            .args
            .iter()
            .find_map(|t| t.as_aggregate().map(|(f, v)| (f, v.to_string())));

        let inner = if let Some((func, var)) = agg {
            self.build_aggregate_wrapped_project(rule, func, &var, next_level, bindings)?
        } else {
            build_project(rule, bindings, self.filter_relation.clone())?
        };

        Ok(match filter_condition {
            Some(condition) => Operation::Filter {
                condition,
                body: Box::new(inner),
            },
            None => inner,
        })
    }

    fn build_aggregate_wrapped_project(
        &self,
        rule: &Rule,
        func: AstAggregateFunc,
        var: &str,
        next_level: &mut usize,
        bindings: &Bindings,
    ) -> EngineResult<Operation> {
        let positive = rule.positive_body_atoms();
        let (atom, target_column) = positive
            .iter()
            .find_map(|a| {
                a.args
                    .iter()
                    .position(|t| matches!(t, Term::Variable(name) if name == var))
                    .map(|pos| (*a, pos))
            })
            .ok_or_else(|| {
                EngineError::Integrity(format!(
                    "aggregated variable '{var}' is not bound by any body atom"
                ))
            })?;

        let pattern: Vec<Option<Value>> = atom
            .args
            .iter()
            .enumerate()
            .map(|(col, term)| {
                if col == target_column {
                    None
                } else {
                    term_to_pattern_value(term, bindings)
                }
            })
            .collect();

        let level = *next_level;
        *next_level += 1;
        let mut inner_bindings = bindings.clone();
        inner_bindings.insert(var.to_string(), (level, 0));
        let project = build_project(rule, &inner_bindings, self.filter_relation.clone())?;

        Ok(Operation::Aggregate {
            relation: self.relation_for_atom(&atom.relation),
            pattern,
            function: map_aggregate(func),
            target_column,
            level,
            body: Box::new(project),
        })
    }
}

fn map_aggregate(func: AstAggregateFunc) -> AggregateFunction {
    match func {
        AstAggregateFunc::Count => AggregateFunction::Count,
        AstAggregateFunc::Sum => AggregateFunction::Sum,
        AstAggregateFunc::Min => AggregateFunction::Min,
        AstAggregateFunc::Max => AggregateFunction::Max,
    }
}

/// Builds a scan's equal-range `pattern` (columns already pinned to a known
/// value before the scan runs, servable by [`crate::relation::Relation::equal_range`])
/// and any residual `Condition` that a pattern cannot express.
///
/// A column is foldable into the pattern when its value is known before the
/// scan starts: a constant, or a variable already bound at an earlier
/// level. A variable repeated *within this same atom* (`p(x, x)`) cannot be
/// prefetched that way — the second occurrence's value is only known once
/// the candidate tuple itself is in hand — so it is lowered to a
/// `BINARY_REL` comparing the two columns of the scanned tuple instead.
fn build_atom_pattern(atom: &Atom, bindings: &Bindings, level: usize) -> (Vec<Option<Value>>, Option<Condition>) {
    let mut pattern: Vec<Option<Value>> = vec![None; atom.arity()];
    let mut condition: Option<Condition> = None;
    let mut local_first: HashMap<&str, usize> = HashMap::new();

    let mut add = |cond: Condition, acc: &mut Option<Condition>| {
        *acc = Some(match acc.take() {
            Some(existing) => existing.and(cond),
            None => cond,
        });
    };

    for (col, term) in atom.args.iter().enumerate() {
        match term {
            Term::Constant(c) => pattern[col] = Some(Value::number(*c)),
            Term::Variable(name) => {
                if let Some(&ref_col) = local_first.get(name.as_str()) {
                    add(
                        Condition::BinaryRel {
                            op: BinaryRelOp::Eq,
                            lhs: Value::element(level, col),
                            rhs: Value::element(level, ref_col),
                        },
                        &mut condition,
                    );
                } else if let Some(&(blevel, bcol)) = bindings.get(name) {
                    pattern[col] = Some(Value::element(blevel, bcol));
                } else {
                    local_first.insert(name, col);
                }
            }
            _ => {}
        }
    }
    (pattern, condition)
}

fn build_filter_condition(rule: &Rule, bindings: &Bindings) -> Option<Condition> {
    let mut condition: Option<Condition> = None;
    let mut add = |cond: Condition, acc: &mut Option<Condition>| {
        *acc = Some(match acc.take() {
            Some(existing) => existing.and(cond),
            None => cond,
        });
    };

    for atom in rule.negated_body_atoms() {
        let pattern: Vec<Option<Value>> = atom
            .args
            .iter()
            .map(|t| term_to_pattern_value(t, bindings))
            .collect();
        add(
            Condition::NotExists {
                relation: atom.relation.clone(),
                pattern,
            },
            &mut condition,
        );
    }

    for constraint in &rule.constraints {
        add(constraint_to_condition(constraint, bindings), &mut condition);
    }

    condition
}

fn constraint_to_condition(constraint: &Constraint, bindings: &Bindings) -> Condition {
    let (op, l, r) = match constraint {
        Constraint::NotEqual(l, r) => (BinaryRelOp::Ne, l, r),
        Constraint::LessThan(l, r) => (BinaryRelOp::Lt, l, r),
        Constraint::LessOrEqual(l, r) => (BinaryRelOp::Le, l, r),
        Constraint::GreaterThan(l, r) => (BinaryRelOp::Gt, l, r),
        Constraint::GreaterOrEqual(l, r) => (BinaryRelOp::Ge, l, r),
        Constraint::Equal(l, r) => (BinaryRelOp::Eq, l, r),
    };
    Condition::BinaryRel {
        op,
        lhs: term_to_value(l, bindings),
        rhs: term_to_value(r, bindings),
    }
}

fn term_to_pattern_value(term: &Term, bindings: &Bindings) -> Option<Value> {
    match term {
        Term::Constant(c) => Some(Value::number(*c)),
        Term::Variable(name) => bindings.get(name).map(|&(l, c)| Value::element(l, c)),
        Term::Arithmetic(expr) => Some(lower_arith(expr, bindings)),
        _ => None,
    }
}

fn term_to_value(term: &Term, bindings: &Bindings) -> Value {
    match term {
        Term::Constant(c) => Value::number(*c),
        Term::Variable(name) => bindings
            .get(name)
            .map(|&(l, c)| Value::element(l, c))
            .unwrap_or(Value::Number(0)),
        Term::Arithmetic(expr) => lower_arith(expr, bindings),
        Term::Record(fields) => Value::Pack(fields.iter().map(|f| term_to_value(f, bindings)).collect()),
        // `build_aggregate_wrapped_project` rebinds the aggregated
        // variable to the `AGGREGATE` operation's result level before
        // calling `build_project`, so this resolves the same way a plain
        // variable reference would.
        Term::Aggregate(_, var) => bindings
            .get(var)
            .map(|&(l, c)| Value::element(l, c))
            .unwrap_or(Value::Number(0)),
        Term::StringConstant(_) | Term::Placeholder => Value::Number(0),
    }
}

fn lower_arith(expr: &ArithExpr, bindings: &Bindings) -> Value {
    match expr {
        ArithExpr::Constant(c) => Value::number(*c),
        ArithExpr::Variable(name) => bindings
            .get(name)
            .map(|&(l, c)| Value::element(l, c))
            .unwrap_or(Value::Number(0)),
        ArithExpr::Binary { op, left, right } => Value::binary(
            map_arith_op(*op),
            lower_arith(left, bindings),
            lower_arith(right, bindings),
        ),
    }
}

fn map_arith_op(op: AstArithOp) -> BinaryOp {
    match op {
        AstArithOp::Add => BinaryOp::Add,
        AstArithOp::Sub => BinaryOp::Sub,
        AstArithOp::Mul => BinaryOp::Mul,
        AstArithOp::Div => BinaryOp::Div,
        AstArithOp::Mod => BinaryOp::Mod,
    }
}

fn build_project(
    rule: &Rule,
    bindings: &Bindings,
    filter_relation: Option<String>,
) -> EngineResult<Operation> {
    let values: Vec<Value> = rule.head.args.iter().map(|t| term_to_value(t, bindings)).collect();
    Ok(Operation::Project {
        values,
        filter_relation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_ast::{BodyPredicate, ColumnKind, RelationDecl};

    fn decl(name: &str, arity: usize) -> RelationDecl {
        RelationDecl::new(name, vec![ColumnKind::Number; arity])
    }

    fn var(name: &str) -> Term {
        Term::Variable(name.to_string())
    }

    #[test]
    fn non_recursive_program_lowers_to_a_flat_sequence() {
        let mut program = Program::new();
        program.add_type_decl(decl("edge", 2));
        program.add_type_decl(decl("path", 2));
        program.add_rule(Rule::new(
            Atom::new("path", vec![var("x"), var("y")]),
            vec![BodyPredicate::Positive(Atom::new("edge", vec![var("x"), var("y")]))],
            vec![],
        ));

        let mut env = Environment::new();
        let stmt = translate(&program, &mut env).unwrap();
        let rendered = stmt.pretty_print();
        assert!(rendered.contains("SCAN edge"));
        assert!(rendered.contains("INSERT INTO path"));
        assert!(!rendered.contains("LOOP"));
    }

    #[test]
    fn an_edb_with_several_fact_rules_stays_a_flat_sequence() {
        // `edge` is defined by three FACT rules and referenced by nobody
        // recursively; it must not be wrapped in a semi-naive LOOP just
        // because it has more than one defining rule.
        let mut program = Program::new();
        program.add_type_decl(decl("edge", 2));
        program.add_rule(Rule::fact(Atom::new("edge", vec![Term::Constant(1), Term::Constant(2)])));
        program.add_rule(Rule::fact(Atom::new("edge", vec![Term::Constant(2), Term::Constant(3)])));
        program.add_rule(Rule::fact(Atom::new("edge", vec![Term::Constant(3), Term::Constant(4)])));

        let mut env = Environment::new();
        let stmt = translate(&program, &mut env).unwrap();
        let rendered = stmt.pretty_print();
        assert!(!rendered.contains("LOOP"));
        assert!(env.triple("edge").is_none());
    }

    #[test]
    fn recursive_program_lowers_to_a_semi_naive_loop() {
        let mut program = Program::new();
        program.add_type_decl(decl("edge", 2));
        program.add_type_decl(decl("path", 2));
        program.add_rule(Rule::new(
            Atom::new("path", vec![var("x"), var("y")]),
            vec![BodyPredicate::Positive(Atom::new("edge", vec![var("x"), var("y")]))],
            vec![],
        ));
        program.add_rule(Rule::new(
            Atom::new("path", vec![var("x"), var("z")]),
            vec![
                BodyPredicate::Positive(Atom::new("path", vec![var("x"), var("y")])),
                BodyPredicate::Positive(Atom::new("edge", vec![var("y"), var("z")])),
            ],
            vec![],
        ));

        let mut env = Environment::new();
        let stmt = translate(&program, &mut env).unwrap();
        let rendered = stmt.pretty_print();
        assert!(rendered.contains("LOOP"));
        assert!(rendered.contains("path#delta"));
        assert!(rendered.contains("EXIT"));
        assert!(rendered.contains("UNLESS IN path"));
        assert!(env.triple("path").is_some());
    }

    #[test]
    fn negated_atom_lowers_to_a_not_exists_filter() {
        let mut program = Program::new();
        program.add_type_decl(decl("r", 1));
        program.add_type_decl(decl("s", 1));
        program.add_type_decl(decl("t", 1));
        program.add_rule(Rule::new(
            Atom::new("t", vec![var("x")]),
            vec![
                BodyPredicate::Positive(Atom::new("r", vec![var("x")])),
                BodyPredicate::Negated(Atom::new("s", vec![var("x")])),
            ],
            vec![],
        ));

        let mut env = Environment::new();
        let stmt = translate(&program, &mut env).unwrap();
        assert!(stmt.pretty_print().contains("!∃ s"));
    }

    #[test]
    fn fact_rule_lowers_to_an_unconditioned_project() {
        let mut program = Program::new();
        program.add_type_decl(decl("edge", 2));
        program.add_rule(Rule::fact(Atom::new("edge", vec![Term::Constant(1), Term::Constant(2)])));

        let mut env = Environment::new();
        let stmt = translate(&program, &mut env).unwrap();
        assert!(stmt.pretty_print().contains("PROJECT (1, 2)"));
    }

    #[test]
    fn a_bound_variable_narrows_the_scans_pattern_instead_of_a_condition() {
        // path(x, z) :- edge(x, y), edge(y, z). The second edge(y, z) scan's
        // first column is already bound by the first scan's `y`, so it
        // should fold into that scan's equal-range pattern rather than
        // becoming an `IF` condition checked per-tuple.
        let mut program = Program::new();
        program.add_type_decl(decl("edge", 2));
        program.add_type_decl(decl("path2", 2));
        program.add_rule(Rule::new(
            Atom::new("path2", vec![var("x"), var("z")]),
            vec![
                BodyPredicate::Positive(Atom::new("edge", vec![var("x"), var("y")])),
                BodyPredicate::Positive(Atom::new("edge", vec![var("y"), var("z")])),
            ],
            vec![],
        ));

        let mut env = Environment::new();
        let stmt = translate(&program, &mut env).unwrap();
        let rendered = stmt.pretty_print();
        assert!(rendered.contains("SCAN edge(t0.1, _) AS t1"));
        assert!(!rendered.contains("IF t1.0 = t0.1"));
    }

    #[test]
    fn a_repeated_variable_within_one_atom_stays_a_residual_condition() {
        // self(x, x) cannot be prefetched into a pattern: both columns are
        // only known once the scanned tuple itself is in hand.
        let mut program = Program::new();
        program.add_type_decl(decl("self_edge", 2));
        program.add_type_decl(decl("diag", 1));
        program.add_rule(Rule::new(
            Atom::new("diag", vec![var("x")]),
            vec![BodyPredicate::Positive(Atom::new("self_edge", vec![var("x"), var("x")]))],
            vec![],
        ));

        let mut env = Environment::new();
        let stmt = translate(&program, &mut env).unwrap();
        let rendered = stmt.pretty_print();
        assert!(rendered.contains("SCAN self_edge AS t0"));
        assert!(rendered.contains("IF t0.1 = t0.0"));
    }
}
