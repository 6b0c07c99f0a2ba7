//! End-to-end fixpoint scenarios against fixed, literal inputs: each test
//! builds a small program directly via `datalog_ast`'s builder API, runs it
//! through `ram_datalog::driver::run`, and checks the expected output
//! relation exactly.

use datalog_ast::{Atom, BodyPredicate, ColumnKind, Program, RelationDecl, Rule, Term};
use ram_datalog::config::EngineConfig;
use ram_datalog::driver;

fn var(name: &str) -> Term {
    Term::Variable(name.to_string())
}

fn fact(relation: &str, args: Vec<i32>) -> Rule {
    Rule::fact(Atom::new(relation, args.into_iter().map(Term::Constant).collect()))
}

fn tuples_of(env: &ram_datalog::Environment, relation: &str) -> Vec<Vec<i32>> {
    let rel = env.relation(relation).expect("relation exists");
    let mut rows: Vec<Vec<i32>> = rel.all_rows().iter().map(|t| t.as_slice().to_vec()).collect();
    rows.sort();
    rows
}

#[test]
fn transitive_closure_over_a_three_edge_chain() {
    let mut program = Program::new();
    program.add_type_decl(RelationDecl::new("edge", vec![ColumnKind::Number; 2]));
    program.add_type_decl(RelationDecl::new("path", vec![ColumnKind::Number; 2]));
    for (a, b) in [(1, 2), (2, 3), (3, 4)] {
        program.add_rule(fact("edge", vec![a, b]));
    }
    program.add_rule(Rule::new(
        Atom::new("path", vec![var("x"), var("y")]),
        vec![BodyPredicate::Positive(Atom::new("edge", vec![var("x"), var("y")]))],
        vec![],
    ));
    program.add_rule(Rule::new(
        Atom::new("path", vec![var("x"), var("z")]),
        vec![
            BodyPredicate::Positive(Atom::new("edge", vec![var("x"), var("y")])),
            BodyPredicate::Positive(Atom::new("path", vec![var("y"), var("z")])),
        ],
        vec![],
    ));

    let env = driver::run(&program, &EngineConfig::default()).unwrap();
    let path = tuples_of(&env, "path");
    assert_eq!(
        path,
        vec![
            vec![1, 2],
            vec![1, 3],
            vec![1, 4],
            vec![2, 3],
            vec![2, 4],
            vec![3, 4],
        ]
    );
}

#[test]
fn cycle_reachability_on_six_nodes_is_the_complete_graph() {
    let mut program = Program::new();
    program.add_type_decl(RelationDecl::new("edge", vec![ColumnKind::Number; 2]));
    program.add_type_decl(RelationDecl::new("path", vec![ColumnKind::Number; 2]));
    for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 1)] {
        program.add_rule(fact("edge", vec![a, b]));
    }
    program.add_rule(Rule::new(
        Atom::new("path", vec![var("x"), var("y")]),
        vec![BodyPredicate::Positive(Atom::new("edge", vec![var("x"), var("y")]))],
        vec![],
    ));
    program.add_rule(Rule::new(
        Atom::new("path", vec![var("x"), var("z")]),
        vec![
            BodyPredicate::Positive(Atom::new("edge", vec![var("x"), var("y")])),
            BodyPredicate::Positive(Atom::new("path", vec![var("y"), var("z")])),
        ],
        vec![],
    ));

    let env = driver::run(&program, &EngineConfig::default()).unwrap();
    assert_eq!(env.relation("path").unwrap().len(), 36);
}

#[test]
fn stratified_negation_excludes_matching_tuples() {
    let mut program = Program::new();
    program.add_type_decl(RelationDecl::new("r", vec![ColumnKind::Number; 1]));
    program.add_type_decl(RelationDecl::new("s", vec![ColumnKind::Number; 1]));
    program.add_type_decl(RelationDecl::new("t", vec![ColumnKind::Number; 1]));
    for v in [1, 2, 3] {
        program.add_rule(fact("r", vec![v]));
    }
    program.add_rule(fact("s", vec![2]));
    program.add_rule(Rule::new(
        Atom::new("t", vec![var("x")]),
        vec![
            BodyPredicate::Positive(Atom::new("r", vec![var("x")])),
            BodyPredicate::Negated(Atom::new("s", vec![var("x")])),
        ],
        vec![],
    ));

    let env = driver::run(&program, &EngineConfig::default()).unwrap();
    assert_eq!(tuples_of(&env, "t"), vec![vec![1], vec![3]]);
}

#[test]
fn count_aggregate_groups_by_the_unaggregated_column() {
    let mut program = Program::new();
    program.add_type_decl(RelationDecl::new("r", vec![ColumnKind::Number; 2]));
    program.add_type_decl(RelationDecl::new("c", vec![ColumnKind::Number; 2]));
    program.add_rule(fact("r", vec![1, 1]));
    program.add_rule(fact("r", vec![1, 2]));
    program.add_rule(fact("r", vec![2, 3]));
    program.add_rule(Rule::new(
        Atom::new("c", vec![var("x"), Term::Aggregate(datalog_ast::AggregateFunc::Count, "y".to_string())]),
        vec![BodyPredicate::Positive(Atom::new("r", vec![var("x"), var("y")]))],
        vec![],
    ));

    let env = driver::run(&program, &EngineConfig::default()).unwrap();
    assert_eq!(tuples_of(&env, "c"), vec![vec![1, 2], vec![2, 1]]);
}

#[test]
fn record_pack_and_unpack_round_trips_through_a_rule() {
    let mut program = Program::new();
    program.add_type_decl(RelationDecl::new("p", vec![ColumnKind::Number; 2]));
    program.add_type_decl(RelationDecl::new("q", vec![ColumnKind::Number; 3]));
    program.add_rule(Rule::fact(Atom::new(
        "p",
        vec![Term::Constant(1), Term::Record(vec![Term::Constant(2), Term::Constant(3)])],
    )));
    program.add_rule(Rule::new(
        Atom::new("q", vec![var("x"), var("a"), var("b")]),
        vec![BodyPredicate::Positive(Atom::new(
            "p",
            vec![var("x"), Term::Record(vec![var("a"), var("b")])],
        ))],
        vec![],
    ));

    let env = driver::run(&program, &EngineConfig::default()).unwrap();
    assert_eq!(tuples_of(&env, "q"), vec![vec![1, 2, 3]]);
}

#[test]
fn semi_naive_loop_terminates_immediately_on_an_empty_edb() {
    let mut program = Program::new();
    program.add_type_decl(RelationDecl::new("edge", vec![ColumnKind::Number; 2]));
    program.add_type_decl(RelationDecl::new("path", vec![ColumnKind::Number; 2]));
    program.add_rule(Rule::new(
        Atom::new("path", vec![var("x"), var("y")]),
        vec![BodyPredicate::Positive(Atom::new("edge", vec![var("x"), var("y")]))],
        vec![],
    ));
    program.add_rule(Rule::new(
        Atom::new("path", vec![var("x"), var("z")]),
        vec![
            BodyPredicate::Positive(Atom::new("edge", vec![var("x"), var("y")])),
            BodyPredicate::Positive(Atom::new("path", vec![var("y"), var("z")])),
        ],
        vec![],
    ));

    let env = driver::run(&program, &EngineConfig::default()).unwrap();
    assert_eq!(env.relation("path").unwrap().len(), 0);
}
