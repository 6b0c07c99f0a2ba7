//! Thin demo binary: builds a small transitive-closure program directly
//! against [`datalog_ast`]'s builder API (no surface parser — that's the
//! named-out external collaborator) and runs it to a fixpoint, printing
//! every output relation's tuples.
//!
//! ```bash
//! cargo run --bin ram-datalog
//! ```

use datalog_ast::{Atom, BodyPredicate, ColumnKind, Program, RelationDecl, Rule, Term};
use ram_datalog::config::EngineConfig;
use ram_datalog::driver;
use tracing_subscriber::EnvFilter;

fn var(name: &str) -> Term {
    Term::Variable(name.to_string())
}

fn fact(relation: &str, args: Vec<i32>) -> Rule {
    Rule::fact(Atom::new(relation, args.into_iter().map(Term::Constant).collect()))
}

fn transitive_closure_program() -> Program {
    let mut program = Program::new();
    program.add_type_decl(RelationDecl::new("edge", vec![ColumnKind::Number; 2]));
    program.add_type_decl(RelationDecl::new("path", vec![ColumnKind::Number; 2]).with_output(true));

    for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 5)] {
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
            BodyPredicate::Positive(Atom::new("path", vec![var("x"), var("y")])),
            BodyPredicate::Positive(Atom::new("edge", vec![var("y"), var("z")])),
        ],
        vec![],
    ));
    program
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::load().unwrap_or_default();
    let program = transitive_closure_program();

    let env = driver::run(&program, &config)?;

    for descriptor in env.all_descriptors() {
        if !descriptor.output {
            continue;
        }
        let relation = env.relation(&descriptor.name).expect("declared relation has storage");
        println!("{}: {} tuples", descriptor.name, relation.len());
        for tuple in relation.all_rows() {
            println!("  {:?}", tuple.as_slice());
        }
    }

    Ok(())
}
