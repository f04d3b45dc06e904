//! End-to-end checks of the preprocess → clausify → solve pipeline.

use std::io::{BufReader, Cursor};

use aigsat::aiger::{read_aiger_ascii, write_aiger};
use aigsat::clausify::Clausifier;
use aigsat::cone::split_outputs;
use aigsat::{CadicalSolver, Circ, DagShrinker, SatOracle, SatSweeper, Sig, Sinks};

fn parse(text: &str) -> (Circ, Sinks, Vec<aigsat::Def>) {
    read_aiger_ascii(BufReader::new(Cursor::new(text.as_bytes().to_vec()))).unwrap()
}

fn solve(circ: &Circ, sinks: &Sinks) -> (bool, CadicalSolver, Vec<aigsat::Var>) {
    let mut solver = CadicalSolver::new();
    let mut input_vars = Vec::new();
    {
        let mut cl = Clausifier::new(circ, &mut solver);
        for &out in &sinks.outs {
            cl.assume(out);
        }
        for &inp in &sinks.inps {
            let lit = cl.clausify(inp);
            assert!(!lit.sign());
            input_vars.push(lit.var());
        }
    }
    let ret = solver.okay() && solver.solve();
    (ret, solver, input_vars)
}

#[test]
fn constant_true_output_is_sat() {
    let mut circ = Circ::new();
    let a = circ.mk_inp();
    let sinks = Sinks {
        inps: vec![a],
        outs: vec![Sig::TRUE],
    };
    let (ret, _, _) = solve(&circ, &sinks);
    assert!(ret);
}

#[test]
fn constant_false_output_is_unsat() {
    let mut circ = Circ::new();
    let a = circ.mk_inp();
    let sinks = Sinks {
        inps: vec![a],
        outs: vec![Sig::FALSE],
    };
    let mut solver = CadicalSolver::new();
    let mut cl = Clausifier::new(&circ, &mut solver);
    cl.assume(Sig::FALSE);
    // Solved before search even starts.
    assert!(!cl.solver().okay());
}

#[test]
fn contradiction_folds_away_at_construction() {
    // mk_and(x, !x) never allocates a gate; the output is plain false.
    let mut circ = Circ::new();
    let a = circ.mk_inp();
    let b = circ.mk_inp();
    let ab = circ.mk_and(a, b);
    let out = circ.mk_and(ab, !ab);
    assert_eq!(out, Sig::FALSE);
    assert_eq!(circ.n_gates(), 1); // only a & b itself

    let sinks = Sinks {
        inps: vec![a, b],
        outs: vec![out],
    };
    let (ret, _, _) = solve(&circ, &sinks);
    assert!(!ret);
}

#[test]
fn latched_circuits_are_rejected_at_the_boundary() {
    // One latch: the parser surfaces it, the pipeline must refuse.
    let (_, _, defs) = parse("aag 3 1 1 1 1\n2\n4 6\n4\n6 2 4\n");
    assert_eq!(defs.len(), 1);
    let err = aigsat::AigError::SequentialCircuit(defs.len());
    assert!(err.to_string().contains("not supported"));
}

#[test]
fn sweep_unifies_commuted_outputs() {
    // Strashing already identifies a & b with b & a; sweeping keeps the
    // single gate and both outputs stay on it.
    let mut circ = Circ::new();
    let a = circ.mk_inp();
    let b = circ.mk_inp();
    let x = circ.mk_and(a, b);
    let y = circ.mk_and(b, a);
    assert_eq!(x, y);

    let mut sinks = Sinks {
        inps: vec![a, b],
        outs: vec![x, y],
    };
    let mut sweeper = SatSweeper::new(&mut circ, &mut sinks);
    assert!(sweeper.sweep());
    assert_eq!(sinks.outs[0], sinks.outs[1]);
    assert_eq!(circ.n_gates(), 1);
}

#[test]
fn sweep_unifies_solver_variables_in_cnf() {
    // Two structurally different renderings of the same function: after the
    // sweep both outputs clausify to the same literal, which is what a
    // DIMACS dump then reflects.
    let mut circ = Circ::new();
    let a = circ.mk_inp();
    let b = circ.mk_inp();
    let x = circ.mk_and(a, b);
    let a_or_b = circ.mk_or(a, b);
    let y = circ.mk_and(x, a_or_b);
    assert_ne!(x.gate(), y.gate());

    let mut sinks = Sinks {
        inps: vec![a, b],
        outs: vec![x, y],
    };
    let mut sweeper = SatSweeper::new(&mut circ, &mut sinks);
    assert!(sweeper.sweep());

    let mut solver = CadicalSolver::new();
    let mut cl = Clausifier::new(&circ, &mut solver);
    let lx = cl.clausify(sinks.outs[0]);
    let ly = cl.clausify(sinks.outs[1]);
    assert_eq!(lx, ly);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.cnf");
    cl.solver().to_dimacs(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("p cnf"));
}

#[test]
fn full_pipeline_on_parsed_circuit() {
    // out = (a & b) & !(a & b) written out the long way; the pipeline must
    // conclude UNSAT however much preprocessing runs.
    let text = "aag 5 2 0 1 3\n2\n4\n10\n6 2 4\n8 2 4\n10 6 9\n";
    let (mut circ, mut sinks, defs) = parse(text);
    assert!(defs.is_empty());
    // Strashing already collapsed 6 and 8; the top gate folded to false.
    assert_eq!(sinks.outs[0], Sig::FALSE);

    split_outputs(&circ, &mut sinks);
    let mut shrinker = DagShrinker::new(&mut circ, &mut sinks);
    shrinker.shrink_iter(5);

    let (ret, _, _) = solve(&circ, &sinks);
    assert!(!ret);
}

#[test]
fn satisfiable_circuit_produces_a_model() {
    // out = a & !b has exactly one model over (a, b).
    let mut circ = Circ::new();
    let a = circ.mk_inp();
    let b = circ.mk_inp();
    let out = circ.mk_and(a, !b);
    let mut sinks = Sinks {
        inps: vec![a, b],
        outs: vec![out],
    };
    split_outputs(&circ, &mut sinks);

    let (ret, solver, input_vars) = solve(&circ, &sinks);
    assert!(ret);
    assert_eq!(input_vars.len(), 2);
    assert_eq!(solver.value(input_vars[0]), Some(true));
    assert_eq!(solver.value(input_vars[1]), Some(false));
}

#[test]
fn preprocessing_preserves_the_verdict() {
    // A satisfiable xor-chain stays satisfiable through sweep + shrink, and
    // the model still satisfies the original circuit.
    let text = "aag 7 3 0 1 4\n2\n4\n6\n14\n8 3 5\n10 2 4\n12 9 11\n14 12 6\n";
    let (mut circ, mut sinks, _) = parse(text);

    let mut sweeper = SatSweeper::new(&mut circ, &mut sinks);
    assert!(sweeper.sweep());
    let mut shrinker = DagShrinker::new(&mut circ, &mut sinks);
    shrinker.shrink_iter(5);

    let (ret, solver, input_vars) = solve(&circ, &sinks);
    assert!(ret);

    // Check the model against an evaluation of the preprocessed circuit.
    let mut values = aigsat::maps::GMap::new();
    for (k, &inp) in sinks.inps.iter().enumerate() {
        values.grow_to(inp.gate(), None);
        values[inp.gate()] = Some(solver.value(input_vars[k]).unwrap_or(false));
    }
    for &out in &sinks.outs {
        assert!(aigsat::cone::evaluate(&circ, out, &mut values));
    }
}
