//! Command-line front-end: read an AIGER circuit, preprocess it, then
//! either re-emit it, dump CNF, or solve and report a model over the
//! primary inputs. Exit codes follow SAT-competition convention: 10 for
//! satisfiable, 20 for unsatisfiable, 0 when an intermediate artifact was
//! requested.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;

use aigsat::aiger::{read_aiger, write_aiger};
use aigsat::clausify::{Clausifier, NaiveClausifier};
use aigsat::cone::split_outputs;
use aigsat::{AigError, CadicalSolver, Circ, DagShrinker, SatOracle, SatSweeper, Sinks, Var};

#[derive(Parser, Debug)]
#[command(
    name = "aigsat",
    about = "Preprocess a combinational AIGER circuit and solve it",
    arg_required_else_help = true
)]
struct Opts {
    /// Verbosity: 0 = quiet, 1 = normal, 2 = debug.
    #[arg(long, default_value_t = 1)]
    verb: u8,

    /// Solver-side simplification of the generated CNF.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pre: bool,

    /// Use the naive three-clauses-per-gate clausification.
    #[arg(long, default_value_t = false)]
    clausify_naive: bool,

    /// Stop after preprocessing the AIG and write the result to this file.
    #[arg(long)]
    aiger: Option<PathBuf>,

    /// Stop after producing CNF and write the result to this file.
    #[arg(long)]
    dimacs: Option<PathBuf>,

    /// Number of DAG-aware rewriting iterations.
    #[arg(long, default_value_t = 5)]
    dash_iters: usize,

    /// Split the topmost output conjunctions into multiple outputs.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    split_output: bool,

    /// Run SAT sweeping before rewriting.
    #[arg(long, default_value_t = false)]
    sweep: bool,

    /// Input circuit, binary (.aig) or ASCII (.aag) AIGER.
    input: PathBuf,

    /// Result file: `1` plus one bit per input on SAT, `0` on UNSAT.
    output: Option<PathBuf>,
}

#[derive(Debug, Default, Clone)]
struct Stats {
    n_inps: usize,
    n_outs: usize,
    n_gates: usize,
    n_vars: usize,
    n_clauses: usize,
    parse_time: f64,
    rewrite_time: f64,
    clausify_time: f64,
    total_start: Option<Instant>,
}

impl Stats {
    fn print(&self) {
        println!("===============================================================================");
        println!("inputs                : {:12}", self.n_inps);
        println!("outputs               : {:12}", self.n_outs);
        println!("gates                 : {:12}", self.n_gates);
        println!("variables             : {:12}", self.n_vars);
        println!("clauses               : {:12}", self.n_clauses);
        println!("parse time            : {:12.2} s", self.parse_time);
        println!("rewrite time          : {:12.2} s", self.rewrite_time);
        println!("clausify time         : {:12.2} s", self.clausify_time);
        if let Some(start) = self.total_start {
            println!("total time            : {:12.2} s", start.elapsed().as_secs_f64());
        }
    }
}

fn write_result(path: &PathBuf, model: Option<&[Option<bool>]>) -> std::io::Result<()> {
    let mut f = File::create(path)?;
    match model {
        Some(bits) => {
            writeln!(f, "1")?;
            let line: String = bits
                .iter()
                .map(|b| match b {
                    Some(true) => '1',
                    Some(false) => '0',
                    None => 'x',
                })
                .collect();
            writeln!(f, "{}", line)?;
        }
        None => writeln!(f, "0")?,
    }
    Ok(())
}

fn clausify_problem(
    circ: &mut Circ,
    sinks: &Sinks,
    solver: &mut CadicalSolver,
    naive: bool,
) -> Vec<Var> {
    let mut input_vars = Vec::with_capacity(sinks.inps.len());

    let vmap = if naive {
        let mut cl = NaiveClausifier::new(circ, solver);
        for &out in &sinks.outs {
            let unit = cl.clausify(out);
            cl.solver_mut().add_clause(&[unit]);
        }
        for &inp in &sinks.inps {
            let lit = cl.clausify(inp);
            debug_assert!(!lit.sign());
            input_vars.push(lit.var());
        }
        cl.vmap().clone()
    } else {
        let mut cl = Clausifier::new(circ, solver);
        for &out in &sinks.outs {
            cl.assume(out);
        }
        for &inp in &sinks.inps {
            let lit = cl.clausify(inp);
            debug_assert!(!lit.sign());
            input_vars.push(lit.var());
        }
        cl.vmap().clone()
    };

    circ.add_constraints(solver, &vmap);
    input_vars
}

fn run(opts: &Opts, stats: &Arc<Mutex<Stats>>) -> anyhow::Result<i32> {
    let start = Instant::now();
    stats.lock().unwrap().total_start = Some(start);

    let (mut circ, mut sinks, defs) = read_aiger(&opts.input)
        .with_context(|| format!("reading {}", opts.input.display()))?;
    if !defs.is_empty() {
        bail!(AigError::SequentialCircuit(defs.len()));
    }

    if opts.split_output {
        split_outputs(&circ, &mut sinks);
    }

    {
        let mut st = stats.lock().unwrap();
        st.n_inps = circ.n_inps();
        st.n_outs = sinks.outs.len();
        st.n_gates = circ.n_gates();
        st.parse_time = start.elapsed().as_secs_f64();
    }
    if opts.verb > 0 {
        println!("============================[ Problem Statistics ]=============================");
        println!("|  Number of inputs:    {:12}                                          |", circ.n_inps());
        println!("|  Number of outputs:   {:12}                                          |", sinks.outs.len());
        println!("|  Number of gates:     {:12}                                          |", circ.n_gates());
    }

    // Preprocess: optional sweeping, then DAG-aware rewriting.
    let rewrite_start = Instant::now();
    let mut swept_contradiction = false;
    if opts.sweep {
        let mut sweeper = SatSweeper::new(&mut circ, &mut sinks);
        swept_contradiction = !sweeper.sweep();
    }
    if !swept_contradiction && opts.dash_iters > 0 {
        let mut shrinker = DagShrinker::new(&mut circ, &mut sinks);
        shrinker.shrink_iter(opts.dash_iters);
    }
    {
        let mut st = stats.lock().unwrap();
        st.n_gates = circ.n_gates();
        st.rewrite_time = rewrite_start.elapsed().as_secs_f64();
    }
    if opts.verb > 0 {
        println!("|  Gates after rewrite: {:12}                                          |", circ.n_gates());
    }

    if let Some(path) = &opts.aiger {
        write_aiger(path, &circ, &sinks, &defs)
            .with_context(|| format!("writing {}", path.display()))?;
        stats.lock().unwrap().print();
        return Ok(0);
    }

    let mut solver = CadicalSolver::new();
    if !opts.pre {
        solver.eliminate(true);
    }

    let clausify_start = Instant::now();
    let input_vars = clausify_problem(&mut circ, &sinks, &mut solver, opts.clausify_naive);
    {
        let mut st = stats.lock().unwrap();
        st.n_vars = solver.n_vars();
        st.n_clauses = solver.n_clauses();
        st.clausify_time = clausify_start.elapsed().as_secs_f64();
    }
    if opts.verb > 0 {
        println!("|  Number of variables: {:12}                                          |", solver.n_vars());
        println!("|  Number of clauses:   {:12}                                          |", solver.n_clauses());
    }

    if opts.pre {
        solver.eliminate(true);
    }

    if swept_contradiction || !solver.okay() {
        if let Some(path) = &opts.output {
            write_result(path, None)?;
        }
        stats.lock().unwrap().print();
        println!("Solved by preprocessing");
        println!("UNSATISFIABLE");
        return Ok(20);
    }

    if let Some(path) = &opts.dimacs {
        solver
            .to_dimacs(path)
            .with_context(|| format!("writing {}", path.display()))?;
        stats.lock().unwrap().print();
        return Ok(0);
    }

    let ret = solver.solve();
    stats.lock().unwrap().print();
    println!("{}", if ret { "SATISFIABLE" } else { "UNSATISFIABLE" });

    if let Some(path) = &opts.output {
        if ret {
            let bits: Vec<Option<bool>> = input_vars.iter().map(|&v| solver.value(v)).collect();
            write_result(path, Some(&bits))?;
        } else {
            write_result(path, None)?;
        }
    }

    Ok(if ret { 10 } else { 20 })
}

fn main() {
    let opts = Opts::parse();

    let level = match opts.verb {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(level).init();

    let stats = Arc::new(Mutex::new(Stats::default()));
    {
        let stats = stats.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("*** INTERRUPTED ***");
            stats.lock().unwrap().print();
            exit(1);
        }) {
            log::warn!("could not install the interrupt handler: {}", e);
        }
    }

    match run(&opts, &stats) {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("ERROR! {:#}", e);
            exit(1);
        }
    }
}
