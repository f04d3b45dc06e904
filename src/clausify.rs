//! Lowering an AIG into CNF.
//!
//! Two clausifiers share a contract: after `assume(sig)`, every model of
//! the solver renders `sig` true; `clausify(input)` returns a positive
//! literal whose variable stands for that input. [`NaiveClausifier`] emits
//! the textbook three Tseitin clauses per AND gate. [`Clausifier`] collects
//! multi-input conjunctions first — positive fanout-1 AND children are
//! inlined into their parent — and so spends fewer variables and clauses on
//! chains the strashed circuit is full of. The fanout counts are only a
//! guide; correctness does not depend on them being exact.

use crate::circ::Circ;
use crate::maps::{GMap, GSet, SSet};
use crate::sig::{Gate, GateType, Sig};
use crate::solver::{Lit, SatOracle, Var};

/// Textbook Tseitin encoding, one variable per gate in the cone.
pub struct NaiveClausifier<'a, S> {
    circ: &'a Circ,
    solver: &'a mut S,
    vmap: GMap<Var>,
}

impl<'a, S: SatOracle> NaiveClausifier<'a, S> {
    pub fn new(circ: &'a Circ, solver: &'a mut S) -> Self {
        NaiveClausifier {
            circ,
            solver,
            vmap: GMap::new(),
        }
    }

    pub fn clausify(&mut self, x: Sig) -> Lit {
        Lit::new(self.clausify_gate(x.gate()), x.sign())
    }

    pub fn clausify_gate(&mut self, g: Gate) -> Var {
        let mut stack = vec![g];

        while let Some(&g) = stack.last() {
            self.vmap.grow_to(g, Var::UNDEF);
            if self.vmap[g] != Var::UNDEF {
                stack.pop();
                continue;
            }
            match self.circ.gtype(g) {
                GateType::True => {
                    let v = self.solver.new_var();
                    self.solver.add_clause(&[Lit::positive(v)]);
                    self.vmap[g] = v;
                    stack.pop();
                }
                GateType::Inp => {
                    self.vmap[g] = self.solver.new_var();
                    stack.pop();
                }
                GateType::And => {
                    let l = self.circ.lchild(g);
                    let r = self.circ.rchild(g);
                    self.vmap.grow_to(l.gate(), Var::UNDEF);
                    self.vmap.grow_to(r.gate(), Var::UNDEF);
                    if self.vmap[l.gate()] == Var::UNDEF || self.vmap[r.gate()] == Var::UNDEF {
                        if self.vmap[l.gate()] == Var::UNDEF {
                            stack.push(l.gate());
                        }
                        if self.vmap[r.gate()] == Var::UNDEF {
                            stack.push(r.gate());
                        }
                        continue;
                    }

                    let v = self.solver.new_var();
                    self.vmap[g] = v;
                    let zl = Lit::positive(v);
                    let xl = Lit::new(self.vmap[l.gate()], l.sign());
                    let yl = Lit::new(self.vmap[r.gate()], r.sign());
                    self.solver.add_clause(&[!xl, !yl, zl]);
                    self.solver.add_clause(&[!zl, xl]);
                    self.solver.add_clause(&[!zl, yl]);
                    stack.pop();
                }
            }
        }

        self.vmap[g]
    }

    pub fn vmap(&self) -> &GMap<Var> {
        &self.vmap
    }

    pub fn solver(&self) -> &S {
        &*self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut *self.solver
    }
}

/// The default clausifier: conjunction-collecting Tseitin.
pub struct Clausifier<'a, S> {
    circ: &'a Circ,
    solver: &'a mut S,
    vmap: GMap<Var>,
    n_fanouts: GMap<u32>,
    /// AND gates seen on the way down but not yet clausified.
    building: GSet,
    top_assumed: SSet,
}

impl<'a, S: SatOracle> Clausifier<'a, S> {
    pub fn new(circ: &'a Circ, solver: &'a mut S) -> Self {
        let mut n_fanouts: GMap<u32> = GMap::new();
        circ.adjust_gmap(&mut n_fanouts, 0);
        n_fanouts.grow_to(Gate::TRUE, 0);
        for g in circ.iter() {
            if circ.gtype(g) == GateType::And {
                n_fanouts[circ.lchild(g).gate()] += 1;
                n_fanouts[circ.rchild(g).gate()] += 1;
            }
        }
        Clausifier {
            circ,
            solver,
            vmap: GMap::new(),
            n_fanouts,
            building: GSet::new(),
            top_assumed: SSet::new(),
        }
    }

    /// The conjunction `g` computes, with positive fanout-1 AND children
    /// flattened into it.
    fn gather_big_and(&self, g: Gate, conj: &mut Vec<Sig>) {
        debug_assert!(self.circ.gtype(g) == GateType::And);
        conj.clear();
        let mut reached = SSet::new();
        let mut stack = vec![self.circ.lchild(g), self.circ.rchild(g)];

        while let Some(x) = stack.pop() {
            if reached.has(x) {
                continue;
            }
            reached.insert(x);

            if self.circ.gtype(x.gate()) == GateType::And
                && self.n_fanouts[x.gate()] == 1
                && !x.sign()
            {
                stack.push(self.circ.lchild(x.gate()));
                stack.push(self.circ.rchild(x.gate()));
            } else {
                conj.push(x);
            }
        }
    }

    pub fn clausify(&mut self, x: Sig) -> Lit {
        Lit::new(self.clausify_gate(x.gate()), x.sign())
    }

    pub fn clausify_gate(&mut self, g: Gate) -> Var {
        let mut stack = vec![g];
        let mut conj = Vec::new();

        while let Some(&g) = stack.last() {
            self.vmap.grow_to(g, Var::UNDEF);
            if self.vmap[g] != Var::UNDEF {
                stack.pop();
                continue;
            }
            match self.circ.gtype(g) {
                GateType::True => {
                    let v = self.solver.new_var();
                    self.solver.add_clause(&[Lit::positive(v)]);
                    self.vmap[g] = v;
                    stack.pop();
                }
                GateType::Inp => {
                    self.vmap[g] = self.solver.new_var();
                    stack.pop();
                }
                GateType::And => {
                    if !self.building.has(g) {
                        // Downwards: schedule the collected conjunction.
                        self.building.insert(g);
                        self.gather_big_and(g, &mut conj);
                        for &s in &conj {
                            stack.push(s.gate());
                        }
                    } else {
                        // Upwards: children are done, emit the clauses.
                        let v = self.solver.new_var();
                        self.vmap[g] = v;
                        let lg = Lit::positive(v);
                        self.gather_big_and(g, &mut conj);

                        // g implies each conjunct.
                        for &s in &conj {
                            let p = Lit::new(self.vmap[s.gate()], s.sign());
                            self.solver.add_clause(&[!lg, p]);
                        }
                        // All conjuncts together imply g.
                        let mut lits: Vec<Lit> = conj
                            .iter()
                            .map(|&s| !Lit::new(self.vmap[s.gate()], s.sign()))
                            .collect();
                        lits.push(lg);
                        self.solver.add_clause(&lits);
                        stack.pop();
                    }
                }
            }
        }

        self.vmap[g]
    }

    /// Constrain the solver so `x` holds in every model. Top-level
    /// conjunctions split into separate constraints, so an unsigned AND
    /// root costs no Tseitin variable at all.
    pub fn assume(&mut self, x: Sig) {
        let mut top = Vec::new();
        let mut stack = vec![x];

        while let Some(x) = stack.pop() {
            if self.top_assumed.has(x) {
                continue;
            }
            self.top_assumed.insert(x);

            if x == Sig::TRUE {
                continue;
            }
            if x == Sig::FALSE {
                self.solver.add_clause(&[]);
                continue;
            }
            match self.circ.gtype(x.gate()) {
                GateType::Inp => {
                    let l = self.clausify(x);
                    self.solver.add_clause(&[l]);
                }
                GateType::And if !x.sign() => {
                    stack.push(self.circ.lchild(x.gate()));
                    stack.push(self.circ.rchild(x.gate()));
                }
                _ => top.push(x),
            }
        }

        // Each negated AND root becomes one big disjunction clause.
        let mut disj = Vec::new();
        for x in top {
            debug_assert!(x.sign());
            self.gather_big_and(x.gate(), &mut disj);
            let mut lits = Vec::with_capacity(disj.len());
            for i in 0..disj.len() {
                lits.push(!self.clausify(disj[i]));
            }
            self.solver.add_clause(&lits);
        }
    }

    pub fn vmap(&self) -> &GMap<Var> {
        &self.vmap
    }

    pub fn solver(&self) -> &S {
        &*self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut *self.solver
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::solver::CadicalSolver;

    fn two_input_and() -> (Circ, Sig, Sig, Sig) {
        let mut c = Circ::new();
        let a = c.mk_inp();
        let b = c.mk_inp();
        let ab = c.mk_and(a, b);
        (c, a, b, ab)
    }

    #[test]
    fn naive_and_gate_is_functionally_correct() {
        let (c, a, b, ab) = two_input_and();
        let mut s = CadicalSolver::new();
        let mut cl = NaiveClausifier::new(&c, &mut s);
        let lab = cl.clausify(ab);
        let la = cl.clausify(a);
        let lb = cl.clausify(b);
        assert!(!la.sign() && !lb.sign());

        let s = cl.solver_mut();
        // ab & !a is impossible.
        assert!(!s.solve_with(&[lab, !la]));
        // a & b forces ab.
        assert!(!s.solve_with(&[la, lb, !lab]));
        // a & !b forces !ab.
        assert!(!s.solve_with(&[la, !lb, lab]));
        assert!(s.solve());
    }

    #[test]
    fn naive_constant_true() {
        let c = Circ::new();
        let mut s = CadicalSolver::new();
        let mut cl = NaiveClausifier::new(&c, &mut s);
        let t = cl.clausify(Sig::TRUE);
        let f = cl.clausify(Sig::FALSE);
        let s = cl.solver_mut();
        assert!(s.solve());
        assert_eq!(s.value(t.var()), Some(true));
        assert!(!s.solve_with(&[f]));
    }

    #[test]
    fn optimized_assume_output() {
        // assume(a & b) pins both inputs true.
        let (c, a, b, ab) = two_input_and();
        let mut s = CadicalSolver::new();
        let mut cl = Clausifier::new(&c, &mut s);
        cl.assume(ab);
        let la = cl.clausify(a);
        let lb = cl.clausify(b);
        let s = cl.solver_mut();
        assert!(s.solve());
        assert_eq!(s.value(la.var()), Some(true));
        assert_eq!(s.value(lb.var()), Some(true));
    }

    #[test]
    fn optimized_assume_negated_and() {
        // assume(!(a & b)) forbids a & b together.
        let (c, a, b, ab) = two_input_and();
        let mut s = CadicalSolver::new();
        let mut cl = Clausifier::new(&c, &mut s);
        cl.assume(!ab);
        let la = cl.clausify(a);
        let lb = cl.clausify(b);
        let s = cl.solver_mut();
        assert!(s.solve());
        assert!(!s.solve_with(&[la, lb]));
    }

    #[test]
    fn optimized_assume_constants() {
        let c = Circ::new();
        let mut s = CadicalSolver::new();
        let mut cl = Clausifier::new(&c, &mut s);
        cl.assume(Sig::TRUE);
        assert!(cl.solver_mut().solve());

        let mut s2 = CadicalSolver::new();
        let mut cl2 = Clausifier::new(&c, &mut s2);
        cl2.assume(Sig::FALSE);
        assert!(!cl2.solver().okay());
    }

    #[test]
    fn big_and_chain_uses_fewer_vars_than_naive() {
        // A chain of fanout-1 ANDs: the optimized clausifier should collapse
        // it into one conjunction around a single defined variable.
        let mut c = Circ::new();
        let inps: Vec<Sig> = (0..6).map(|_| c.mk_inp()).collect();
        let mut acc = inps[0];
        for &i in &inps[1..] {
            acc = c.mk_and(acc, i);
        }

        let mut s_naive = CadicalSolver::new();
        let mut cl = NaiveClausifier::new(&c, &mut s_naive);
        cl.clausify(acc);
        let naive_vars = cl.solver().n_vars();

        let mut s_opt = CadicalSolver::new();
        let mut cl = Clausifier::new(&c, &mut s_opt);
        cl.clausify(acc);
        let opt_vars = cl.solver().n_vars();
        assert!(opt_vars < naive_vars);

        // And it is still an AND over all inputs.
        let mut cl = Clausifier::new(&c, &mut s_opt);
        let root = cl.clausify(acc);
        let ins: Vec<Lit> = inps.iter().map(|&i| cl.clausify(i)).collect();
        let s = cl.solver_mut();
        let mut assume: Vec<Lit> = ins.clone();
        assume.push(!root);
        assert!(!s.solve_with(&assume));
        assert!(!s.solve_with(&[root, !ins[3]]));
    }

    #[test]
    fn constraints_translate_when_ready() {
        let mut c = Circ::new();
        let a = c.mk_inp();
        let b = c.mk_inp();
        c.constrain(vec![!a, !b]);

        let mut s = CadicalSolver::new();
        let mut cl = NaiveClausifier::new(&c, &mut s);
        let la = cl.clausify(a);
        let lb = cl.clausify(b);
        let vmap = cl.vmap().clone();
        assert!(c.add_constraints(&mut s, &vmap));
        assert_eq!(c.n_constraints(), 0);
        assert!(!s.solve_with(&[la, lb]));
        assert!(s.solve());
    }

    #[test]
    fn constraints_with_unclausified_gates_are_retained() {
        let mut c = Circ::new();
        let a = c.mk_inp();
        let b = c.mk_inp();
        c.constrain(vec![a, b]);

        let mut s = CadicalSolver::new();
        let mut cl = NaiveClausifier::new(&c, &mut s);
        let _ = cl.clausify(a); // b never clausified
        let vmap = cl.vmap().clone();
        assert!(c.add_constraints(&mut s, &vmap));
        assert_eq!(c.n_constraints(), 1);
    }
}
