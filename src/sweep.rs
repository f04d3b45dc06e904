//! SAT sweeping: find signals that agree (or disagree) under all inputs,
//! prove it, and collapse them.
//!
//! Candidates come from bit-parallel simulation: gates whose 64-pattern
//! signatures match modulo polarity land in the same class. Each candidate
//! pair is then checked against a SAT oracle; UNSAT on both polarities of
//! the difference proves equivalence and the pair is merged in an
//! [`Equivs`]. A satisfying assignment is a counterexample and is fed back
//! into the next round's patterns, splitting the class. When a round proves
//! nothing new, the circuit is rebuilt with every gate pushed through its
//! class leader, and merged nodes vanish.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::circ::Circ;
use crate::clausify::Clausifier;
use crate::cone::{copy_circ_with_subst, Sinks};
use crate::equivs::Equivs;
use crate::maps::GMap;
use crate::sig::{Gate, GateType, Sig};
use crate::solver::{CadicalSolver, SatOracle};

const SWEEP_SEED: u64 = 0x5eed_a16;
const MAX_ROUNDS: usize = 16;

/// Equivalence sweeping over a circuit and its pinned sinks.
pub struct SatSweeper<'a> {
    circ: &'a mut Circ,
    sinks: &'a mut Sinks,
    equivs: Equivs,
    map: GMap<Sig>,
    seed: u64,
}

impl<'a> SatSweeper<'a> {
    pub fn new(circ: &'a mut Circ, sinks: &'a mut Sinks) -> Self {
        SatSweeper {
            circ,
            sinks,
            equivs: Equivs::new(),
            map: GMap::new(),
            seed: SWEEP_SEED,
        }
    }

    /// Run the sweep with a freshly created solver. Returns false if
    /// merging uncovered a contradiction (a signal equivalent to its own
    /// negation); the caller may escalate that to an UNSAT verdict.
    pub fn sweep(&mut self) -> bool {
        let mut solver = CadicalSolver::new();
        self.sweep_with(&mut solver)
    }

    /// Run the sweep against a caller-supplied oracle.
    pub fn sweep_with<S: SatOracle>(&mut self, solver: &mut S) -> bool {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let mut cexs: Vec<GMap<bool>> = Vec::new();
        let mut consistent = true;

        self.equivs.clear();

        {
            let circ: &Circ = self.circ;
            let mut cl = Clausifier::new(circ, solver);

            for round in 0..MAX_ROUNDS {
                let sim = simulate(circ, &mut rng, &cexs);
                let classes = candidate_classes(circ, &sim);
                let mut merges = 0usize;
                let mut refuted = 0usize;

                'classes: for members in &classes {
                    let rep = members[0];
                    let rep_sig = Sig::positive(rep);
                    for &m in &members[1..] {
                        let pol = sim[rep] != sim[m];
                        let m_sig = Sig::positive(m) ^ pol;

                        if self.equivs.leader(rep_sig) == self.equivs.leader(m_sig) {
                            continue;
                        }

                        let la = cl.clausify(rep_sig);
                        let lb = cl.clausify(m_sig);
                        let sat = {
                            let s = cl.solver_mut();
                            s.solve_with(&[la, !lb]) || s.solve_with(&[!la, lb])
                        };
                        if sat {
                            // Counterexample: remember the input assignment
                            // so the next round's signatures split this pair.
                            let mut cex: GMap<bool> = GMap::new();
                            circ.adjust_gmap(&mut cex, false);
                            for &inp in &self.sinks.inps {
                                let vm = cl.vmap();
                                let g = inp.gate();
                                let val = if vm.has(g) && vm[g] != crate::solver::Var::UNDEF {
                                    cl.solver().value(vm[g]).unwrap_or(false)
                                } else {
                                    false
                                };
                                cex[g] = val;
                            }
                            cexs.push(cex);
                            refuted += 1;
                            continue;
                        }

                        if !self.equivs.merge(rep_sig, m_sig) {
                            log::warn!("sweep: contradictory merge for {}", m_sig);
                            consistent = false;
                            break 'classes;
                        }
                        merges += 1;
                    }
                }

                log::info!(
                    "sweep round {}: {} candidate classes, {} merges, {} refuted",
                    round + 1,
                    classes.len(),
                    merges,
                    refuted
                );
                if merges == 0 || !consistent {
                    break;
                }
            }
        }

        if !consistent {
            return false;
        }

        // Rebuild with every gate pushed through its leader.
        let subst = make_subst(self.circ, &self.equivs);
        let mut dst = Circ::new();
        let mut map = GMap::new();
        copy_circ_with_subst(self.circ, &mut dst, &subst, &mut map);
        self.sinks.map(&map);
        *self.circ = dst;
        self.map = map;
        true
    }

    /// The rebuild's gate→signal remap.
    pub fn result_map(&self) -> &GMap<Sig> {
        &self.map
    }

    /// Proven equivalence classes of the last sweep.
    pub fn equivs(&self) -> &Equivs {
        &self.equivs
    }
}

/// 64 parallel evaluations per gate. Inputs get random words; recent
/// counterexample assignments occupy the low pattern columns so refuted
/// candidates stay split.
fn simulate(c: &Circ, rng: &mut impl Rng, cexs: &[GMap<bool>]) -> GMap<u64> {
    let mut sim: GMap<u64> = GMap::new();
    c.adjust_gmap(&mut sim, 0);
    sim.grow_to(Gate::TRUE, 0);
    sim[Gate::TRUE] = !0u64;

    for g in c.iter() {
        match c.gtype(g) {
            GateType::Inp => {
                let mut w: u64 = rng.gen();
                for (j, cex) in cexs.iter().rev().take(64).enumerate() {
                    let bit = cex.has(g) && cex[g];
                    w = (w & !(1u64 << j)) | ((bit as u64) << j);
                }
                sim[g] = w;
            }
            GateType::And => {
                let l = c.lchild(g);
                let r = c.rchild(g);
                let lw = sim[l.gate()] ^ if l.sign() { !0 } else { 0 };
                let rw = sim[r.gate()] ^ if r.sign() { !0 } else { 0 };
                sim[g] = lw & rw;
            }
            GateType::True => unreachable!(),
        }
    }
    sim
}

/// Group AND gates (and the constant) by signature modulo polarity.
/// Classes keep discovery order; members are in increasing id order, so
/// member 0 is the natural representative. Singleton classes are dropped.
fn candidate_classes(c: &Circ, sim: &GMap<u64>) -> Vec<Vec<Gate>> {
    use std::collections::HashMap;

    let mut order: Vec<Vec<Gate>> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();

    let mut add = |g: Gate, w: u64| {
        let key = w.min(!w);
        match index.get(&key) {
            Some(&i) => order[i].push(g),
            None => {
                index.insert(key, order.len());
                order.push(vec![g]);
            }
        }
    };

    add(Gate::TRUE, !0u64);
    for g in c.iter() {
        if c.gtype(g) == GateType::And {
            add(g, sim[g]);
        }
    }

    order.retain(|class| class.len() > 1);
    order
}

fn make_subst(c: &Circ, eqs: &Equivs) -> GMap<Sig> {
    let mut m: GMap<Sig> = GMap::new();
    c.adjust_gmap(&mut m, Sig::UNDEF);
    m.grow_to(Gate::TRUE, Sig::UNDEF);
    m[Gate::TRUE] = Sig::TRUE;
    for g in c.iter() {
        m[g] = eqs.leader(Sig::positive(g));
    }
    m
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cone::evaluate;

    #[test]
    fn merges_structurally_hidden_equivalence() {
        // x = a & b and y = (a & b) & (a | b) are the same function but
        // strashing cannot see it; only the sweep can.
        let mut c = Circ::new();
        let a = c.mk_inp();
        let b = c.mk_inp();
        let x = c.mk_and(a, b);
        let a_or_b = c.mk_or(a, b);
        let y = c.mk_and(x, a_or_b);
        assert_ne!(x.gate(), y.gate());

        let mut sinks = Sinks {
            inps: vec![a, b],
            outs: vec![x, y],
        };
        let mut sweeper = SatSweeper::new(&mut c, &mut sinks);
        assert!(sweeper.sweep());

        // Both outputs now reference the same signal. The dead or-cone
        // survives until a shrink pass collects it.
        assert_eq!(sinks.outs[0], sinks.outs[1]);
        assert_eq!(c.n_gates(), 2);
    }

    #[test]
    fn merges_constant_gate_into_true() {
        // (a & b) & (a & !b) is constant false but a real gate.
        let mut c = Circ::new();
        let a = c.mk_inp();
        let b = c.mk_inp();
        let ab = c.mk_and(a, b);
        let anb = c.mk_and(a, !b);
        let dead = c.mk_and(ab, anb);

        let mut sinks = Sinks {
            inps: vec![a, b],
            outs: vec![dead, ab],
        };
        let mut sweeper = SatSweeper::new(&mut c, &mut sinks);
        assert!(sweeper.sweep());
        assert_eq!(sinks.outs[0], Sig::FALSE);
    }

    #[test]
    fn merges_through_negated_children() {
        // t = r & !(a & b) is equivalent to r = !a & !b; the redundant
        // conjunct hangs off a negated AND edge.
        let mut c = Circ::new();
        let a = c.mk_inp();
        let b = c.mk_inp();
        let r = c.mk_and(!a, !b);
        let ab = c.mk_and(a, b);
        let t = c.mk_and(r, !ab);
        assert_ne!(r.gate(), t.gate());

        let mut sinks = Sinks {
            inps: vec![a, b],
            outs: vec![r, t],
        };
        let mut sweeper = SatSweeper::new(&mut c, &mut sinks);
        assert!(sweeper.sweep());
        assert_eq!(sinks.outs[0], sinks.outs[1]);
    }

    #[test]
    fn sweep_preserves_behaviour_and_is_idempotent() {
        let mut c = Circ::new();
        let a = c.mk_inp();
        let b = c.mk_inp();
        let d = c.mk_inp();
        let x = c.mk_xor(a, b);
        let a_or_b = c.mk_or(a, b);
        let x2 = c.mk_and(x, a_or_b); // == x
        let z = c.mk_and(x2, d);

        let mut truth = Vec::new();
        for bits in 0..8u32 {
            let (va, vb, vd) = (bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
            let mut v = GMap::new();
            for (s, val) in [(a, va), (b, vb), (d, vd)] {
                v.grow_to(s.gate(), None);
                v[s.gate()] = Some(val);
            }
            truth.push(evaluate(&c, z, &mut v));
        }

        let mut sinks = Sinks {
            inps: vec![a, b, d],
            outs: vec![z],
        };
        let mut sweeper = SatSweeper::new(&mut c, &mut sinks);
        assert!(sweeper.sweep());
        let swept_gates = c.n_gates();

        for bits in 0..8u32 {
            let (va, vb, vd) = (bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
            let mut v = GMap::new();
            for (s, val) in [
                (sinks.inps[0], va),
                (sinks.inps[1], vb),
                (sinks.inps[2], vd),
            ] {
                v.grow_to(s.gate(), None);
                v[s.gate()] = Some(val);
            }
            assert_eq!(evaluate(&c, sinks.outs[0], &mut v), truth[bits as usize]);
        }

        // A second sweep finds nothing more to merge.
        let mut sweeper = SatSweeper::new(&mut c, &mut sinks);
        assert!(sweeper.sweep());
        assert_eq!(c.n_gates(), swept_gates);
    }
}
