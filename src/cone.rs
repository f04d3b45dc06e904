//! Cone-of-influence utilities: evaluation, bottom-up orders and circuit
//! copies, plus the sink container rewrites pin their roots with.
//!
//! All traversals run on explicit work stacks. Deep AIGs show up in real
//! benchmarks and native recursion overflows on them.

use crate::circ::Circ;
use crate::maps::{GMap, GSet, SSet};
use crate::sig::{Gate, GateType, Sig};

/// The signals that must survive rewrites: primary inputs and
/// outputs/constraint roots, in call order.
#[derive(Debug, Clone, Default)]
pub struct Sinks {
    pub inps: Vec<Sig>,
    pub outs: Vec<Sig>,
}

impl Sinks {
    pub fn new() -> Self {
        Sinks::default()
    }

    /// Re-point both lists through a rewrite's gate→signal map.
    pub fn map(&mut self, m: &GMap<Sig>) {
        for s in self.inps.iter_mut().chain(self.outs.iter_mut()) {
            *s = remap_sig(*s, m);
        }
    }
}

/// A latch binding: `var` is an input-typed signal, `def` its next-state
/// function. The core requires the list of these to be empty; the type only
/// exists so the parser can report what it saw.
#[derive(Debug, Clone, Copy)]
pub struct Def {
    pub var: Sig,
    pub def: Sig,
}

/// Push a signal through a gate→signal map, composing polarities.
pub fn remap_sig(s: Sig, m: &GMap<Sig>) -> Sig {
    debug_assert!(m.has(s.gate()) && m[s.gate()] != Sig::UNDEF);
    m[s.gate()] ^ s.sign()
}

// -------------------------------------------------------------------------
// Evaluation:

/// Evaluate the cone of `x` under the (three-valued) assignment in
/// `values`, memoizing every gate value on the way. Inputs in the cone must
/// have been assigned beforehand; gates outside the cone stay undefined.
pub fn evaluate(c: &Circ, x: Sig, values: &mut GMap<Option<bool>>) -> bool {
    let mut stack = vec![x.gate()];

    while let Some(&g) = stack.last() {
        values.grow_to(g, None);
        if values[g].is_some() {
            stack.pop();
            continue;
        }
        if g == Gate::TRUE {
            values[g] = Some(true);
            stack.pop();
            continue;
        }
        assert!(
            c.gtype(g) == GateType::And,
            "evaluate: input {} has no assigned value",
            g
        );

        let l = c.lchild(g);
        let r = c.rchild(g);
        values.grow_to(l.gate(), None);
        values.grow_to(r.gate(), None);
        match (values[l.gate()], values[r.gate()]) {
            (Some(a), Some(b)) => {
                values[g] = Some((a ^ l.sign()) && (b ^ r.sign()));
                stack.pop();
            }
            (lv, rv) => {
                if lv.is_none() {
                    stack.push(l.gate());
                }
                if rv.is_none() {
                    stack.push(r.gate());
                }
            }
        }
    }

    values[x.gate()].expect("evaluate: root left undefined") ^ x.sign()
}

// -------------------------------------------------------------------------
// Bottom-up topological orders:

/// Extend `gset` with the cone of `g` such that every gate precedes its
/// users. `Gate::TRUE` is skipped.
pub fn bottom_up_order_gate(c: &Circ, g: Gate, gset: &mut GSet) {
    if g == Gate::TRUE || gset.has(g) {
        return;
    }
    let mut stack = vec![g];
    while let Some(&g) = stack.last() {
        if gset.has(g) {
            stack.pop();
            continue;
        }
        if c.gtype(g) == GateType::And {
            let mut ready = true;
            for child in [c.rchild(g).gate(), c.lchild(g).gate()] {
                if child != Gate::TRUE && !gset.has(child) {
                    stack.push(child);
                    ready = false;
                }
            }
            if ready {
                gset.insert(g);
                stack.pop();
            }
        } else {
            gset.insert(g);
            stack.pop();
        }
    }
}

pub fn bottom_up_order_sig(c: &Circ, x: Sig, gset: &mut GSet) {
    bottom_up_order_gate(c, x.gate(), gset);
}

pub fn bottom_up_order_sigs(c: &Circ, xs: &[Sig], gset: &mut GSet) {
    for &x in xs {
        bottom_up_order_sig(c, x, gset);
    }
}

// -------------------------------------------------------------------------
// Copying the fan-in of signals from one circuit to another:

/// Rebuild the cone of `g` inside `dst`, memoizing gate→signal images in
/// `map` (`Sig::UNDEF` = not yet copied). Inputs become fresh `dst` inputs;
/// ANDs are rebuilt through `dst.mk_and`, so the destination gets
/// simplification and strashing for free.
pub fn copy_gate(src: &Circ, dst: &mut Circ, g: Gate, map: &mut GMap<Sig>) -> Sig {
    src.adjust_gmap(map, Sig::UNDEF);
    map.grow_to(Gate::TRUE, Sig::UNDEF);
    map[Gate::TRUE] = Sig::TRUE;

    let mut order = GSet::new();
    bottom_up_order_gate(src, g, &mut order);
    for h in order.iter() {
        if map[h] != Sig::UNDEF {
            continue;
        }
        map[h] = match src.gtype(h) {
            GateType::Inp => dst.mk_inp(),
            GateType::And => {
                let x = remap_sig(src.lchild(h), map);
                let y = remap_sig(src.rchild(h), map);
                dst.mk_and(x, y)
            }
            GateType::True => unreachable!(),
        };
    }
    map[g]
}

pub fn copy_sig(src: &Circ, dst: &mut Circ, x: Sig, map: &mut GMap<Sig>) -> Sig {
    copy_gate(src, dst, x.gate(), map) ^ x.sign()
}

pub fn copy_sigs(src: &Circ, dst: &mut Circ, xs: &[Sig], map: &mut GMap<Sig>) {
    for &x in xs {
        copy_sig(src, dst, x, map);
    }
}

/// Copy every live gate of `src` into `dst` in arena order (children always
/// precede their users there).
pub fn copy_circ(src: &Circ, dst: &mut Circ, map: &mut GMap<Sig>) {
    src.adjust_gmap(map, Sig::UNDEF);
    map.grow_to(Gate::TRUE, Sig::UNDEF);
    map[Gate::TRUE] = Sig::TRUE;

    for g in src.iter() {
        if map[g] != Sig::UNDEF {
            continue;
        }
        map[g] = match src.gtype(g) {
            GateType::Inp => dst.mk_inp(),
            GateType::And => {
                let x = remap_sig(src.lchild(g), map);
                let y = remap_sig(src.rchild(g), map);
                dst.mk_and(x, y)
            }
            GateType::True => unreachable!(),
        };
    }
}

/// Like [`copy_circ`], but children are first pushed through `subst`.
/// Gates that `subst` maps away are not rebuilt; their images resolve to
/// their substitute's image. `subst` entries must be idempotent and map
/// each gate to a signal whose gate index is not larger (which is what
/// [`crate::Equivs`] leaders guarantee).
pub fn copy_circ_with_subst(src: &Circ, dst: &mut Circ, subst: &GMap<Sig>, map: &mut GMap<Sig>) {
    src.adjust_gmap(map, Sig::UNDEF);
    map.grow_to(Gate::TRUE, Sig::UNDEF);
    map[Gate::TRUE] = Sig::TRUE;

    let subst_of = |g: Gate| -> Sig {
        if subst.has(g) && subst[g] != Sig::UNDEF {
            subst[g]
        } else {
            Sig::positive(g)
        }
    };

    for g in src.iter() {
        if subst_of(g) != Sig::positive(g) || map[g] != Sig::UNDEF {
            continue;
        }
        map[g] = match src.gtype(g) {
            GateType::Inp => dst.mk_inp(),
            GateType::And => {
                let sx = {
                    let c = src.lchild(g);
                    subst_of(c.gate()) ^ c.sign()
                };
                let sy = {
                    let c = src.rchild(g);
                    subst_of(c.gate()) ^ c.sign()
                };
                let x = remap_sig(sx, map);
                let y = remap_sig(sy, map);
                dst.mk_and(x, y)
            }
            GateType::True => unreachable!(),
        };
    }

    // Images for the substituted-away gates.
    for g in src.iter() {
        let s = subst_of(g);
        if s != Sig::positive(g) && map[g] == Sig::UNDEF {
            map[g] = remap_sig(s, map);
        }
    }
}

// -------------------------------------------------------------------------
// Output splitting:

/// Split topmost output conjunctions into multiple outputs: an unsigned AND
/// output is replaced by its conjuncts, recursively. Duplicates are dropped,
/// first-occurrence order is kept.
pub fn split_outputs(c: &Circ, sinks: &mut Sinks) {
    let mut seen = SSet::new();
    let mut outs = Vec::new();
    let mut stack: Vec<Sig> = sinks.outs.drain(..).rev().collect();

    while let Some(x) = stack.pop() {
        if seen.has(x) {
            continue;
        }
        seen.insert(x);
        if !x.sign() && c.gtype(x.gate()) == GateType::And {
            stack.push(c.rchild(x.gate()));
            stack.push(c.lchild(x.gate()));
        } else {
            outs.push(x);
        }
    }
    sinks.outs = outs;
}
