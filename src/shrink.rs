//! DAG-aware rewriting.
//!
//! One iteration walks the pinned cone bottom-up and rebuilds it into a
//! fresh circuit, applying two-level rewrite rules at each AND before
//! handing the operands to `mk_and`. Because the destination circuit
//! strashes and simplifies on its own, redundancy the rules introduce (or
//! expose) collapses automatically. Iterating re-applies the rules to the
//! already-rewritten structure until the gate count stops moving.

use crate::circ::Circ;
use crate::cone::{bottom_up_order_sigs, remap_sig, Sinks};
use crate::maps::{GMap, GSet};
use crate::sig::{Gate, GateType, Sig};

/// Rewrite engine over a circuit and its pinned sinks.
pub struct DagShrinker<'a> {
    circ: &'a mut Circ,
    sinks: &'a mut Sinks,
    map: GMap<Sig>,
}

impl<'a> DagShrinker<'a> {
    pub fn new(circ: &'a mut Circ, sinks: &'a mut Sinks) -> Self {
        DagShrinker {
            circ,
            sinks,
            map: GMap::new(),
        }
    }

    /// Run one rebuild. Returns true if the AND count changed.
    pub fn shrink(&mut self) -> bool {
        let before = self.circ.n_gates();

        let mut order = GSet::new();
        bottom_up_order_sigs(self.circ, &self.sinks.inps, &mut order);
        bottom_up_order_sigs(self.circ, &self.sinks.outs, &mut order);

        let mut dst = Circ::new();
        let mut map: GMap<Sig> = GMap::new();
        self.circ.adjust_gmap(&mut map, Sig::UNDEF);
        map.grow_to(Gate::TRUE, Sig::UNDEF);
        map[Gate::TRUE] = Sig::TRUE;

        for g in order.iter() {
            map[g] = match self.circ.gtype(g) {
                GateType::Inp => dst.mk_inp(),
                GateType::And => {
                    let x = remap_sig(self.circ.lchild(g), &map);
                    let y = remap_sig(self.circ.rchild(g), &map);
                    rewrite_and(&mut dst, x, y)
                }
                GateType::True => unreachable!(),
            };
        }

        self.sinks.map(&map);
        *self.circ = dst;
        self.map = map;

        before != self.circ.n_gates()
    }

    /// Iterate until a fixed point or `n` rounds, whichever comes first.
    pub fn shrink_iter(&mut self, n: usize) {
        for i in 0..n {
            let before = self.circ.n_gates();
            let changed = self.shrink();
            log::info!(
                "dag-shrink iteration {}: {} -> {} gates",
                i + 1,
                before,
                self.circ.n_gates()
            );
            if !changed {
                break;
            }
        }
    }

    /// The last iteration's gate→signal remap.
    pub fn result_map(&self) -> &GMap<Sig> {
        &self.map
    }
}

/// Build `x & y` in `c` after trying the local two-level rules.
fn rewrite_and(c: &mut Circ, x: Sig, y: Sig) -> Sig {
    // Trivial cases go straight to mk_and's constant folding; the rules
    // below must not see them.
    if x == y || x == !y || x.gtype() == GateType::True || y.gtype() == GateType::True {
        return c.mk_and(x, y);
    }

    if let Some(s) = absorb(c, x, y) {
        return s;
    }
    if let Some(s) = absorb(c, y, x) {
        return s;
    }
    if let Some(s) = cross(c, x, y) {
        return s;
    }
    c.mk_and(x, y)
}

/// One-sided rules for `x & y` where `x` decomposes as an AND.
fn absorb(c: &mut Circ, x: Sig, y: Sig) -> Option<Sig> {
    if c.gtype(x.gate()) != GateType::And {
        return None;
    }
    let a = c.lchild(x.gate());
    let b = c.rchild(x.gate());

    if !x.sign() {
        // (a & b) & a      = a & b
        if y == a || y == b {
            return Some(x);
        }
        // (a & b) & !a     = false
        if y == !a || y == !b {
            return Some(Sig::FALSE);
        }
    } else {
        // !(a & b) & a     = a & !b
        if y == a {
            return Some(c.mk_and(a, !b));
        }
        if y == b {
            return Some(c.mk_and(!a, b));
        }
        // !(a & b) & !a    = !a
        if y == !a || y == !b {
            return Some(y);
        }
    }
    None
}

/// Rules needing both operands decomposed.
fn cross(c: &mut Circ, x: Sig, y: Sig) -> Option<Sig> {
    if c.gtype(x.gate()) != GateType::And || c.gtype(y.gate()) != GateType::And {
        return None;
    }
    let (a, b) = (c.lchild(x.gate()), c.rchild(x.gate()));
    let (d, e) = (c.lchild(y.gate()), c.rchild(y.gate()));

    if !x.sign() && !y.sign() {
        // (a & b) & (!a & e) = false
        if a == !d || a == !e || b == !d || b == !e {
            return Some(Sig::FALSE);
        }
    } else if !x.sign() && y.sign() {
        // (a & b) & !(a & e) = (a & b) & !e
        if d == a || d == b {
            return Some(c.mk_and(x, !e));
        }
        if e == a || e == b {
            return Some(c.mk_and(x, !d));
        }
    } else if x.sign() && !y.sign() {
        if a == d || a == e {
            return Some(c.mk_and(y, !b));
        }
        if b == d || b == e {
            return Some(c.mk_and(y, !a));
        }
    }
    None
}
