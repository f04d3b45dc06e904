//! Union-find over signals.
//!
//! An equivalence is always rooted at its minimum signal, stored unsigned,
//! so `leader` is idempotent and commutes with negation:
//! `leader(!x) == !leader(x)`. Class member lists accumulate monotonically
//! between [`Equivs::clear`] calls; member 0 of each class is its (positive)
//! leader.

use crate::maps::GMap;
use crate::sig::Sig;

pub type ClassId = u32;

const CLASS_UNDEF: ClassId = u32::MAX;

#[derive(Debug, Default)]
pub struct Equivs {
    /// Gate → signed representative. Absent (or `Sig::UNDEF`) means the
    /// gate is its own representative.
    union_find: GMap<Sig>,
    /// Leader gate → index into `classes`.
    class_map: GMap<ClassId>,
    classes: Vec<Vec<Sig>>,
}

impl Equivs {
    pub fn new() -> Self {
        Equivs::default()
    }

    /// The representative of `x`, with polarity composed along the chain.
    pub fn leader(&self, mut x: Sig) -> Sig {
        loop {
            let g = x.gate();
            if !self.union_find.has(g) || self.union_find[g] == Sig::UNDEF {
                return x;
            }
            x = self.union_find[g] ^ x.sign();
        }
    }

    /// Unify the classes of `x` and `y`. Returns false (without mutating
    /// anything) if they are already known to be complementary.
    pub fn merge(&mut self, x: Sig, y: Sig) -> bool {
        debug_assert!(x != Sig::UNDEF && y != Sig::UNDEF);

        let mut x = self.leader(x);
        let mut y = self.leader(y);

        if y < x {
            std::mem::swap(&mut x, &mut y);
        }
        if x.sign() {
            // Make 'x' unsigned; 'y' carries the polarity offset.
            x = !x;
            y = !y;
        }
        if x == !y {
            return false;
        }
        if x == y {
            return true;
        }

        debug_assert!(x < y && !x.sign());

        // Map 'y' to 'x' while handling signs:
        self.union_find.grow_to(y.gate(), Sig::UNDEF);
        self.union_find[y.gate()] = x ^ y.sign();

        // Create the class for 'x' if needed:
        self.class_map.grow_to(x.gate(), CLASS_UNDEF);
        if self.class_map[x.gate()] == CLASS_UNDEF {
            self.classes.push(vec![x]);
            self.class_map[x.gate()] = self.classes.len() as ClassId - 1;
        }
        let xid = self.class_map[x.gate()] as usize;

        // Extend it with 'y', or with all of 'y's class if 'y' led one:
        self.class_map.grow_to(y.gate(), CLASS_UNDEF);
        let yid = self.class_map[y.gate()];
        if yid == CLASS_UNDEF {
            self.classes[xid].push(y);
        } else {
            let yid = yid as usize;
            let members = std::mem::take(&mut self.classes[yid]);
            self.classes[xid].extend(members);

            // Free the emptied slot by swapping with the last class and
            // re-pointing the displaced class's leader.
            let last = self.classes.len() - 1;
            if last > yid {
                self.classes.swap(yid, last);
                let lead = self.classes[yid][0];
                debug_assert!(!lead.sign());
                self.class_map[lead.gate()] = yid as ClassId;
            }
            self.classes.pop();
        }

        true
    }

    /// Number of (non-trivial) classes.
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Members of class `i`; member 0 is the positive leader.
    pub fn class(&self, i: usize) -> &[Sig] {
        &self.classes[i]
    }

    pub fn clear(&mut self) {
        self.union_find.clear();
        self.class_map.clear();
        self.classes.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sig::{Gate, GateType};

    fn sig(i: u32) -> Sig {
        Sig::positive(Gate::new(i, GateType::Inp))
    }

    #[test]
    fn leader_is_idempotent() {
        let mut e = Equivs::new();
        let (a, b, c) = (sig(1), sig(2), sig(3));
        assert!(e.merge(b, a));
        assert!(e.merge(c, b));
        let l = e.leader(c);
        assert_eq!(e.leader(l), l);
        assert_eq!(l, a);
        assert_eq!(e.leader(b), a);
    }

    #[test]
    fn leader_commutes_with_negation() {
        let mut e = Equivs::new();
        let (a, b) = (sig(1), sig(2));
        assert!(e.merge(!b, a));
        assert_eq!(e.leader(!b), !e.leader(b));
        assert_eq!(e.leader(b), !a);
        assert_eq!(e.leader(!b), a);
    }

    #[test]
    fn merge_unifies_leaders() {
        let mut e = Equivs::new();
        let (a, b, c, d) = (sig(1), sig(2), sig(3), sig(4));
        assert!(e.merge(a, b));
        assert!(e.merge(c, d));
        assert!(e.merge(d, b));
        assert_eq!(e.leader(a), e.leader(b));
        assert_eq!(e.leader(c), e.leader(d));
        assert_eq!(e.leader(a), e.leader(d));
        // Everything collapsed into one class led by the minimum.
        assert_eq!(e.n_classes(), 1);
        assert_eq!(e.class(0)[0], a);
        assert_eq!(e.class(0).len(), 4);
    }

    #[test]
    fn merge_with_own_negation_fails_cleanly() {
        let mut e = Equivs::new();
        let a = sig(1);
        assert!(!e.merge(a, !a));
        assert_eq!(e.n_classes(), 0);
        assert_eq!(e.leader(a), a);

        // Indirectly: a == b, then b == !a must fail.
        let b = sig(2);
        assert!(e.merge(a, b));
        assert!(!e.merge(b, !a));
        assert_eq!(e.leader(b), a);
    }

    #[test]
    fn redundant_merge_is_true() {
        let mut e = Equivs::new();
        let (a, b) = (sig(1), sig(2));
        assert!(e.merge(a, b));
        assert!(e.merge(a, b));
        assert!(e.merge(b, a));
        assert_eq!(e.n_classes(), 1);
        assert_eq!(e.class(0).len(), 2);
    }

    #[test]
    fn signed_merge_polarity_bookkeeping() {
        let mut e = Equivs::new();
        let (a, b, c) = (sig(1), sig(2), sig(3));
        // b == !a, c == b  =>  c == !a.
        assert!(e.merge(b, !a));
        assert!(e.merge(c, b));
        assert_eq!(e.leader(c), !a);
        assert_eq!(e.leader(!c), a);
    }

    #[test]
    fn class_slot_reuse_keeps_map_consistent() {
        let mut e = Equivs::new();
        let (a, b, c, d, x, y) = (sig(1), sig(2), sig(3), sig(4), sig(5), sig(6));
        assert!(e.merge(a, b)); // class 0 led by a
        assert!(e.merge(c, d)); // class 1 led by c
        assert!(e.merge(x, y)); // class 2 led by x
        // Merging c's class into a's frees slot 1; x's class moves there.
        assert!(e.merge(a, c));
        assert_eq!(e.n_classes(), 2);
        assert!(e.merge(x, sig(7)));
        let xc: Vec<Sig> = e.class(1).to_vec();
        assert_eq!(xc[0], x);
        assert_eq!(xc.len(), 3);
    }
}
