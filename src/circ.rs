//! The hash-consed And-Inverter Graph.
//!
//! [`Circ`] owns a dense arena of gates and a structural-hash index over the
//! AND gates. Construction goes through [`Circ::mk_inp`] and
//! [`Circ::mk_and`]; the latter simplifies, canonicalizes operand order and
//! deduplicates against the strash, so the live arena is in canonical
//! hash-consed form at all times. Every other component relies on that:
//! for each live AND gate `g`, `lchild(g) < rchild(g)`, neither child is a
//! constant, the children are neither equal nor complementary, and no other
//! AND shares the same `(lchild, rchild)` key.
//!
//! For background on strashing see "Robust boolean reasoning for equivalence
//! checking" by Kuehlmann et al.

use crate::maps::GMap;
use crate::sig::{Gate, GateType, Sig};
use crate::solver::{Lit, SatOracle, Var};

const PAIR_HASH_PRIME: usize = 148_814_101;

/// Bucket-count schedule for the strash table.
const STRASH_PRIMES: [usize; 26] = [
    53, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317, 196613, 393241, 786433,
    1572869, 3145739, 6291469, 12582917, 25165843, 50331653, 100663319, 201326611, 402653189,
    805306457, 1610612741,
];

/// Per-slot storage. The fan-in fields are only meaningful for AND gates:
/// `x == Sig::UNDEF` marks an input slot (and the reserved true slot),
/// `x == Sig::ERROR` marks a freed slot.
#[derive(Debug, Clone, Copy)]
struct GateData {
    strash_next: Gate,
    x: Sig,
    y: Sig,
}

const INPUT_SLOT: GateData = GateData {
    strash_next: Gate::UNDEF,
    x: Sig::UNDEF,
    y: Sig::UNDEF,
};

const FREE_SLOT: GateData = GateData {
    strash_next: Gate::UNDEF,
    x: Sig::ERROR,
    y: Sig::ERROR,
};

/// A combinational circuit as a hash-consed AIG.
pub struct Circ {
    gates: GMap<GateData>,
    n_inps: u32,
    n_ands: u32,
    strash: Vec<Gate>,
    free_ids: Vec<u32>,
    constraints: Vec<Vec<Sig>>,
}

impl Default for Circ {
    fn default() -> Self {
        Circ::new()
    }
}

impl Circ {
    pub fn new() -> Self {
        let mut c = Circ {
            gates: GMap::new(),
            n_inps: 0,
            n_ands: 0,
            strash: Vec::new(),
            free_ids: Vec::new(),
            constraints: Vec::new(),
        };
        // Slot 0 is reserved for the constant-true gate.
        c.gates.grow_to(Gate::TRUE, INPUT_SLOT);
        c.restrash_all();
        c
    }

    /// Number of allocated slots, the constant excluded.
    pub fn size(&self) -> usize {
        self.gates.len() - 1
    }

    /// Number of live AND gates.
    pub fn n_gates(&self) -> usize {
        self.n_ands as usize
    }

    /// Number of live inputs.
    pub fn n_inps(&self) -> usize {
        self.n_inps as usize
    }

    /// Reset to a freshly constructed circuit.
    pub fn clear(&mut self) {
        self.gates.clear();
        self.n_inps = 0;
        self.n_ands = 0;
        self.strash.clear();
        self.free_ids.clear();
        self.constraints.clear();
        self.gates.grow_to(Gate::TRUE, INPUT_SLOT);
        self.restrash_all();
    }

    // ---------------------------------------------------------------------
    // Id allocation:

    fn alloc_id(&mut self) -> u32 {
        if let Some(id) = self.free_ids.pop() {
            return id;
        }
        let id = self.gates.len() as u32;
        self.gates
            .grow_to(Gate::new(id, GateType::Inp), FREE_SLOT);
        id
    }

    /// Return an id to the free list. The slot must not be referenced by any
    /// live gate; rewrites normally reclaim storage wholesale by swapping in
    /// a fresh arena instead.
    #[allow(dead_code)]
    pub(crate) fn free_id(&mut self, id: u32) {
        debug_assert!(id != 0, "the constant slot is never freed");
        let g = Gate::new(id, GateType::Inp);
        debug_assert!(self.gates[g].x == Sig::UNDEF, "only input slots are recycled");
        if self.gates[g].x == Sig::UNDEF {
            self.n_inps -= 1;
        }
        self.gates[g] = FREE_SLOT;
        self.free_ids.push(id);
    }

    fn id_kind(&self, id: u32) -> GateType {
        if self.gates[Gate::new(id, GateType::Inp)].x == Sig::UNDEF {
            GateType::Inp
        } else {
            GateType::And
        }
    }

    fn id_is_free(&self, id: u32) -> bool {
        id != 0 && self.gates[Gate::new(id, GateType::Inp)].x == Sig::ERROR
    }

    fn gate_from_id(&self, id: u32) -> Gate {
        if id == 0 {
            Gate::TRUE
        } else {
            Gate::new(id, self.id_kind(id))
        }
    }

    /// The kind of `g` as recorded by the arena.
    pub fn gtype(&self, g: Gate) -> GateType {
        if g == Gate::TRUE {
            GateType::True
        } else {
            self.id_kind(g.index())
        }
    }

    // ---------------------------------------------------------------------
    // Gate iteration (slot 0 and freed slots are skipped):

    pub fn first_gate(&self) -> Gate {
        self.next_gate(Gate::TRUE)
    }

    pub fn next_gate(&self, g: Gate) -> Gate {
        debug_assert!(g != Gate::UNDEF);
        let mut id = g.index() + 1;
        while (id as usize) < self.gates.len() {
            if !self.id_is_free(id) {
                return self.gate_from_id(id);
            }
            id += 1;
        }
        Gate::UNDEF
    }

    /// The highest allocated gate handle; useful for sizing maps.
    pub fn last_gate(&self) -> Gate {
        self.gate_from_id(self.gates.len() as u32 - 1)
    }

    /// Live gates in increasing id order. Since `mk_and` only ever refers to
    /// existing gates, this order is also bottom-up.
    pub fn iter(&self) -> impl Iterator<Item = Gate> + '_ {
        (1..self.gates.len() as u32)
            .filter(|&id| !self.id_is_free(id))
            .map(|id| self.gate_from_id(id))
    }

    /// Grow a gate map to cover every currently allocated gate.
    pub fn adjust_gmap<T: Clone>(&self, map: &mut GMap<T>, def: T) {
        map.grow_to(self.last_gate(), def);
    }

    // ---------------------------------------------------------------------
    // Node inspection:

    pub fn lchild(&self, g: Gate) -> Sig {
        debug_assert!(self.gtype(g) == GateType::And);
        self.gates[g].x
    }

    pub fn rchild(&self, g: Gate) -> Sig {
        debug_assert!(self.gtype(g) == GateType::And);
        self.gates[g].y
    }

    // ---------------------------------------------------------------------
    // Strash:

    fn gate_hash(&self, x: Sig, y: Sig) -> usize {
        x.index().wrapping_mul(PAIR_HASH_PRIME).wrapping_add(y.index())
    }

    fn strash_find(&self, x: Sig, y: Sig) -> Gate {
        let mut h = self.strash[self.gate_hash(x, y) % self.strash.len()];
        while h != Gate::UNDEF {
            debug_assert!(self.gtype(h) == GateType::And);
            let d = &self.gates[h];
            if d.x == x && d.y == y {
                return h;
            }
            h = d.strash_next;
        }
        Gate::UNDEF
    }

    fn strash_insert(&mut self, g: Gate) {
        debug_assert!(self.gtype(g) == GateType::And);
        let d = self.gates[g];
        debug_assert!(self.strash_find(d.x, d.y) == Gate::UNDEF);
        let pos = self.gate_hash(d.x, d.y) % self.strash.len();
        self.gates[g].strash_next = self.strash[pos];
        self.strash[pos] = g;
    }

    fn restrash_all(&mut self) {
        let old = self.strash.len();
        let cap = STRASH_PRIMES
            .iter()
            .copied()
            .find(|&p| p > old)
            .unwrap_or(*STRASH_PRIMES.last().unwrap());
        log::debug!("restrash: {} -> {} buckets", old, cap);

        self.strash.clear();
        self.strash.resize(cap, Gate::UNDEF);

        let mut g = self.first_gate();
        while g != Gate::UNDEF {
            if self.gtype(g) == GateType::And {
                self.gates[g].strash_next = Gate::UNDEF;
                self.strash_insert(g);
            }
            g = self.next_gate(g);
        }
    }

    // ---------------------------------------------------------------------
    // Node constructors:

    /// Create a fresh primary input. The returned signal is unsigned.
    pub fn mk_inp(&mut self) -> Sig {
        self.n_inps += 1;
        let id = self.alloc_id();
        let g = Gate::new(id, GateType::Inp);
        self.gates[g] = INPUT_SLOT;
        Sig::positive(g)
    }

    /// The signal denoting `x & y`.
    ///
    /// Simplification runs first, then operand order is canonicalized, then
    /// the strash is probed; only if all of that fails is a gate allocated.
    pub fn mk_and(&mut self, mut x: Sig, mut y: Sig) -> Sig {
        // Simplify:
        if x == Sig::TRUE {
            return y;
        } else if y == Sig::TRUE {
            return x;
        } else if x == y {
            return x;
        } else if x == Sig::FALSE || y == Sig::FALSE || x == !y {
            return Sig::FALSE;
        }

        // Order:
        if y < x {
            std::mem::swap(&mut x, &mut y);
        }

        // Strash lookup:
        let mut g = self.strash_find(x, y);
        if g == Gate::UNDEF {
            let id = self.alloc_id();
            g = Gate::new(id, GateType::And);
            self.gates[g] = GateData {
                strash_next: Gate::UNDEF,
                x,
                y,
            };
            self.n_ands += 1;

            if self.n_ands as usize > self.strash.len() / 2 {
                self.restrash_all();
            } else {
                self.strash_insert(g);
            }
        }

        Sig::positive(g)
    }

    pub fn mk_or(&mut self, x: Sig, y: Sig) -> Sig {
        !self.mk_and(!x, !y)
    }

    /// Odd xor form: `(x & !y) | (!x & y)`.
    pub fn mk_xor_odd(&mut self, x: Sig, y: Sig) -> Sig {
        let a = self.mk_and(x, !y);
        let b = self.mk_and(!x, y);
        self.mk_or(a, b)
    }

    /// Even xor form: `(!x | !y) & (x | y)`.
    pub fn mk_xor_even(&mut self, x: Sig, y: Sig) -> Sig {
        let a = self.mk_or(!x, !y);
        let b = self.mk_or(x, y);
        self.mk_and(a, b)
    }

    /// Xor; the even form (the two are logically identical).
    pub fn mk_xor(&mut self, x: Sig, y: Sig) -> Sig {
        self.mk_xor_even(x, y)
    }

    // ---------------------------------------------------------------------
    // Constraint clauses:

    /// Record a clause over signals to be emitted during clausification.
    pub fn constrain(&mut self, clause: Vec<Sig>) {
        self.constraints.push(clause);
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Translate every stored constraint clause whose gates all have a
    /// variable in `vmap` into a solver clause, removing it. Clauses with
    /// unclausified gates are retained for a later pass. Removal is by
    /// swap-with-last, so the stored order is not preserved.
    pub fn add_constraints<S: SatOracle>(&mut self, solver: &mut S, vmap: &GMap<Var>) -> bool {
        let mut i = 0;
        while i < self.constraints.len() {
            let ready = self.constraints[i]
                .iter()
                .all(|s| vmap.has(s.gate()) && vmap[s.gate()] != Var::UNDEF);
            if ready {
                let lits: Vec<Lit> = self.constraints[i]
                    .iter()
                    .map(|s| Lit::new(vmap[s.gate()], s.sign()))
                    .collect();
                solver.add_clause(&lits);
                self.constraints.swap_remove(i);
            } else {
                i += 1;
            }
        }
        solver.okay()
    }
}
