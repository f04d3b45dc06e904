//! Dense gate- and signal-indexed maps and sets.
//!
//! A gate map is a plain vector indexed by gate id with grow-on-demand
//! semantics: `grow_to(g, def)` guarantees `map[g]` can be indexed
//! afterwards. The set types remember insertion order (which is what makes
//! [`GSet`] usable as a bottom-up schedule) and clear in time proportional
//! to their size.

use std::ops::{Index, IndexMut};

use crate::sig::{Gate, Sig};

/// A dense map from gates to `T`.
#[derive(Debug, Clone)]
pub struct GMap<T> {
    data: Vec<T>,
}

impl<T> Default for GMap<T> {
    fn default() -> Self {
        GMap { data: Vec::new() }
    }
}

impl<T: Clone> GMap<T> {
    pub fn new() -> Self {
        GMap { data: Vec::new() }
    }

    /// Ensure `self[g]` is indexable, filling new slots with `def`.
    pub fn grow_to(&mut self, g: Gate, def: T) {
        let n = g.index() as usize + 1;
        if self.data.len() < n {
            self.data.resize(n, def);
        }
    }

    /// Whether `g` is within the map's current bounds.
    pub fn has(&self, g: Gate) -> bool {
        (g.index() as usize) < self.data.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl<T> Index<Gate> for GMap<T> {
    type Output = T;

    fn index(&self, g: Gate) -> &T {
        &self.data[g.index() as usize]
    }
}

impl<T> IndexMut<Gate> for GMap<T> {
    fn index_mut(&mut self, g: Gate) -> &mut T {
        &mut self.data[g.index() as usize]
    }
}

/// A dense map from signals to `T`. `s` and `!s` are distinct keys.
#[derive(Debug, Clone)]
pub struct SMap<T> {
    data: Vec<T>,
}

impl<T> Default for SMap<T> {
    fn default() -> Self {
        SMap { data: Vec::new() }
    }
}

impl<T: Clone> SMap<T> {
    pub fn new() -> Self {
        SMap { data: Vec::new() }
    }

    pub fn grow_to(&mut self, s: Sig, def: T) {
        let n = s.index() + 1;
        if self.data.len() < n {
            self.data.resize(n, def);
        }
    }

    pub fn has(&self, s: Sig) -> bool {
        s.index() < self.data.len()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl<T> Index<Sig> for SMap<T> {
    type Output = T;

    fn index(&self, s: Sig) -> &T {
        &self.data[s.index()]
    }
}

impl<T> IndexMut<Sig> for SMap<T> {
    fn index_mut(&mut self, s: Sig) -> &mut T {
        &mut self.data[s.index()]
    }
}

/// An insertion-ordered set of gates.
#[derive(Debug, Clone, Default)]
pub struct GSet {
    in_set: GMap<bool>,
    gates: Vec<Gate>,
}

impl GSet {
    pub fn new() -> Self {
        GSet::default()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn insert(&mut self, g: Gate) {
        self.in_set.grow_to(g, false);
        if !self.in_set[g] {
            self.in_set[g] = true;
            self.gates.push(g);
        }
    }

    pub fn has(&self, g: Gate) -> bool {
        self.in_set.has(g) && self.in_set[g]
    }

    pub fn iter(&self) -> impl Iterator<Item = Gate> + '_ {
        self.gates.iter().copied()
    }

    pub fn clear(&mut self) {
        for &g in &self.gates {
            self.in_set[g] = false;
        }
        self.gates.clear();
    }
}

impl Index<usize> for GSet {
    type Output = Gate;

    fn index(&self, i: usize) -> &Gate {
        &self.gates[i]
    }
}

/// An insertion-ordered set of signals (`s` and `!s` are distinct members).
#[derive(Debug, Clone, Default)]
pub struct SSet {
    in_set: SMap<bool>,
    sigs: Vec<Sig>,
}

impl SSet {
    pub fn new() -> Self {
        SSet::default()
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    pub fn insert(&mut self, s: Sig) {
        self.in_set.grow_to(s, false);
        if !self.in_set[s] {
            self.in_set[s] = true;
            self.sigs.push(s);
        }
    }

    pub fn has(&self, s: Sig) -> bool {
        self.in_set.has(s) && self.in_set[s]
    }

    pub fn iter(&self) -> impl Iterator<Item = Sig> + '_ {
        self.sigs.iter().copied()
    }

    pub fn clear(&mut self) {
        for &s in &self.sigs {
            self.in_set[s] = false;
        }
        self.sigs.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sig::GateType;

    #[test]
    fn gmap_grow_and_index() {
        let mut m: GMap<u32> = GMap::new();
        let g = Gate::new(4, GateType::Inp);
        assert!(!m.has(g));
        m.grow_to(g, 7);
        assert!(m.has(g));
        assert_eq!(m[g], 7);
        m[g] = 9;
        assert_eq!(m[g], 9);
        // Growing never shrinks or overwrites.
        m.grow_to(Gate::new(2, GateType::Inp), 0);
        assert_eq!(m[g], 9);
    }

    #[test]
    fn gset_order_and_clear() {
        let mut s = GSet::new();
        let a = Gate::new(3, GateType::And);
        let b = Gate::new(1, GateType::Inp);
        s.insert(a);
        s.insert(b);
        s.insert(a);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0], a);
        assert_eq!(s[1], b);
        assert!(s.has(a));
        s.clear();
        assert!(!s.has(a));
        assert_eq!(s.len(), 0);
        s.insert(b);
        assert!(s.has(b));
    }

    #[test]
    fn sset_signed_membership() {
        let mut s = SSet::new();
        let x = Sig::positive(Gate::new(2, GateType::And));
        s.insert(x);
        assert!(s.has(x));
        assert!(!s.has(!x));
        s.insert(!x);
        assert_eq!(s.len(), 2);
    }
}
