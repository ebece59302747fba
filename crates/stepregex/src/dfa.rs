//! Lazy subset construction: deterministic states are built on demand from
//! sets of NFA states, and interned by their sorted NFA-state-index key so
//! two paths that reach the same set of possibilities collapse onto the same
//! deterministic state.

use std::collections::{BTreeMap, VecDeque};

use crate::nfa::{NfaArena, BYTE_MASK, FLAG_ANY, FLAG_EPSILON, FLAG_FINAL};

#[derive(Debug, Clone)]
pub struct DState {
    pub trans: Vec<Option<usize>>,
    pub is_final: bool,
    pub ndstates: Vec<usize>,
}

impl DState {
    fn new(ndstates: Vec<usize>, is_final: bool) -> Self {
        Self {
            trans: vec![None; 256],
            is_final,
            ndstates,
        }
    }
}

/// Epsilon-closure of a set of NFA state indices: every state reachable via
/// epsilon transitions, plus whether the closure contains a final state.
pub fn eclosure(arena: &NfaArena, initial: &[usize]) -> (Vec<usize>, bool) {
    let mut seen = std::collections::HashSet::new();
    let mut queue = VecDeque::new();
    let mut closure = Vec::new();
    let mut has_final = false;

    for &s in initial {
        if seen.insert(s) {
            queue.push_back(s);
        }
    }
    while let Some(s) = queue.pop_front() {
        closure.push(s);
        let st = arena.states[s];
        if st.tok & FLAG_FINAL != 0 {
            has_final = true;
        } else if st.tok & FLAG_EPSILON != 0 {
            if let Some(n1) = st.next1 {
                if seen.insert(n1) {
                    queue.push_back(n1);
                }
            }
            if let Some(n2) = st.next2 {
                if seen.insert(n2) {
                    queue.push_back(n2);
                }
            }
        }
    }
    closure.sort_unstable();
    (closure, has_final)
}

/// Holds every deterministic state discovered so far plus the interning
/// table keyed by NFA-state-set.
pub struct DfaTable {
    pub states: Vec<DState>,
    pub intern: BTreeMap<Vec<usize>, usize>,
}

impl DfaTable {
    pub fn new(arena: &NfaArena, nfa_begin: usize) -> (Self, usize) {
        let (closure, has_final) = eclosure(arena, &[nfa_begin]);
        let mut intern = BTreeMap::new();
        intern.insert(closure.clone(), 0);
        let states = vec![DState::new(closure, has_final)];
        (Self { states, intern }, 0)
    }

    /// Advances from `current` on byte `c`, building and interning a new
    /// deterministic state the first time this NFA-state-set is reached.
    /// Returns `None` if no NFA state in `current`'s set can consume `c`.
    pub fn step(&mut self, arena: &NfaArena, current: usize, c: u8) -> Option<usize> {
        if let Some(next) = self.states[current].trans[c as usize] {
            return Some(next);
        }
        let mut reachable = Vec::new();
        for &s in &self.states[current].ndstates {
            let st = arena.states[s];
            let consumes_epsilon = st.tok & FLAG_EPSILON != 0;
            let matches = !consumes_epsilon
                && ((st.tok & FLAG_ANY != 0) || (st.tok & BYTE_MASK) == u32::from(c));
            if matches {
                if let Some(n1) = st.next1 {
                    reachable.push(n1);
                }
            }
        }
        if reachable.is_empty() {
            return None;
        }
        let (closure, has_final) = eclosure(arena, &reachable);
        let next_id = match self.intern.get(&closure) {
            Some(&id) => id,
            None => {
                let id = self.states.len();
                self.states.push(DState::new(closure.clone(), has_final));
                self.intern.insert(closure, id);
                id
            }
        };
        self.states[current].trans[c as usize] = Some(next_id);
        Some(next_id)
    }
}
