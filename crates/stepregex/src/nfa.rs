//! Thompson-construction of a non-deterministic automaton from the parsed
//! [`Ast`](crate::parser::Ast).
//!
//! States live in a flat arena (`Vec<NfaState>`) and reference each other by
//! index rather than by pointer, so the `*`/`+` back-edges that would be
//! self-referential in an owned-pointer tree are just indices pointing
//! backwards into the same `Vec`.

use crate::parser::Ast;

pub const BYTE_MASK: u32 = 0x0000_00FF;
pub const FLAG_ANY: u32 = 0x0000_0100;
pub const FLAG_FINAL: u32 = 0x0000_0200;
pub const FLAG_EPSILON: u32 = 0x0000_0400;

#[derive(Clone, Copy, Debug)]
pub struct NfaState {
    pub next1: Option<usize>,
    pub next2: Option<usize>,
    pub tok: u32,
}

impl NfaState {
    fn new(next1: Option<usize>, next2: Option<usize>, tok: u32) -> Self {
        Self { next1, next2, tok }
    }
}

/// Owns every NFA state ever allocated while compiling one pattern.
#[derive(Debug, Default)]
pub struct NfaArena {
    pub states: Vec<NfaState>,
}

impl NfaArena {
    fn push(&mut self, s: NfaState) -> usize {
        self.states.push(s);
        self.states.len() - 1
    }

    /// Compiles `ast` into a fragment, returning its (initial, final) state indices.
    pub fn compile(&mut self, ast: &Ast) -> (usize, usize) {
        match ast {
            Ast::Token(byte) => {
                let final_idx = self.push(NfaState::new(None, None, FLAG_FINAL));
                let init_idx = self.push(NfaState::new(Some(final_idx), None, u32::from(*byte)));
                (init_idx, final_idx)
            }
            Ast::Any => {
                let final_idx = self.push(NfaState::new(None, None, FLAG_FINAL));
                let init_idx = self.push(NfaState::new(Some(final_idx), None, FLAG_ANY));
                (init_idx, final_idx)
            }
            Ast::Group { chars, negate } => self.compile_group(chars, *negate),
            Ast::And(a, b) => {
                let (init1, final1) = self.compile(a);
                let (init2, final2) = self.compile(b);
                // splice final1 into init2: final1 adopts init2's transition
                // so the fragment boundary disappears without an extra hop.
                let merged = self.states[init2];
                self.states[final1] = merged;
                (init1, final2)
            }
            Ast::Or(a, b) => {
                let (init1, final1) = self.compile(a);
                let (init2, final2) = self.compile(b);
                self.states[final1] = NfaState::new(Some(final2), None, FLAG_EPSILON);
                let init = self.push(NfaState::new(Some(init1), Some(init2), FLAG_EPSILON));
                (init, final2)
            }
            Ast::Option(a) => {
                let (init1, final1) = self.compile(a);
                let init = self.push(NfaState::new(Some(init1), Some(final1), FLAG_EPSILON));
                (init, final1)
            }
            Ast::Repeat(a) => {
                let (init1, final1) = self.compile(a);
                let final_idx = self.push(NfaState::new(None, None, FLAG_FINAL));
                let init_idx = self.push(NfaState::new(Some(init1), Some(final_idx), FLAG_EPSILON));
                self.states[final1] = NfaState::new(Some(final_idx), Some(init1), FLAG_EPSILON);
                (init_idx, final_idx)
            }
            Ast::RepeatOnce(a) => {
                let (init1, final1) = self.compile(a);
                let final_idx = self.push(NfaState::new(None, None, FLAG_FINAL));
                self.states[final1] = NfaState::new(Some(init1), Some(final_idx), FLAG_EPSILON);
                (init1, final_idx)
            }
        }
    }

    fn compile_group(&mut self, chars: &[u8], negate: bool) -> (usize, usize) {
        let members: Vec<u8> = if negate {
            (0u8..=255).filter(|b| !chars.contains(b)).collect()
        } else {
            chars.to_vec()
        };
        debug_assert!(!members.is_empty(), "character class matches no byte");
        let mut final_idx = self.push(NfaState::new(None, None, FLAG_FINAL));
        let mut init_idx = self.push(NfaState::new(Some(final_idx), None, u32::from(members[0])));
        for &byte in &members[1..] {
            self.states[final_idx] = NfaState::new(None, None, FLAG_EPSILON);
            let next_final = self.push(NfaState::new(None, None, FLAG_FINAL));
            let state = self.push(NfaState::new(Some(next_final), None, u32::from(byte)));
            let branch = self.push(NfaState::new(Some(state), Some(init_idx), FLAG_EPSILON));
            self.states[final_idx].next1 = Some(next_final);
            init_idx = branch;
            final_idx = next_final;
        }
        (init_idx, final_idx)
    }
}
