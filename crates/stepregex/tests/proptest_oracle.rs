//! Checks the incremental engine against a small independent backtracking
//! matcher: for every (pattern, input) pair the generator produces, stepping
//! the input through [`stepregex::compile`] one byte at a time must agree
//! with whether the input is in the pattern's language, and once no
//! continuation can possibly match, the engine must already have gone loose.

use proptest::prelude::*;
use stepregex::{compile, Step};

/// A tiny regex AST, built directly (not via string parsing) so the oracle
/// and the rendered pattern text are guaranteed to describe the same
/// language. Only literal bytes, concatenation, alternation, and repetition
/// of an always-non-empty unit are generated, which keeps the backtracking
/// oracle below simple and guarantees it terminates.
#[derive(Clone, Debug)]
enum Unit {
    Lit(u8),
    Seq(Vec<u8>),
    Alt(Vec<Unit>),
}

#[derive(Clone, Debug)]
enum Pattern {
    Plain(Unit),
    Star(Unit),
    Plus(Unit),
    Concat(Vec<Pattern>),
}

const ALPHABET: [u8; 3] = [b'a', b'b', b'c'];

fn unit_strategy() -> impl Strategy<Value = Unit> {
    let lit = prop::sample::select(ALPHABET.to_vec()).prop_map(Unit::Lit);
    let seq = prop::collection::vec(prop::sample::select(ALPHABET.to_vec()), 2..4).prop_map(Unit::Seq);
    prop_oneof![
        3 => lit,
        2 => seq,
    ]
}

fn unit_alt_strategy() -> impl Strategy<Value = Unit> {
    prop::collection::vec(unit_strategy(), 2..4).prop_map(Unit::Alt)
}

fn pattern_piece_strategy() -> impl Strategy<Value = Pattern> {
    prop_oneof![
        unit_strategy().prop_map(Pattern::Plain),
        unit_alt_strategy().prop_map(Pattern::Plain),
        unit_strategy().prop_map(Pattern::Star),
        unit_alt_strategy().prop_map(Pattern::Star),
        unit_strategy().prop_map(Pattern::Plus),
        unit_alt_strategy().prop_map(Pattern::Plus),
    ]
}

fn pattern_strategy() -> impl Strategy<Value = Pattern> {
    prop::collection::vec(pattern_piece_strategy(), 1..4).prop_map(Pattern::Concat)
}

fn render_unit(u: &Unit) -> String {
    match u {
        Unit::Lit(c) => (*c as char).to_string(),
        Unit::Seq(bytes) => bytes.iter().map(|&b| b as char).collect(),
        Unit::Alt(alts) => alts.iter().map(render_unit).collect::<Vec<_>>().join("|"),
    }
}

fn render(p: &Pattern) -> String {
    match p {
        Pattern::Plain(u) => match u {
            Unit::Alt(_) => format!("({})", render_unit(u)),
            _ => render_unit(u),
        },
        Pattern::Star(u) => format!("({})*", render_unit(u)),
        Pattern::Plus(u) => format!("({})+", render_unit(u)),
        Pattern::Concat(pieces) => pieces.iter().map(render).collect::<Vec<_>>().join(""),
    }
}

/// Attempts to consume `unit` starting at `pos`, calling `k` at every
/// resulting position and returning true as soon as some continuation
/// succeeds. `unit` always consumes at least one byte.
fn match_unit(unit: &Unit, s: &[u8], pos: usize, k: &dyn Fn(usize) -> bool) -> bool {
    match unit {
        Unit::Lit(c) => pos < s.len() && s[pos] == *c && k(pos + 1),
        Unit::Seq(bytes) => {
            if pos + bytes.len() > s.len() {
                return false;
            }
            if s[pos..pos + bytes.len()] != bytes[..] {
                return false;
            }
            k(pos + bytes.len())
        }
        Unit::Alt(alts) => alts.iter().any(|u| match_unit(u, s, pos, k)),
    }
}

fn match_star(unit: &Unit, s: &[u8], pos: usize, k: &dyn Fn(usize) -> bool) -> bool {
    if k(pos) {
        return true;
    }
    match_unit(unit, s, pos, &|next| next > pos && match_star(unit, s, next, k))
}

fn match_pattern(p: &Pattern, s: &[u8], pos: usize, k: &dyn Fn(usize) -> bool) -> bool {
    match p {
        Pattern::Plain(u) => match_unit(u, s, pos, k),
        Pattern::Star(u) => match_star(u, s, pos, k),
        Pattern::Plus(u) => match_unit(u, s, pos, &|next| match_star(u, s, next, k)),
        Pattern::Concat(pieces) => match_concat(pieces, s, pos, k),
    }
}

fn match_concat(pieces: &[Pattern], s: &[u8], pos: usize, k: &dyn Fn(usize) -> bool) -> bool {
    match pieces.split_first() {
        None => k(pos),
        Some((first, rest)) => match_pattern(first, s, pos, &|next| match_concat(rest, s, next, k)),
    }
}

/// Whether the whole of `s` is in the language of `p`.
fn oracle_accepts(p: &Pattern, s: &[u8]) -> bool {
    match_pattern(p, s, 0, &|pos| pos == s.len())
}

/// Whether any suffix starting anywhere in `0..=s.len()` could still lead to
/// acceptance — i.e. whether some extension of `s` is still in the language.
/// Used to check the engine's loose latch: once this goes false, `step` must
/// never again report anything but `Fail`.
fn oracle_has_live_prefix(p: &Pattern, s: &[u8]) -> bool {
    match_pattern(p, s, 0, &|_pos| true)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(400))]

    #[test]
    fn incremental_engine_agrees_with_backtracking_oracle(
        pattern in pattern_strategy(),
        input in prop::collection::vec(prop::sample::select(ALPHABET.to_vec()), 0..6),
    ) {
        let text = render(&pattern);
        let mut re = compile(&text).unwrap();

        let mut went_loose = false;
        for (i, &b) in input.iter().enumerate() {
            let step = re.step(b);
            if step == Step::Fail {
                went_loose = true;
                prop_assert!(
                    !oracle_has_live_prefix(&pattern, &input[..=i]),
                    "engine failed on {:?} at byte {i} but the oracle still sees a live continuation",
                    text,
                );
                break;
            }
        }

        if !went_loose {
            prop_assert_eq!(re.is_accepted(), oracle_accepts(&pattern, &input), "pattern {:?} input {:?}", text, input);
        }
    }
}
