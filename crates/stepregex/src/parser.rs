//! Hand-written LL(1) parser for the pattern grammar:
//!
//! ```text
//! E -> T ('|' T)*
//! T -> F+
//! F -> Atom ('?' | '*' | '+')*
//! Atom -> '(' E ')' | '.' | Char | '[' Group ']'
//! ```
//!
//! Patterns operate on raw bytes, not Unicode scalars: a pattern byte string
//! and the stream it is matched against are both treated as ASCII/byte
//! sequences, one byte per token.

use crate::error::RegexError;

const SPECIAL: &[u8] = b"()|+*?[]^";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Tok {
    byte: u8,
    escaped: bool,
}

impl Tok {
    fn is_special(self) -> bool {
        !self.escaped && SPECIAL.contains(&self.byte)
    }
}

struct Tokenizer<'a> {
    s: &'a [u8],
    i: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(s: &'a [u8]) -> Self {
        Self { s, i: 0 }
    }

    fn peek(&self) -> Result<Option<Tok>, RegexError> {
        if self.i >= self.s.len() {
            return Ok(None);
        }
        if self.s[self.i] == b'\\' {
            if self.i + 1 >= self.s.len() {
                return Err(RegexError::DanglingEscape);
            }
            return Ok(Some(Tok {
                byte: self.s[self.i + 1],
                escaped: true,
            }));
        }
        Ok(Some(Tok {
            byte: self.s[self.i],
            escaped: false,
        }))
    }

    fn advance(&mut self) -> Result<Option<Tok>, RegexError> {
        let tok = self.peek()?;
        if let Some(t) = tok {
            self.i += if t.escaped { 2 } else { 1 };
        }
        Ok(tok)
    }
}

/// Abstract syntax tree for a compiled pattern, consumed by `crate::nfa`.
#[derive(Debug, Clone)]
pub enum Ast {
    Token(u8),
    Any,
    Group { chars: Vec<u8>, negate: bool },
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Option(Box<Ast>),
    Repeat(Box<Ast>),
    RepeatOnce(Box<Ast>),
}

/// Parses a pattern string into an [`Ast`].
pub fn parse(pattern: &str) -> Result<Ast, RegexError> {
    let mut t = Tokenizer::new(pattern.as_bytes());
    let ast = parse_e(&mut t)?;
    match t.peek()? {
        None => Ok(ast),
        Some(tok) => Err(unexpected(tok)),
    }
}

fn unexpected(tok: Tok) -> RegexError {
    RegexError::UnexpectedToken {
        found: (tok.byte as char).to_string(),
    }
}

fn starts_atom(tok: Option<Tok>) -> bool {
    match tok {
        None => false,
        Some(t) => t.byte == b'[' || t.byte == b'(' || t.byte == b'.' || !t.is_special(),
    }
}

// E -> T ('|' T)*
fn parse_e(t: &mut Tokenizer) -> Result<Ast, RegexError> {
    let peeked = t.peek()?;
    if !starts_atom(peeked) {
        return Err(match peeked {
            Some(tok) => unexpected(tok),
            None => RegexError::UnexpectedEnd,
        });
    }
    let mut expr = parse_t(t)?;
    while let Some(tok) = t.peek()? {
        if tok.byte == b'|' && !tok.escaped {
            t.advance()?;
            let rhs = parse_t(t)?;
            expr = Ast::Or(Box::new(expr), Box::new(rhs));
        } else {
            break;
        }
    }
    Ok(expr)
}

// T -> F+
fn parse_t(t: &mut Tokenizer) -> Result<Ast, RegexError> {
    let peeked = t.peek()?;
    if !starts_atom(peeked) {
        return Err(match peeked {
            Some(tok) => unexpected(tok),
            None => RegexError::UnexpectedEnd,
        });
    }
    let mut expr = parse_f(t)?;
    while starts_atom(t.peek()?) {
        let rhs = parse_f(t)?;
        expr = Ast::And(Box::new(expr), Box::new(rhs));
    }
    Ok(expr)
}

// F -> Atom ('?' | '*' | '+')*
fn parse_f(t: &mut Tokenizer) -> Result<Ast, RegexError> {
    let atom = parse_atom(t)?;
    Ok(parse_postfix(t, atom)?)
}

fn parse_postfix(t: &mut Tokenizer, expr: Ast) -> Result<Ast, RegexError> {
    match t.peek()? {
        Some(tok) if tok.byte == b'?' && !tok.escaped => {
            t.advance()?;
            Ok(Ast::Option(Box::new(parse_postfix(t, expr)?)))
        }
        Some(tok) if tok.byte == b'*' && !tok.escaped => {
            t.advance()?;
            Ok(Ast::Repeat(Box::new(parse_postfix(t, expr)?)))
        }
        Some(tok) if tok.byte == b'+' && !tok.escaped => {
            t.advance()?;
            Ok(Ast::RepeatOnce(Box::new(parse_postfix(t, expr)?)))
        }
        _ => Ok(expr),
    }
}

fn parse_atom(t: &mut Tokenizer) -> Result<Ast, RegexError> {
    match t.peek()? {
        Some(tok) if tok.byte == b'(' && !tok.escaped => {
            t.advance()?;
            let inner = parse_e(t)?;
            match t.peek()? {
                Some(close) if close.byte == b')' && !close.escaped => {
                    t.advance()?;
                    Ok(inner)
                }
                _ => Err(RegexError::UnclosedGroup),
            }
        }
        Some(tok) if tok.byte == b'.' && !tok.escaped => {
            t.advance()?;
            Ok(Ast::Any)
        }
        Some(tok) if tok.byte == b'[' && !tok.escaped => {
            t.advance()?;
            let group = parse_group(t)?;
            match t.peek()? {
                Some(close) if close.byte == b']' && !close.escaped => {
                    t.advance()?;
                    Ok(group)
                }
                _ => Err(RegexError::UnclosedClass),
            }
        }
        Some(tok) if !tok.is_special() => {
            t.advance()?;
            Ok(Ast::Token(tok.byte))
        }
        Some(tok) => Err(unexpected(tok)),
        None => Err(RegexError::UnexpectedEnd),
    }
}

// Group -> '^'? <member> ('-' <member>)? Group'
fn parse_group(t: &mut Tokenizer) -> Result<Ast, RegexError> {
    let negate = match t.peek()? {
        Some(tok) if tok.byte == b'^' && !tok.escaped => {
            t.advance()?;
            true
        }
        _ => false,
    };
    let first = next_member(t)?;
    let chars = parse_group_rest(t, first)?;
    Ok(Ast::Group { chars, negate })
}

fn next_member(t: &mut Tokenizer) -> Result<u8, RegexError> {
    match t.advance()? {
        Some(tok) => Ok(tok.byte),
        None => Err(RegexError::UnexpectedEnd),
    }
}

fn is_class_end(tok: Option<Tok>) -> bool {
    matches!(tok, None) || matches!(tok, Some(t) if t.byte == b']' && !t.escaped)
}

// mirrors the legacy reference's G2: either a single member, a `a-z` range,
// or the terminal `-` member when a class ends with a bare hyphen.
fn parse_group_rest(t: &mut Tokenizer, pred: u8) -> Result<Vec<u8>, RegexError> {
    match t.peek()? {
        Some(tok) if tok.byte == b'-' && !tok.escaped => {
            t.advance()?;
            if is_class_end(t.peek()?) {
                return Ok(vec![pred, b'-']);
            }
            let high = next_member(t)?;
            if pred > high {
                return Err(RegexError::InvertedRange { low: pred, high });
            }
            let mut range: Vec<u8> = (pred..=high).collect();
            if !is_class_end(t.peek()?) {
                let next_pred = next_member(t)?;
                range.extend(parse_group_rest(t, next_pred)?);
            }
            Ok(range)
        }
        other if !is_class_end(other) => {
            let next_pred = next_member(t)?;
            let mut out = vec![pred];
            out.extend(parse_group_rest(t, next_pred)?);
            Ok(out)
        }
        _ => Ok(vec![pred]),
    }
}
