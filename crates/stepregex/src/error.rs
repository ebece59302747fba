use thiserror::Error;

/// Errors raised while compiling a pattern string into a [`crate::Regex`].
///
/// Matching itself never fails: an unrecognised byte sequence is reported
/// through [`crate::Step::Fail`], not through this type.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RegexError {
    /// The pattern ended where at least one more token was expected.
    #[error("pattern ended unexpectedly")]
    UnexpectedEnd,
    /// A token appeared where the grammar did not allow one.
    #[error("syntax error near '{found}'")]
    UnexpectedToken {
        /// The offending byte, rendered for display.
        found: String,
    },
    /// A trailing `\` had no byte left to escape.
    #[error("'\\' cannot be placed at the end of the pattern")]
    DanglingEscape,
    /// A `(` was never matched by a closing `)`.
    #[error("syntax error: ')' missing")]
    UnclosedGroup,
    /// A `[` was never matched by a closing `]`.
    #[error("syntax error: ']' missing")]
    UnclosedClass,
    /// A character class range such as `[z-a]` had its bounds reversed.
    #[error("bad character interval [{low}-{high}]")]
    InvertedRange {
        /// Lower bound byte of the malformed range.
        low: u8,
        /// Upper bound byte of the malformed range.
        high: u8,
    },
}
