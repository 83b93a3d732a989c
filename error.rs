//! Error and status taxonomy shared by the lexer, driver and attribute engine.
//!
//! Mirrors `spec.md` §7: a flat enum with manual `Display`, no `thiserror` —
//! this matches the teacher crate's own hand-rolled error type rather than
//! reaching for a derive macro the teacher's runtime layer never uses.

use std::fmt::{self, Display};

/// Top-level status returned at the lexer/parser boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
  /// More input is required before this operation can make progress. Resumable:
  /// feed another chunk and retry.
  InputExhausted,
  /// No valid shift/reduce action existed for the current state and lookahead.
  /// Terminal for this parse; the derivation produced so far remains valid.
  SyntaxError,
  /// Configured LR stack depth was reached.
  StackOverflow,
  /// Configured reduction-log capacity was reached.
  ReductionLogOverflow,
  /// Allocation or other internal failure — including a goto table returning
  /// a null-target on a reduce, which can only happen if a table was
  /// hand-built incorrectly, since a correctly generated table never reaches
  /// a reduce it cannot goto from. Terminal; the parser must be discarded
  /// after this is observed.
  GeneralError(String),
}

impl Display for RuntimeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RuntimeError::InputExhausted => f.write_str("input exhausted"),
      RuntimeError::SyntaxError => f.write_str("syntax error"),
      RuntimeError::StackOverflow => f.write_str("parser stack overflow"),
      RuntimeError::ReductionLogOverflow => f.write_str("reduction log overflow"),
      RuntimeError::GeneralError(msg) => write!(f, "general error: {msg}"),
    }
  }
}

impl std::error::Error for RuntimeError {}

impl From<&str> for RuntimeError {
  fn from(msg: &str) -> Self {
    RuntimeError::GeneralError(msg.to_string())
  }
}

impl From<String> for RuntimeError {
  fn from(msg: String) -> Self {
    RuntimeError::GeneralError(msg)
  }
}

/// Status returned by the lexer FSA on each scan step. `spec.md` §4.4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
  /// More chunks are needed to resolve the current scan position.
  InputExhausted,
  /// No accepting state was visited before a dead end.
  Invalid,
  /// Allocation failure during chunk join or candidate table update.
  GeneralError(String),
}

impl Display for LexError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LexError::InputExhausted => f.write_str("lexer input exhausted"),
      LexError::Invalid => f.write_str("no terminal matched at this position"),
      LexError::GeneralError(msg) => write!(f, "lexer general error: {msg}"),
    }
  }
}

impl std::error::Error for LexError {}

/// Maps a lexer status 1:1 onto the parser boundary, except that
/// [`LexError::Invalid`] becomes [`RuntimeError::SyntaxError`] (`spec.md` §7).
impl From<LexError> for RuntimeError {
  fn from(err: LexError) -> Self {
    match err {
      LexError::InputExhausted => RuntimeError::InputExhausted,
      LexError::Invalid => RuntimeError::SyntaxError,
      LexError::GeneralError(msg) => RuntimeError::GeneralError(msg),
    }
  }
}

/// Status of a token-to-numeric conversion (`spec.md` §4.5). Local to the
/// conversion call; never affects parser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericError {
  UnsupportedBase,
  Empty,
  PrematureEnd,
  InvalidCharacter,
  InvalidFormat,
  Error,
}

impl Display for NumericError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      NumericError::UnsupportedBase => "unsupported base",
      NumericError::Empty => "empty token",
      NumericError::PrematureEnd => "premature end of token",
      NumericError::InvalidCharacter => "invalid character",
      NumericError::InvalidFormat => "invalid format",
      NumericError::Error => "error",
    };
    f.write_str(s)
  }
}

impl std::error::Error for NumericError {}
