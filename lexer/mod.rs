//! Lexer FSA (`spec.md` §4.4): longest-match union-FSA segmenter producing
//! token candidates.
//!
//! Grounded on `la_status_t`/`la_item_t` (`tlang/c/include/lexical_analyser.h`)
//! for the status/candidate shape and on `fsa.h` for the state/branch/accept
//! table layout. Scoped to a byte alphabet rather than decoded Unicode
//! codepoints (see `SPEC_FULL.md` §4) — branches are `u8` intervals.

use std::rc::Rc;

use crate::chunk::ChunkRing;
use crate::error::LexError;
use crate::tables::TerminalCode;
use crate::token::{Position, TokenView, EOI_CODE};

/// An inclusive byte interval `[lo, hi]` labelling one FSA branch.
#[derive(Debug, Clone, Copy)]
pub struct ByteRange {
  pub lo: u8,
  pub hi: u8,
}

impl ByteRange {
  pub fn single(b: u8) -> Self {
    Self { lo: b, hi: b }
  }

  pub fn contains(&self, b: u8) -> bool {
    self.lo <= b && b <= self.hi
  }
}

/// One outgoing branch of a lexer FSA state.
pub struct Branch {
  pub range: ByteRange,
  pub target: u32,
}

/// One lexer FSA state: its outgoing branches and the terminal codes it
/// accepts (a state may accept more than one code, for overlapping
/// terminals).
pub struct LexState {
  pub branches: Vec<Branch>,
  pub accepts: Vec<TerminalCode>,
}

/// The union FSA recognising all terminal symbols: states, per-state
/// branches, per-state accepted terminal codes (`spec.md` §3).
pub struct LexTable {
  pub states: Vec<LexState>,
  pub root: u32,
}

impl LexTable {
  fn step(&self, state: u32, byte: u8) -> Option<u32> {
    self.states[state as usize].branches.iter().find(|b| b.range.contains(byte)).map(|b| b.target)
  }

  fn accepts(&self, state: u32) -> &[TerminalCode] {
    &self.states[state as usize].accepts
  }
}

/// One potential token at the current cursor: the longest match seen so far
/// for its terminal code during this scan (`spec.md` GLOSSARY).
#[derive(Debug, Clone)]
pub struct Candidate {
  pub code: TerminalCode,
  pub start_offset: u64,
  pub length: u64,
  pub start: Position,
  pub end: Position,
}

/// The candidate set for one scan attempt, ordered by the position at which
/// each terminal's accepting state was first entered (`spec.md` §4.4: "the
/// order in which their accepting states were entered (and later
/// re-entered), not length"). A re-entry of an already-seen code updates its
/// `Candidate` in place without moving its position in the order — that
/// recorded order is also the driver's tie-break (`spec.md` §4.6 step 2).
#[derive(Debug, Default)]
pub struct CandidateList(Vec<Candidate>);

impl CandidateList {
  fn new() -> Self {
    Self(Vec::new())
  }

  fn record(&mut self, candidate: Candidate) {
    match self.0.iter_mut().find(|c| c.code == candidate.code) {
      Some(slot) => *slot = candidate,
      None => self.0.push(candidate),
    }
  }

  pub fn get(&self, code: TerminalCode) -> Option<&Candidate> {
    self.0.iter().find(|c| c.code == code)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  fn clear(&mut self) {
    self.0.clear();
  }

  /// Iterates candidates in FSA-accept-entry order, the driver's tie-break.
  pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
    self.0.iter()
  }
}

/// Result of [`Lexer::get_candidates`].
pub enum LexOutcome<'a> {
  Candidates(&'a CandidateList),
  EndOfInput,
}

/// Current scan phase, `spec.md` §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Scanning,
  HaveCandidates,
  InputExhausted,
  Invalid,
  Eof,
}

/// The longest-match union-FSA segmenter. Owns the chunk ring it reads from.
pub struct Lexer {
  table: Rc<LexTable>,
  ring: ChunkRing,
  phase: Phase,
  candidates: CandidateList,
  /// Running cursor at the *start* of the current scan attempt.
  offset: u64,
  pos: Position,
  /// FSA state reached so far in the current scan attempt.
  fsa_state: u32,
  /// Cursor reached so far in the current scan attempt (may be ahead of
  /// `offset` when resuming after `InputExhausted`).
  scan_offset: u64,
  scan_pos: Position,
  /// True once at least one accepting state has been visited during the
  /// current scan attempt — a later dead end then commits candidates
  /// instead of failing (`spec.md` §4.4 invariant (b)).
  any_accepted: bool,
  /// Distinguishes "paused mid-token on exhaustion" from "restart at root".
  segmentation_interrupt: bool,
}

impl Lexer {
  pub fn new(table: Rc<LexTable>, ring: ChunkRing) -> Self {
    let root = table.root;
    Self {
      table,
      ring,
      phase: Phase::Scanning,
      candidates: CandidateList::new(),
      offset: 0,
      pos: Position { line: 1, column: 1 },
      fsa_state: root,
      scan_offset: 0,
      scan_pos: Position { line: 1, column: 1 },
      any_accepted: false,
      segmentation_interrupt: false,
    }
  }

  pub fn ring_mut(&mut self) -> &mut ChunkRing {
    &mut self.ring
  }

  /// Locates the chunk and intra-chunk offset for a given absolute byte
  /// offset, starting the search from the ring head.
  fn locate(&self, offset: u64) -> Option<(Rc<crate::chunk::Chunk>, usize)> {
    let mut cur = self.ring.head()?;
    loop {
      let base = cur.base_offset();
      if offset < base + cur.len() as u64 || (offset == base + cur.len() as u64 && cur.is_last()) {
        return Some((cur, (offset - base) as usize));
      }
      cur = cur.next()?;
    }
  }

  fn byte_at(&self, offset: u64) -> Option<u8> {
    let (chunk, off) = self.locate(offset)?;
    chunk.data().get(off).copied()
  }

  fn is_eof_reachable(&self, offset: u64) -> bool {
    if !self.ring.is_last_seen() {
      return false;
    }
    // True once `offset` is at or past every byte the ring currently holds.
    self.byte_at(offset).is_none()
  }

  fn advance_position(pos: &mut Position, byte: u8) {
    if byte == b'\n' {
      pos.line += 1;
      pos.column = 1;
    } else {
      pos.column += 1;
    }
  }

  /// Produces either a non-empty candidate set, or signals that more input
  /// is needed, that no terminal matched, or that end-of-input was reached.
  pub fn get_candidates(&mut self) -> Result<LexOutcome<'_>, LexError> {
    if self.phase == Phase::Eof {
      return Ok(LexOutcome::EndOfInput);
    }
    if self.phase == Phase::HaveCandidates {
      return Ok(LexOutcome::Candidates(&self.candidates));
    }
    if self.phase == Phase::Invalid {
      return Err(LexError::Invalid);
    }
    loop {
      match self.byte_at(self.scan_offset) {
        Some(byte) => {
          self.segmentation_interrupt = false;
          match self.table.step(self.fsa_state, byte) {
            Some(next) => {
              let mut next_pos = self.scan_pos;
              Self::advance_position(&mut next_pos, byte);
              self.scan_offset += 1;
              self.fsa_state = next;
              self.scan_pos = next_pos;
              for &code in self.table.accepts(next) {
                self.any_accepted = true;
                self.candidates.record(Candidate {
                  code,
                  start_offset: self.offset,
                  length: self.scan_offset - self.offset,
                  start: self.pos,
                  end: self.scan_pos,
                });
              }
              continue;
            }
            None => {
              // Dead end.
              if self.candidates.is_empty() {
                self.phase = Phase::Invalid;
                return Err(LexError::Invalid);
              }
              self.phase = Phase::HaveCandidates;
              return Ok(LexOutcome::Candidates(&self.candidates));
            }
          }
        }
        None => {
          if self.is_eof_reachable(self.scan_offset) {
            if self.any_accepted || !self.candidates.is_empty() {
              self.phase = Phase::HaveCandidates;
              return Ok(LexOutcome::Candidates(&self.candidates));
            }
            if self.scan_offset == self.offset {
              self.phase = Phase::Eof;
              return Ok(LexOutcome::EndOfInput);
            }
            self.phase = Phase::Invalid;
            return Err(LexError::Invalid);
          }
          self.phase = Phase::InputExhausted;
          self.segmentation_interrupt = true;
          return Err(LexError::InputExhausted);
        }
      }
    }
  }

  /// Looks up a specific candidate by terminal code, without mutating scan
  /// state. Only meaningful after a successful [`Lexer::get_candidates`].
  pub fn get_candidate(&self, code: TerminalCode) -> Option<&Candidate> {
    self.candidates.get(code)
  }

  /// Commits the candidate for `code`: advances the cursor past its bytes,
  /// releases chunks fully behind the new cursor, and resets the FSA to
  /// its root for the next token.
  pub fn consume(&mut self, code: TerminalCode) -> Result<TokenView, LexError> {
    if self.phase != Phase::HaveCandidates {
      return Err(LexError::GeneralError("consume called without pending candidates".into()));
    }
    let candidate = self
      .candidates
      .get(code)
      .cloned()
      .ok_or_else(|| LexError::GeneralError(format!("no candidate for code {code}")))?;

    let (first_chunk, offset_in_chunk) = self
      .locate(candidate.start_offset)
      .ok_or_else(|| LexError::GeneralError("candidate start offset not resolvable".into()))?;

    let end_offset = candidate.start_offset + candidate.length;
    let view = if (offset_in_chunk as u64 + candidate.length) <= first_chunk.len() as u64 {
      TokenView::single(code, candidate.start_offset, candidate.length, candidate.start, first_chunk.clone(), offset_in_chunk)
    } else {
      TokenView::spanning(code, candidate.start_offset, candidate.length, candidate.start, first_chunk.clone(), offset_in_chunk)
    };

    self.offset = end_offset;
    self.pos = candidate.end;
    self.scan_offset = end_offset;
    self.scan_pos = candidate.end;
    self.fsa_state = self.table.root;
    self.candidates.clear();
    self.any_accepted = false;
    self.segmentation_interrupt = false;
    self.phase = Phase::Scanning;

    if let Some((chunk, _)) = self.locate(end_offset) {
      self.ring.release_before(&chunk);
    }

    Ok(view)
  }

  /// Synthesises the singleton end-of-input token once all chunks are
  /// consumed and `is_last` was observed.
  pub fn end_of_input_token(&self) -> TokenView {
    TokenView::end_of_input(self.offset, self.pos)
  }

  pub fn is_interrupted(&self) -> bool {
    self.segmentation_interrupt
  }
}
