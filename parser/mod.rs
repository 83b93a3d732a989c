//! Parser facade (`spec.md` §5): the public entry point combining the chunk
//! ring, lexer, LR driver, parse tree and attribute engine into one parse.
//!
//! Grounded on the teacher's top-level `Parser`/`ParseContext` split
//! (`source/lib/sherpa-rust-rt/types/parse_context.rs`): one long-lived
//! table bundle shared across parses, one per-parse mutable driving state.

use std::rc::Rc;

use crate::attribute::AttributeEngine;
use crate::driver::{Driver, StepResult};
use crate::error::RuntimeError;
use crate::lexer::Lexer;
use crate::tables::{AttrValue, RuleId, Tables};
use crate::tree::{NodeId, Tree};

/// Sizing knobs for the pools and bounds backing one parse. `spec.md` §4.2,
/// §4.3, §4.6: every pool is pre-sized rather than growing without bound, so
/// a caller can cap the memory and stack depth one parse may use.
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
  /// Objects per stack pack (`spec.md` §4.2).
  pub stack_pack_capacity: usize,
  /// Freed packs kept cached for reuse by the LR stack's pool.
  pub stack_cache_capacity: usize,
  /// Ceiling on LR stack depth; exceeding it is [`RuntimeError::StackOverflow`].
  pub max_stack_depth: usize,
  /// Ceiling on the reduction log; exceeding it is
  /// [`RuntimeError::ReductionLogOverflow`].
  pub max_reduction_log: usize,
  /// Objects per pack in the attribute pool.
  pub attr_pack_capacity: usize,
  /// Freed packs kept cached for reuse by the attribute pool.
  pub attr_cache_capacity: usize,
  /// Ceiling on the attribute engine's worker stack depth during
  /// [`Parser::eval_attr`]; `0` means uncapped. Exceeding it resolves the
  /// offending attribute to an error (`spec.md` §4.8).
  pub attribute_depth_cap: usize,
}

impl Default for ParserConfig {
  fn default() -> Self {
    Self {
      stack_pack_capacity: 64,
      stack_cache_capacity: 4,
      max_stack_depth: 4096,
      max_reduction_log: 65536,
      attr_pack_capacity: 64,
      attr_cache_capacity: 4,
      attribute_depth_cap: 0,
    }
  }
}

/// One parse in progress: owns its own chunk ring, lexer, LR stack, parse
/// tree and attribute storage. Tables are reference-counted and may be
/// shared across multiple, independently-driven `Parser`s.
pub struct Parser {
  tables: Rc<Tables>,
  lexer: Lexer,
  tree: Tree,
  attrs: AttributeEngine,
  driver: Driver,
  attribute_depth_cap: usize,
}

impl Parser {
  pub fn new(tables: Rc<Tables>, config: ParserConfig) -> Self {
    let lexer = Lexer::new(tables.lexer.clone(), crate::chunk::ChunkRing::new());
    let driver = Driver::new(0, config.stack_pack_capacity, config.stack_cache_capacity, config.max_stack_depth, config.max_reduction_log);
    let attrs = AttributeEngine::new(config.attr_pack_capacity, config.attr_cache_capacity);
    Self { tables, lexer, tree: Tree::new(), attrs, driver, attribute_depth_cap: config.attribute_depth_cap }
  }

  /// Appends one chunk of source bytes. `is_last` marks the final chunk of
  /// the input; `cleanup` runs once the chunk (and every token view still
  /// referencing it) is released.
  pub fn feed(
    &mut self,
    data: impl Into<Box<[u8]>>,
    cookie: usize,
    is_last: bool,
    cleanup: impl FnOnce(usize, &[u8]) + 'static,
  ) -> Result<(), RuntimeError> {
    self.lexer.ring_mut().append(data, cookie, is_last, cleanup)
  }

  /// Executes one shift, reduce, or accept/reject decision.
  pub fn step(&mut self) -> Result<StepResult, RuntimeError> {
    self.driver.step(&self.tables, &mut self.lexer, &mut self.tree, &mut self.attrs)
  }

  /// Drives the parse until it accepts, rejects, or needs more input.
  /// `Err(RuntimeError::InputExhausted)` is resumable: `feed` more chunks
  /// and call `run` again.
  pub fn run(&mut self) -> Result<(), RuntimeError> {
    loop {
      match self.step()? {
        StepResult::Accepted => return Ok(()),
        StepResult::Rejected => return Err(RuntimeError::SyntaxError),
        StepResult::Shifted(_) | StepResult::Reduced(_) => continue,
      }
    }
  }

  pub fn accepted(&self) -> bool {
    self.driver.accepted()
  }

  pub fn rejected(&self) -> bool {
    self.driver.rejected()
  }

  /// Drains the reductions performed so far, in rightmost-derivation order.
  pub fn drain_derivation(&mut self) -> Vec<RuleId> {
    self.driver.drain_derivation()
  }

  /// Borrows the parse tree built so far.
  pub fn tree(&self) -> &Tree {
    &self.tree
  }

  /// Consumes the parser, running every node's attribute destructors before
  /// handing back the standalone tree. After this, [`Parser::eval_attr`] is
  /// no longer reachable since the attribute engine is dropped with it.
  pub fn take_tree(mut self) -> Tree {
    self.teardown_attributes();
    std::mem::replace(&mut self.tree, Tree::new())
  }

  fn teardown_attributes(&mut self) {
    for i in 0..self.tree.len() {
      let id = NodeId(i);
      let node = self.tree.node(id);
      let symbol_attrs = self.tables.symbol_attrs(node.symbol);
      self.attrs.teardown_node(node, symbol_attrs);
    }
  }

  /// Looks up and lazily evaluates `name` on `node`'s attributes.
  pub fn eval_attr(&mut self, node: NodeId, name: &str) -> Result<AttrValue, RuntimeError> {
    self.attrs.eval_attr_by_name(&self.tree, &self.tables, node, name, self.attribute_depth_cap)
  }
}

impl Drop for Parser {
  fn drop(&mut self) {
    self.teardown_attributes();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::tests::calc_lex_table;
  use crate::tables::{Action, ActionTable, AttrEvalDescriptor, AttrEvaluator, DepSlotDescriptor, GotoTable, Rule, Symbol};
  use crate::token::EOI_CODE;
  use std::collections::HashMap;
  use std::rc::Rc as StdRc;

  /// `S -> NUMBER`, attribute `value` on `S` copies the token's int value.
  fn tables_with_attrs() -> Tables {
    let mut action = ActionTable::new();
    action.set(0, 1, Action::Shift(1));
    action.set(1, EOI_CODE, Action::Reduce(0));
    action.set(2, EOI_CODE, Action::Accept);
    let mut goto = GotoTable::new();
    goto.set(0, 0, 2);

    let lhs_binding = crate::tables::RuleAttrBinding {
      attr_index: 0,
      descriptor: AttrEvalDescriptor {
        evaluator: AttrEvaluator::Pure(StdRc::new(|deps: &[AttrValue]| {
          let value = match &deps[0] {
            AttrValue::Token(tv) => tv.int_value(10).unwrap_or(0) as f64,
            other => other.as_f64().unwrap_or_default(),
          };
          crate::tables::EvalOutcome::Ok(AttrValue::Float(value))
        })),
        deps: vec![DepSlotDescriptor { symbol_index: 1, attr_index: 0 }],
      },
    };
    let rule = Rule { number: 0, lhs: 0, rhs: vec![Symbol::Terminal(1)], lhs_attrs: vec![lhs_binding], rhs_attrs: vec![vec![]] };

    let mut attrs = HashMap::new();
    attrs.insert(
      Symbol::Terminal(1),
      crate::tables::SymbolAttrs {
        classes: vec![crate::tables::AttrClass { name: "value".into(), kind: crate::tables::AttrKind::Aggregated, destructor: None }],
        default_evaluators: {
          let mut m = HashMap::new();
          m.insert(0, AttrEvalDescriptor { evaluator: AttrEvaluator::GetToken, deps: vec![] });
          m
        },
        names: crate::names::NameFsa::build(&[("value", 0)]),
      },
    );
    attrs.insert(
      Symbol::NonTerminal(0),
      crate::tables::SymbolAttrs {
        classes: vec![crate::tables::AttrClass { name: "value".into(), kind: crate::tables::AttrKind::Aggregated, destructor: None }],
        default_evaluators: HashMap::new(),
        names: crate::names::NameFsa::build(&[("value", 0)]),
      },
    );

    Tables { lexer: calc_lex_table(), action, goto, rules: vec![rule], attrs }
  }

  #[test]
  fn feeds_single_chunk_and_accepts() {
    let tables = StdRc::new(tables_with_attrs());
    let mut parser = Parser::new(tables, ParserConfig::default());
    parser.feed(b"42".to_vec(), 0, true, |_, _| {}).unwrap();
    parser.run().unwrap();
    assert!(parser.accepted());
    assert_eq!(parser.drain_derivation(), vec![0]);
  }

  #[test]
  fn resumes_after_input_exhausted() {
    let tables = StdRc::new(tables_with_attrs());
    let mut parser = Parser::new(tables, ParserConfig::default());
    parser.feed(b"4".to_vec(), 0, false, |_, _| {}).unwrap();
    let err = parser.run().unwrap_err();
    assert_eq!(err, RuntimeError::InputExhausted);
    parser.feed(b"2".to_vec(), 0, true, |_, _| {}).unwrap();
    parser.run().unwrap();
    assert!(parser.accepted());
  }

  #[test]
  fn attribute_propagates_token_numeric_value() {
    let tables = StdRc::new(tables_with_attrs());
    let mut parser = Parser::new(tables, ParserConfig::default());
    parser.feed(b"42".to_vec(), 0, true, |_, _| {}).unwrap();
    parser.run().unwrap();
    let root = parser.tree().root().unwrap();
    let value = parser.eval_attr(root, "value").unwrap();
    assert_eq!(value.as_f64(), Some(42.0));
  }

  #[test]
  fn rejects_invalid_token() {
    let tables = StdRc::new(tables_with_attrs());
    let mut parser = Parser::new(tables, ParserConfig::default());
    parser.feed(b"(".to_vec(), 0, true, |_, _| {}).unwrap();
    assert_eq!(parser.run().unwrap_err(), RuntimeError::SyntaxError);
    assert!(parser.rejected());
  }
}
