//! LR(1) Driver (`spec.md` §4.6): drives the parse stack against the
//! action/goto tables, producing shifts, reductions, the accept state, or a
//! syntax error, and feeding the parse tree and attribute engine as it goes.
//!
//! Grounded on the teacher's bytecode-interpreted LR driver
//! (`source/lib/sherpa-rust-rt/types/parse_action.rs`) for the
//! shift/reduce/accept action shape, reworked to interpret table data
//! directly (`spec.md` is explicit that table generation and bytecode
//! execution are out of scope) rather than dispatch on compiled opcodes.

use crate::attribute::AttributeEngine;
use crate::error::{LexError, RuntimeError};
use crate::lexer::{CandidateList, LexOutcome, Lexer};
use crate::pool::BoundedStack;
use crate::tables::{Action, RuleId, StateId, Symbol, Tables, TerminalCode};
use crate::token::EOI_CODE;
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone, Copy, Default)]
struct StackEntry {
  state: StateId,
  node: Option<NodeId>,
}

/// Outcome of one driver step.
#[derive(Debug, Clone, Copy)]
pub enum StepResult {
  Shifted(TerminalCode),
  Reduced(RuleId),
  Accepted,
  /// No table entry existed for the current `(state, lookahead)` pair.
  Rejected,
}

/// Drives one parse: owns the LR stack, the reduction log, and the running
/// lookahead cache.
pub struct Driver {
  stack: BoundedStack<StackEntry>,
  reduction_log: Vec<RuleId>,
  max_log: usize,
  accepted: bool,
  rejected: bool,
}

impl Driver {
  pub fn new(start_state: StateId, stack_pack_capacity: usize, stack_cache_cap: usize, max_depth: usize, max_log: usize) -> Self {
    let mut stack = BoundedStack::new(stack_pack_capacity, stack_cache_cap, max_depth);
    stack.push(StackEntry { state: start_state, node: None }).expect("max_depth must be at least 1");
    Self { stack, reduction_log: Vec::new(), max_log, accepted: false, rejected: false }
  }

  pub fn accepted(&self) -> bool {
    self.accepted
  }

  pub fn rejected(&self) -> bool {
    self.rejected
  }

  /// The reduction log accumulated so far, in the order reductions were
  /// performed. `spec.md` §4.6: the rightmost derivation is this sequence
  /// reversed.
  pub fn reduction_log(&self) -> &[RuleId] {
    &self.reduction_log
  }

  /// Takes the reduction log accumulated so far and reverses it into
  /// rightmost-derivation order, leaving the log empty for subsequent
  /// reductions (`spec.md` §4.6).
  pub fn drain_derivation(&mut self) -> Vec<RuleId> {
    let mut log = std::mem::take(&mut self.reduction_log);
    log.reverse();
    log
  }

  /// Chooses which of the lexer's current candidates to act on: the first
  /// one, in FSA-accept-entry order, that has a defined action in `state`
  /// (`spec.md` §4.6 step 2 — "scan the candidate list in order", the same
  /// order §4.4 defines for the candidate set itself).
  fn select_action(tables: &Tables, state: StateId, candidates: &CandidateList) -> Option<(TerminalCode, Action)> {
    candidates.iter().find_map(|c| tables.action.get(state, c.code).map(|a| (c.code, a)))
  }

  fn top_state(&self) -> StateId {
    self.stack.top().expect("stack is never empty").state
  }

  /// Executes one shift, reduce, or accept. Returns `Ok(StepResult::Rejected)`
  /// rather than an error so callers can still inspect the derivation/tree
  /// built so far before giving up, matching `spec.md` §4.6's "terminal for
  /// this parse; the derivation produced so far remains valid".
  pub fn step(&mut self, tables: &Tables, lexer: &mut Lexer, tree: &mut Tree, attrs: &mut AttributeEngine) -> Result<StepResult, RuntimeError> {
    if self.accepted || self.rejected {
      return Ok(if self.accepted { StepResult::Accepted } else { StepResult::Rejected });
    }

    let state = self.top_state();
    let selection = match lexer.get_candidates() {
      Ok(LexOutcome::Candidates(candidates)) => Self::select_action(tables, state, candidates),
      Ok(LexOutcome::EndOfInput) => tables.action.get(state, EOI_CODE).map(|a| (EOI_CODE, a)),
      Err(LexError::InputExhausted) => return Err(RuntimeError::InputExhausted),
      Err(other) => return Err(other.into()),
    };

    let (code, action) = match selection {
      Some(pair) => pair,
      None => {
        self.rejected = true;
        return Ok(StepResult::Rejected);
      }
    };

    match action {
      Action::Shift(next) => {
        let token = if code == EOI_CODE { lexer.end_of_input_token() } else { lexer.consume(code)? };
        let node = tree.push_terminal(code, token);
        let symbol_attrs = tables.symbol_attrs(Symbol::Terminal(code));
        let attr_ids = attrs.create_attrs_for_node(node, Symbol::Terminal(code), symbol_attrs);
        if let Some((pack, start)) = attr_ids.first().map(|id| id.pack_start()) {
          tree.node_mut(node).attr_pack = Some((pack, start));
        }
        self.stack.push(StackEntry { state: next, node: Some(node) }).map_err(|_| RuntimeError::StackOverflow)?;
        Ok(StepResult::Shifted(code))
      }
      Action::Reduce(rule_id) => {
        let rule = tables.rule(rule_id);
        let rhs_len = rule.rhs_len();
        let mut children = Vec::with_capacity(rhs_len);
        for _ in 0..rhs_len {
          let entry = self.stack.pop().expect("reduce popped past stack bottom");
          children.push(entry.node.expect("non-bottom stack entries always carry a node"));
        }
        children.reverse();

        let under_state = self.top_state();
        let next_state = tables
          .goto
          .get(under_state, rule.lhs)
          .ok_or_else(|| RuntimeError::GeneralError(format!("no goto for state {under_state}, nonterminal {}", rule.lhs)))?;

        let parent = tree.push_nonterminal(rule.lhs, rule_id);
        for &child in &children {
          tree.append_child(parent, child);
        }

        let symbol_attrs = tables.symbol_attrs(Symbol::NonTerminal(rule.lhs));
        let parent_attrs = attrs.create_attrs_for_node(parent, Symbol::NonTerminal(rule.lhs), symbol_attrs);
        if let Some((pack, start)) = parent_attrs.first().map(|id| id.pack_start()) {
          tree.node_mut(parent).attr_pack = Some((pack, start));
        }
        let children_attrs: Vec<Vec<crate::attribute::AttrId>> = children
          .iter()
          .map(|&child| {
            let n = tree.node(child);
            match n.attr_pack {
              Some((pack, start)) => {
                let count = match n.symbol {
                  Symbol::Terminal(t) => tables.symbol_attrs(Symbol::Terminal(t)).classes.len(),
                  Symbol::NonTerminal(nt) => tables.symbol_attrs(Symbol::NonTerminal(nt)).classes.len(),
                };
                (0..count).map(|i| crate::attribute::AttrId::from_pack_start(pack, start + i)).collect()
              }
              None => Vec::new(),
            }
          })
          .collect();
        attrs.wire_rule_bindings(&parent_attrs, &children_attrs, rule);

        if self.reduction_log.len() >= self.max_log {
          return Err(RuntimeError::ReductionLogOverflow);
        }
        self.reduction_log.push(rule_id);

        self.stack.push(StackEntry { state: next_state, node: Some(parent) }).map_err(|_| RuntimeError::StackOverflow)?;
        Ok(StepResult::Reduced(rule_id))
      }
      Action::Accept => {
        let top = self.stack.top().expect("stack non-empty").node;
        if let Some(root) = top {
          tree.set_root(root);
        }
        self.accepted = true;
        Ok(StepResult::Accepted)
      }
    }
  }
}
