//! Grammar tables (`spec.md` §3): the read-only, shareable data a [`Tables`]
//! bundle supplies at parser construction — action/goto/rule tables and the
//! attribute grammar. The lexer's own FSA table lives in [`crate::lexer`]
//! since it is scanned by a different state machine.
//!
//! Grounded on `attr_class_descr_t`/`attr_eval_descr_t`/`attr_dep_descr_t`
//! (`tlang/c/include/attribute.h`) for the attribute side, and on the
//! teacher's `ParseAction`/goto-table conventions
//! (`source/lib/sherpa-rust-rt/types/parse_action.rs`) for the action side —
//! reworked as owned Rust enums/maps instead of packed bytecode words, since
//! this crate interprets tables directly rather than executing bytecode.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::lexer::LexTable;
use crate::token::TokenView;

pub type StateId = u32;
pub type RuleId = u32;
pub type NonTerminalIndex = u32;
pub type TerminalCode = i32;
pub type AttrIndex = usize;

/// A grammar symbol: either a terminal (by reserved/user code) or a
/// non-terminal (by table index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
  Terminal(TerminalCode),
  NonTerminal(NonTerminalIndex),
}

/// One LR(1) action. `spec.md` §3: "indexed by `(state, terminal_code)` ->
/// one of {Shift(next), Reduce(rule), Accept, Reject}."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Shift(StateId),
  Reduce(RuleId),
  Accept,
}

/// `(state, terminal_code) -> Action`. Absence of an entry means *reject*.
#[derive(Default)]
pub struct ActionTable {
  entries: HashMap<(StateId, TerminalCode), Action>,
}

impl ActionTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, state: StateId, code: TerminalCode, action: Action) -> &mut Self {
    self.entries.insert((state, code), action);
    self
  }

  pub fn get(&self, state: StateId, code: TerminalCode) -> Option<Action> {
    self.entries.get(&(state, code)).copied()
  }
}

/// `(state, nonterminal_index) -> next state`. A missing entry is the
/// *null-target* sentinel: it must never be reached in a valid parse.
#[derive(Default)]
pub struct GotoTable {
  entries: HashMap<(StateId, NonTerminalIndex), StateId>,
}

impl GotoTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, state: StateId, nonterminal: NonTerminalIndex, next: StateId) -> &mut Self {
    self.entries.insert((state, nonterminal), next);
    self
  }

  pub fn get(&self, state: StateId, nonterminal: NonTerminalIndex) -> Option<StateId> {
    self.entries.get(&(state, nonterminal)).copied()
  }
}

/// A dependency slot descriptor: `symbol_index = 0` means "LHS = parent",
/// `1..=k` index children left to right (`spec.md` §4.8).
#[derive(Debug, Clone, Copy)]
pub struct DepSlotDescriptor {
  pub symbol_index: usize,
  pub attr_index: AttrIndex,
}

/// Evaluation outcome (`spec.md` §6.2, §4.8 built-ins).
#[derive(Clone)]
pub enum EvalOutcome {
  /// Evaluation succeeded; the value is owned and will be destructed by the
  /// class destructor at tree teardown.
  Ok(AttrValue),
  /// Like `Ok`, but the value is a borrowed alias (the *is-reference*
  /// flag): no destructor runs for it.
  Reference(AttrValue),
  /// Evaluation could not proceed (e.g. a dependency not resolved).
  Undefined,
  /// Evaluation failed.
  Error,
}

/// A rule- or symbol-specific evaluator: `(target, deps) -> status`,
/// `spec.md` §6.2. `deps` are the already-evaluated dependency values, in
/// the same order as the owning [`AttrEvalDescriptor`]'s `deps` list.
pub type Evaluator = Rc<dyn Fn(&[AttrValue]) -> EvalOutcome>;

/// Either a user/generator-supplied evaluator or one of the two built-ins
/// the runtime must provide regardless of table content (`spec.md` §4.8):
/// `get_token` (zero-arity, terminal-only) and `reference(x)` (unary).
#[derive(Clone)]
pub enum AttrEvaluator {
  Pure(Evaluator),
  /// Yields the token view of the owning terminal node. Only valid on
  /// terminal-node attributes.
  GetToken,
}

impl AttrEvaluator {
  /// The `reference(x)` built-in: copies `deps[0]` and marks the result as
  /// a borrowed reference.
  pub fn reference() -> Self {
    AttrEvaluator::Pure(Rc::new(|deps: &[AttrValue]| {
      EvalOutcome::Reference(deps.first().cloned().unwrap_or(AttrValue::None))
    }))
  }
}

/// A rule- or symbol-specific evaluator plus the dependency slots it needs
/// resolved before it can run.
#[derive(Clone)]
pub struct AttrEvalDescriptor {
  pub evaluator: AttrEvaluator,
  pub deps: Vec<DepSlotDescriptor>,
}

/// One attribute binding within a [`Rule`]: which attribute (on the LHS, for
/// aggregated attributes, or on one RHS position, for inherited attributes)
/// gets this rule-specific evaluator and dependency wiring.
#[derive(Clone)]
pub struct RuleAttrBinding {
  pub attr_index: AttrIndex,
  pub descriptor: AttrEvalDescriptor,
}

/// Per rule: `{number, LHS nonterminal, RHS symbols, optional per-rule LHS
/// attribute evaluators, per-position optional RHS attribute evaluators for
/// inherited attributes}` (`spec.md` §3).
pub struct Rule {
  pub number: RuleId,
  pub lhs: NonTerminalIndex,
  pub rhs: Vec<Symbol>,
  pub lhs_attrs: Vec<RuleAttrBinding>,
  pub rhs_attrs: Vec<Vec<RuleAttrBinding>>,
}

impl Rule {
  pub fn rhs_len(&self) -> usize {
    self.rhs.len()
  }
}

/// Attribute type: whether it resolves from descendants (aggregated) or
/// from parent/siblings (inherited). `spec.md` GLOSSARY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
  Aggregated,
  Inherited,
}

/// Value destructor for an attribute class — run once at tree teardown for
/// every attribute that evaluated `Ok` and is not a reference.
pub type AttrDestructor = Rc<dyn Fn(&AttrValue)>;

/// Static per-attribute descriptor shared by every node of one symbol.
#[derive(Clone)]
pub struct AttrClass {
  pub name: String,
  pub kind: AttrKind,
  pub destructor: Option<AttrDestructor>,
}

/// Per-symbol attribute table: `{attribute class list, default evaluator
/// list, name-to-index FSA}` (`spec.md` §3).
///
/// Invariant (`spec.md` §3): aggregated attributes appear before inherited
/// attributes in `classes`.
pub struct SymbolAttrs {
  pub classes: Vec<AttrClass>,
  pub default_evaluators: HashMap<AttrIndex, AttrEvalDescriptor>,
  pub names: crate::names::NameFsa,
}

impl SymbolAttrs {
  pub fn empty() -> Self {
    Self { classes: Vec::new(), default_evaluators: HashMap::new(), names: crate::names::NameFsa::build(&[]) }
  }

  pub fn aggregated_count(&self) -> usize {
    self.classes.iter().take_while(|c| c.kind == AttrKind::Aggregated).count()
  }
}

/// Tagged variant over the value types the attribute grammar can produce.
/// `spec.md` §9: a target-native replacement for the C source's
/// `void*` + caller-owned destructor pointer.
#[derive(Clone)]
pub enum AttrValue {
  None,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(Rc<str>),
  Token(TokenView),
  Node(crate::tree::NodeId),
  List(Rc<Vec<AttrValue>>),
  Custom(Rc<dyn std::any::Any>),
}

impl fmt::Debug for AttrValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AttrValue::None => write!(f, "None"),
      AttrValue::Bool(b) => write!(f, "Bool({b})"),
      AttrValue::Int(i) => write!(f, "Int({i})"),
      AttrValue::Float(v) => write!(f, "Float({v})"),
      AttrValue::Str(s) => write!(f, "Str({s:?})"),
      AttrValue::Token(t) => write!(f, "Token({t:?})"),
      AttrValue::Node(n) => write!(f, "Node({n:?})"),
      AttrValue::List(l) => write!(f, "List(len={})", l.len()),
      AttrValue::Custom(_) => write!(f, "Custom"),
    }
  }
}

impl Default for AttrValue {
  fn default() -> Self {
    AttrValue::None
  }
}

impl AttrValue {
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      AttrValue::Float(v) => Some(*v),
      AttrValue::Int(i) => Some(*i as f64),
      _ => None,
    }
  }
}

/// All grammar tables bundled at parser construction, shareable (`Rc`)
/// across parses over the same grammar.
pub struct Tables {
  pub lexer: Rc<LexTable>,
  pub action: ActionTable,
  pub goto: GotoTable,
  pub rules: Vec<Rule>,
  /// Indexed by [`Symbol`]; terminals and non-terminals share one map keyed
  /// by the `Symbol` enum so both kinds of attribute tables live together.
  pub attrs: HashMap<Symbol, SymbolAttrs>,
}

impl Tables {
  pub fn rule(&self, id: RuleId) -> &Rule {
    &self.rules[id as usize]
  }

  pub fn symbol_attrs(&self, symbol: Symbol) -> &SymbolAttrs {
    self.attrs.get(&symbol).unwrap_or(&EMPTY_ATTRS)
  }
}

// A `'static` fallback used when a symbol carries no attributes at all.
static EMPTY_ATTRS: once_empty::Lazy = once_empty::Lazy;

/// Tiny helper providing a `'static SymbolAttrs` without pulling in a
/// lazy-static dependency the teacher crate itself never needed.
mod once_empty {
  use super::SymbolAttrs;
  use std::ops::Deref;
  use std::sync::OnceLock;

  pub struct Lazy;
  static CELL: OnceLock<SymbolAttrs> = OnceLock::new();

  impl Deref for Lazy {
    type Target = SymbolAttrs;
    fn deref(&self) -> &SymbolAttrs {
      CELL.get_or_init(SymbolAttrs::empty)
    }
  }
}
