//! Attribute Engine (`spec.md` §4.8): lazy, stack-based evaluation of
//! aggregated and inherited attributes over the parse tree, with cycle
//! detection.
//!
//! Grounded on `attr_handle_t`/`attr_eval_descr_t`/`attr_dep_descr_t`
//! (`tlang/c/include/attribute.h`): each node's attribute slots are carved
//! out of a [`crate::pool::PackPool`], same as the C source's own pack-pool
//! backed `attr_handle_t` allocation, and the evaluation order is the same
//! iterative (non-recursive) dependency walk — reworked here as an explicit
//! enter/exit frame stack so cycle detection falls out of one `scheduled`
//! flag per attribute rather than a separate visited-set.

use crate::tables::{AttrEvalDescriptor, AttrEvaluator, AttrValue, DepSlotDescriptor, Rule, Symbol, SymbolAttrs, Tables};
use crate::tree::{NodeId, NodeKind, Tree};
use crate::{error::RuntimeError, pool::PackPool};

/// Resolution state of one attribute (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalStatus {
  #[default]
  Undefined,
  Ok,
  Error,
}

/// Handle to one attribute slot within the engine's pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AttrId {
  pack: usize,
  index: usize,
}

impl AttrId {
  pub(crate) fn pack_start(&self) -> (usize, usize) {
    (self.pack, self.index)
  }

  pub(crate) fn from_pack_start(pack: usize, index: usize) -> Self {
    Self { pack, index }
  }
}

/// One attribute instance on one tree node.
#[derive(Clone, Default)]
pub struct Attribute {
  status: EvalStatus,
  /// Set while this attribute is on the current evaluation path; a repeat
  /// `Enter` while this is set is a genuine dependency cycle.
  scheduled: bool,
  is_reference: bool,
  owner: Option<NodeId>,
  symbol: Option<Symbol>,
  class_index: usize,
  evaluator: Option<AttrEvalDescriptor>,
  deps: Vec<AttrId>,
  value: AttrValue,
}

enum Frame {
  Enter(AttrId, usize),
  Exit(AttrId),
}

/// Owns every attribute slot allocated across a parse's tree.
pub struct AttributeEngine {
  pool: PackPool<Attribute>,
}

impl AttributeEngine {
  pub fn new(pack_capacity: usize, cache_cap: usize) -> Self {
    Self { pool: PackPool::new(pack_capacity, cache_cap) }
  }

  fn get(&self, id: AttrId) -> &Attribute {
    self.pool.get(id.pack, id.index)
  }

  fn get_mut(&mut self, id: AttrId) -> &mut Attribute {
    self.pool.get_mut(id.pack, id.index)
  }

  /// Allocates one attribute slot per class declared for `symbol`, seeded
  /// with that class's default evaluator (if any). Returns the slots in
  /// class order, matching `symbol_attrs.classes`.
  pub fn create_attrs_for_node(&mut self, node: NodeId, symbol: Symbol, symbol_attrs: &SymbolAttrs) -> Vec<AttrId> {
    let n = symbol_attrs.classes.len();
    if n == 0 {
      return Vec::new();
    }
    let range = self.pool.alloc(n);
    self.pool.acquire(range.pack, n);
    (0..n)
      .map(|i| {
        let id = AttrId { pack: range.pack, index: range.start + i };
        *self.get_mut(id) = Attribute {
          status: EvalStatus::Undefined,
          scheduled: false,
          is_reference: false,
          owner: Some(node),
          symbol: Some(symbol),
          class_index: i,
          evaluator: symbol_attrs.default_evaluators.get(&i).cloned(),
          deps: Vec::new(),
          value: AttrValue::None,
        };
        id
      })
      .collect()
  }

  /// Wires the rule-specific evaluators and dependency slots for one
  /// reduction: aggregated attributes on `parent` (from `rule.lhs_attrs`)
  /// and inherited attributes on each RHS child (from `rule.rhs_attrs`),
  /// overriding whatever default evaluator each slot carried.
  ///
  /// `symbol_index` in a [`DepSlotDescriptor`]: `0` is the parent, `1..=k`
  /// index `children_attrs` left to right (`spec.md` §4.8).
  pub fn wire_rule_bindings(&mut self, parent_attrs: &[AttrId], children_attrs: &[Vec<AttrId>], rule: &Rule) {
    for binding in &rule.lhs_attrs {
      let target = parent_attrs[binding.attr_index];
      let deps = Self::resolve_deps(&binding.descriptor.deps, parent_attrs, children_attrs);
      let attr = self.get_mut(target);
      attr.evaluator = Some(binding.descriptor.clone());
      attr.deps = deps;
    }
    for (i, bindings) in rule.rhs_attrs.iter().enumerate() {
      for binding in bindings {
        let target = children_attrs[i][binding.attr_index];
        let deps = Self::resolve_deps(&binding.descriptor.deps, parent_attrs, children_attrs);
        let attr = self.get_mut(target);
        attr.evaluator = Some(binding.descriptor.clone());
        attr.deps = deps;
      }
    }
  }

  fn resolve_deps(descriptors: &[DepSlotDescriptor], parent_attrs: &[AttrId], children_attrs: &[Vec<AttrId>]) -> Vec<AttrId> {
    descriptors
      .iter()
      .map(|d| if d.symbol_index == 0 { parent_attrs[d.attr_index] } else { children_attrs[d.symbol_index - 1][d.attr_index] })
      .collect()
  }

  /// Evaluates `target`, recursively evaluating any unresolved dependency
  /// first. Idempotent: an already-`Ok`/`Error` attribute is returned as-is.
  /// A dependency cycle resolves every attribute on the cycle to `Error`
  /// without invoking any of their evaluators.
  ///
  /// `depth_cap`, if non-zero, bounds the worker stack depth (`spec.md`
  /// §4.8): a dependency chain that would recurse past it resolves to
  /// `Error` at the offending attribute instead of descending further, the
  /// same way a cycle does, guarding against a pathologically deep but
  /// non-cyclic chain.
  pub fn evaluate(&mut self, tree: &Tree, target: AttrId, depth_cap: usize) -> EvalStatus {
    let mut stack = vec![Frame::Enter(target, 1)];
    while let Some(frame) = stack.pop() {
      match frame {
        Frame::Enter(id, depth) => {
          if self.get(id).status != EvalStatus::Undefined {
            continue;
          }
          if self.get(id).scheduled {
            self.get_mut(id).status = EvalStatus::Error;
            continue;
          }
          if depth_cap != 0 && depth > depth_cap {
            self.get_mut(id).status = EvalStatus::Error;
            continue;
          }
          self.get_mut(id).scheduled = true;
          let deps = self.get(id).deps.clone();
          stack.push(Frame::Exit(id));
          for &dep in deps.iter().rev() {
            stack.push(Frame::Enter(dep, depth + 1));
          }
        }
        Frame::Exit(id) => {
          self.get_mut(id).scheduled = false;
          if self.get(id).status != EvalStatus::Undefined {
            // Resolved out-of-band (cycle short-circuit) while deps were
            // being processed.
            continue;
          }
          let deps = self.get(id).deps.clone();
          if deps.iter().any(|&d| self.get(d).status == EvalStatus::Error) {
            self.get_mut(id).status = EvalStatus::Error;
            continue;
          }
          let values: Vec<AttrValue> = deps.iter().map(|&d| self.get(d).value.clone()).collect();
          let outcome = match self.get(id).evaluator.clone() {
            Some(desc) => match desc.evaluator {
              AttrEvaluator::Pure(f) => f(&values),
              AttrEvaluator::GetToken => match self.get(id).owner.map(|n| tree.node(n)) {
                Some(node) => match &node.kind {
                  NodeKind::Terminal { token } => crate::tables::EvalOutcome::Reference(AttrValue::Token(token.clone())),
                  NodeKind::NonTerminal { .. } => crate::tables::EvalOutcome::Error,
                },
                None => crate::tables::EvalOutcome::Error,
              },
            },
            None => crate::tables::EvalOutcome::Undefined,
          };
          let attr = self.get_mut(id);
          match outcome {
            crate::tables::EvalOutcome::Ok(v) => {
              attr.value = v;
              attr.is_reference = false;
              attr.status = EvalStatus::Ok;
            }
            crate::tables::EvalOutcome::Reference(v) => {
              attr.value = v;
              attr.is_reference = true;
              attr.status = EvalStatus::Ok;
            }
            crate::tables::EvalOutcome::Undefined | crate::tables::EvalOutcome::Error => {
              attr.status = EvalStatus::Error;
            }
          }
        }
      }
    }
    self.get(target).status
  }

  /// Resolves `name` against `node`'s symbol attribute table and evaluates
  /// it, returning its value on success.
  pub fn eval_attr_by_name(&mut self, tree: &Tree, tables: &Tables, node: NodeId, name: &str, depth_cap: usize) -> Result<AttrValue, RuntimeError> {
    let n = tree.node(node);
    let symbol_attrs = tables.symbol_attrs(n.symbol);
    let class_index = symbol_attrs
      .names
      .lookup(name)
      .ok_or_else(|| RuntimeError::GeneralError(format!("unknown attribute '{name}'")))?;
    let (pack, start) = n
      .attr_pack
      .ok_or_else(|| RuntimeError::GeneralError("node has no attributes".into()))?;
    let id = AttrId { pack, index: start + class_index };
    match self.evaluate(tree, id, depth_cap) {
      EvalStatus::Ok => Ok(self.get(id).value.clone()),
      EvalStatus::Error => Err(RuntimeError::GeneralError(format!("attribute '{name}' failed to evaluate"))),
      EvalStatus::Undefined => unreachable!("evaluate always leaves a terminal status"),
    }
  }

  /// Runs each `Ok`, non-reference attribute's class destructor once, then
  /// releases the node's attribute slots back to the pool. `spec.md` §4.8:
  /// reference-valued attributes are never destructed by their holder.
  pub fn teardown_node(&mut self, node: &crate::tree::Node, symbol_attrs: &SymbolAttrs) {
    if let Some((pack, start)) = node.attr_pack {
      let n = symbol_attrs.classes.len();
      for i in 0..n {
        let id = AttrId { pack, index: start + i };
        let attr = self.get(id);
        if attr.status == EvalStatus::Ok && !attr.is_reference {
          if let Some(destructor) = &symbol_attrs.classes[i].destructor {
            destructor(&attr.value);
          }
        }
      }
      self.pool.unref(pack, n);
    }
  }
}
