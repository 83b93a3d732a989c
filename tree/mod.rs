//! Parse Tree (`spec.md` §4.7): the optional rightmost-derivation tree built
//! incrementally as the LR driver shifts and reduces.
//!
//! Grounded on `ptree_node_t`/`ptree_ntnode_t`/`ptree_tnode_t`
//! (`tlang/c/include/ptree.h`) for the node shape, reworked as an arena of
//! `Node` values addressed by [`NodeId`] rather than a pointer-linked tree —
//! idiomatic for a tree built strictly bottom-up with no re-parenting after a
//! node's siblings are fixed. The original's "previous sibling pointer
//! doubles as last-child pointer on the parent" trick is replaced by an
//! explicit `last_child` field; see `SPEC_FULL.md` §9 for why
//! `ptree_ntnode_rule`'s inverted condition (`is_nonterminal(node) ? NULL :
//! ntnode.rule`) is not reproduced here — non-terminal nodes simply own their
//! rule number.

use crate::tables::{RuleId, Symbol};
use crate::token::TokenView;

/// Arena index into a [`Tree`]. Stable for the lifetime of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Node-kind-specific payload.
pub enum NodeKind {
  Terminal { token: TokenView },
  NonTerminal { rule: RuleId },
}

/// One parse-tree node. Children are held as a singly-linked sibling list
/// reachable from `first_child`/`last_child` (`spec.md` §4.7).
pub struct Node {
  pub symbol: Symbol,
  pub kind: NodeKind,
  pub parent: Option<NodeId>,
  pub first_child: Option<NodeId>,
  pub last_child: Option<NodeId>,
  pub next_sibling: Option<NodeId>,
  pub prev_sibling: Option<NodeId>,
  pub child_count: usize,
  /// Index of this node's attribute pack in the attribute engine's pool, set
  /// once attributes are created for it. `None` until then.
  pub attr_pack: Option<(usize, usize)>,
}

/// Arena-backed parse tree. Nodes are appended, never removed individually —
/// the whole arena is dropped together at parser teardown.
#[derive(Default)]
pub struct Tree {
  nodes: Vec<Node>,
  root: Option<NodeId>,
}

impl Tree {
  pub fn new() -> Self {
    Self { nodes: Vec::new(), root: None }
  }

  pub fn node(&self, id: NodeId) -> &Node {
    &self.nodes[id.0]
  }

  pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
    &mut self.nodes[id.0]
  }

  pub fn root(&self) -> Option<NodeId> {
    self.root
  }

  pub(crate) fn set_root(&mut self, id: NodeId) {
    self.root = Some(id);
  }

  /// Creates a fresh, parentless terminal leaf from a shifted token.
  pub fn push_terminal(&mut self, code: i32, token: TokenView) -> NodeId {
    let id = NodeId(self.nodes.len());
    self.nodes.push(Node {
      symbol: Symbol::Terminal(code),
      kind: NodeKind::Terminal { token },
      parent: None,
      first_child: None,
      last_child: None,
      next_sibling: None,
      prev_sibling: None,
      child_count: 0,
      attr_pack: None,
    });
    id
  }

  /// Creates a fresh, parentless non-terminal node for a reduction, with no
  /// children attached yet.
  pub fn push_nonterminal(&mut self, lhs: crate::tables::NonTerminalIndex, rule: RuleId) -> NodeId {
    let id = NodeId(self.nodes.len());
    self.nodes.push(Node {
      symbol: Symbol::NonTerminal(lhs),
      kind: NodeKind::NonTerminal { rule },
      parent: None,
      first_child: None,
      last_child: None,
      next_sibling: None,
      prev_sibling: None,
      child_count: 0,
      attr_pack: None,
    });
    id
  }

  /// Appends `child` as the new last child of `parent`. `child` must
  /// currently be parentless (true of every node produced by a shift or a
  /// reduce before it's attached, `spec.md` §4.7 invariant).
  pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
    debug_assert!(self.nodes[child.0].parent.is_none(), "child already attached");
    let prev_last = self.nodes[parent.0].last_child;
    self.nodes[child.0].parent = Some(parent);
    self.nodes[child.0].prev_sibling = prev_last;
    match prev_last {
      Some(last) => self.nodes[last.0].next_sibling = Some(child),
      None => self.nodes[parent.0].first_child = Some(child),
    }
    self.nodes[parent.0].last_child = Some(child);
    self.nodes[parent.0].child_count += 1;
  }

  /// In-order children of `node`.
  pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    let mut cur = self.nodes[node.0].first_child;
    std::iter::from_fn(move || {
      let next = cur?;
      cur = self.nodes[next.0].next_sibling;
      Some(next)
    })
  }

  pub fn child_count(&self, node: NodeId) -> usize {
    self.nodes[node.0].child_count
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
