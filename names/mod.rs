//! Name FSA (`spec.md` §4.8, §3): maps a symbol's attribute names to their
//! indices in that symbol's attribute list.
//!
//! Grounded on `attr_name_fsa_node_t`/`attr_name_fsa_branch_t`
//! (`tlang/c/include/attribute.h`): a trie keyed by character, branches
//! ordered so binary search is admissible. The original C node is a *union*
//! of inner/leaf representations reached via a distinguished `'\0'` edge
//! (so "val" being a prefix of "value" doesn't get confused with "val"
//! itself being a valid name); we get the same disambiguation more directly
//! by storing the index on the trie node itself rather than modelling an
//! explicit null-byte child, since Rust's `Option` already expresses
//! "this prefix is also a complete name" without an extra edge.

#[derive(Default)]
struct TrieNode {
  /// Children ordered by character, enabling binary search.
  children: Vec<(u8, TrieNode)>,
  /// Attribute index, if this node is also the end of a valid name.
  index: Option<usize>,
}

impl TrieNode {
  fn insert(&mut self, name: &[u8], index: usize) {
    match name.split_first() {
      None => self.index = Some(index),
      Some((&b, rest)) => {
        let pos = self.children.binary_search_by_key(&b, |(c, _)| *c);
        let child = match pos {
          Ok(i) => &mut self.children[i].1,
          Err(i) => {
            self.children.insert(i, (b, TrieNode::default()));
            &mut self.children[i].1
          }
        };
        child.insert(rest, index);
      }
    }
  }

  fn lookup(&self, name: &[u8]) -> Option<usize> {
    match name.split_first() {
      None => self.index,
      Some((&b, rest)) => {
        let i = self.children.binary_search_by_key(&b, |(c, _)| *c).ok()?;
        self.children[i].1.lookup(rest)
      }
    }
  }
}

/// Trie-FSA mapping attribute names to per-symbol indices.
#[derive(Default)]
pub struct NameFsa {
  root: TrieNode,
}

impl NameFsa {
  /// Builds a name FSA from `(name, attribute index)` pairs for one symbol.
  pub fn build(entries: &[(&str, usize)]) -> Self {
    let mut root = TrieNode::default();
    for &(name, index) in entries {
      root.insert(name.as_bytes(), index);
    }
    Self { root }
  }

  /// Resolves `name` to an attribute index, if it names a valid attribute.
  pub fn lookup(&self, name: &str) -> Option<usize> {
    self.root.lookup(name.as_bytes())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolves_exact_and_distinguishes_prefixes() {
    let fsa = NameFsa::build(&[("val", 0), ("value", 1), ("other", 2)]);
    assert_eq!(fsa.lookup("val"), Some(0));
    assert_eq!(fsa.lookup("value"), Some(1));
    assert_eq!(fsa.lookup("other"), Some(2));
    assert_eq!(fsa.lookup("va"), None);
    assert_eq!(fsa.lookup("values"), None);
    assert_eq!(fsa.lookup("nope"), None);
  }

  #[test]
  fn empty_fsa_resolves_nothing() {
    let fsa = NameFsa::build(&[]);
    assert_eq!(fsa.lookup("anything"), None);
  }
}
