//! Prefix tree over the vocabulary, keyed by UTF-16 code units.
//!
//! Edges are individual UTF-16 code units rather than code points, so a
//! character outside the BMP contributes two edges (its surrogate halves).
//! Nodes live in a flat arena; child edges are indices into it. Dropping the
//! trie drops the arena.
//!
//! The trie is built once from a frozen vocabulary and is read-only
//! afterward. `longest_prefix` may resume from any interior node, which is
//! what lets WordPiece continue a word from the "##" subtree.

use std::collections::HashMap;

use crate::vocab::TokenId;

#[derive(Debug, Default)]
struct TrieNode {
    /// Terminal token id. Set iff the path from the root spells a
    /// vocabulary entry exactly.
    id: Option<TokenId>,
    children: HashMap<u16, usize>,
}

/// Handle to a node inside the trie arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(usize);

#[derive(Debug)]
pub struct Trie {
    nodes: Vec<TrieNode>,
}

impl Trie {
    /// Build a trie over `vocab`; entry `i` becomes terminal id `i`.
    pub fn build(vocab: &[String]) -> Self {
        let mut trie = Self {
            nodes: vec![TrieNode::default()],
        };
        for (id, token) in vocab.iter().enumerate() {
            trie.insert(token, id as TokenId);
        }
        trie
    }

    fn insert(&mut self, token: &str, id: TokenId) {
        if token.is_empty() {
            return;
        }
        let mut cur = 0;
        for unit in token.encode_utf16() {
            cur = match self.nodes[cur].children.get(&unit) {
                Some(&next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[cur].children.insert(unit, next);
                    next
                }
            };
        }
        // first-inserted id wins
        if self.nodes[cur].id.is_none() {
            self.nodes[cur].id = Some(id);
        }
    }

    pub fn root(&self) -> NodeRef {
        NodeRef(0)
    }

    /// Descend from `from` along `units`. `None` if any transition is missing
    /// or `units` is empty. The reached node need not be terminal.
    pub fn node(&self, from: NodeRef, units: &[u16]) -> Option<NodeRef> {
        if units.is_empty() {
            return None;
        }
        let mut cur = from.0;
        for unit in units {
            cur = *self.nodes[cur].children.get(unit)?;
        }
        Some(NodeRef(cur))
    }

    /// [`node`](Self::node) taking a string, descending from the root.
    pub fn node_of(&self, s: &str) -> Option<NodeRef> {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.node(self.root(), &units)
    }

    /// Terminal id at `node`, if any.
    pub fn id_at(&self, node: NodeRef) -> Option<TokenId> {
        self.nodes[node.0].id
    }

    /// Exact lookup of a full vocabulary string.
    pub fn lookup(&self, s: &str) -> Option<TokenId> {
        self.node_of(s).and_then(|n| self.id_at(n))
    }

    /// Greedy longest match: walk from `from` while transitions exist,
    /// remembering the last terminal node visited. Returns that terminal's id
    /// and the number of units consumed up to it (the unconsumed remainder is
    /// `units[consumed..]`). `None` if no terminal was ever visited, even if
    /// the walk consumed units.
    pub fn longest_prefix(&self, from: NodeRef, units: &[u16]) -> Option<(TokenId, usize)> {
        let mut cur = from.0;
        let mut last_terminal = None;
        for (walked, unit) in units.iter().enumerate() {
            match self.nodes[cur].children.get(unit) {
                Some(&next) => {
                    cur = next;
                    if let Some(id) = self.nodes[cur].id {
                        last_terminal = Some((id, walked + 1));
                    }
                }
                None => break,
            }
        }
        last_terminal
    }
}
