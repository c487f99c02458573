//! WordPiece: greedy longest-match against the vocabulary trie, with the
//! "##" continuation subtree for non-initial pieces of a word.

use std::collections::HashSet;

use tracing::{debug, error, warn};

use super::{pre_tokenize, TokenizeConfig, Tokenizer};
use crate::error::TokenizerError;
use crate::trie::{NodeRef, Trie};
use crate::vocab::{SpecialRole, TokenId, Vocabulary};

pub struct WordPieceTokenizer {
    vocab: Vocabulary,
    trie: Trie,
    cont: NodeRef,
    never_split: HashSet<String>,
}

impl WordPieceTokenizer {
    /// Build the trie over `vocab` and locate the "##" continuation node.
    ///
    /// Fails if "##" is missing from the vocabulary (the trie could never
    /// continue a word) or if any of cls/mask/pad/sep/unk is unresolved.
    pub fn new(vocab: Vocabulary) -> Result<Self, TokenizerError> {
        vocab.require_special(&[
            SpecialRole::Cls,
            SpecialRole::Mask,
            SpecialRole::Pad,
            SpecialRole::Sep,
            SpecialRole::Unk,
        ])?;

        let trie = Trie::build(vocab.tokens());
        let cont = match trie.node_of("##") {
            Some(node) => node,
            None => {
                error!("corrupted vocab: \"##\" is not found");
                return Err(TokenizerError::MissingContinuation);
            }
        };
        let never_split = vocab.special_strings();

        Ok(Self {
            vocab,
            trie,
            cont,
            never_split,
        })
    }

    /// Register a token and rebuild the trie. Returns `false` on a duplicate.
    /// Callers must hold exclusive access; there is no incremental update.
    pub fn add_token(&mut self, token: &str) -> bool {
        if !self.vocab.add_token(token) {
            return false;
        }
        self.trie = Trie::build(self.vocab.tokens());
        // "##" was present before the rebuild, so it still is
        self.cont = self.trie.node_of("##").unwrap_or_else(|| self.trie.root());
        true
    }

    fn tokenize_word(&self, word: &str, unk: TokenId, result: &mut Vec<TokenId>) {
        let units: Vec<u16> = word.encode_utf16().collect();
        let mut pos = 0;
        let mut node = self.trie.root();

        while pos < units.len() {
            match self.trie.longest_prefix(node, &units[pos..]) {
                Some((id, consumed)) => {
                    result.push(id);
                    pos += consumed;
                    node = if pos == units.len() {
                        self.trie.root()
                    } else {
                        self.cont
                    };
                }
                None => {
                    // the whole remaining word collapses into one unk
                    warn!(word, "unknown token");
                    result.push(unk);
                    break;
                }
            }
        }
    }
}

impl Tokenizer for WordPieceTokenizer {
    fn tokenize(&self, text: &str, config: &TokenizeConfig) -> crate::error::Result<Vec<TokenId>> {
        debug!("start tokenize");

        let words = pre_tokenize(text, &self.never_split, config);

        let mut result = Vec::with_capacity(words.len());
        for word in &words {
            self.tokenize_word(word, config.unknown_token_id, &mut result);
        }

        debug!(tokens = result.len(), "end tokenize");

        Ok(result)
    }

    fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }
}
