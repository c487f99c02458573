//! Rule-driven byte-pair encoding with merge dropout and unk fusion.
//!
//! [`Bpe`] is the merge engine: it reduces a single word to subword symbols
//! by repeatedly applying the highest-priority merge rule present in the
//! merge table. [`BpeTokenizer`] wires the engine behind the shared
//! cleaner/pre-tokenizer and maps symbols to vocabulary ids.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use tracing::{debug, error, warn};

use super::{pre_tokenize, split_protected, TokenizeConfig, Tokenizer};
use crate::error::TokenizerError;
use crate::vocab::{SpecialRole, TokenId, Vocabulary};

/// Cache of dropout-free tokenizations, keyed by word.
pub type BpeCache = HashMap<String, Vec<String>>;

/// BPE merge engine over string symbols.
pub struct Bpe {
    unk: String,
    dropout: f64,
    fuse_unk: bool,
    vocab: HashMap<String, TokenId>,
    vocab_r: HashMap<TokenId, String>,
    /// (left, right) -> (rank, merged symbol); lower rank merges first.
    merges: HashMap<(String, String), (u32, String)>,
    continuing_subword_prefix: String,
    end_of_word_suffix: String,
}

impl Bpe {
    pub fn new(unk: impl Into<String>, dropout: f64, fuse_unk: bool) -> Self {
        Self {
            unk: unk.into(),
            dropout,
            fuse_unk,
            vocab: HashMap::new(),
            vocab_r: HashMap::new(),
            merges: HashMap::new(),
            continuing_subword_prefix: String::new(),
            end_of_word_suffix: String::new(),
        }
    }

    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    pub fn set_dropout(&mut self, dropout: f64) {
        self.dropout = dropout;
    }

    pub fn fuse_unk(&self) -> bool {
        self.fuse_unk
    }

    pub fn set_fuse_unk(&mut self, fuse_unk: bool) {
        self.fuse_unk = fuse_unk;
    }

    pub fn continuing_subword_prefix(&self) -> &str {
        &self.continuing_subword_prefix
    }

    pub fn set_continuing_subword_prefix(&mut self, prefix: impl Into<String>) {
        self.continuing_subword_prefix = prefix.into();
    }

    pub fn end_of_word_suffix(&self) -> &str {
        &self.end_of_word_suffix
    }

    pub fn set_end_of_word_suffix(&mut self, suffix: impl Into<String>) {
        self.end_of_word_suffix = suffix.into();
    }

    pub fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.vocab.get(token).copied()
    }

    pub fn id_to_token(&self, id: TokenId) -> Option<&str> {
        self.vocab_r.get(&id).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.vocab.clear();
        self.vocab_r.clear();
        self.merges.clear();
    }

    /// Load the vocabulary and the ordered merge list. Every merge's left
    /// symbol, right symbol and merged result must resolve to a vocabulary
    /// id, or loading fails and the engine must not be used.
    pub fn load_vocab(
        &mut self,
        vocab: &HashMap<String, TokenId>,
        merges: &[(String, String)],
    ) -> Result<(), TokenizerError> {
        debug!(tokens = vocab.len(), merges = merges.len(), "loading BPE vocab");

        self.vocab.reserve(vocab.len());
        self.vocab_r.reserve(vocab.len());
        for (token, &id) in vocab {
            self.vocab.insert(token.clone(), id);
            self.vocab_r.insert(id, token.clone());
        }

        let prefix_len = self.continuing_subword_prefix.chars().count();
        let rank_start = self.merges.len() as u32;
        self.merges.reserve(merges.len());
        for (index, (left, right)) in merges.iter().enumerate() {
            if !self.vocab.contains_key(left) {
                error!(token = %left, "merge symbol is not found in vocab");
                return Err(TokenizerError::UnknownMergeSymbol(left.clone()));
            }
            if !self.vocab.contains_key(right) {
                error!(token = %right, "merge symbol is not found in vocab");
                return Err(TokenizerError::UnknownMergeSymbol(right.clone()));
            }

            let mut merged = left.clone();
            merged.extend(right.chars().skip(prefix_len));
            if !self.vocab.contains_key(&merged) {
                error!(token = %merged, "merged token is not found in vocab");
                return Err(TokenizerError::UnknownMergeResult(merged));
            }

            let rank = rank_start + index as u32;
            self.merges
                .insert((left.clone(), right.clone()), (rank, merged));
        }

        debug!("finish loading BPE vocab");

        Ok(())
    }

    /// Tokenize one word, drawing dropout trials from the thread RNG.
    pub fn tokenize(&self, word: &str) -> Vec<String> {
        self.tokenize_with_rng(word, &mut rand::thread_rng())
    }

    /// Tokenize one word with an injected randomness source, so dropout is
    /// reproducible under a seeded RNG. Never fails; unknown symbols map to
    /// the unk token (fused if configured).
    pub fn tokenize_with_rng<R: Rng + ?Sized>(&self, word: &str, rng: &mut R) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }

        let mut symbols = self.split_atoms(word);
        self.merge_all(&mut symbols, rng);
        self.map_symbols(symbols)
    }

    /// [`tokenize`](Self::tokenize) with a per-word cache. The cache is only
    /// consulted and filled when dropout is disabled; dropout results are
    /// intentionally not reusable.
    pub fn tokenize_with_cache(&self, word: &str, cache: &mut BpeCache) -> Vec<String> {
        if self.dropout == 0.0 {
            if let Some(cached) = cache.get(word) {
                return cached.clone();
            }
        }
        let result = self.tokenize(word);
        if self.dropout == 0.0 {
            cache.insert(word.to_string(), result.clone());
        }
        result
    }

    /// One symbol per code point, decorated with the continuing-subword
    /// prefix (non-initial) and end-of-word suffix (final) when configured.
    fn split_atoms(&self, word: &str) -> Vec<String> {
        let count = word.chars().count();
        word.chars()
            .enumerate()
            .map(|(i, c)| {
                let mut symbol = String::new();
                if i != 0 {
                    symbol.push_str(&self.continuing_subword_prefix);
                }
                symbol.push(c);
                if i == count - 1 {
                    symbol.push_str(&self.end_of_word_suffix);
                }
                symbol
            })
            .collect()
    }

    /// Repeatedly apply the best-ranked merge until no candidate is accepted.
    ///
    /// Each pass scans all adjacent pairs, orders the candidates by
    /// (rank, position) and walks them: with dropout enabled an independent
    /// Bernoulli trial may suppress a candidate, in which case the next-best
    /// one is considered. Applying a merge restarts the scan; a pass in which
    /// every candidate is suppressed terminates the loop.
    fn merge_all<R: Rng + ?Sized>(&self, symbols: &mut Vec<String>, rng: &mut R) {
        loop {
            let mut candidates: Vec<(u32, usize)> = Vec::new();
            for i in 0..symbols.len().saturating_sub(1) {
                let pair = (symbols[i].clone(), symbols[i + 1].clone());
                if let Some(&(rank, _)) = self.merges.get(&pair) {
                    candidates.push((rank, i));
                }
            }
            candidates.sort_unstable();

            let mut accepted = None;
            for &(_, pos) in &candidates {
                if self.dropout > 0.0 && rng.gen::<f64>() < self.dropout {
                    continue;
                }
                accepted = Some(pos);
                break;
            }

            let Some(pos) = accepted else {
                break;
            };

            let pair = (symbols[pos].clone(), symbols[pos + 1].clone());
            let (_, merged) = &self.merges[&pair];
            debug!(left = %pair.0, right = %pair.1, merged = %merged, "merge");
            symbols[pos] = merged.clone();
            symbols.remove(pos + 1);
        }
    }

    /// Replace symbols absent from the vocabulary with the unk token,
    /// collapsing consecutive unk runs when fusing is enabled. Symbols are
    /// dropped outright if no usable unk is configured.
    fn map_symbols(&self, symbols: Vec<String>) -> Vec<String> {
        let mut result = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if self.vocab.contains_key(&symbol) {
                result.push(symbol);
            } else if self.unk.is_empty() || !self.vocab.contains_key(&self.unk) {
                warn!(symbol = %symbol, "no usable unk token; dropping symbol");
            } else if !(self.fuse_unk && result.last() == Some(&self.unk)) {
                result.push(self.unk.clone());
            }
        }
        result
    }
}

/// BPE strategy behind the shared cleaner, producing vocabulary ids.
pub struct BpeTokenizer {
    vocab: Vocabulary,
    model: Bpe,
    never_split: HashSet<String>,
}

impl BpeTokenizer {
    /// Requires cls/mask/pad/sep/unk plus bos/eos to be resolved, then loads
    /// the merge table into the engine.
    pub fn new(vocab: Vocabulary, merges: &[(String, String)]) -> Result<Self, TokenizerError> {
        vocab.require_special(&[
            SpecialRole::Cls,
            SpecialRole::Mask,
            SpecialRole::Pad,
            SpecialRole::Sep,
            SpecialRole::Unk,
            SpecialRole::Bos,
            SpecialRole::Eos,
        ])?;

        // require_special guarantees unk resolves
        let unk = vocab
            .special_token(SpecialRole::Unk)
            .unwrap_or_default()
            .to_string();
        let mut model = Bpe::new(unk, 0.0, true);
        model.load_vocab(&vocab.index_map(), merges)?;
        let never_split = vocab.special_strings();

        Ok(Self {
            vocab,
            model,
            never_split,
        })
    }

    pub fn model(&self) -> &Bpe {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Bpe {
        &mut self.model
    }

    /// Register a token in both the registry and the engine maps. Returns
    /// `false` on a duplicate. Requires exclusive access.
    pub fn add_token(&mut self, token: &str) -> bool {
        if !self.vocab.add_token(token) {
            return false;
        }
        // the registry appended the token, so its id is the last index
        let id = (self.vocab.len() - 1) as TokenId;
        self.model.vocab.insert(token.to_string(), id);
        self.model.vocab_r.insert(id, token.to_string());
        true
    }

    /// Tokenize with an injected RNG for reproducible dropout.
    ///
    /// Protected token strings are recognized anywhere in the text and map
    /// straight to their ids; only the segments between them go through the
    /// cleaner and the merge engine.
    pub fn tokenize_with_rng<R: Rng + ?Sized>(
        &self,
        text: &str,
        config: &TokenizeConfig,
        rng: &mut R,
    ) -> Vec<TokenId> {
        let mut result = Vec::new();
        for (protected, segment) in split_protected(text, &self.never_split) {
            if protected {
                match self.vocab.token_to_id(&segment) {
                    Some(id) => result.push(id),
                    None => {
                        warn!(token = %segment, "protected token is not found in vocab");
                        result.push(config.unknown_token_id);
                    }
                }
                continue;
            }

            for word in pre_tokenize(&segment, &self.never_split, config) {
                for symbol in self.model.tokenize_with_rng(&word, rng) {
                    match self.model.token_to_id(&symbol) {
                        Some(id) => result.push(id),
                        None => result.push(config.unknown_token_id),
                    }
                }
            }
        }
        result
    }
}

impl Tokenizer for BpeTokenizer {
    fn tokenize(&self, text: &str, config: &TokenizeConfig) -> crate::error::Result<Vec<TokenId>> {
        debug!("start tokenize");
        let result = self.tokenize_with_rng(text, config, &mut rand::thread_rng());
        debug!(tokens = result.len(), "end tokenize");
        Ok(result)
    }

    fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn vocab_map(tokens: &[&str]) -> HashMap<String, TokenId> {
        tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i as TokenId))
            .collect()
    }

    fn merge_list(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(l, r)| (l.to_string(), r.to_string()))
            .collect()
    }

    #[test]
    fn unfused_unk() {
        let mut bpe = Bpe::new("<unk>", 0.0, false);
        bpe.load_vocab(&vocab_map(&["<unk>", "a", "b"]), &[]).unwrap();

        assert_eq!(bpe.tokenize("c"), vec!["<unk>"]);
        assert_eq!(bpe.tokenize("cc"), vec!["<unk>", "<unk>"]);
        assert_eq!(bpe.tokenize("accb"), vec!["a", "<unk>", "<unk>", "b"]);
    }

    #[test]
    fn fused_unk() {
        let mut bpe = Bpe::new("<unk>", 0.0, true);
        bpe.load_vocab(&vocab_map(&["<unk>", "a", "b"]), &[]).unwrap();

        assert_eq!(bpe.tokenize("c"), vec!["<unk>"]);
        assert_eq!(bpe.tokenize("cc"), vec!["<unk>"]);
        assert_eq!(bpe.tokenize("accb"), vec!["a", "<unk>", "b"]);
    }

    #[test]
    fn full_merge_reduction() {
        let mut bpe = Bpe::new("<unk>", 0.0, true);
        let vocab = vocab_map(&[
            "u", "n", "r", "e", "l", "a", "t", "d", "re", "at", "ed", "un", "ated", "rel",
            "related", "unrelated",
        ]);
        let merges = merge_list(&[
            ("r", "e"),
            ("a", "t"),
            ("e", "d"),
            ("u", "n"),
            ("at", "ed"),
            ("re", "l"),
            ("rel", "ated"),
            ("un", "related"),
        ]);
        bpe.load_vocab(&vocab, &merges).unwrap();

        assert_eq!(bpe.tokenize("unrelated"), vec!["unrelated"]);
    }

    #[test]
    fn dropout_boundaries() {
        let mut bpe = Bpe::new("<unk>", 0.0, true);
        let vocab = vocab_map(&[
            "u", "n", "r", "e", "l", "a", "t", "d", "re", "at", "ed", "un", "ated", "rel",
            "related", "unrelated",
        ]);
        let merges = merge_list(&[
            ("r", "e"),
            ("a", "t"),
            ("e", "d"),
            ("u", "n"),
            ("at", "ed"),
            ("re", "l"),
            ("rel", "ated"),
            ("un", "related"),
        ]);
        bpe.load_vocab(&vocab, &merges).unwrap();

        let mut rng = StdRng::seed_from_u64(42);

        // dropout 1: every merge suppressed, atomic split
        bpe.set_dropout(1.0);
        assert_eq!(
            bpe.tokenize_with_rng("unrelated", &mut rng),
            vec!["u", "n", "r", "e", "l", "a", "t", "e", "d"]
        );

        // dropout 0.5: never longer than the atomic split, never empty, and
        // across repeated trials some run lands strictly in between
        bpe.set_dropout(0.5);
        let lengths: Vec<usize> = (0..50)
            .map(|_| bpe.tokenize_with_rng("unrelated", &mut rng).len())
            .collect();
        assert!(lengths.iter().all(|&len| (1..=9).contains(&len)));
        assert!(lengths.iter().any(|&len| len > 1 && len < 9));
    }

    #[test]
    fn merge_referencing_missing_symbol_fails_load() {
        let mut bpe = Bpe::new("<unk>", 0.0, false);
        let vocab = vocab_map(&["a", "b", "c", "ab"]);
        let merges = merge_list(&[("a", "b"), ("a", "d")]);
        assert!(matches!(
            bpe.load_vocab(&vocab, &merges),
            Err(TokenizerError::UnknownMergeSymbol(sym)) if sym == "d"
        ));
    }

    #[test]
    fn merge_with_unknown_result_fails_load() {
        let mut bpe = Bpe::new("<unk>", 0.0, false);
        let vocab = vocab_map(&["a", "b"]);
        let merges = merge_list(&[("a", "b")]);
        assert!(matches!(
            bpe.load_vocab(&vocab, &merges),
            Err(TokenizerError::UnknownMergeResult(sym)) if sym == "ab"
        ));
    }

    #[test]
    fn continuing_subword_prefix_is_stripped_in_merges() {
        let mut bpe = Bpe::new("<unk>", 0.0, true);
        bpe.set_continuing_subword_prefix("##");
        let vocab = vocab_map(&["a", "##b", "ab"]);
        let merges = merge_list(&[("a", "##b")]);
        bpe.load_vocab(&vocab, &merges).unwrap();

        assert_eq!(bpe.tokenize("ab"), vec!["ab"]);
    }

    #[test]
    fn cache_round_trip() {
        let mut bpe = Bpe::new("<unk>", 0.0, true);
        bpe.load_vocab(&vocab_map(&["<unk>", "a", "b"]), &[]).unwrap();

        let mut cache = BpeCache::new();
        assert_eq!(bpe.tokenize_with_cache("ab", &mut cache), vec!["a", "b"]);
        assert!(cache.contains_key("ab"));
        assert_eq!(bpe.tokenize_with_cache("ab", &mut cache), vec!["a", "b"]);
    }

    #[test]
    fn empty_word_yields_nothing() {
        let mut bpe = Bpe::new("<unk>", 0.0, true);
        bpe.load_vocab(&vocab_map(&["<unk>", "a"]), &[]).unwrap();
        assert!(bpe.tokenize("").is_empty());
    }
}
