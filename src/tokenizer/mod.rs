mod basic;
mod bpe;
mod wordpiece;

pub use basic::{pre_tokenize, split_protected};
pub use bpe::{Bpe, BpeCache, BpeTokenizer};
pub use wordpiece::WordPieceTokenizer;

use anyhow::bail;

use crate::error::Result;
use crate::vocab::{SpecialRole, TokenId, Vocabulary};

/// Per-call cleaning switches plus the resolved unknown-token id.
///
/// Immutable during a `tokenize` call; swap the whole struct between calls.
#[derive(Debug, Clone)]
pub struct TokenizeConfig {
    /// NFC-normalize the whole text before anything else.
    pub normalize: bool,
    /// Remove U+FFFD.
    pub remove_replacement_char: bool,
    /// Remove U+0000.
    pub remove_null_char: bool,
    /// Remove control characters (category C*, except TAB/LF/CR).
    pub remove_control_char: bool,
    /// Collapse every whitespace to a plain space (U+0020).
    pub normalize_whitespaces: bool,
    /// Put spaces around CJK ideographs.
    pub add_space_around_cjk_char: bool,
    /// Case-fold words.
    pub do_lower_case: bool,
    /// Remove accents (NFD, drop nonspacing marks, NFC).
    pub strip_accents: bool,
    /// Split words at punctuation; each punctuation character becomes its own
    /// pre-token.
    pub split_on_punc: bool,
    /// Id emitted for out-of-vocabulary pre-tokens.
    pub unknown_token_id: TokenId,
}

impl TokenizeConfig {
    /// Every cleaning stage enabled.
    pub fn default_basic(unknown_token_id: TokenId) -> Self {
        Self {
            normalize: true,
            remove_replacement_char: true,
            remove_null_char: true,
            remove_control_char: true,
            normalize_whitespaces: true,
            add_space_around_cjk_char: true,
            do_lower_case: true,
            strip_accents: true,
            split_on_punc: true,
            unknown_token_id,
        }
    }

    /// Cleaning disabled; only whitespace normalization is retained.
    pub fn no_basic(unknown_token_id: TokenId) -> Self {
        Self {
            normalize: false,
            remove_replacement_char: false,
            remove_null_char: false,
            remove_control_char: false,
            normalize_whitespaces: true,
            add_space_around_cjk_char: false,
            do_lower_case: false,
            strip_accents: false,
            split_on_punc: false,
            unknown_token_id,
        }
    }
}

pub trait Tokenizer: Send + Sync {
    /// Convert raw text into vocabulary ids.
    fn tokenize(&self, text: &str, config: &TokenizeConfig) -> Result<Vec<TokenId>>;

    fn vocab(&self) -> &Vocabulary;

    fn vocab_size(&self) -> usize {
        self.vocab().len()
    }

    fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.vocab().token_to_id(token)
    }

    fn id_to_token(&self, id: TokenId) -> Option<&str> {
        self.vocab().id_to_token(id)
    }

    fn special_id(&self, role: SpecialRole) -> Option<TokenId> {
        self.vocab().special_id(role)
    }
}

/// Subword strategy, selected per model family. The two strategies are
/// mutually exclusive: BERT-family models use WordPiece, RoBERTa-family
/// models use BPE.
pub enum SubwordTokenizer {
    WordPiece(WordPieceTokenizer),
    Bpe(BpeTokenizer),
}

impl SubwordTokenizer {
    /// Build the strategy a model family expects. `merges` is only consulted
    /// for BPE families.
    pub fn for_model_family(
        family: &str,
        vocab: Vocabulary,
        merges: &[(String, String)],
    ) -> Result<Self> {
        match family {
            "bert" => Ok(Self::WordPiece(WordPieceTokenizer::new(vocab)?)),
            "roberta" | "gpt2" => Ok(Self::Bpe(BpeTokenizer::new(vocab, merges)?)),
            _ => bail!("unsupported tokenizer model family: {family}"),
        }
    }

    /// Register a token, rebuilding derived structures. Returns `false` on a
    /// duplicate. Requires exclusive access; concurrent `tokenize` calls must
    /// be externally serialized against this.
    pub fn add_token(&mut self, token: &str) -> bool {
        match self {
            Self::WordPiece(wp) => wp.add_token(token),
            Self::Bpe(bpe) => bpe.add_token(token),
        }
    }
}

impl Tokenizer for SubwordTokenizer {
    fn tokenize(&self, text: &str, config: &TokenizeConfig) -> Result<Vec<TokenId>> {
        match self {
            Self::WordPiece(wp) => wp.tokenize(text, config),
            Self::Bpe(bpe) => bpe.tokenize(text, config),
        }
    }

    fn vocab(&self) -> &Vocabulary {
        match self {
            Self::WordPiece(wp) => wp.vocab(),
            Self::Bpe(bpe) => bpe.vocab(),
        }
    }
}
