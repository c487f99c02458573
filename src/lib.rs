//! Subword tokenization for BERT/RoBERTa-family models.
//!
//! Converts raw UTF-8 text into vocabulary ids that line up with a reference
//! pretrained vocabulary: a Unicode-aware cleaner/pre-tokenizer feeds either
//! the trie-backed WordPiece algorithm (BERT) or rule-driven BPE with merge
//! dropout (RoBERTa). All lookup structures are built once at load time and
//! are read-only afterward, so a tokenizer can be shared across threads.

pub mod error;
pub mod tokenizer;
pub mod trie;
pub mod unicode;
pub mod vocab;

pub use error::{Result, TokenizerError};
pub use tokenizer::{
    Bpe, BpeCache, BpeTokenizer, SubwordTokenizer, TokenizeConfig, Tokenizer, WordPieceTokenizer,
};
pub use trie::Trie;
pub use vocab::{SpecialRole, SpecialTokens, TokenId, Vocabulary};
