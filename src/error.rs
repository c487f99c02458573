//! Error handling shared across the crate.

use thiserror::Error;

/// Result alias used at tokenizer entry points.
pub type Result<T> = anyhow::Result<T>;

/// Load-time failures that render a tokenizer unusable.
///
/// Per-call anomalies (out-of-vocabulary words, odd code points) never surface
/// here; they resolve to the unknown token or are governed by
/// [`TokenizeConfig`](crate::tokenizer::TokenizeConfig) switches.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// The vocabulary has no "##" entry, so WordPiece continuation is impossible.
    #[error("corrupted vocab: \"##\" is not found")]
    MissingContinuation,
    /// A required special-token role could not be resolved from metadata or
    /// any textual fallback.
    #[error("special token {role} could not be resolved ({key} does not exist in vocab)")]
    UnresolvedSpecial {
        /// Role name (cls, mask, pad, sep, unk, bos, eos).
        role: &'static str,
        /// The last key that was tried.
        key: String,
    },
    /// A BPE merge rule references a symbol that is not in the vocabulary.
    #[error("token {0:?} is not found in vocab")]
    UnknownMergeSymbol(String),
    /// The result of applying a BPE merge rule is not in the vocabulary.
    #[error("merged token {0:?} is not found in vocab")]
    UnknownMergeResult(String),
}
