//! Vocabulary registry: id↔string bijection plus special-token roles.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::error::TokenizerError;

/// Vocabulary id. Ids are insertion indices, contiguous from zero.
pub type TokenId = u32;

/// Fixed special-token roles a model resolves at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialRole {
    Cls,
    Mask,
    Pad,
    Sep,
    Unk,
    Bos,
    Eos,
}

impl SpecialRole {
    pub fn name(self) -> &'static str {
        match self {
            SpecialRole::Cls => "cls",
            SpecialRole::Mask => "mask",
            SpecialRole::Pad => "pad",
            SpecialRole::Sep => "sep",
            SpecialRole::Unk => "unk",
            SpecialRole::Bos => "bos",
            SpecialRole::Eos => "eos",
        }
    }
}

/// Resolved special-token ids. `None` until resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecialTokens {
    pub cls: Option<TokenId>,
    pub mask: Option<TokenId>,
    pub pad: Option<TokenId>,
    pub sep: Option<TokenId>,
    pub unk: Option<TokenId>,
    pub bos: Option<TokenId>,
    pub eos: Option<TokenId>,
}

impl SpecialTokens {
    fn slot(&mut self, role: SpecialRole) -> &mut Option<TokenId> {
        match role {
            SpecialRole::Cls => &mut self.cls,
            SpecialRole::Mask => &mut self.mask,
            SpecialRole::Pad => &mut self.pad,
            SpecialRole::Sep => &mut self.sep,
            SpecialRole::Unk => &mut self.unk,
            SpecialRole::Bos => &mut self.bos,
            SpecialRole::Eos => &mut self.eos,
        }
    }

    pub fn get(&self, role: SpecialRole) -> Option<TokenId> {
        match role {
            SpecialRole::Cls => self.cls,
            SpecialRole::Mask => self.mask,
            SpecialRole::Pad => self.pad,
            SpecialRole::Sep => self.sep,
            SpecialRole::Unk => self.unk,
            SpecialRole::Bos => self.bos,
            SpecialRole::Eos => self.eos,
        }
    }
}

/// Ordered token list with a reverse map and the resolved special roles.
///
/// Created incrementally during model load; once a tokenizer builds its trie
/// over it, the vocabulary is frozen and only read.
#[derive(Debug, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, TokenId>,
    special: SpecialTokens,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            tokens: Vec::with_capacity(n),
            index: HashMap::with_capacity(n),
            special: SpecialTokens::default(),
        }
    }

    /// Bulk-load tokens in order. Duplicates are rejected as in
    /// [`add_token`](Self::add_token).
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self::new();
        for token in tokens {
            vocab.add_token(&token.into());
        }
        vocab
    }

    /// Append `token` with id = current size. Returns `false` without
    /// modifying anything if the exact string is already registered.
    pub fn add_token(&mut self, token: &str) -> bool {
        if self.index.contains_key(token) {
            warn!(token, "token is already registered");
            return false;
        }
        let id = self.tokens.len() as TokenId;
        self.tokens.push(token.to_string());
        self.index.insert(token.to_string(), id);
        true
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.index.get(token).copied()
    }

    pub fn id_to_token(&self, id: TokenId) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Token string → id map, in the shape the BPE loader consumes.
    pub fn index_map(&self) -> HashMap<String, TokenId> {
        self.index.clone()
    }

    pub fn special(&self) -> &SpecialTokens {
        &self.special
    }

    pub fn special_id(&self, role: SpecialRole) -> Option<TokenId> {
        self.special.get(role)
    }

    pub fn set_special_id(&mut self, role: SpecialRole, id: TokenId) {
        *self.special.slot(role) = Some(id);
    }

    /// The token string behind a resolved role.
    pub fn special_token(&self, role: SpecialRole) -> Option<&str> {
        self.special.get(role).and_then(|id| self.id_to_token(id))
    }

    /// Strings of every resolved role, i.e. the never-split set the cleaner
    /// must leave untouched.
    pub fn special_strings(&self) -> HashSet<String> {
        [
            SpecialRole::Cls,
            SpecialRole::Mask,
            SpecialRole::Pad,
            SpecialRole::Sep,
            SpecialRole::Unk,
            SpecialRole::Bos,
            SpecialRole::Eos,
        ]
        .into_iter()
        .filter_map(|role| self.special_token(role).map(str::to_string))
        .collect()
    }

    /// Resolve a role: an explicit id from model metadata wins; otherwise the
    /// textual fallbacks are looked up in order. The error names the last key
    /// tried.
    pub fn resolve_special(
        &mut self,
        role: SpecialRole,
        explicit: Option<TokenId>,
        fallbacks: &[&str],
    ) -> Result<TokenId, TokenizerError> {
        if let Some(id) = explicit {
            *self.special.slot(role) = Some(id);
            return Ok(id);
        }
        let mut last_key = String::new();
        for &key in fallbacks {
            warn!(role = role.name(), key, "id is not defined; using fallback");
            if let Some(id) = self.token_to_id(key) {
                info!(role = role.name(), id, token = key, "resolved special token");
                *self.special.slot(role) = Some(id);
                return Ok(id);
            }
            last_key = key.to_string();
        }
        Err(TokenizerError::UnresolvedSpecial {
            role: role.name(),
            key: last_key,
        })
    }

    /// Check that every role in `roles` has been resolved.
    pub fn require_special(&self, roles: &[SpecialRole]) -> Result<(), TokenizerError> {
        for &role in roles {
            if self.special.get(role).is_none() {
                return Err(TokenizerError::UnresolvedSpecial {
                    role: role.name(),
                    key: String::new(),
                });
            }
        }
        Ok(())
    }
}
