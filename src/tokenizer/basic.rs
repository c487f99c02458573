//! Text cleaner / pre-tokenizer shared by both subword strategies.
//!
//! Mirrors the reference BasicTokenizer pipeline: clean the code-point
//! stream, split on spaces, then per word apply case folding, accent
//! stripping and punctuation splitting. Words in the never-split set pass
//! through untouched.

use std::collections::HashSet;

use tracing::{debug, info};

use super::TokenizeConfig;
use crate::unicode;

/// Clean `text` per the config and split it into an ordered list of
/// pre-tokens.
pub fn pre_tokenize(
    text: &str,
    never_split: &HashSet<String>,
    config: &TokenizeConfig,
) -> Vec<String> {
    debug!("start basic tokenize");

    let text = if config.normalize {
        unicode::normalize_nfc(text)
    } else {
        text.to_string()
    };

    let cleaned = clean_text(&text, config);
    let words = cleaned.split(' ').filter(|w| !w.is_empty());

    let mut result = Vec::new();
    for word in words {
        if never_split.contains(word) {
            result.push(word.to_string());
            continue;
        }

        let mut word = word.to_string();

        if config.do_lower_case {
            word = unicode::to_lower(&word);
        }

        if config.strip_accents {
            word = unicode::strip_accents(&word);
        }

        if !config.split_on_punc {
            result.push(word);
            continue;
        }

        // .ab.cd. -> ".", "ab", ".", "cd", "."
        let mut run = String::new();
        for c in word.chars() {
            if unicode::is_punct(c) {
                if !run.is_empty() {
                    result.push(std::mem::take(&mut run));
                }
                result.push(c.to_string());
            } else {
                run.push(c);
            }
        }
        if !run.is_empty() {
            result.push(run);
        }
    }

    debug!(words = result.len(), "end basic tokenize");

    result
}

/// Split raw text around protected token strings, recognizing them anywhere
/// in the text rather than only at whitespace boundaries:
/// `"<s>abc <mask>def</s>"` becomes `"<s>"`, `"abc "`, `"<mask>"`, `"def"`,
/// `"</s>"`. Returns `(is_protected, segment)` pairs in input order; the
/// longest protected string wins when several match at the same position.
pub fn split_protected(text: &str, never_split: &HashSet<String>) -> Vec<(bool, String)> {
    if never_split.is_empty() {
        return vec![(false, text.to_string())];
    }

    let mut keeps: Vec<&str> = never_split
        .iter()
        .map(String::as_str)
        .filter(|keep| !keep.is_empty())
        .collect();
    keeps.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let mut segments = Vec::new();
    let mut run = String::new();
    let mut rest = text;
    'scan: while !rest.is_empty() {
        for &keep in &keeps {
            if let Some(after) = rest.strip_prefix(keep) {
                if !run.is_empty() {
                    segments.push((false, std::mem::take(&mut run)));
                }
                segments.push((true, keep.to_string()));
                rest = after;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            run.push(c);
        }
        rest = chars.as_str();
    }
    if !run.is_empty() {
        segments.push((false, run));
    }

    segments
}

/// Per-code-point cleaning pass. Invalid characters are removed, whitespace
/// is collapsed to U+0020 and CJK ideographs get spaces around them, each
/// governed by its config switch.
fn clean_text(text: &str, config: &TokenizeConfig) -> String {
    let mut cleaned = String::with_capacity(text.len());

    for c in text.chars() {
        if c == '\0' {
            if config.remove_null_char {
                info!("null character found in text");
            } else {
                cleaned.push(c);
            }
            continue;
        }

        // a lone surrogate half in the input has already been decoded as
        // U+FFFD, so this switch governs it too
        if c == '\u{FFFD}' {
            if config.remove_replacement_char {
                info!("U+FFFD found in text");
            } else {
                cleaned.push(c);
            }
            continue;
        }

        if unicode::is_control(c) {
            if !config.remove_control_char {
                cleaned.push(c);
            }
            continue;
        }

        if unicode::is_whitespace(c) {
            if config.normalize_whitespaces {
                cleaned.push(' ');
            } else {
                cleaned.push(c);
            }
            continue;
        }

        if unicode::is_cjk(c) && config.add_space_around_cjk_char {
            cleaned.push(' ');
            cleaned.push(c);
            cleaned.push(' ');
        } else {
            cleaned.push(c);
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn no_protected() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn splits_on_whitespace_runs() {
        let config = TokenizeConfig::default_basic(0);
        let words = pre_tokenize("  hello   world\t\n", &no_protected(), &config);
        assert_eq!(words, vec!["hello", "world"]);
    }

    #[test]
    fn removes_null_and_replacement_chars() {
        let config = TokenizeConfig::default_basic(0);
        let words = pre_tokenize("a\0b\u{FFFD}c", &no_protected(), &config);
        assert_eq!(words, vec!["abc"]);

        let mut keep = TokenizeConfig::default_basic(0);
        keep.remove_null_char = false;
        keep.remove_replacement_char = false;
        let words = pre_tokenize("a\0b\u{FFFD}c", &no_protected(), &keep);
        assert_eq!(words, vec!["a\0b\u{FFFD}c"]);
    }

    #[test]
    fn control_chars_are_dropped_but_tab_lf_cr_survive_as_spaces() {
        let config = TokenizeConfig::default_basic(0);
        let words = pre_tokenize("a\u{200B}b\tc", &no_protected(), &config);
        assert_eq!(words, vec!["ab", "c"]);
    }

    #[test]
    fn cjk_chars_get_spaced() {
        let config = TokenizeConfig::default_basic(0);
        let words = pre_tokenize("ab\u{4E2D}\u{6587}cd", &no_protected(), &config);
        assert_eq!(words, vec!["ab", "\u{4E2D}", "\u{6587}", "cd"]);

        let mut off = TokenizeConfig::default_basic(0);
        off.add_space_around_cjk_char = false;
        let words = pre_tokenize("ab\u{4E2D}\u{6587}cd", &no_protected(), &off);
        assert_eq!(words, vec!["ab\u{4E2D}\u{6587}cd"]);
    }

    #[test]
    fn punctuation_splits_into_single_char_pretokens() {
        let config = TokenizeConfig::default_basic(0);
        let words = pre_tokenize(".ab.cd.", &no_protected(), &config);
        assert_eq!(words, vec![".", "ab", ".", "cd", "."]);
    }

    #[test]
    fn lowercase_and_accent_stripping() {
        let config = TokenizeConfig::default_basic(0);
        let words = pre_tokenize("Café MÜLLER", &no_protected(), &config);
        assert_eq!(words, vec!["cafe", "muller"]);
    }

    #[test]
    fn never_split_words_pass_through_all_stages() {
        let mut protected = HashSet::new();
        protected.insert("[CLS]".to_string());
        let config = TokenizeConfig::default_basic(0);
        let words = pre_tokenize("Hello [CLS] World!", &protected, &config);
        assert_eq!(words, vec!["hello", "[CLS]", "world", "!"]);
    }

    #[test]
    fn protected_substrings_split_out_anywhere_in_text() {
        let mut protected = HashSet::new();
        protected.insert("<s>".to_string());
        protected.insert("</s>".to_string());
        protected.insert("<mask>".to_string());

        let segments = split_protected("<s>abc <mask>def</s>", &protected);
        let expected: Vec<(bool, String)> = [
            (true, "<s>"),
            (false, "abc "),
            (true, "<mask>"),
            (false, "def"),
            (true, "</s>"),
        ]
        .into_iter()
        .map(|(p, s)| (p, s.to_string()))
        .collect();
        assert_eq!(segments, expected);
    }

    #[test]
    fn text_without_protected_strings_is_one_segment() {
        let mut protected = HashSet::new();
        protected.insert("<s>".to_string());
        let segments = split_protected("plain text", &protected);
        assert_eq!(segments, vec![(false, "plain text".to_string())]);
    }

    #[test]
    fn no_basic_preset_only_normalizes_whitespace() {
        let config = TokenizeConfig::no_basic(0);
        let words = pre_tokenize("Héllo,\tWörld!", &no_protected(), &config);
        assert_eq!(words, vec!["Héllo,", "Wörld!"]);
    }
}
