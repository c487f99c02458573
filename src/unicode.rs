//! Wrappers over the Unicode normalization and classification providers.
//!
//! Tokenization itself never reimplements Unicode tables; everything here
//! delegates to `unicode-normalization` and `unicode-general-category` and
//! only encodes the tokenizer's own policy (which categories count as
//! whitespace, control, punctuation) plus the fixed CJK ideograph ranges.

use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

/// NFC-normalize `text`. If the provider cannot normalize the input it is
/// returned unchanged; normalization failure is never fatal.
pub fn normalize_nfc(text: &str) -> String {
    match is_nfc_quick(text.chars()) {
        IsNormalized::Yes => text.to_string(),
        _ => text.nfc().collect(),
    }
}

/// NFD-decompose `text`, falling back to the input unchanged.
pub fn normalize_nfd(text: &str) -> String {
    text.nfd().collect()
}

/// Case-fold a word via the provider's lowercase mapping.
pub fn to_lower(word: &str) -> String {
    word.chars().flat_map(char::to_lowercase).collect()
}

/// Remove accents: decompose to NFD, drop nonspacing marks (category Mn),
/// recompose to NFC.
pub fn strip_accents(word: &str) -> String {
    word.nfd()
        .filter(|&c| get_general_category(c) != GeneralCategory::NonspacingMark)
        .nfc()
        .collect()
}

// ' ', '\t', '\n' and '\r' are control characters,
// but we treat them as whitespace here.
// ref: transformers.BasicTokenizer
pub fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
        || get_general_category(c) == GeneralCategory::SpaceSeparator
}

pub fn is_control(c: char) -> bool {
    !matches!(c, '\t' | '\n' | '\r')
        && matches!(
            get_general_category(c),
            GeneralCategory::Control
                | GeneralCategory::Format
                | GeneralCategory::Surrogate
                | GeneralCategory::PrivateUse
                | GeneralCategory::Unassigned
        )
}

/// ASCII punctuation ranges 33-47, 58-64, 91-96, 123-126, or any code point
/// whose general category is in the P group. The ASCII ranges matter because
/// characters like `^` and `$` are not category P but reference tokenizers
/// split on them anyway.
pub fn is_punct(c: char) -> bool {
    matches!(c, '!'..='/' | ':'..='@' | '['..='`' | '{'..='~')
        || matches!(
            get_general_category(c),
            GeneralCategory::ConnectorPunctuation
                | GeneralCategory::DashPunctuation
                | GeneralCategory::OpenPunctuation
                | GeneralCategory::ClosePunctuation
                | GeneralCategory::InitialPunctuation
                | GeneralCategory::FinalPunctuation
                | GeneralCategory::OtherPunctuation
        )
}

// ref: transformers.BasicTokenizer._is_chinese_char
pub fn is_cjk(c: char) -> bool {
    matches!(u32::from(c),
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x20000..=0x2A6DF
        | 0x2A700..=0x2B73F
        | 0x2B740..=0x2B81F
        | 0x2B820..=0x2CEAF
        | 0xF900..=0xFAFF
        | 0x2F800..=0x2FA1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_covers_ascii_and_zs() {
        assert!(is_whitespace(' '));
        assert!(is_whitespace('\t'));
        assert!(is_whitespace('\u{00A0}')); // no-break space, Zs
        assert!(!is_whitespace('a'));
    }

    #[test]
    fn tab_lf_cr_are_not_control() {
        assert!(!is_control('\t'));
        assert!(!is_control('\n'));
        assert!(!is_control('\r'));
        assert!(is_control('\u{0000}'));
        assert!(is_control('\u{200B}')); // zero width space, Cf
    }

    #[test]
    fn punct_includes_ascii_symbols_outside_p() {
        assert!(is_punct('.'));
        assert!(is_punct('^')); // Sk, caught by the ASCII range
        assert!(is_punct('$')); // Sc, caught by the ASCII range
        assert!(is_punct('\u{2014}')); // em dash, Pd
        assert!(!is_punct('a'));
    }

    #[test]
    fn cjk_table_boundaries() {
        assert!(is_cjk('\u{4E00}'));
        assert!(is_cjk('\u{9FFF}'));
        assert!(is_cjk('\u{20000}')); // outside the BMP, surrogate pair in UTF-16
        assert!(!is_cjk('\u{4DFF}'));
        assert!(!is_cjk('a'));
    }

    #[test]
    fn strip_accents_removes_nonspacing_marks() {
        assert_eq!(strip_accents("café"), "cafe");
        assert_eq!(strip_accents("über"), "uber");
        assert_eq!(strip_accents("plain"), "plain");
    }
}
