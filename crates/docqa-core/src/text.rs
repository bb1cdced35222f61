//! Tokenization and sentence splitting shared by the lexical scorer and the
//! answer synthesizer.
//!
//! Tokens are the `\w+` runs of the lowercased text. No stemming and no
//! stop-word removal.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is a valid regex"));

/// Lowercase `text` and return its word tokens in order, duplicates kept.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Distinct lowercase word tokens of `text`.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Split on runs of `.`, `!` and `?`, trimming and dropping empty pieces.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits_on_non_word() {
        assert_eq!(
            tokenize("What is ISO 13849-1?"),
            vec!["what", "is", "iso", "13849", "1"]
        );
    }

    #[test]
    fn test_tokenize_keeps_underscores_and_unicode() {
        assert_eq!(tokenize("safety_rated Größe"), vec!["safety_rated", "größe"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("  ?! ").is_empty());
    }

    #[test]
    fn test_token_set_dedups() {
        let set = token_set("Guard the guard");
        assert_eq!(set.len(), 2);
        assert!(set.contains("guard"));
    }

    #[test]
    fn test_split_sentences_on_terminal_punctuation() {
        let s = split_sentences("First one. Second!! Third?  . Trailing");
        assert_eq!(s, vec!["First one", "Second", "Third", "Trailing"]);
    }

    #[test]
    fn test_split_sentences_breaks_decimals() {
        // Periods inside numbers are sentence boundaries too.
        assert_eq!(split_sentences("Version 2.1 applies"), vec!["Version 2", "1 applies"]);
    }
}
