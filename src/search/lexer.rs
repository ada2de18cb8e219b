//! Text normalisation matching Postgres' `english` text-search configuration:
//! default-parser word splitting, the `english.stop` list and Snowball stemming.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};

/// Contents of Postgres' `tsearch_data/english.stop`
const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "should", "now",
];

static STOP_WORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

static ENGLISH: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));

/// Lowercased words in parser order, split on anything that is not a letter
/// or digit.
///
/// A hyphenated compound such as `red-sunset` yields the whole compound and
/// then each part, as Postgres' default parser does. Every word takes one
/// position, stop words included.
pub fn words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in text.split(|c: char| !c.is_alphanumeric() && c != '-') {
        let parts: Vec<&str> = chunk.split('-').filter(|part| !part.is_empty()).collect();
        if parts.len() > 1 && parts.join("-") == chunk {
            words.push(chunk.to_lowercase());
        }
        words.extend(parts.into_iter().map(str::to_lowercase));
    }
    words
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Normalise one lowercased word into a lexeme, or drop it.
///
/// Words containing digits go through the `simple` dictionary in Postgres
/// and are kept verbatim.
pub fn lexeme(word: &str) -> Option<String> {
    if is_stop_word(word) {
        return None;
    }
    if word.chars().any(|c| c.is_ascii_digit()) {
        return Some(word.to_string());
    }
    Some(ENGLISH.stem(word).into_owned())
}

/// All lexemes of `text` in order, duplicates kept
pub fn lexemes(text: &str) -> Vec<String> {
    positioned_lexemes(text)
        .into_iter()
        .map(|(_, lexeme)| lexeme)
        .collect()
}

/// Lexemes with their 1-based word position, as `to_tsvector` numbers them
pub fn positioned_lexemes(text: &str) -> Vec<(u32, String)> {
    words(text)
        .iter()
        .zip(1u32..)
        .filter_map(|(word, position)| lexeme(word).map(|lexeme| (position, lexeme)))
        .collect()
}
