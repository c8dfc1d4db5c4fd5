//! Error message cleaning
//!
//! Lowercases, strips punctuation, tokenizes, drops stop-words and reduces
//! plural nouns to their lemma, so that "Unused variables" and "unused
//! variable" land on the same terms.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::error::ComputeError;

/// English stop-words removed before term weighting
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "could", "couldn", "did", "didn", "do", "does", "doesn", "doing",
    "don", "down", "during", "each", "either", "else", "etc", "ever", "every", "few", "for",
    "from", "further", "had", "hadn", "has", "hasn", "have", "haven", "having", "he", "her",
    "here", "hers", "herself", "him", "himself", "his", "how", "however", "if", "in", "into",
    "is", "isn", "it", "its", "itself", "just", "ll", "may", "me", "might", "more", "most",
    "must", "my", "myself", "neither", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "re", "same",
    "shall", "she", "should", "shouldn", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "upon", "us", "ve", "very", "was", "wasn",
    "we", "were", "weren", "what", "when", "where", "whether", "which", "while", "who", "whom",
    "why", "will", "with", "won", "would", "wouldn", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Irregular plurals the suffix rules would get wrong
const IRREGULAR_LEMMAS: &[(&str, &str)] = &[
    ("analyses", "analysis"),
    ("children", "child"),
    ("indices", "index"),
    ("matrices", "matrix"),
    ("vertices", "vertex"),
    ("criteria", "criterion"),
    ("men", "man"),
    ("people", "person"),
    ("aliases", "alias"),
    ("statuses", "status"),
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

/// Word tokens of at least two word characters; `_` joins identifiers
const WORD_PATTERN: &str = r"(?u)\b\w\w+\b";

fn word_pattern() -> Result<&'static Regex, ComputeError> {
    static WORD_RE: OnceCell<Regex> = OnceCell::new();
    WORD_RE
        .get_or_try_init(|| Regex::new(WORD_PATTERN))
        .map_err(|e| ComputeError::ParseError(format!("word pattern: {e}")))
}

/// Clean a single message into lemmatized, stop-word free tokens
pub fn clean(message: &str) -> Result<Vec<String>, ComputeError> {
    let lowered = message.to_lowercase();
    let tokens = word_pattern()?
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !is_stop_word(t))
        .map(lemmatize)
        .filter(|t| !is_stop_word(t))
        .collect();
    Ok(tokens)
}

/// Clean every usable message, skipping non-strings, blanks, and messages
/// that clean to nothing
pub fn clean_corpus<'a, I>(messages: I) -> Result<Vec<Vec<String>>, ComputeError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut corpus = Vec::new();
    for message in messages.into_iter().filter_map(Value::as_str) {
        let tokens = clean(message)?;
        if !tokens.is_empty() {
            corpus.push(tokens);
        }
    }
    Ok(corpus)
}

/// Reduce a plural noun to its singular form
pub fn lemmatize(token: &str) -> String {
    if let Some((_, lemma)) = IRREGULAR_LEMMAS.iter().find(|(plural, _)| *plural == token) {
        return lemma.to_string();
    }

    let len = token.len();
    if len > 4 && token.ends_with("ies") {
        return format!("{}y", &token[..len - 3]);
    }
    if token.ends_with("sses") {
        return token[..len - 2].to_string();
    }
    if len > 4 && (token.ends_with("xes") || token.ends_with("ches") || token.ends_with("shes")) {
        return token[..len - 2].to_string();
    }
    if len > 3
        && token.ends_with('s')
        && !token.ends_with("ss")
        && !token.ends_with("us")
        && !token.ends_with("is")
    {
        return token[..len - 1].to_string();
    }
    token.to_string()
}
