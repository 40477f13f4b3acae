//! Optional syntactic analysis used to enrich validation.
//!
//! No analyzer ships with the crate; callers plug one in through [`SyntacticAnalyzer`].

/// Universal POS tags treated as content words.
const CONTENT_POS: [&str; 4] = ["NOUN", "VERB", "ADJ", "ADV"];

/// One token of an analyzed sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Universal POS tag, e.g. `NOUN`.
    pub pos: String,
    /// Index of the syntactic head; equal to the token's own index for the root.
    pub head: usize,
}

pub trait SyntacticAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Vec<Token>;

    /// Similarity of two words or phrases in `[0, 1]`.
    fn similarity(&self, a: &str, b: &str) -> f32;
}

/// Words around every occurrence of `word`: its dependents, its head and the other
/// content words of the sentence. First occurrence order, no duplicates.
pub fn context_words(analyzer: &dyn SyntacticAnalyzer, sentence: &str, word: &str) -> Vec<String> {
    let tokens = analyzer.analyze(sentence);
    let mut words: Vec<String> = Vec::new();
    let mut push = |text: &str| {
        if !words.iter().any(|w| w == text) {
            words.push(text.to_string());
        }
    };

    for (idx, token) in tokens.iter().enumerate() {
        if !token.text.eq_ignore_ascii_case(word) {
            continue;
        }
        for child in tokens
            .iter()
            .enumerate()
            .filter(|(child_idx, child)| child.head == idx && *child_idx != idx)
        {
            push(&child.1.text);
        }
        if token.head != idx {
            if let Some(head) = tokens.get(token.head) {
                push(&head.text);
            }
        }
        for (other_idx, other) in tokens.iter().enumerate() {
            if other_idx != idx && CONTENT_POS.contains(&other.pos.as_str()) {
                push(&other.text);
            }
        }
    }
    words
}

/// Compares POS patterns before and after replacing `original` with `substitute`.
pub fn check_grammatical_substitution(
    analyzer: &dyn SyntacticAnalyzer,
    sentence: &str,
    original: &str,
    substitute: &str,
) -> (bool, String) {
    let original_tokens = analyzer.analyze(sentence);
    let Some(matched) = original_tokens
        .iter()
        .find(|t| t.text.eq_ignore_ascii_case(original))
        .map(|t| t.text.clone())
    else {
        return (false, format!("Could not find '{}' in sentence", original));
    };

    // Replace the word as written in the sentence, whatever its case.
    let substituted = sentence.replace(&matched, substitute);
    let original_pos: Vec<String> = original_tokens.into_iter().map(|t| t.pos).collect();
    let substituted_pos: Vec<String> = analyzer
        .analyze(&substituted)
        .into_iter()
        .map(|t| t.pos)
        .collect();

    if original_pos == substituted_pos {
        (true, "POS pattern preserved after substitution".to_string())
    } else {
        (
            false,
            format!(
                "POS pattern changed: {:?} -> {:?}",
                original_pos, substituted_pos
            ),
        )
    }
}
