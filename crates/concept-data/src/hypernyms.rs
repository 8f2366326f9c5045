//! Hypernym candidate lookup.
//!
//! The preparer never talks to an ontology directly. It asks a
//! [`HypernymSource`] for the candidate concepts of a word under a
//! part-of-speech tag (e.g. `"v"`, `"n"`, `"a"`). WordNet-backed sources,
//! pronoun classes and number heuristics all live behind this trait.

use std::collections::HashMap;

/// Supplies candidate hypernym concept names for a word.
pub trait HypernymSource {
    /// Candidate concepts for `word` tagged `pos`, in a stable order.
    ///
    /// An empty result means the word is unknown to the ontology; the
    /// preparer then uses the word itself as its only concept.
    fn hypernyms(&self, word: &str, pos: &str) -> Vec<String>;
}

impl<T: HypernymSource + ?Sized> HypernymSource for &T {
    fn hypernyms(&self, word: &str, pos: &str) -> Vec<String> {
        (**self).hypernyms(word, pos)
    }
}

/// In-memory lexicon keyed by `(pos, lowercased word)`.
#[derive(Debug, Clone, Default)]
pub struct LexiconHypernyms {
    entries: HashMap<(String, String), Vec<String>>,
}

impl LexiconHypernyms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hypernyms of `word` under `pos`, replacing earlier entries.
    pub fn insert<I, S>(&mut self, pos: &str, word: &str, hypernyms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            (pos.to_string(), word.to_lowercase()),
            hypernyms.into_iter().map(Into::into).collect(),
        );
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<I, S>(mut self, pos: &str, word: &str, hypernyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(pos, word, hypernyms);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HypernymSource for LexiconHypernyms {
    fn hypernyms(&self, word: &str, pos: &str) -> Vec<String> {
        self.entries
            .get(&(pos.to_string(), word.to_lowercase()))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive_and_pos_scoped() {
        let lexicon = LexiconHypernyms::new().with("n", "Dog", ["dog.n.01", "animal.n.01"]);
        assert_eq!(
            lexicon.hypernyms("dog", "n"),
            vec!["dog.n.01".to_string(), "animal.n.01".to_string()]
        );
        assert!(lexicon.hypernyms("dog", "v").is_empty());
        assert!(lexicon.hypernyms("cat", "n").is_empty());
    }

    #[test]
    fn test_insert_replaces() {
        let mut lexicon = LexiconHypernyms::new();
        lexicon.insert("v", "eat", ["eat.v.01"]);
        lexicon.insert("v", "eat", ["consume.v.02"]);
        assert_eq!(lexicon.len(), 1);
        assert_eq!(lexicon.hypernyms("eat", "v"), vec!["consume.v.02".to_string()]);
    }
}
