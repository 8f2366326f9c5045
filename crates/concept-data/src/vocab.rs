//! First-seen-order string index with occurrence counts and OOV bucketing.

use std::collections::{HashMap, HashSet};

/// Name of the shared out-of-vocabulary entry (always index 0 after bucketing).
pub const UNK: &str = "UNK";

/// String-to-index map that assigns indices in first-seen order and counts
/// how often each entry was observed.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    index: HashMap<String, usize>,
    names: Vec<String>,
    counts: Vec<u64>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index of `name`, inserting it if unseen. Does not count.
    pub fn intern(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.names.len();
        self.index.insert(name.to_string(), i);
        self.names.push(name.to_string());
        self.counts.push(0);
        i
    }

    /// Record one occurrence of `name`, inserting it if unseen.
    pub fn observe(&mut self, name: &str) -> usize {
        let i = self.intern(name);
        self.counts[i] += 1;
        i
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn count(&self, index: usize) -> u64 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Entries in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Collapse the `floor(fraction * len)` least frequent entries into [`UNK`].
    ///
    /// Ties are broken by first-seen order. Returns the rebuilt vocabulary
    /// (`UNK` at index 0, survivors from index 1 in their original order),
    /// the old→new index mapping, and the set of names that were bucketed.
    ///
    /// The name [`UNK`] is reserved: an observed entry with that name always
    /// joins the bucket, is reported among the bucketed names, and does not
    /// use up one of the `floor(fraction * len)` rare slots.
    pub fn bucket_rare(&self, fraction: f64) -> (Vocabulary, Vec<usize>, HashSet<String>) {
        let n_oov = (fraction * self.len() as f64).floor() as usize;

        let mut by_count: Vec<usize> = (0..self.len())
            .filter(|&i| self.names[i] != UNK)
            .collect();
        // stable: equal counts keep first-seen order
        by_count.sort_by_key(|&i| self.counts[i]);
        let oov: HashSet<usize> = by_count.into_iter().take(n_oov).collect();

        let mut fixed = Vocabulary::new();
        let unk = fixed.intern(UNK);
        let mut mapping = Vec::with_capacity(self.len());
        let mut oov_names = HashSet::with_capacity(oov.len());

        for (old, name) in self.names.iter().enumerate() {
            if oov.contains(&old) || name == UNK {
                mapping.push(unk);
                fixed.counts[unk] += self.counts[old];
                oov_names.insert(name.clone());
            } else {
                let new = fixed.intern(name);
                fixed.counts[new] += self.counts[old];
                mapping.push(new);
            }
        }
        (fixed, mapping, oov_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order_and_counts() {
        let mut vocab = Vocabulary::new();
        assert_eq!(vocab.observe("eat"), 0);
        assert_eq!(vocab.observe("dog"), 1);
        assert_eq!(vocab.observe("eat"), 0);
        assert_eq!(vocab.intern("bone"), 2);
        assert_eq!(vocab.count(0), 2);
        assert_eq!(vocab.count(1), 1);
        assert_eq!(vocab.count(2), 0);
        assert_eq!(vocab.get("dog"), Some(1));
        assert_eq!(vocab.name(2), Some("bone"));
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn test_bucket_rare_ties_follow_first_seen() {
        let mut vocab = Vocabulary::new();
        for name in ["a", "b", "c", "d"] {
            vocab.observe(name);
        }
        vocab.observe("a");
        vocab.observe("d");
        // counts: a=2, b=1, c=1, d=2 → two rarest are b, c (first seen first)
        let (fixed, mapping, oov) = vocab.bucket_rare(0.5);
        assert_eq!(fixed.names(), &["UNK", "a", "d"]);
        assert_eq!(mapping, vec![1, 0, 0, 2]);
        assert!(oov.contains("b") && oov.contains("c"));
        assert_eq!(fixed.count(0), 2);
    }

    #[test]
    fn test_bucket_rare_reserves_unk_name() {
        let mut vocab = Vocabulary::new();
        for name in ["a", "UNK", "b", "c"] {
            vocab.observe(name);
        }
        vocab.observe("a");
        vocab.observe("c");
        vocab.observe("UNK");
        // floor(0.25*4)=1 rare slot goes to b; the literal UNK joins the bucket too
        let (fixed, mapping, oov) = vocab.bucket_rare(0.25);
        assert_eq!(fixed.names(), &["UNK", "a", "c"]);
        assert_eq!(mapping, vec![1, 0, 0, 2]);
        assert!(oov.contains("UNK") && oov.contains("b"));
        assert_eq!(fixed.count(0), 3);
        assert_eq!(fixed.get("UNK"), Some(0));
    }

    #[test]
    fn test_bucket_rare_small_fraction_keeps_everything() {
        let mut vocab = Vocabulary::new();
        for name in ["x", "y", "z"] {
            vocab.observe(name);
        }
        let (fixed, mapping, oov) = vocab.bucket_rare(0.01);
        assert!(oov.is_empty());
        assert_eq!(fixed.names(), &["UNK", "x", "y", "z"]);
        assert_eq!(mapping, vec![1, 2, 3]);
    }
}
