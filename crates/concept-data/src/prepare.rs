//! Builds integer-indexed training instances from word tuples.
//!
//! For every tuple the preparer looks up candidate hypernyms per slot,
//! interns words and concepts in first-seen order, and emits either one
//! exact instance (full Cartesian candidate set) or one relaxed instance per
//! slot. Rare words and concepts can then be collapsed into a shared `UNK`
//! entry.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Deserialize;

use crate::hypernyms::HypernymSource;
use crate::types::{CandidateSet, TupleError, WordTuple};
use crate::vocab::Vocabulary;

/// Errors raised while preparing training data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    /// A tuple has a different number of slots than the part-of-speech pattern.
    #[error("tuple {line} has {got} slots, expected {expected}")]
    Arity {
        line: usize,
        expected: usize,
        got: usize,
    },

    /// The part-of-speech pattern needs a predicate and at least one argument.
    #[error("pos pattern must have at least 2 slots, got {0}")]
    Pattern(usize),

    #[error(transparent)]
    Tuple(#[from] TupleError),
}

/// Options for [`DataPreparer::prepare`], loadable from the `[data]` TOML table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreparationConfig {
    /// Emit one instance per slot instead of one per tuple.
    #[serde(default)]
    pub relaxed: bool,

    /// Collapse the rarest words and concepts into `UNK`.
    #[serde(default = "default_handle_oov")]
    pub handle_oov: bool,

    /// Fraction of each index treated as out-of-vocabulary.
    #[serde(default = "default_oov_fraction")]
    pub oov_fraction: f64,
}

fn default_handle_oov() -> bool {
    true
}
fn default_oov_fraction() -> f64 {
    0.01
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            relaxed: false,
            handle_oov: default_handle_oov(),
            oov_fraction: default_oov_fraction(),
        }
    }
}

/// Instance over the full concept-tuple space of one word tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactInstance {
    pub words: WordTuple,
    /// Cartesian product of the per-slot hypernym lists.
    pub candidates: CandidateSet,
}

/// Instance restricted to the hypernyms of a single slot.
///
/// Relaxed instances are data-only output for per-slot concept models; the
/// event autoencoder scores whole concept tuples and trains on
/// [`ExactInstance`]s only.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxedInstance {
    pub words: WordTuple,
    /// Slot whose concept is being induced.
    pub slot: usize,
    /// Candidate concepts of that slot.
    pub concepts: Vec<usize>,
}

/// Training instances in the mode they were prepared in.
#[derive(Debug, Clone, PartialEq)]
pub enum Instances {
    Exact(Vec<ExactInstance>),
    Relaxed(Vec<RelaxedInstance>),
}

impl Instances {
    pub fn len(&self) -> usize {
        match self {
            Self::Exact(v) => v.len(),
            Self::Relaxed(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact instances, or `None` if prepared in relaxed mode.
    pub fn exact(&self) -> Option<&[ExactInstance]> {
        match self {
            Self::Exact(v) => Some(v),
            Self::Relaxed(_) => None,
        }
    }

    /// Relaxed instances, or `None` if prepared in exact mode.
    pub fn relaxed(&self) -> Option<&[RelaxedInstance]> {
        match self {
            Self::Relaxed(v) => Some(v),
            Self::Exact(_) => None,
        }
    }

    fn remap(&mut self, words: &[usize], concepts: &[usize]) -> Result<(), TupleError> {
        let remap_words =
            |w: &WordTuple| WordTuple::new(w.as_slice().iter().map(|&i| words[i]).collect());
        match self {
            Self::Exact(instances) => {
                for inst in instances.iter_mut() {
                    inst.words = remap_words(&inst.words);
                    let rows: Vec<Vec<usize>> = inst
                        .candidates
                        .iter()
                        .map(|t| t.as_slice().iter().map(|&c| concepts[c]).collect())
                        .collect();
                    inst.candidates = CandidateSet::from_rows(rows)?;
                }
            }
            Self::Relaxed(instances) => {
                for inst in instances.iter_mut() {
                    inst.words = remap_words(&inst.words);
                    inst.concepts = inst.concepts.iter().map(|&c| concepts[c]).collect();
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Instances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(_) => write!(f, "exact"),
            Self::Relaxed(_) => write!(f, "relaxed"),
        }
    }
}

/// Output of [`DataPreparer::prepare`].
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub instances: Instances,
    pub words: Vocabulary,
    pub concepts: Vocabulary,
    /// Hypernym list fixed for each word at its first occurrence.
    pub word_hypernyms: HashMap<String, Vec<String>>,
    /// Words collapsed into `UNK` (empty when OOV handling is off).
    pub word_oov: HashSet<String>,
    /// Concepts collapsed into `UNK` (empty when OOV handling is off).
    pub concept_oov: HashSet<String>,
    num_slots: usize,
}

impl PreparedData {
    /// Number of predicate + argument slots per tuple, taken from the
    /// preparer's pattern (at least 2, even for an empty corpus).
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Number of argument slots, i.e. `num_slots() - 1`.
    pub fn num_args(&self) -> usize {
        self.num_slots - 1
    }
}

/// Turns word tuples into indexed instances using a [`HypernymSource`].
pub struct DataPreparer<S> {
    pred_arg_pos: Vec<String>,
    source: S,
}

impl<S: HypernymSource> DataPreparer<S> {
    /// `pred_arg_pos` gives the part-of-speech tag of each slot, predicate
    /// first, e.g. `["v", "n", "n"]` for verb-subject-object or `["n", "a"]`
    /// for adjectival modifiers.
    pub fn new<P: Into<String>>(
        pred_arg_pos: impl IntoIterator<Item = P>,
        source: S,
    ) -> Result<Self, DataError> {
        let pred_arg_pos: Vec<String> = pred_arg_pos.into_iter().map(Into::into).collect();
        if pred_arg_pos.len() < 2 {
            return Err(DataError::Pattern(pred_arg_pos.len()));
        }
        Ok(Self {
            pred_arg_pos,
            source,
        })
    }

    pub fn num_slots(&self) -> usize {
        self.pred_arg_pos.len()
    }

    pub fn prepare<T: AsRef<str>>(
        &self,
        tuples: &[Vec<T>],
        config: &PreparationConfig,
    ) -> Result<PreparedData, DataError> {
        let mut words = Vocabulary::new();
        let mut concepts = Vocabulary::new();
        let mut word_hypernyms: HashMap<String, Vec<String>> = HashMap::new();
        let mut exact = Vec::new();
        let mut relaxed = Vec::new();

        for (line, tuple) in tuples.iter().enumerate() {
            if tuple.len() != self.num_slots() {
                return Err(DataError::Arity {
                    line,
                    expected: self.num_slots(),
                    got: tuple.len(),
                });
            }

            let mut word_ids = Vec::with_capacity(tuple.len());
            let mut slot_concepts = Vec::with_capacity(tuple.len());
            for (word, pos) in tuple.iter().zip(&self.pred_arg_pos) {
                let word = word.as_ref();
                word_ids.push(words.observe(word));

                let hyps = word_hypernyms.entry(word.to_string()).or_insert_with(|| {
                    let found = self.source.hypernyms(word, pos);
                    if found.is_empty() {
                        vec![word.to_string()]
                    } else {
                        found
                    }
                });
                slot_concepts.push(hyps.iter().map(|h| concepts.observe(h)).collect::<Vec<_>>());
            }

            let words_tuple = WordTuple::new(word_ids);
            if config.relaxed {
                for (slot, concept_ids) in slot_concepts.into_iter().enumerate() {
                    relaxed.push(RelaxedInstance {
                        words: words_tuple.clone(),
                        slot,
                        concepts: concept_ids,
                    });
                }
            } else {
                exact.push(ExactInstance {
                    words: words_tuple,
                    candidates: CandidateSet::cartesian(&slot_concepts)?,
                });
            }
        }

        let mut instances = if config.relaxed {
            Instances::Relaxed(relaxed)
        } else {
            Instances::Exact(exact)
        };

        let (words, concepts, word_oov, concept_oov) = if config.handle_oov {
            let (fixed_words, word_map, word_oov) = words.bucket_rare(config.oov_fraction);
            let (fixed_concepts, concept_map, concept_oov) =
                concepts.bucket_rare(config.oov_fraction);
            instances.remap(&word_map, &concept_map)?;
            (fixed_words, fixed_concepts, word_oov, concept_oov)
        } else {
            (words, concepts, HashSet::new(), HashSet::new())
        };

        tracing::info!(
            mode = %instances,
            tuples = tuples.len(),
            instances = instances.len(),
            words = words.len(),
            concepts = concepts.len(),
            word_oov = word_oov.len(),
            concept_oov = concept_oov.len(),
            "Prepared training data"
        );

        Ok(PreparedData {
            instances,
            words,
            concepts,
            word_hypernyms,
            word_oov,
            concept_oov,
            num_slots: self.num_slots(),
        })
    }
}
