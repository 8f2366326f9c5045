//! Predicate-argument tuples and their hypernym candidate sets.
//!
//! Provides the integer-indexed types consumed by the event autoencoder and
//! the preparer that builds them from word tuples.
//!
//! # Key types
//!
//! - [`WordTuple`] / [`ConceptTuple`]: one index per slot, predicate first
//! - [`CandidateSet`]: non-empty, equal-width set of concept tuples
//! - [`DataPreparer`]: exact / relaxed instance building with OOV bucketing
//! - [`HypernymSource`]: pluggable ontology lookup

pub mod hypernyms;
pub mod prepare;
pub mod types;
pub mod vocab;

pub use hypernyms::{HypernymSource, LexiconHypernyms};
pub use prepare::{
    DataError, DataPreparer, ExactInstance, Instances, PreparationConfig, PreparedData,
    RelaxedInstance,
};
pub use types::{CandidateSet, ConceptTuple, TupleError, WordTuple};
pub use vocab::{Vocabulary, UNK};
