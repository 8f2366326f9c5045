//! Integer-indexed tuple types shared by the data preparer and the model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural errors raised while building tuples and candidate sets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TupleError {
    /// A candidate set must contain at least one concept tuple.
    #[error("candidate set is empty")]
    EmptyCandidateSet,

    /// A candidate tuple does not have the same width as the first one.
    #[error("candidate {index} has {got} slots, expected {expected}")]
    RaggedCandidates {
        index: usize,
        expected: usize,
        got: usize,
    },
}

/// Word indices of one predicate-argument tuple, predicate first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordTuple(Vec<usize>);

impl WordTuple {
    pub fn new(words: Vec<usize>) -> Self {
        Self(words)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Number of slots (predicate + arguments).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for WordTuple {
    fn from(words: Vec<usize>) -> Self {
        Self(words)
    }
}

/// One assignment of ontology concepts to the slots of a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConceptTuple(Vec<usize>);

impl ConceptTuple {
    pub fn new(concepts: Vec<usize>) -> Self {
        Self(concepts)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for ConceptTuple {
    fn from(concepts: Vec<usize>) -> Self {
        Self(concepts)
    }
}

impl fmt::Display for ConceptTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

/// Ordered, non-empty set of candidate concept tuples of equal width.
///
/// This is the finite support every distribution over concept assignments is
/// normalized over. Construction rejects empty and ragged collections, so a
/// `CandidateSet` in hand always has at least one tuple and a single width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ConceptTuple>", into = "Vec<ConceptTuple>")]
pub struct CandidateSet {
    tuples: Vec<ConceptTuple>,
}

impl CandidateSet {
    /// Build a candidate set, checking non-emptiness and uniform width.
    pub fn new(tuples: Vec<ConceptTuple>) -> Result<Self, TupleError> {
        let first = tuples.first().ok_or(TupleError::EmptyCandidateSet)?;
        let expected = first.len();
        for (index, tuple) in tuples.iter().enumerate() {
            if tuple.len() != expected {
                return Err(TupleError::RaggedCandidates {
                    index,
                    expected,
                    got: tuple.len(),
                });
            }
        }
        Ok(Self { tuples })
    }

    /// Build a candidate set from raw index rows.
    pub fn from_rows(rows: Vec<Vec<usize>>) -> Result<Self, TupleError> {
        Self::new(rows.into_iter().map(ConceptTuple::new).collect())
    }

    /// Cartesian product of per-slot concept lists, in slot order.
    ///
    /// The last slot varies fastest, so candidates come out in lexicographic
    /// order of each slot's list order.
    pub fn cartesian(slot_concepts: &[Vec<usize>]) -> Result<Self, TupleError> {
        if slot_concepts.is_empty() {
            return Err(TupleError::EmptyCandidateSet);
        }
        let mut rows: Vec<Vec<usize>> = vec![Vec::with_capacity(slot_concepts.len())];
        for concepts in slot_concepts {
            let mut next = Vec::with_capacity(rows.len() * concepts.len());
            for prefix in &rows {
                for &c in concepts {
                    let mut row = prefix.clone();
                    row.push(c);
                    next.push(row);
                }
            }
            rows = next;
        }
        Self::from_rows(rows)
    }

    pub fn tuples(&self) -> &[ConceptTuple] {
        &self.tuples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConceptTuple> {
        self.tuples.iter()
    }

    /// Number of candidate tuples (never zero).
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Number of slots shared by every candidate.
    pub fn width(&self) -> usize {
        self.tuples[0].len()
    }

    /// Concept indices of one slot across all candidates, in candidate order.
    pub fn slot_column(&self, slot: usize) -> Vec<usize> {
        self.tuples.iter().map(|t| t.as_slice()[slot]).collect()
    }
}

impl TryFrom<Vec<ConceptTuple>> for CandidateSet {
    type Error = TupleError;

    fn try_from(tuples: Vec<ConceptTuple>) -> Result<Self, Self::Error> {
        Self::new(tuples)
    }
}

impl From<CandidateSet> for Vec<ConceptTuple> {
    fn from(set: CandidateSet) -> Self {
        set.tuples
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a ConceptTuple;
    type IntoIter = std::slice::Iter<'a, ConceptTuple>;

    fn into_iter(self) -> Self::IntoIter {
        self.tuples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_candidate_set_rejected() {
        assert_eq!(
            CandidateSet::new(vec![]).unwrap_err(),
            TupleError::EmptyCandidateSet
        );
    }

    #[test]
    fn test_ragged_candidates_rejected() {
        let err = CandidateSet::from_rows(vec![vec![0, 1, 2], vec![0, 1]]).unwrap_err();
        assert_eq!(
            err,
            TupleError::RaggedCandidates {
                index: 1,
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn test_cartesian_order() {
        let set = CandidateSet::cartesian(&[vec![0, 1], vec![5], vec![2, 3]]).unwrap();
        let rows: Vec<Vec<usize>> = set.iter().map(|t| t.as_slice().to_vec()).collect();
        assert_eq!(
            rows,
            vec![
                vec![0, 5, 2],
                vec![0, 5, 3],
                vec![1, 5, 2],
                vec![1, 5, 3],
            ]
        );
        assert_eq!(set.width(), 3);
    }

    #[test]
    fn test_cartesian_with_empty_slot_is_empty() {
        let err = CandidateSet::cartesian(&[vec![0, 1], vec![]]).unwrap_err();
        assert_eq!(err, TupleError::EmptyCandidateSet);
        assert_eq!(
            CandidateSet::cartesian(&[]).unwrap_err(),
            TupleError::EmptyCandidateSet
        );
    }

    #[test]
    fn test_slot_column() {
        let set = CandidateSet::from_rows(vec![vec![0, 4], vec![1, 5], vec![2, 6]]).unwrap();
        assert_eq!(set.slot_column(0), vec![0, 1, 2]);
        assert_eq!(set.slot_column(1), vec![4, 5, 6]);
    }

    #[test]
    fn test_concept_tuple_display() {
        assert_eq!(ConceptTuple::new(vec![3, 1, 4]).to_string(), "(3, 1, 4)");
    }
}
