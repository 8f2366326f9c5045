use concept_data::TupleError;

/// Errors raised by model construction and scoring.
///
/// Every variant is deterministic given its inputs; none is worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum EventAeError {
    /// Construction-time contract violation (sizes, hidden-size lists).
    #[error("Invalid model config: {0}")]
    InvalidConfig(String),

    /// A word tuple or candidate tuple has the wrong number of slots.
    #[error("{what} has {got} slots, expected {expected}")]
    SlotMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// A word or concept index is outside its table.
    #[error("{what} index {index} out of range for size {size}")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        size: usize,
    },

    /// Overflow or NaN while computing a partition function.
    #[error("Non-finite {quantity}")]
    NonFinite { quantity: &'static str },

    /// Every candidate has zero reconstruction probability.
    #[error("Posterior partition is zero: no candidate can reconstruct the words")]
    DegeneratePosterior,

    /// A batch objective was requested over zero examples.
    #[error("Batch contains no examples")]
    EmptyBatch,

    #[error(transparent)]
    Tuple(#[from] TupleError),
}
