//! Event autoencoder for inducing concept assignments of predicate-argument
//! tuples.
//!
//! An energy-based encoder scores candidate concept tuples for a word tuple
//! with shared word/concept embeddings and three families of pair scorers
//! (hypernymy, word-concept and concept-concept preferences). A bilinear
//! decoder regenerates each word from its concept. Training maximizes the
//! expected complete-data log-likelihood under the posterior over the
//! hypernym candidate set; partitions are computed in log space.
//!
//! Everything is generic over the burn `Backend`; use `Autodiff<_>` to train.

pub mod config;
pub mod error;
pub mod inference;
pub mod model;

pub use config::{load_experiment_toml, ExperimentToml, ModelToml};
pub use error::EventAeError;
pub use inference::{load_checkpoint, save_checkpoint, EventAeScorer, RankedCandidate};
pub use model::embeddings::SharedEmbeddings;
pub use model::event_ae::{EnergyTerms, EventAe, EventAeConfig};
pub use model::reconstruction::{BilinearReconstruction, BilinearReconstructionConfig};
pub use model::scorer::{LinLayerScorer, LinLayerScorerConfig, PairScorer, ReconstructionScorer};
