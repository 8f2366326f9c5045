//! Posterior decoding and checkpoint I/O.
//!
//! `EventAeScorer<B>` turns the tensor-valued model operations into plain
//! `f64` results: ranked concept assignments and per-example objectives.
//! `save_checkpoint` / `load_checkpoint` persist a model together with the
//! `EventAeConfig` needed to rebuild its shape.

use std::path::Path;

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use concept_data::{CandidateSet, ConceptTuple, TupleError, WordTuple};

use crate::error::EventAeError;
use crate::model::bridge::{tensor_to_f64, tensor_to_vec};
use crate::model::event_ae::{EventAe, EventAeConfig};

const MODEL_FILE: &str = "model";
const CONFIG_FILE: &str = "config.json";

/// One candidate with its posterior weight and the quantities behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub concepts: ConceptTuple,
    /// Posterior responsibility `w(y)`.
    pub weight: f64,
    /// Encoder energy.
    pub energy: f64,
    /// Reconstruction probability `Π_i R(y[i], x[i])`.
    pub reconstruction: f64,
}

/// Decodes concept assignments with a trained model.
pub struct EventAeScorer<B: Backend> {
    model: EventAe<B>,
}

impl<B: Backend> EventAeScorer<B> {
    pub fn new(model: EventAe<B>) -> Self {
        Self { model }
    }

    /// Load a scorer from a directory written by [`save_checkpoint`].
    pub fn load(dir: &Path, device: &B::Device) -> anyhow::Result<Self> {
        let (model, _) = load_checkpoint::<B>(dir, device)?;
        Ok(Self::new(model))
    }

    pub fn model(&self) -> &EventAe<B> {
        &self.model
    }

    /// Every candidate, sorted by descending posterior weight.
    ///
    /// Ties keep candidate-set order.
    pub fn rank_candidates(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<Vec<RankedCandidate>, EventAeError> {
        let weights = tensor_to_vec(self.model.posterior_weights(x, y_s)?);
        let energies = tensor_to_vec(self.model.energies(x, y_s)?);
        let reconstructions = tensor_to_vec(self.model.reconstruction_probs(x, y_s)?);

        let mut ranked: Vec<RankedCandidate> = y_s
            .iter()
            .zip(weights)
            .zip(energies.into_iter().zip(reconstructions))
            .map(|((concepts, weight), (energy, reconstruction))| RankedCandidate {
                concepts: concepts.clone(),
                weight,
                energy,
                reconstruction,
            })
            .collect();
        ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        Ok(ranked)
    }

    /// The maximum-posterior concept tuple.
    pub fn best_assignment(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<RankedCandidate, EventAeError> {
        self.rank_candidates(x, y_s)?
            .into_iter()
            .next()
            .ok_or(EventAeError::Tuple(TupleError::EmptyCandidateSet))
    }

    /// Expected complete-data log-likelihood of each example.
    pub fn score_examples<'a, I>(&self, examples: I) -> Result<Vec<f64>, EventAeError>
    where
        I: IntoIterator<Item = (&'a WordTuple, &'a CandidateSet)>,
    {
        examples
            .into_iter()
            .map(|(x, y_s)| {
                let ell = self.model.expected_log_likelihood(x, y_s)?;
                Ok(tensor_to_f64(ell))
            })
            .collect()
    }
}

/// Write `config.json` and `model.mpk` into `dir`, creating it if needed.
pub fn save_checkpoint<B: Backend>(
    model: &EventAe<B>,
    config: &EventAeConfig,
    dir: &Path,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    config
        .save(dir.join(CONFIG_FILE))
        .map_err(|e| anyhow::anyhow!("Failed to save config to {}: {e}", dir.display()))?;
    model
        .clone()
        .save_file(dir.join(MODEL_FILE), &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
        .map_err(|e| anyhow::anyhow!("Failed to save model to {}: {e}", dir.display()))?;
    tracing::info!(dir = %dir.display(), params = model.num_params(), "Saved checkpoint");
    Ok(())
}

/// Rebuild a model from a directory written by [`save_checkpoint`].
pub fn load_checkpoint<B: Backend>(
    dir: &Path,
    device: &B::Device,
) -> anyhow::Result<(EventAe<B>, EventAeConfig)> {
    let config = EventAeConfig::load(dir.join(CONFIG_FILE))
        .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {e}", dir.display()))?;
    let model = config
        .init::<B>(device)?
        .load_file(
            dir.join(MODEL_FILE),
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            device,
        )
        .map_err(|e| anyhow::anyhow!("Failed to load checkpoint from {}: {e}", dir.display()))?;
    tracing::info!(dir = %dir.display(), "Loaded checkpoint");
    Ok((model, config))
}
