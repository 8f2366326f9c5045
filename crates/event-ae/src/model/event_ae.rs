//! The event autoencoder.
//!
//! The encoder scores a concept tuple `y` for a word tuple `x` with an
//! unnormalized energy built from three families of pair scorers. The
//! decoder regenerates each word from its slot's concept. Training maximizes
//! the expected complete-data log-likelihood under the posterior over a
//! finite candidate set, with both partition functions computed in log space.

use burn::module::ParamId;
use burn::prelude::*;
use concept_data::{CandidateSet, ConceptTuple, WordTuple};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::EventAeError;
use crate::model::bridge::tensor_to_f64;
use crate::model::embeddings::SharedEmbeddings;
use crate::model::reconstruction::{BilinearReconstruction, BilinearReconstructionConfig};
use crate::model::scorer::{LinLayerScorer, LinLayerScorerConfig, PairScorer, ReconstructionScorer};

/// Hyperparameters of the event autoencoder.
///
/// `num_args` counts argument slots; the predicate occupies slot 0, so the
/// model handles `num_args + 1` slots.
#[derive(Config, Debug)]
pub struct EventAeConfig {
    /// Number of argument slots (at least 1).
    pub num_args: usize,
    /// Rows of the word table.
    pub vocab_size: usize,
    /// Rows of the concept table.
    pub ont_size: usize,
    /// Hidden width of the shared hypernymy scorer.
    pub hyp_hidden_size: usize,
    /// Hidden width of each word-concept scorer, one per slot.
    pub wc_hidden_sizes: Vec<usize>,
    /// Hidden width of each concept-concept scorer, one per argument slot.
    pub cc_hidden_sizes: Vec<usize>,
    #[config(default = 50)]
    pub word_dim: usize,
    #[config(default = 50)]
    pub concept_dim: usize,
    /// Seed for every random draw made during `init`.
    #[config(default = 12345)]
    pub seed: u64,
    /// Multiplier on the Glorot range of the embedding tables.
    #[config(default = 4.0)]
    pub init_scale: f64,
}

impl EventAeConfig {
    pub fn num_slots(&self) -> usize {
        self.num_args + 1
    }

    /// Check every size contract without allocating anything.
    pub fn validate(&self) -> Result<(), EventAeError> {
        let invalid = |msg: String| Err(EventAeError::InvalidConfig(msg));

        if self.num_args == 0 {
            return invalid("num_args must be at least 1".into());
        }
        for (name, value) in [
            ("vocab_size", self.vocab_size),
            ("ont_size", self.ont_size),
            ("hyp_hidden_size", self.hyp_hidden_size),
            ("word_dim", self.word_dim),
            ("concept_dim", self.concept_dim),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be positive"));
            }
        }
        if self.wc_hidden_sizes.len() != self.num_slots() {
            return invalid(format!(
                "wc_hidden_sizes has {} entries, expected one per slot ({})",
                self.wc_hidden_sizes.len(),
                self.num_slots()
            ));
        }
        if self.cc_hidden_sizes.len() != self.num_args {
            return invalid(format!(
                "cc_hidden_sizes has {} entries, expected one per argument ({})",
                self.cc_hidden_sizes.len(),
                self.num_args
            ));
        }
        if self.wc_hidden_sizes.contains(&0) || self.cc_hidden_sizes.contains(&0) {
            return invalid("hidden sizes must be positive".into());
        }
        if !(self.init_scale.is_finite() && self.init_scale > 0.0) {
            return invalid(format!("init_scale must be positive, got {}", self.init_scale));
        }
        Ok(())
    }

    /// Build a model with seeded random parameters.
    ///
    /// Draw order: word table, concept table, hypernymy scorer, word-concept
    /// scorers by slot, concept-concept scorers by argument, reconstruction.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<EventAe<B>, EventAeError> {
        self.validate()?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let embeddings = SharedEmbeddings::init(
            self.vocab_size,
            self.word_dim,
            self.ont_size,
            self.concept_dim,
            self.init_scale,
            &mut rng,
            device,
        );
        let hypernymy = LinLayerScorerConfig::new(self.word_dim, self.concept_dim, self.hyp_hidden_size)
            .init(&mut rng, device);
        let wc_preferences = self
            .wc_hidden_sizes
            .iter()
            .map(|&h| LinLayerScorerConfig::new(self.word_dim, self.concept_dim, h).init(&mut rng, device))
            .collect();
        let cc_preferences = self
            .cc_hidden_sizes
            .iter()
            .map(|&h| {
                LinLayerScorerConfig::new(self.concept_dim, self.concept_dim, h).init(&mut rng, device)
            })
            .collect();
        let reconstruction =
            BilinearReconstructionConfig::new(self.ont_size, self.word_dim).init(&mut rng, device);

        let model = EventAe::from_parts(
            embeddings,
            hypernymy,
            wc_preferences,
            cc_preferences,
            reconstruction,
        )?;

        tracing::info!(
            num_args = self.num_args,
            vocab_size = self.vocab_size,
            ont_size = self.ont_size,
            word_dim = self.word_dim,
            concept_dim = self.concept_dim,
            seed = self.seed,
            params = model.num_params(),
            "Initialized event autoencoder"
        );
        Ok(model)
    }
}

/// Event autoencoder over `num_args + 1` slots.
#[derive(Module, Debug)]
pub struct EventAe<B: Backend> {
    embeddings: SharedEmbeddings<B>,
    /// Word in slot i vs. concept in slot i, shared across slots.
    hypernymy: LinLayerScorer<B>,
    /// Scorer i: word in slot i vs. concept in every other slot.
    wc_preferences: Vec<LinLayerScorer<B>>,
    /// Scorer i-1: predicate concept vs. concept in argument slot i.
    cc_preferences: Vec<LinLayerScorer<B>>,
    reconstruction: BilinearReconstruction<B>,
    num_args: usize,
}

/// The three additive components of the encoder energy, one entry per
/// candidate.
#[derive(Debug, Clone)]
pub struct EnergyTerms<B: Backend> {
    pub hypernymy: Tensor<B, 1>,
    pub word_concept: Tensor<B, 1>,
    pub concept_concept: Tensor<B, 1>,
}

impl<B: Backend> EnergyTerms<B> {
    pub fn total(self) -> Tensor<B, 1> {
        self.hypernymy + self.word_concept + self.concept_concept
    }
}

/// Per-slot embedding rows for one word tuple and one candidate set.
struct SlotRows<B: Backend> {
    /// One (1, word_dim) row per slot.
    words: Vec<Tensor<B, 2>>,
    /// One (n, concept_dim) block per slot.
    concepts: Vec<Tensor<B, 2>>,
    /// Concept indices per slot, one per candidate.
    concept_ids: Vec<Vec<usize>>,
    n: usize,
}

/// Energy and log reconstruction probability per candidate.
struct CandidateScores<B: Backend> {
    energies: Tensor<B, 1>,
    log_rec: Tensor<B, 1>,
}

impl<B: Backend> EventAe<B> {
    /// Assemble a model from prebuilt components.
    ///
    /// The number of word-concept scorers fixes the slot count; there must be
    /// exactly one fewer concept-concept scorer. Scorer input widths must
    /// match the embedding tables, and the decoder needs one row per concept.
    pub fn from_parts(
        embeddings: SharedEmbeddings<B>,
        hypernymy: LinLayerScorer<B>,
        wc_preferences: Vec<LinLayerScorer<B>>,
        cc_preferences: Vec<LinLayerScorer<B>>,
        reconstruction: BilinearReconstruction<B>,
    ) -> Result<Self, EventAeError> {
        let num_slots = wc_preferences.len();
        if num_slots < 2 || cc_preferences.len() + 1 != num_slots {
            return Err(EventAeError::InvalidConfig(format!(
                "{} word-concept and {} concept-concept scorers do not describe a predicate with arguments",
                num_slots,
                cc_preferences.len()
            )));
        }

        let word_dim = embeddings.word_dim();
        let concept_dim = embeddings.concept_dim();
        let pair_dims_ok = |scorer: &LinLayerScorer<B>, left: usize, right: usize| {
            let (d_left, d_right, _) = scorer.dims();
            d_left == left && d_right == right
        };
        let dims_ok = pair_dims_ok(&hypernymy, word_dim, concept_dim)
            && wc_preferences.iter().all(|s| pair_dims_ok(s, word_dim, concept_dim))
            && cc_preferences.iter().all(|s| pair_dims_ok(s, concept_dim, concept_dim))
            && reconstruction.dims() == (embeddings.ont_size(), word_dim);
        if !dims_ok {
            return Err(EventAeError::InvalidConfig(format!(
                "scorer shapes do not match word_dim={word_dim}, concept_dim={concept_dim}, ont_size={}",
                embeddings.ont_size()
            )));
        }

        Ok(Self {
            embeddings,
            hypernymy,
            wc_preferences,
            cc_preferences,
            reconstruction,
            num_args: num_slots - 1,
        })
    }

    pub fn num_args(&self) -> usize {
        self.num_args
    }

    pub fn num_slots(&self) -> usize {
        self.num_args + 1
    }

    pub fn embeddings(&self) -> &SharedEmbeddings<B> {
        &self.embeddings
    }

    pub fn hypernymy(&self) -> &LinLayerScorer<B> {
        &self.hypernymy
    }

    /// Word-concept scorer for the word in `slot`, `None` past the last slot.
    pub fn wc_preference(&self, slot: usize) -> Option<&LinLayerScorer<B>> {
        self.wc_preferences.get(slot)
    }

    /// Concept-concept scorer pairing the predicate with argument `arg`
    /// (1-based, so `arg` is also the slot index).
    ///
    /// `None` for `arg == 0` (the predicate has no such scorer) and for
    /// `arg > num_args`.
    pub fn cc_preference(&self, arg: usize) -> Option<&LinLayerScorer<B>> {
        arg.checked_sub(1).and_then(|k| self.cc_preferences.get(k))
    }

    pub fn reconstruction(&self) -> &BilinearReconstruction<B> {
        &self.reconstruction
    }

    /// Parameters of the encoder: both tables and every pair scorer.
    pub fn encoder_params(&self) -> Vec<ParamId> {
        let mut ids = self.embeddings.param_ids();
        ids.extend(self.hypernymy.param_ids());
        for scorer in self.wc_preferences.iter().chain(&self.cc_preferences) {
            ids.extend(scorer.param_ids());
        }
        ids
    }

    /// Parameters of the reconstruction scorer only: its own concept table
    /// and bias. Word rows it reads belong to the encoder group.
    pub fn reconstruction_params(&self) -> Vec<ParamId> {
        self.reconstruction.param_ids()
    }

    // ---- Validation & lookup -------------------------------------------

    fn check_words(&self, x: &WordTuple) -> Result<(), EventAeError> {
        if x.len() != self.num_slots() {
            return Err(EventAeError::SlotMismatch {
                what: "word tuple",
                expected: self.num_slots(),
                got: x.len(),
            });
        }
        let size = self.embeddings.vocab_size();
        if let Some(&index) = x.as_slice().iter().find(|&&w| w >= size) {
            return Err(EventAeError::IndexOutOfRange {
                what: "word",
                index,
                size,
            });
        }
        Ok(())
    }

    fn check_candidates(&self, y_s: &CandidateSet) -> Result<(), EventAeError> {
        if y_s.width() != self.num_slots() {
            return Err(EventAeError::SlotMismatch {
                what: "candidate tuple",
                expected: self.num_slots(),
                got: y_s.width(),
            });
        }
        let size = self.embeddings.ont_size();
        let out_of_range = y_s
            .iter()
            .flat_map(|y| y.as_slice().iter().copied())
            .find(|&c| c >= size);
        if let Some(index) = out_of_range {
            return Err(EventAeError::IndexOutOfRange {
                what: "concept",
                index,
                size,
            });
        }
        Ok(())
    }

    fn slot_rows(&self, x: &WordTuple, y_s: &CandidateSet) -> Result<SlotRows<B>, EventAeError> {
        self.check_words(x)?;
        self.check_candidates(y_s)?;
        let words = x
            .as_slice()
            .iter()
            .map(|&w| self.embeddings.words(&[w]))
            .collect();
        let concept_ids: Vec<Vec<usize>> = (0..self.num_slots())
            .map(|slot| y_s.slot_column(slot))
            .collect();
        let concepts = concept_ids
            .iter()
            .map(|ids| self.embeddings.concepts(ids))
            .collect();
        Ok(SlotRows {
            words,
            concepts,
            concept_ids,
            n: y_s.len(),
        })
    }

    fn zeros(&self, n: usize) -> Tensor<B, 1> {
        Tensor::zeros([n], &self.embeddings.device())
    }

    fn terms_from_rows(&self, rows: &SlotRows<B>) -> EnergyTerms<B> {
        let slots = self.num_slots();

        let mut hypernymy = self.zeros(rows.n);
        for i in 0..slots {
            hypernymy = hypernymy
                + self
                    .hypernymy
                    .score(rows.words[i].clone(), rows.concepts[i].clone());
        }

        let mut word_concept = self.zeros(rows.n);
        for i in 0..slots {
            for j in (0..slots).filter(|&j| j != i) {
                word_concept = word_concept
                    + self.wc_preferences[i].score(rows.words[i].clone(), rows.concepts[j].clone());
            }
        }

        let mut concept_concept = self.zeros(rows.n);
        for arg in 1..slots {
            concept_concept = concept_concept
                + self.cc_preferences[arg - 1]
                    .score(rows.concepts[0].clone(), rows.concepts[arg].clone());
        }

        EnergyTerms {
            hypernymy,
            word_concept,
            concept_concept,
        }
    }

    fn log_rec_from_rows(&self, rows: &SlotRows<B>) -> Tensor<B, 1> {
        let mut log_rec = self.zeros(rows.n);
        for (ids, words) in rows.concept_ids.iter().zip(&rows.words) {
            log_rec = log_rec + self.reconstruction.log_probability(ids, words.clone());
        }
        log_rec
    }

    fn candidate_scores(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<CandidateScores<B>, EventAeError> {
        let rows = self.slot_rows(x, y_s)?;
        Ok(CandidateScores {
            energies: self.terms_from_rows(&rows).total(),
            log_rec: self.log_rec_from_rows(&rows),
        })
    }

    // ---- Encoder ---------------------------------------------------------

    /// The three energy components for every candidate in `y_s`.
    pub fn energy_terms(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<EnergyTerms<B>, EventAeError> {
        let rows = self.slot_rows(x, y_s)?;
        Ok(self.terms_from_rows(&rows))
    }

    /// Encoder energy of every candidate, shape `[n]`.
    pub fn energies(&self, x: &WordTuple, y_s: &CandidateSet) -> Result<Tensor<B, 1>, EventAeError> {
        Ok(self.energy_terms(x, y_s)?.total())
    }

    /// Encoder energy of a single concept tuple, shape `[1]`.
    pub fn energy(&self, x: &WordTuple, y: &ConceptTuple) -> Result<Tensor<B, 1>, EventAeError> {
        self.energies(x, &single(y)?)
    }

    /// `log Σ_y exp(energy(x, y))`, shape `[1]`.
    pub fn log_encoder_partition(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        log_sum_exp(self.energies(x, y_s)?, "encoder partition")
    }

    /// `Σ_y exp(energy(x, y))`, shape `[1]`.
    pub fn encoder_partition(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        finite_exp(self.log_encoder_partition(x, y_s)?, "encoder partition")
    }

    // ---- Decoder ---------------------------------------------------------

    /// `Σ_i log R(y[i], x[i])` for every candidate, shape `[n]`.
    pub fn log_reconstruction_probs(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        let rows = self.slot_rows(x, y_s)?;
        Ok(self.log_rec_from_rows(&rows))
    }

    /// `Π_i R(y[i], x[i])` for every candidate, shape `[n]`.
    pub fn reconstruction_probs(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        Ok(self.log_reconstruction_probs(x, y_s)?.exp())
    }

    /// `Π_i R(y[i], x[i])` for a single concept tuple, shape `[1]`.
    pub fn reconstruction_prob(
        &self,
        x: &WordTuple,
        y: &ConceptTuple,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        self.reconstruction_probs(x, &single(y)?)
    }

    // ---- Posterior -------------------------------------------------------

    /// `exp(energy(x, y)) · reconstruction_prob(x, y)`, shape `[1]`.
    pub fn posterior_numerator(
        &self,
        x: &WordTuple,
        y: &ConceptTuple,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        let scores = self.candidate_scores(x, &single(y)?)?;
        finite_exp(scores.energies + scores.log_rec, "posterior numerator")
    }

    /// `log Σ_y exp(energy(x, y)) · R(x, y)`, shape `[1]`.
    pub fn log_posterior_partition(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        let scores = self.candidate_scores(x, y_s)?;
        log_posterior_partition(scores.energies + scores.log_rec)
    }

    /// `Σ_y exp(energy(x, y)) · R(x, y)`, shape `[1]`.
    pub fn posterior_partition(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        let z = finite_exp(self.log_posterior_partition(x, y_s)?, "posterior partition")?;
        if tensor_to_f64(z.clone()) == 0.0 {
            return Err(EventAeError::DegeneratePosterior);
        }
        Ok(z)
    }

    /// Posterior responsibilities `w(y)`, shape `[n]`, summing to 1.
    pub fn posterior_weights(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        let scores = self.candidate_scores(x, y_s)?;
        let log_numerators = scores.energies + scores.log_rec;
        let log_z = log_posterior_partition(log_numerators.clone())?;
        Ok((log_numerators - log_z).exp())
    }

    // ---- Objective -------------------------------------------------------

    /// Expected complete-data log-likelihood of one example, shape `[1]`:
    /// `Σ_y w(y) [energy(x, y) − log Z_enc + log R(x, y)]`.
    ///
    /// Candidates with zero posterior weight contribute exactly 0.
    pub fn expected_log_likelihood(
        &self,
        x: &WordTuple,
        y_s: &CandidateSet,
    ) -> Result<Tensor<B, 1>, EventAeError> {
        let CandidateScores { energies, log_rec } = self.candidate_scores(x, y_s)?;

        let log_z_enc = log_sum_exp(energies.clone(), "encoder partition")?;
        let log_numerators = energies.clone() + log_rec.clone();
        let log_z_post = log_posterior_partition(log_numerators.clone())?;
        let weights = (log_numerators - log_z_post).exp();

        let log_joint = energies - log_z_enc + log_rec;
        let log_joint = log_joint.mask_fill(weights.clone().equal_elem(0.0), 0.0);
        Ok((weights * log_joint).sum())
    }

    /// Sum of [`expected_log_likelihood`](Self::expected_log_likelihood)
    /// over a batch of `(x, y_s)` examples, shape `[1]`.
    pub fn batch_expected_log_likelihood<'a, I>(&self, examples: I) -> Result<Tensor<B, 1>, EventAeError>
    where
        I: IntoIterator<Item = (&'a WordTuple, &'a CandidateSet)>,
    {
        let mut total: Option<Tensor<B, 1>> = None;
        for (x, y_s) in examples {
            let ell = self.expected_log_likelihood(x, y_s)?;
            total = Some(match total {
                Some(acc) => acc + ell,
                None => ell,
            });
        }
        total.ok_or(EventAeError::EmptyBatch)
    }
}

fn single(y: &ConceptTuple) -> Result<CandidateSet, EventAeError> {
    Ok(CandidateSet::new(vec![y.clone()])?)
}

/// Numerically stable `log Σ exp(v)` with a detached max shift, shape `[1]`.
fn log_sum_exp<B: Backend>(values: Tensor<B, 1>, quantity: &'static str) -> Result<Tensor<B, 1>, EventAeError> {
    let shift = values.clone().max().detach();
    if !tensor_to_f64(shift.clone()).is_finite() {
        return Err(EventAeError::NonFinite { quantity });
    }
    let lse = (values - shift.clone()).exp().sum().log() + shift;
    if !tensor_to_f64(lse.clone()).is_finite() {
        return Err(EventAeError::NonFinite { quantity });
    }
    Ok(lse)
}

/// Log-space posterior partition over `energy + log R`.
///
/// All-`-inf` numerators mean no candidate can reconstruct the words.
fn log_posterior_partition<B: Backend>(log_numerators: Tensor<B, 1>) -> Result<Tensor<B, 1>, EventAeError> {
    if tensor_to_f64(log_numerators.clone().max()) == f64::NEG_INFINITY {
        return Err(EventAeError::DegeneratePosterior);
    }
    log_sum_exp(log_numerators, "posterior partition")
}

fn finite_exp<B: Backend>(log_value: Tensor<B, 1>, quantity: &'static str) -> Result<Tensor<B, 1>, EventAeError> {
    let value = log_value.exp();
    if !tensor_to_f64(value.clone()).is_finite() {
        return Err(EventAeError::NonFinite { quantity });
    }
    Ok(value)
}
