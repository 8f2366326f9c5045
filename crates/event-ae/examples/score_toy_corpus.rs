//! Prepare a toy subject-verb-object corpus, train briefly, and print the
//! best concept assignment of every tuple.
//!
//! Usage:
//!   cargo run -p event-ae --example score_toy_corpus -- \
//!     --config configs/experiment.toml --steps 50 --checkpoint checkpoints/toy

use std::path::PathBuf;

use burn::backend::{Autodiff, NdArray};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use concept_data::{DataPreparer, ExactInstance, LexiconHypernyms};
use event_ae::model::bridge::tensor_to_f64;
use event_ae::{load_experiment_toml, save_checkpoint, EventAe, EventAeScorer, ExperimentToml};

type TrainBackend = Autodiff<NdArray<f32>>;

#[derive(Parser)]
struct Args {
    /// Experiment TOML; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of full-batch Adam steps.
    #[arg(long, default_value_t = 20)]
    steps: usize,
    /// Learning rate for both parameter groups.
    #[arg(long, default_value_t = 0.01)]
    lr: f64,
    /// Directory to write the trained checkpoint to.
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

fn lexicon() -> LexiconHypernyms {
    LexiconHypernyms::new()
        .with("v", "eat", ["consume.v.02", "eat.v.01", "feed.v.06"])
        .with("v", "chase", ["chase.v.01", "pursue.v.02"])
        .with("v", "drink", ["drink.v.01", "consume.v.02"])
        .with("n", "dog", ["dog.n.01", "canine.n.02", "animal.n.01"])
        .with("n", "cat", ["cat.n.01", "feline.n.01", "animal.n.01"])
        .with("n", "mouse", ["mouse.n.01", "rodent.n.01", "animal.n.01"])
        .with("n", "bone", ["bone.n.01", "structure.n.04"])
        .with("n", "milk", ["milk.n.01", "beverage.n.01", "food.n.01"])
        .with("n", "water", ["water.n.01", "beverage.n.01", "liquid.n.01"])
        .with("n", "cheese", ["cheese.n.01", "food.n.01"])
}

fn corpus() -> Vec<Vec<&'static str>> {
    vec![
        vec!["chase", "dog", "cat"],
        vec!["chase", "cat", "mouse"],
        vec!["eat", "dog", "bone"],
        vec!["eat", "mouse", "cheese"],
        vec!["drink", "cat", "milk"],
        vec!["drink", "dog", "water"],
        vec!["eat", "cat", "mouse"],
    ]
}

fn pairs(
    instances: &[ExactInstance],
) -> impl Iterator<Item = (&concept_data::WordTuple, &concept_data::CandidateSet)> {
    instances.iter().map(|inst| (&inst.words, &inst.candidates))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let experiment = match &args.config {
        Some(path) => load_experiment_toml(path)?,
        None => toml::from_str::<ExperimentToml>("")?,
    };

    let preparer = DataPreparer::new(experiment.pattern.clone(), lexicon())?;
    let data = preparer.prepare(&corpus(), &experiment.data)?;
    let instances = data
        .instances
        .exact()
        .ok_or_else(|| {
            anyhow::anyhow!("relaxed instances are data-only; set data.relaxed = false to train")
        })?;

    let config = experiment
        .model
        .to_config(data.num_args(), data.words.len(), data.concepts.len());
    let device = Default::default();
    let mut model: EventAe<TrainBackend> = config.init(&device)?;

    let encoder_ids = model.encoder_params();
    let reconstruction_ids = model.reconstruction_params();
    let mut encoder_optim = AdamConfig::new().init();
    let mut reconstruction_optim = AdamConfig::new().init();

    for step in 0..args.steps {
        let objective = model.batch_expected_log_likelihood(pairs(instances))?;
        let ell = tensor_to_f64(objective.clone().inner());

        let mut grads = objective.neg().backward();
        let encoder_grads = GradientsParams::from_params(&mut grads, &model, &encoder_ids);
        let reconstruction_grads =
            GradientsParams::from_params(&mut grads, &model, &reconstruction_ids);
        model = encoder_optim.step(args.lr, model, encoder_grads);
        model = reconstruction_optim.step(args.lr, model, reconstruction_grads);

        tracing::info!(step, ell, "Training step");
    }

    if let Some(dir) = &args.checkpoint {
        save_checkpoint(&model, &config, dir)?;
    }

    let scorer = EventAeScorer::new(model);
    let scores = scorer.score_examples(pairs(instances))?;
    for ((inst, tuple), ell) in instances.iter().zip(corpus()).zip(scores) {
        let best = scorer.best_assignment(&inst.words, &inst.candidates)?;
        let concepts: Vec<&str> = best
            .concepts
            .as_slice()
            .iter()
            .map(|&c| data.concepts.name(c).unwrap_or("?"))
            .collect();
        println!(
            "{:<24} -> {:<50} w={:.3} ell={ell:.3}",
            tuple.join(" "),
            concepts.join(" "),
            best.weight
        );
    }
    Ok(())
}
