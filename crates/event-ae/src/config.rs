//! TOML experiment config.
//!
//! An experiment file has a `[model]` section of hyperparameters that do not
//! depend on the data, and a `[data]` section for the preparer. Vocabulary
//! and ontology sizes are only known after preparation, so
//! [`ModelToml::to_config`] fills them in.

use std::path::Path;

use concept_data::PreparationConfig;
use serde::Deserialize;

use crate::model::event_ae::EventAeConfig;

/// Top-level structure of an experiment TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentToml {
    /// Part-of-speech tag of each slot, predicate first.
    #[serde(default = "default_pattern")]
    pub pattern: Vec<String>,
    #[serde(default)]
    pub model: ModelToml,
    #[serde(default)]
    pub data: PreparationConfig,
}

/// Data-independent model hyperparameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelToml {
    /// Hidden width used by every scorer without an explicit size.
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,

    /// Hidden width of the hypernymy scorer; defaults to `hidden_size`.
    #[serde(default)]
    pub hyp_hidden_size: Option<usize>,

    /// One hidden width per slot; defaults to `hidden_size` everywhere.
    #[serde(default)]
    pub wc_hidden_sizes: Option<Vec<usize>>,

    /// One hidden width per argument; defaults to `hidden_size` everywhere.
    #[serde(default)]
    pub cc_hidden_sizes: Option<Vec<usize>>,

    #[serde(default = "default_dim")]
    pub word_dim: usize,

    #[serde(default = "default_dim")]
    pub concept_dim: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_init_scale")]
    pub init_scale: f64,
}

fn default_pattern() -> Vec<String> {
    ["v", "n", "n"].iter().map(|s| s.to_string()).collect()
}
fn default_hidden_size() -> usize {
    50
}
fn default_dim() -> usize {
    50
}
fn default_seed() -> u64 {
    12345
}
fn default_init_scale() -> f64 {
    4.0
}

impl Default for ModelToml {
    fn default() -> Self {
        Self {
            hidden_size: default_hidden_size(),
            hyp_hidden_size: None,
            wc_hidden_sizes: None,
            cc_hidden_sizes: None,
            word_dim: default_dim(),
            concept_dim: default_dim(),
            seed: default_seed(),
            init_scale: default_init_scale(),
        }
    }
}

impl ModelToml {
    /// Complete the hyperparameters with data-dependent sizes.
    ///
    /// Explicit hidden-size lists are passed through unchanged, so a list of
    /// the wrong length is reported by `EventAeConfig::init`.
    pub fn to_config(&self, num_args: usize, vocab_size: usize, ont_size: usize) -> EventAeConfig {
        let wc = self
            .wc_hidden_sizes
            .clone()
            .unwrap_or_else(|| vec![self.hidden_size; num_args + 1]);
        let cc = self
            .cc_hidden_sizes
            .clone()
            .unwrap_or_else(|| vec![self.hidden_size; num_args]);
        EventAeConfig::new(
            num_args,
            vocab_size,
            ont_size,
            self.hyp_hidden_size.unwrap_or(self.hidden_size),
            wc,
            cc,
        )
        .with_word_dim(self.word_dim)
        .with_concept_dim(self.concept_dim)
        .with_seed(self.seed)
        .with_init_scale(self.init_scale)
    }
}

/// Load and deserialize an `ExperimentToml` from a TOML file.
pub fn load_experiment_toml(path: &Path) -> anyhow::Result<ExperimentToml> {
    let contents = std::fs::read_to_string(path)?;
    let config: ExperimentToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded experiment config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: ExperimentToml = toml::from_str("").unwrap();
        assert_eq!(cfg.pattern, vec!["v", "n", "n"]);
        assert_eq!(cfg.model.hidden_size, 50);
        assert_eq!(cfg.model.word_dim, 50);
        assert_eq!(cfg.model.seed, 12345);
        assert!((cfg.model.init_scale - 4.0).abs() < 1e-9);
        assert!(!cfg.data.relaxed);
        assert!(cfg.data.handle_oov);
    }

    #[test]
    fn test_partial_model_override() {
        let toml_str = r#"
            pattern = ["v", "n"]

            [model]
            hidden_size = 8
            cc_hidden_sizes = [3]
            word_dim = 10

            [data]
            oov_fraction = 0.05
        "#;
        let cfg: ExperimentToml = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.pattern.len(), 2);
        assert_eq!(cfg.model.hidden_size, 8);
        assert_eq!(cfg.model.concept_dim, 50);
        assert!((cfg.data.oov_fraction - 0.05).abs() < 1e-9);

        let model = cfg.model.to_config(1, 100, 200);
        assert_eq!(model.num_args, 1);
        assert_eq!(model.vocab_size, 100);
        assert_eq!(model.ont_size, 200);
        assert_eq!(model.hyp_hidden_size, 8);
        assert_eq!(model.wc_hidden_sizes, vec![8, 8]);
        assert_eq!(model.cc_hidden_sizes, vec![3]);
        assert_eq!(model.word_dim, 10);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_wrong_list_length_fails_at_validation() {
        let toml_str = r#"
            [model]
            wc_hidden_sizes = [4, 4]
        "#;
        let cfg: ExperimentToml = toml::from_str(toml_str).unwrap();
        let model = cfg.model.to_config(2, 10, 10);
        assert!(model.validate().is_err());
    }
}
