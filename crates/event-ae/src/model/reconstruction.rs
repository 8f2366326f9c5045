use burn::module::{Param, ParamId};
use burn::prelude::*;
use burn::tensor::activation::{log_sigmoid, sigmoid};
use rand::Rng;

use crate::model::bridge::indices_to_tensor;
use crate::model::embeddings::{glorot_range, uniform_matrix};
use crate::model::scorer::ReconstructionScorer;

/// Logits beyond this magnitude are saturated before `log_sigmoid`, so an
/// infinite bias yields an exact `-inf` / `0` without a NaN gradient.
const LOGIT_BOUND: f64 = 1e30;

/// Configuration for the bilinear reconstruction scorer.
#[derive(Config, Debug)]
pub struct BilinearReconstructionConfig {
    /// Rows of the decoder's own concept table.
    pub ont_size: usize,
    pub word_dim: usize,
}

/// `p(word | concept) = sigmoid(e_c · w + b)`
///
/// Bilinear in the one-hot concept and the word row: `e_c` is row `c` of a
/// concept table owned by the decoder, separate from the encoder's concept
/// embeddings. Word rows come from the shared word table.
#[derive(Module, Debug)]
pub struct BilinearReconstruction<B: Backend> {
    /// Shape (ont_size, word_dim).
    pub(crate) concept_rep: Param<Tensor<B, 2>>,
    /// Shape (1,).
    pub(crate) bias: Param<Tensor<B, 1>>,
}

impl BilinearReconstructionConfig {
    pub fn init<B: Backend, R: Rng>(
        &self,
        rng: &mut R,
        device: &B::Device,
    ) -> BilinearReconstruction<B> {
        let range = glorot_range(self.ont_size, self.word_dim);
        BilinearReconstruction::new(
            uniform_matrix(self.ont_size, self.word_dim, range, rng, device),
            Tensor::zeros([1], device),
        )
    }
}

impl<B: Backend> BilinearReconstruction<B> {
    /// # Panics
    /// Panics if `bias` does not have shape (1,).
    pub fn new(concept_rep: Tensor<B, 2>, bias: Tensor<B, 1>) -> Self {
        assert_eq!(bias.dims(), [1], "bias shape");
        Self {
            concept_rep: Param::from_tensor(concept_rep),
            bias: Param::from_tensor(bias),
        }
    }

    /// A scorer that assigns `probability` to every (concept, word) pair.
    ///
    /// `probability` is mapped through the logit, so 0.0 and 1.0 yield
    /// infinite biases and exact 0 / 1 outputs.
    pub fn constant(
        ont_size: usize,
        word_dim: usize,
        probability: f64,
        device: &B::Device,
    ) -> Self {
        let logit = (probability / (1.0 - probability)).ln();
        Self::new(
            Tensor::zeros([ont_size, word_dim], device),
            Tensor::zeros([1], device).add_scalar(logit),
        )
    }

    /// `(ont_size, word_dim)`.
    pub fn dims(&self) -> (usize, usize) {
        let [ont_size, word_dim] = self.concept_rep.val().dims();
        (ont_size, word_dim)
    }

    fn logits(&self, concepts: &[usize], words: Tensor<B, 2>) -> Tensor<B, 1> {
        let device = self.concept_rep.val().device();
        let rows = self
            .concept_rep
            .val()
            .select(0, indices_to_tensor(concepts, &device)); // (n, word_dim)
        (rows * words).sum_dim(1).squeeze::<1>(1) + self.bias.val()
    }
}

impl<B: Backend> ReconstructionScorer<B> for BilinearReconstruction<B> {
    fn probability(&self, concepts: &[usize], words: Tensor<B, 2>) -> Tensor<B, 1> {
        sigmoid(self.logits(concepts, words))
    }

    fn log_probability(&self, concepts: &[usize], words: Tensor<B, 2>) -> Tensor<B, 1> {
        let logits = self.logits(concepts, words);
        let never = logits.clone().equal_elem(f64::NEG_INFINITY);
        log_sigmoid(logits.clamp(-LOGIT_BOUND, LOGIT_BOUND)).mask_fill(never, f64::NEG_INFINITY)
    }

    fn param_ids(&self) -> Vec<ParamId> {
        vec![self.concept_rep.id, self.bias.id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bridge::{matrix_from_values, tensor_to_vec};
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::optim::GradientsParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_probability_in_unit_interval() {
        let device = Default::default();
        let rec = BilinearReconstructionConfig::new(5, 4)
            .init::<TestBackend, _>(&mut StdRng::seed_from_u64(2), &device);
        assert_eq!(rec.dims(), (5, 4));
        let words = Tensor::<TestBackend, 2>::random(
            [6, 4],
            burn::tensor::Distribution::Uniform(-3.0, 3.0),
            &device,
        );
        let probs = tensor_to_vec(rec.probability(&[0, 1, 2, 3, 4, 0], words));
        assert_eq!(probs.len(), 6);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_constant_probabilities() {
        let device = Default::default();
        let words = Tensor::<TestBackend, 2>::ones([1, 2], &device);

        for p in [0.0, 0.5, 1.0] {
            let rec = BilinearReconstruction::<TestBackend>::constant(3, 2, p, &device);
            let probs = tensor_to_vec(rec.probability(&[0, 1, 2], words.clone()));
            assert!(probs.iter().all(|q| (q - p).abs() < 1e-6), "{p}: {probs:?}");
        }
    }

    #[test]
    fn test_per_concept_rows() {
        // concept 0 row (1, 2), concept 1 row (-1, 0.5), b = 0
        let device = Default::default();
        let rec = BilinearReconstruction::<TestBackend>::new(
            matrix_from_values(vec![1.0, 2.0, -1.0, 0.5], 2, 2, &device),
            Tensor::zeros([1], &device),
        );
        let words = matrix_from_values(vec![0.5, 0.25], 1, 2, &device);
        let probs = tensor_to_vec(rec.probability(&[0, 1, 0], words));
        let sig = |x: f64| 1.0 / (1.0 + (-x).exp());
        assert!((probs[0] - sig(1.0)).abs() < 1e-5);
        assert!((probs[1] - sig(-0.375)).abs() < 1e-5);
        assert!((probs[2] - probs[0]).abs() < 1e-7);
    }

    #[test]
    fn test_log_probability_matches_log_of_probability() {
        let device = Default::default();
        let rec = BilinearReconstructionConfig::new(4, 3)
            .init::<TestBackend, _>(&mut StdRng::seed_from_u64(5), &device);
        let words = matrix_from_values(vec![0.3, -1.2, 2.0], 1, 3, &device);
        let probs = tensor_to_vec(rec.probability(&[0, 1, 2, 3], words.clone()));
        let logs = tensor_to_vec(rec.log_probability(&[0, 1, 2, 3], words));
        for (p, l) in probs.iter().zip(&logs) {
            assert!((p.ln() - l).abs() < 1e-4, "{p} vs exp({l})");
        }
    }

    #[test]
    fn test_log_probability_stays_finite_where_probability_underflows() {
        let device = Default::default();
        let rec = BilinearReconstruction::<TestBackend>::new(
            matrix_from_values(vec![-1000.0], 1, 1, &device),
            Tensor::zeros([1], &device),
        );
        let words = matrix_from_values(vec![1000.0], 1, 1, &device);
        assert_eq!(tensor_to_vec(rec.probability(&[0], words.clone())), vec![0.0]);
        let log = tensor_to_vec(rec.log_probability(&[0], words))[0];
        assert!(log.is_finite() && log < -1e5, "log = {log}");

        let never = BilinearReconstruction::<TestBackend>::constant(1, 1, 0.0, &device);
        let ones = Tensor::<TestBackend, 2>::ones([1, 1], &device);
        assert_eq!(
            tensor_to_vec(never.log_probability(&[0], ones)),
            vec![f64::NEG_INFINITY]
        );
    }

    #[test]
    fn test_log_probability_gradient_is_finite_when_saturated() {
        let device = Default::default();
        let rec = BilinearReconstruction::<TestAutodiffBackend>::new(
            matrix_from_values(vec![-1000.0, 1000.0], 2, 1, &device),
            Tensor::zeros([1], &device),
        );
        let words = matrix_from_values(vec![1000.0], 1, 1, &device);
        let total = rec.log_probability(&[0, 1], words).sum();
        let grads = GradientsParams::from_grads(total.backward(), &rec);

        let table = grads
            .get::<NdArray<f32>, 2>(rec.concept_rep.id)
            .expect("concept table gradient");
        let bias = grads
            .get::<NdArray<f32>, 1>(rec.bias.id)
            .expect("bias gradient");
        assert!(tensor_to_vec(table.reshape([2])).iter().all(|g| g.is_finite()));
        assert!(tensor_to_vec(bias).iter().all(|g| g.is_finite()));
    }
}
