use burn::module::{Param, ParamId};
use burn::prelude::*;
use rand::Rng;

use crate::model::embeddings::{glorot_range, uniform_matrix};

/// Scores pairs of embedding rows.
///
/// `left` and `right` are row batches; either may have a single row, which
/// is broadcast against the other. The result has one score per row.
pub trait PairScorer<B: Backend> {
    fn score(&self, left: Tensor<B, 2>, right: Tensor<B, 2>) -> Tensor<B, 1>;

    /// Ids of the trainable parameters this scorer owns.
    fn param_ids(&self) -> Vec<ParamId>;
}

/// Probability that a concept regenerates a word, in `[0, 1]`.
///
/// `concepts` are ontology indices, one per output row; `words` holds the
/// matching word rows, or a single row broadcast against every concept.
pub trait ReconstructionScorer<B: Backend> {
    fn probability(&self, concepts: &[usize], words: Tensor<B, 2>) -> Tensor<B, 1>;

    /// `log probability`, finite wherever the underlying logit is finite.
    ///
    /// Its gradient must stay finite when `probability` underflows to 0.
    fn log_probability(&self, concepts: &[usize], words: Tensor<B, 2>) -> Tensor<B, 1>;

    fn param_ids(&self) -> Vec<ParamId>;
}

/// Configuration for a single-hidden-layer pair scorer.
#[derive(Config, Debug)]
pub struct LinLayerScorerConfig {
    /// Width of the left input rows.
    pub d_left: usize,
    /// Width of the right input rows.
    pub d_right: usize,
    /// Hidden layer width.
    pub d_hidden: usize,
}

/// `score(a, b) = v · tanh(a W_l + b W_r + b_h) + b_o`
#[derive(Module, Debug)]
pub struct LinLayerScorer<B: Backend> {
    /// Shape (d_left, d_hidden).
    pub(crate) left_weight: Param<Tensor<B, 2>>,
    /// Shape (d_right, d_hidden).
    pub(crate) right_weight: Param<Tensor<B, 2>>,
    /// Shape (d_hidden,).
    hidden_bias: Param<Tensor<B, 1>>,
    /// Shape (d_hidden,).
    output_weight: Param<Tensor<B, 1>>,
    /// Shape (1,).
    output_bias: Param<Tensor<B, 1>>,
}

impl LinLayerScorerConfig {
    /// Glorot-uniform weights drawn from `rng`, zero biases.
    pub fn init<B: Backend, R: Rng>(&self, rng: &mut R, device: &B::Device) -> LinLayerScorer<B> {
        let d_in = self.d_left + self.d_right;
        let hidden_range = glorot_range(d_in, self.d_hidden);
        let left_weight = uniform_matrix(self.d_left, self.d_hidden, hidden_range, rng, device);
        let right_weight = uniform_matrix(self.d_right, self.d_hidden, hidden_range, rng, device);
        let output_weight = uniform_matrix(
            1,
            self.d_hidden,
            glorot_range(self.d_hidden, 1),
            rng,
            device,
        )
        .reshape([self.d_hidden]);

        LinLayerScorer::new(
            left_weight,
            right_weight,
            Tensor::zeros([self.d_hidden], device),
            output_weight,
            Tensor::zeros([1], device),
        )
    }
}

impl<B: Backend> LinLayerScorer<B> {
    /// Build from explicit parameter tensors.
    ///
    /// # Panics
    /// Panics if the shapes are inconsistent.
    pub fn new(
        left_weight: Tensor<B, 2>,
        right_weight: Tensor<B, 2>,
        hidden_bias: Tensor<B, 1>,
        output_weight: Tensor<B, 1>,
        output_bias: Tensor<B, 1>,
    ) -> Self {
        let d_hidden = left_weight.dims()[1];
        assert_eq!(right_weight.dims()[1], d_hidden, "right weight hidden width");
        assert_eq!(hidden_bias.dims(), [d_hidden], "hidden bias shape");
        assert_eq!(output_weight.dims(), [d_hidden], "output weight shape");
        assert_eq!(output_bias.dims(), [1], "output bias shape");
        Self {
            left_weight: Param::from_tensor(left_weight),
            right_weight: Param::from_tensor(right_weight),
            hidden_bias: Param::from_tensor(hidden_bias),
            output_weight: Param::from_tensor(output_weight),
            output_bias: Param::from_tensor(output_bias),
        }
    }

    /// A scorer that returns `value` for every pair (zero weights).
    pub fn constant(
        d_left: usize,
        d_right: usize,
        d_hidden: usize,
        value: f64,
        device: &B::Device,
    ) -> Self {
        Self::new(
            Tensor::zeros([d_left, d_hidden], device),
            Tensor::zeros([d_right, d_hidden], device),
            Tensor::zeros([d_hidden], device),
            Tensor::zeros([d_hidden], device),
            Tensor::zeros([1], device).add_scalar(value),
        )
    }

    /// `(d_left, d_right, d_hidden)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        let [d_left, d_hidden] = self.left_weight.val().dims();
        (d_left, self.right_weight.val().dims()[0], d_hidden)
    }
}

impl<B: Backend> PairScorer<B> for LinLayerScorer<B> {
    fn score(&self, left: Tensor<B, 2>, right: Tensor<B, 2>) -> Tensor<B, 1> {
        let hidden = left.matmul(self.left_weight.val())
            + right.matmul(self.right_weight.val())
            + self.hidden_bias.val().unsqueeze_dim::<2>(0);
        let out = hidden
            .tanh()
            .matmul(self.output_weight.val().unsqueeze_dim::<2>(1)); // (n, 1)
        out.squeeze::<1>(1) + self.output_bias.val()
    }

    fn param_ids(&self) -> Vec<ParamId> {
        vec![
            self.left_weight.id,
            self.right_weight.id,
            self.hidden_bias.id,
            self.output_weight.id,
            self.output_bias.id,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bridge::{matrix_from_values, tensor_to_vec};
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::TensorData;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_score_shape_broadcasts_single_row() {
        let device = Default::default();
        let scorer = LinLayerScorerConfig::new(4, 6, 8)
            .init::<TestBackend, _>(&mut StdRng::seed_from_u64(1), &device);
        assert_eq!(scorer.dims(), (4, 6, 8));

        let left = Tensor::<TestBackend, 2>::ones([1, 4], &device);
        let right = Tensor::<TestBackend, 2>::ones([5, 6], &device);
        assert_eq!(scorer.score(left, right).dims(), [5]);

        let left = Tensor::<TestBackend, 2>::ones([3, 4], &device);
        let right = Tensor::<TestBackend, 2>::ones([1, 6], &device);
        assert_eq!(scorer.score(left, right).dims(), [3]);
    }

    #[test]
    fn test_constant_scorer() {
        let device = Default::default();
        let scorer = LinLayerScorer::<TestBackend>::constant(3, 3, 4, 0.75, &device);
        let left = Tensor::<TestBackend, 2>::random(
            [2, 3],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let right = Tensor::<TestBackend, 2>::ones([2, 3], &device);
        let scores = tensor_to_vec(scorer.score(left, right));
        assert!(scores.iter().all(|s| (s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn test_closed_form_single_unit() {
        // d = 1, h = 1: score = 2 * tanh(a + 3b) - 1
        let device = Default::default();
        let scorer = LinLayerScorer::<TestBackend>::new(
            matrix_from_values(vec![1.0], 1, 1, &device),
            matrix_from_values(vec![3.0], 1, 1, &device),
            Tensor::zeros([1], &device),
            Tensor::from_data(TensorData::from([2.0_f32]), &device),
            Tensor::from_data(TensorData::from([-1.0_f32]), &device),
        );
        let left = matrix_from_values(vec![0.5], 1, 1, &device);
        let right = matrix_from_values(vec![0.0, 0.1], 2, 1, &device);
        let scores = tensor_to_vec(scorer.score(left, right));
        let expected = [2.0 * 0.5_f64.tanh() - 1.0, 2.0 * 0.8_f64.tanh() - 1.0];
        for (s, e) in scores.iter().zip(expected) {
            assert!((s - e).abs() < 1e-5, "{s} vs {e}");
        }
    }

    #[test]
    fn test_init_is_seeded() {
        let device = Default::default();
        let cfg = LinLayerScorerConfig::new(2, 2, 3);
        let a = cfg.init::<TestBackend, _>(&mut StdRng::seed_from_u64(9), &device);
        let b = cfg.init::<TestBackend, _>(&mut StdRng::seed_from_u64(9), &device);
        let left = Tensor::<TestBackend, 2>::ones([1, 2], &device);
        let right = Tensor::<TestBackend, 2>::ones([1, 2], &device);
        assert_eq!(
            tensor_to_vec(a.score(left.clone(), right.clone())),
            tensor_to_vec(b.score(left, right))
        );
    }

    #[test]
    fn test_gradients_reach_every_parameter() {
        use burn::optim::GradientsParams;

        let device = Default::default();
        let scorer = LinLayerScorerConfig::new(3, 3, 4)
            .init::<TestAutodiffBackend, _>(&mut StdRng::seed_from_u64(3), &device);
        let left = Tensor::<TestAutodiffBackend, 2>::ones([1, 3], &device);
        let right = Tensor::<TestAutodiffBackend, 2>::ones([2, 3], &device).mul_scalar(0.5);

        let loss = scorer.score(left, right).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &scorer);

        assert!(grads.get::<NdArray<f32>, 2>(scorer.left_weight.id).is_some());
        assert!(grads.get::<NdArray<f32>, 2>(scorer.right_weight.id).is_some());
        assert!(grads.get::<NdArray<f32>, 1>(scorer.hidden_bias.id).is_some());
        assert!(grads.get::<NdArray<f32>, 1>(scorer.output_weight.id).is_some());
        assert!(grads.get::<NdArray<f32>, 1>(scorer.output_bias.id).is_some());
        assert_eq!(scorer.param_ids().len(), 5);
    }
}
