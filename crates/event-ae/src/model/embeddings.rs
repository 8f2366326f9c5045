use burn::module::{Param, ParamId};
use burn::prelude::*;
use rand::distributions::Uniform;
use rand::Rng;

use crate::model::bridge::{indices_to_tensor, matrix_from_values};

/// Glorot range `sqrt(6 / (fan_in + fan_out))` for a `(rows, cols)` matrix.
pub fn glorot_range(rows: usize, cols: usize) -> f64 {
    (6.0 / (rows + cols) as f64).sqrt()
}

/// Sample a `(rows, cols)` matrix from Uniform(-range, +range).
///
/// Draws from the caller's RNG so that a single seed fixes every table and
/// every scorer weight in construction order.
pub(crate) fn uniform_matrix<B: Backend, R: Rng>(
    rows: usize,
    cols: usize,
    range: f64,
    rng: &mut R,
    device: &B::Device,
) -> Tensor<B, 2> {
    let dist = Uniform::new_inclusive(-range, range);
    let values: Vec<f32> = (0..rows * cols).map(|_| rng.sample(dist) as f32).collect();
    matrix_from_values(values, rows, cols, device)
}

/// Word and concept embedding tables shared by every scorer of the model.
///
/// Scorers never own a copy of these rows; the model looks rows up here and
/// passes them in, so one gradient step updates a single table.
#[derive(Module, Debug)]
pub struct SharedEmbeddings<B: Backend> {
    /// Word table, shape (vocab_size, word_dim).
    pub(crate) vocab_rep: Param<Tensor<B, 2>>,
    /// Concept table, shape (ont_size, concept_dim).
    pub(crate) ont_rep: Param<Tensor<B, 2>>,
}

impl<B: Backend> SharedEmbeddings<B> {
    /// Random tables: Uniform(±init_scale · sqrt(6 / (rows + dim))).
    pub fn init<R: Rng>(
        vocab_size: usize,
        word_dim: usize,
        ont_size: usize,
        concept_dim: usize,
        init_scale: f64,
        rng: &mut R,
        device: &B::Device,
    ) -> Self {
        let vocab_range = init_scale * glorot_range(vocab_size, word_dim);
        let ont_range = init_scale * glorot_range(ont_size, concept_dim);
        let vocab_rep = uniform_matrix(vocab_size, word_dim, vocab_range, rng, device);
        let ont_rep = uniform_matrix(ont_size, concept_dim, ont_range, rng, device);
        Self::from_tensors(vocab_rep, ont_rep)
    }

    /// Wrap existing tables, e.g. pretrained vectors.
    pub fn from_tensors(vocab_rep: Tensor<B, 2>, ont_rep: Tensor<B, 2>) -> Self {
        Self {
            vocab_rep: Param::from_tensor(vocab_rep),
            ont_rep: Param::from_tensor(ont_rep),
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_rep.val().dims()[0]
    }

    pub fn word_dim(&self) -> usize {
        self.vocab_rep.val().dims()[1]
    }

    pub fn ont_size(&self) -> usize {
        self.ont_rep.val().dims()[0]
    }

    pub fn concept_dim(&self) -> usize {
        self.ont_rep.val().dims()[1]
    }

    pub fn device(&self) -> B::Device {
        self.vocab_rep.val().device()
    }

    /// Word rows for `indices`, shape (indices.len(), word_dim).
    pub fn words(&self, indices: &[usize]) -> Tensor<B, 2> {
        let device = self.device();
        self.vocab_rep.val().select(0, indices_to_tensor(indices, &device))
    }

    /// Concept rows for `indices`, shape (indices.len(), concept_dim).
    pub fn concepts(&self, indices: &[usize]) -> Tensor<B, 2> {
        let device = self.device();
        self.ont_rep.val().select(0, indices_to_tensor(indices, &device))
    }

    pub fn param_ids(&self) -> Vec<ParamId> {
        vec![self.vocab_rep.id, self.ont_rep.id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bridge::tensor_to_vec;
    use burn::backend::ndarray::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_init_shapes_and_range() {
        let device = Default::default();
        let mut rng = StdRng::seed_from_u64(12345);
        let emb = SharedEmbeddings::<TestBackend>::init(20, 8, 30, 6, 4.0, &mut rng, &device);
        assert_eq!(emb.vocab_size(), 20);
        assert_eq!(emb.word_dim(), 8);
        assert_eq!(emb.ont_size(), 30);
        assert_eq!(emb.concept_dim(), 6);

        let bound = 4.0 * glorot_range(20, 8) + 1e-6;
        let values = tensor_to_vec(emb.vocab_rep.val().reshape([20 * 8]));
        assert!(values.iter().all(|v| v.abs() <= bound));
        // not all zero
        assert!(values.iter().any(|v| v.abs() > 1e-3));
    }

    #[test]
    fn test_same_seed_same_tables() {
        let device = Default::default();
        let a = SharedEmbeddings::<TestBackend>::init(
            5, 3, 7, 4, 4.0, &mut StdRng::seed_from_u64(7), &device,
        );
        let b = SharedEmbeddings::<TestBackend>::init(
            5, 3, 7, 4, 4.0, &mut StdRng::seed_from_u64(7), &device,
        );
        let c = SharedEmbeddings::<TestBackend>::init(
            5, 3, 7, 4, 4.0, &mut StdRng::seed_from_u64(8), &device,
        );
        let flat = |e: &SharedEmbeddings<TestBackend>| tensor_to_vec(e.ont_rep.val().reshape([28]));
        assert_eq!(flat(&a), flat(&b));
        assert_ne!(flat(&a), flat(&c));
    }

    #[test]
    fn test_row_lookup() {
        let device = Default::default();
        let vocab = matrix_from_values::<TestBackend>(vec![0.0, 1.0, 10.0, 11.0, 20.0, 21.0], 3, 2, &device);
        let ont = matrix_from_values::<TestBackend>(vec![5.0, 6.0], 2, 1, &device);
        let emb = SharedEmbeddings::from_tensors(vocab, ont);

        let rows = emb.words(&[2, 0, 2]);
        assert_eq!(rows.dims(), [3, 2]);
        assert_eq!(tensor_to_vec(rows.reshape([6])), vec![20.0, 21.0, 0.0, 1.0, 20.0, 21.0]);
        assert_eq!(tensor_to_vec(emb.concepts(&[1]).reshape([1])), vec![6.0]);
        assert_eq!(emb.param_ids().len(), 2);
    }
}
