//! Event autoencoder components: shared embedding tables, pair scorers,
//! the reconstruction scorer, and the model that composes them into
//! energies, partitions and expectations over candidate concept tuples.

pub mod bridge;
pub mod embeddings;
pub mod event_ae;
pub mod reconstruction;
pub mod scorer;
