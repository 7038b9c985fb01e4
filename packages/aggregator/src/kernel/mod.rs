//! Infrastructure layer: the embedding-service trait and its HTTP client.
//!
//! Business logic (what to embed, how to score) lives in `domains/jobs`.

pub mod embedder;
pub mod test_dependencies;
pub mod traits;

pub use embedder::{EmbedError, Embedder, EmbedderConfig};
pub use traits::{BaseEmbeddingService, BaseJobStore};
