//! Caption candidate generation and cross-modal reranking.
//!
//! A [`SequenceDecoder`] proposes several captions for an image, the
//! [`CandidateGenerator`] trims and deduplicates them, and the [`Reranker`]
//! orders the survivors by cosine similarity to the image in a joint
//! embedding space.

pub mod decoder;
pub mod generator;
pub mod ollama;
pub mod reranker;
pub mod retry;

pub use decoder::SequenceDecoder;
pub use generator::{dedup_candidates, CandidateGenerator};
pub use ollama::OllamaDecoder;
pub use reranker::{rank_by_similarity, Ranking, Reranker};
