//! Cross-modal reranking of caption candidates.
//!
//! Every embedding is L2-normalized, so the dot product of a text embedding
//! with the image embedding is their cosine similarity.

use std::cmp::Ordering;
use std::time::Instant;

use image::RgbImage;

use crate::embedding::JointEmbedder;
use crate::error::{PipelineError, PipelineResult};
use crate::math::{cosine_of_unit, l2_normalize};
use crate::types::RankedCaption;

/// Ranked candidates plus the deterministic best pick.
#[derive(Debug, Clone)]
pub struct Ranking {
    /// Sorted by score descending; ties keep candidate order
    pub ranked: Vec<RankedCaption>,
    /// Head of `ranked`
    pub best: RankedCaption,
}

/// Orders caption candidates by similarity to the image.
pub struct Reranker<E> {
    embedder: E,
}

impl<E: JointEmbedder> Reranker<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }

    /// Rank `candidates` against `image` with a single batched embedder call.
    pub fn rerank(&mut self, image: &RgbImage, candidates: &[String]) -> PipelineResult<Ranking> {
        if candidates.is_empty() {
            return Err(PipelineError::invalid_input(
                "cannot rerank an empty candidate set",
            ));
        }

        let start = Instant::now();
        let (image_embedding, text_embeddings) =
            self.embedder
                .embed(image, candidates)
                .map_err(|e| PipelineError::EmbeddingFailed {
                    message: format!("{}: {e}", self.embedder.name()),
                })?;

        let ranked = rank_by_similarity(candidates, &image_embedding, &text_embeddings)?;
        let best = ranked
            .first()
            .cloned()
            .ok_or_else(|| PipelineError::EmbeddingFailed {
                message: "ranking produced no entries".to_string(),
            })?;

        tracing::debug!(
            "Reranked {} candidate(s) in {:?}; best score {:.4}",
            ranked.len(),
            start.elapsed(),
            best.score
        );

        Ok(Ranking { ranked, best })
    }
}

/// Score each candidate by cosine similarity and sort descending (stable).
///
/// Fails with `EmbeddingFailed` when the embedding count differs from the
/// candidate count, dimensions disagree, or any value is non-finite.
pub fn rank_by_similarity(
    candidates: &[String],
    image_embedding: &[f32],
    text_embeddings: &[Vec<f32>],
) -> PipelineResult<Vec<RankedCaption>> {
    if text_embeddings.len() != candidates.len() {
        return Err(PipelineError::EmbeddingFailed {
            message: format!(
                "expected {} text embeddings, got {}",
                candidates.len(),
                text_embeddings.len()
            ),
        });
    }
    check_embedding("image", image_embedding, image_embedding.len())?;

    let image_unit = l2_normalize(image_embedding);
    let mut ranked = Vec::with_capacity(candidates.len());
    for (candidate, embedding) in candidates.iter().zip(text_embeddings) {
        check_embedding(candidate, embedding, image_embedding.len())?;
        let text_unit = l2_normalize(embedding);
        ranked.push(RankedCaption::new(
            candidate.clone(),
            cosine_of_unit(&text_unit, &image_unit),
        ));
    }

    // sort_by is stable, so equal scores keep candidate order.
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    Ok(ranked)
}

fn check_embedding(what: &str, embedding: &[f32], expected_dim: usize) -> PipelineResult<()> {
    if embedding.is_empty() {
        return Err(PipelineError::EmbeddingFailed {
            message: format!("empty embedding for {what:?}"),
        });
    }
    if embedding.len() != expected_dim {
        return Err(PipelineError::EmbeddingFailed {
            message: format!(
                "embedding for {what:?} has {} dimensions, image has {expected_dim}",
                embedding.len()
            ),
        });
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::EmbeddingFailed {
            message: format!("non-finite value in embedding for {what:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embeds text by looking it up in a fixed table.
    struct TableEmbedder {
        image: Vec<f32>,
        texts: Vec<(String, Vec<f32>)>,
        drop_last: bool,
        batches: usize,
    }

    impl TableEmbedder {
        fn new(image: Vec<f32>, texts: &[(&str, Vec<f32>)]) -> Self {
            Self {
                image,
                texts: texts.iter().map(|(t, v)| (t.to_string(), v.clone())).collect(),
                drop_last: false,
                batches: 0,
            }
        }
    }

    impl JointEmbedder for TableEmbedder {
        fn name(&self) -> &str {
            "table"
        }

        fn embed_image(&mut self, _image: &RgbImage) -> PipelineResult<Vec<f32>> {
            Ok(self.image.clone())
        }

        fn embed_texts(&mut self, texts: &[String]) -> PipelineResult<Vec<Vec<f32>>> {
            self.batches += 1;
            let mut out: Vec<Vec<f32>> = texts
                .iter()
                .map(|t| {
                    self.texts
                        .iter()
                        .find(|(k, _)| k == t)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| vec![0.0; self.image.len()])
                })
                .collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }
    }

    fn candidates(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rerank_orders_by_cosine_descending() {
        let embedder = TableEmbedder::new(
            vec![1.0, 0.0],
            &[
                ("a red car", vec![0.0, 1.0]),
                ("a car on a road", vec![2.0, 0.1]),
                ("a vehicle", vec![1.0, 1.0]),
            ],
        );
        let mut reranker = Reranker::new(embedder);
        let ranking = reranker
            .rerank(
                &RgbImage::new(2, 2),
                &candidates(&["a red car", "a car on a road", "a vehicle"]),
            )
            .unwrap();

        let order: Vec<&str> = ranking.ranked.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(order, vec!["a car on a road", "a vehicle", "a red car"]);
        assert_eq!(ranking.best.text, "a car on a road");
        assert_eq!(reranker.embedder.batches, 1);
    }

    #[test]
    fn test_scores_stay_within_unit_interval() {
        let ranked = rank_by_similarity(
            &candidates(&["same", "opposite", "huge"]),
            &[3.0, 4.0],
            &[vec![3.0, 4.0], vec![-3.0, -4.0], vec![3.0e6, 4.0e6]],
        )
        .unwrap();
        for r in &ranked {
            assert!((-1.0..=1.0).contains(&r.score), "{} out of range", r.score);
        }
        assert_eq!(ranked.last().unwrap().text, "opposite");
    }

    #[test]
    fn test_extreme_magnitudes_score_their_true_cosine() {
        let ranked = rank_by_similarity(
            &candidates(&["tiny", "huge"]),
            &[1.0, 0.0],
            &[vec![1e-8, 0.0], vec![1e20, 1e20]],
        )
        .unwrap();
        assert_eq!(ranked[0].text, "tiny");
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
        assert_eq!(ranked[1].text, "huge");
        assert!((ranked[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let ranked = rank_by_similarity(
            &candidates(&["first", "second", "third"]),
            &[1.0, 0.0],
            &[vec![0.5, 0.5], vec![1.0, 0.0], vec![2.0, 2.0]],
        )
        .unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(order, vec!["second", "first", "third"]);
    }

    #[test]
    fn test_reranking_is_repeatable() {
        let texts = candidates(&["b", "a", "c", "d"]);
        let embeddings = vec![
            vec![0.2, 0.9, 0.1],
            vec![0.2, 0.9, 0.1],
            vec![0.7, 0.1, 0.0],
            vec![-0.3, 0.3, 0.9],
        ];
        let image = [0.5, 0.5, 0.5];
        let first = rank_by_similarity(&texts, &image, &embeddings).unwrap();
        let second = rank_by_similarity(&texts, &image, &embeddings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_candidate_is_best_regardless_of_score() {
        let embedder = TableEmbedder::new(vec![1.0, 0.0], &[("only", vec![-1.0, 0.0])]);
        let ranking = Reranker::new(embedder)
            .rerank(&RgbImage::new(2, 2), &candidates(&["only"]))
            .unwrap();
        assert_eq!(ranking.ranked.len(), 1);
        assert_eq!(ranking.best.text, "only");
        assert!((ranking.best.score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_count_mismatch_is_embedding_failed() {
        let mut embedder = TableEmbedder::new(vec![1.0, 0.0], &[]);
        embedder.drop_last = true;
        let err = Reranker::new(embedder)
            .rerank(&RgbImage::new(2, 2), &candidates(&["a", "b"]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingFailed { .. }));
    }

    #[test]
    fn test_dimension_mismatch_is_embedding_failed() {
        let err = rank_by_similarity(&candidates(&["a"]), &[1.0, 0.0], &[vec![1.0, 0.0, 0.0]])
            .unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn test_non_finite_embedding_is_rejected() {
        let err =
            rank_by_similarity(&candidates(&["a"]), &[f32::NAN, 0.0], &[vec![1.0, 0.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingFailed { .. }));
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let embedder = TableEmbedder::new(vec![1.0], &[]);
        let err = Reranker::new(embedder)
            .rerank(&RgbImage::new(1, 1), &[])
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
    }
}
