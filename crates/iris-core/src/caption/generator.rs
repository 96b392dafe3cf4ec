//! Candidate generation: one decoder call, then trim + case-insensitive dedup.

use std::collections::HashSet;
use std::time::Instant;

use image::RgbImage;

use crate::error::{PipelineError, PipelineResult};

use super::decoder::SequenceDecoder;

/// Requests caption candidates from a decoder and cleans them up.
pub struct CandidateGenerator<D> {
    decoder: D,
}

impl<D: SequenceDecoder> CandidateGenerator<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }

    /// Generate unique caption candidates for `image`.
    ///
    /// Calls the decoder exactly once for `requested` sequences. The result is
    /// trimmed, free of empty strings and of case-insensitive duplicates, in
    /// first-seen order. Fails with `GenerationEmpty` when nothing usable is left.
    pub fn generate(&mut self, image: &RgbImage, requested: usize) -> PipelineResult<Vec<String>> {
        if requested == 0 {
            return Err(PipelineError::invalid_input(
                "requested caption count must be >= 1",
            ));
        }

        let start = Instant::now();
        let raw = self
            .decoder
            .decode(image, requested)
            .map_err(|e| e.into_collaborator(self.decoder.name()))?;
        let raw_count = raw.len();

        let unique = dedup_candidates(raw);
        tracing::debug!(
            "Decoder {} returned {} sequence(s), {} unique, in {:?}",
            self.decoder.name(),
            raw_count,
            unique.len(),
            start.elapsed()
        );

        if unique.is_empty() {
            return Err(PipelineError::GenerationEmpty { requested });
        }
        Ok(unique)
    }

    /// Access the wrapped decoder.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }
}

/// Trim sequences, drop empty ones, and keep the first of each
/// case-insensitively equal group, preserving order.
pub fn dedup_candidates<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for sequence in raw {
        let trimmed = sequence.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            unique.push(trimmed.to_string());
        }
    }
    unique
}
