//! Ollama-backed sequence decoder.
//!
//! Talks to a local Ollama instance via its HTTP API. Each caption sample is a
//! separate `/api/generate` request at the configured temperature, so repeated
//! samples diverge the way beam/sampled decoding would.

use std::future::Future;
use std::io::Cursor;
use std::time::{Duration, Instant};

use base64::Engine;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};

use super::decoder::SequenceDecoder;
use super::retry;
use crate::config::{DecoderConfig, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};

const COLLABORATOR: &str = "ollama";

/// Sequence decoder that samples captions from an Ollama vision model.
///
/// The trait is synchronous; requests run on the tokio runtime captured at
/// construction. `decode` works from a blocking context (e.g. `spawn_blocking`)
/// and from tasks on a multi-threaded runtime. Calling it from a task on a
/// current-thread runtime panics, as any nested `block_on` does.
pub struct OllamaDecoder {
    endpoint: String,
    model: String,
    prompt: String,
    temperature: f32,
    max_new_tokens: u32,
    timeout: Duration,
    retry_attempts: u32,
    retry_delay_ms: u64,
    client: reqwest::Client,
    handle: Handle,
}

/// Ollama /api/generate request body.
#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama /api/generate response.
#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaDecoder {
    /// Build a decoder bound to the current tokio runtime.
    pub fn new(decoder: &DecoderConfig, pipeline: &PipelineConfig) -> PipelineResult<Self> {
        let handle = Handle::try_current().map_err(|e| PipelineError::Model {
            message: format!("Ollama decoder needs a tokio runtime: {e}"),
        })?;
        Ok(Self::with_handle(decoder, pipeline, handle))
    }

    pub fn with_handle(decoder: &DecoderConfig, pipeline: &PipelineConfig, handle: Handle) -> Self {
        Self {
            endpoint: decoder.endpoint.trim_end_matches('/').to_string(),
            model: decoder.model.clone(),
            prompt: decoder.prompt.clone(),
            temperature: decoder.temperature,
            max_new_tokens: decoder.max_new_tokens,
            timeout: Duration::from_millis(decoder.request_timeout_ms),
            retry_attempts: pipeline.retry_attempts,
            retry_delay_ms: pipeline.retry_delay_ms,
            client: reqwest::Client::new(),
            handle,
        }
    }

    /// Check whether the Ollama endpoint answers.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        match self.client.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn request_body(&self, encoded_image: &str) -> OllamaRequest<'_> {
        OllamaRequest {
            model: &self.model,
            prompt: &self.prompt,
            images: vec![encoded_image.to_string()],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_new_tokens,
            },
        }
    }

    async fn sample_once(&self, encoded_image: &str) -> PipelineResult<String> {
        let url = format!("{}/api/generate", self.endpoint);

        let resp = self
            .client
            .post(&url)
            .json(&self.request_body(encoded_image))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                PipelineError::collaborator(COLLABORATOR, format!("request failed: {e}"))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::CollaboratorUnavailable {
                collaborator: COLLABORATOR.to_string(),
                message: format!("HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let body: OllamaResponse = resp.json().await.map_err(|e| {
            PipelineError::collaborator(COLLABORATOR, format!("failed to parse response: {e}"))
        })?;
        Ok(first_line(&body.response).to_string())
    }

    /// One sample with retry on transient failures.
    async fn sample_with_retry(&self, encoded_image: &str) -> PipelineResult<String> {
        let mut last_error = None;
        for attempt in 0..=self.retry_attempts {
            if attempt > 0 {
                let delay = retry::backoff_duration(attempt - 1, self.retry_delay_ms);
                tracing::debug!("Retry {attempt}/{} for Ollama after {delay:?}", self.retry_attempts);
                tokio::time::sleep(delay).await;
            }

            match self.sample_once(encoded_image).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    let retryable = retry::is_retryable(&e);
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| PipelineError::collaborator(COLLABORATOR, "no attempt was made")))
    }

    async fn sample_many(&self, encoded_image: &str, sample_count: usize) -> PipelineResult<Vec<String>> {
        let mut sequences = Vec::with_capacity(sample_count);
        let mut last_error = None;
        for index in 0..sample_count {
            match self.sample_with_retry(encoded_image).await {
                Ok(text) => sequences.push(text),
                Err(e) => {
                    tracing::warn!("Caption sample {}/{} failed: {e}", index + 1, sample_count);
                    last_error = Some(e);
                }
            }
        }

        // Partial success is still useful; only a total wipeout is a failure.
        match (sequences.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(sequences),
        }
    }

    /// Drive `future` to completion on the captured runtime.
    ///
    /// On a multi-threaded worker the thread is handed over with
    /// `block_in_place` first, so a nested `block_on` does not panic.
    fn block_on<F: Future>(&self, future: F) -> F::Output {
        match Handle::try_current() {
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.handle.block_on(future))
            }
            _ => self.handle.block_on(future),
        }
    }
}

impl SequenceDecoder for OllamaDecoder {
    fn name(&self) -> &str {
        COLLABORATOR
    }

    fn decode(&mut self, image: &RgbImage, sample_count: usize) -> PipelineResult<Vec<String>> {
        let start = Instant::now();
        let encoded = encode_png_base64(image)?;
        let sequences = self.block_on(self.sample_many(&encoded, sample_count))?;
        tracing::debug!(
            "Ollama {} produced {}/{} sample(s) in {:?}",
            self.model,
            sequences.len(),
            sample_count,
            start.elapsed()
        );
        Ok(sequences)
    }
}

/// Chatty models sometimes append commentary after the caption; keep line one.
fn first_line(response: &str) -> &str {
    response
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

/// Encode an image as base64 PNG for the Ollama `images` field.
fn encode_png_base64(image: &RgbImage) -> PipelineResult<String> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| PipelineError::invalid_input(format!("failed to encode image: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(rt: &tokio::runtime::Runtime) -> OllamaDecoder {
        OllamaDecoder::with_handle(
            &DecoderConfig {
                endpoint: "http://localhost:11434/".to_string(),
                ..Default::default()
            },
            &PipelineConfig::default(),
            rt.handle().clone(),
        )
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        assert_eq!(decoder(&rt).endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_request_body_shape() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let decoder = decoder(&rt);
        let json = serde_json::to_value(decoder.request_body("QUJD")).unwrap();
        assert_eq!(json["model"], "llava");
        assert_eq!(json["stream"], false);
        assert_eq!(json["images"][0], "QUJD");
        assert_eq!(json["options"]["num_predict"], 40);
    }

    #[test]
    fn test_response_parsing() {
        let body: OllamaResponse =
            serde_json::from_str(r#"{"model":"llava","response":" a cat on a sofa ","done":true}"#)
                .unwrap();
        assert_eq!(body.response, " a cat on a sofa ");
    }

    #[test]
    fn test_first_non_empty_line_kept() {
        assert_eq!(first_line("\n  A dog on a beach.\nIt looks happy."), "A dog on a beach.");
        assert_eq!(first_line("   \n\n"), "");
    }

    #[test]
    fn test_png_encoding_is_base64_png() {
        let encoded = encode_png_base64(&RgbImage::new(4, 4)).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_decode_inside_async_task_returns_error() {
        let mut decoder = OllamaDecoder::new(
            &DecoderConfig {
                endpoint: "http://127.0.0.1:9".to_string(),
                request_timeout_ms: 500,
                ..Default::default()
            },
            &PipelineConfig {
                retry_attempts: 0,
                ..Default::default()
            },
        )
        .unwrap();

        let err = decoder.decode(&RgbImage::new(4, 4), 1).unwrap_err();
        assert!(matches!(err, PipelineError::CollaboratorUnavailable { .. }));
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let err = OllamaDecoder::new(&DecoderConfig::default(), &PipelineConfig::default());
        assert!(matches!(err, Err(PipelineError::Model { .. })));
    }
}
