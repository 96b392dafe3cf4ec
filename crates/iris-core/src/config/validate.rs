//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.caption.num_candidates == 0 {
            return Err(ConfigError::ValidationError(
                "caption.num_candidates must be >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.segmentation.threshold) {
            return Err(ConfigError::ValidationError(
                "segmentation.threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.overlay.font_size.is_nan() || self.overlay.font_size <= 0.0 {
            return Err(ConfigError::ValidationError(
                "overlay.font_size must be > 0".into(),
            ));
        }
        if self.embedding.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.image_size must be > 0".into(),
            ));
        }
        if self.embedding.max_text_length == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.max_text_length must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.caption_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.caption_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.segment_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.segment_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}
