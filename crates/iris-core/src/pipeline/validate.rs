//! Input validation before decoding.

use std::io::Read;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Known image signatures: (format name, offset, magic bytes).
const SIGNATURES: &[(&str, usize, &[u8])] = &[
    ("jpeg", 0, &[0xFF, 0xD8, 0xFF]),
    ("png", 0, &[0x89, b'P', b'N', b'G']),
    ("gif", 0, b"GIF8"),
    ("webp", 8, b"WEBP"),
    ("bmp", 0, b"BM"),
    ("tiff", 0, &[b'I', b'I', 0x2A, 0x00]),
    ("tiff", 0, &[b'M', b'M', 0x00, 0x2A]),
];

/// Validates files before decoding.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Quick checks before a full decode: existence, size limit, magic bytes.
    ///
    /// Returns the detected format name.
    pub fn validate(&self, path: &Path) -> Result<&'static str, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let metadata = std::fs::metadata(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read metadata: {e}"),
        })?;

        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let mut header = [0u8; 12];
        let bytes_read = std::fs::File::open(path)
            .and_then(|mut file| file.read(&mut header))
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot open file: {e}"),
            })?;

        if bytes_read < 4 {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "File too small to be a valid image".to_string(),
            });
        }

        sniff_format(&header[..bytes_read]).ok_or_else(|| PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: "unrecognized magic bytes".to_string(),
        })
    }
}

/// Match a file header against the known signatures.
pub fn sniff_format(header: &[u8]) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|(format, offset, magic)| {
            let riff_ok = *format != "webp" || header.starts_with(b"RIFF");
            riff_ok
                && header
                    .get(*offset..*offset + magic.len())
                    .is_some_and(|bytes| bytes == *magic)
        })
        .map(|(format, _, _)| *format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_jpeg_png_webp() {
        assert_eq!(sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpeg"));
        assert_eq!(
            sniff_format(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            Some("png")
        );
        assert_eq!(sniff_format(b"RIFF\0\0\0\0WEBP"), Some("webp"));
    }

    #[test]
    fn test_sniff_riff_without_webp_rejected() {
        assert_eq!(sniff_format(b"RIFF\0\0\0\0WAVE"), None);
    }

    #[test]
    fn test_sniff_tiff_needs_version() {
        assert_eq!(sniff_format(&[b'I', b'I', 0x2A, 0x00]), Some("tiff"));
        assert_eq!(sniff_format(&[b'I', b'I', 0x00, 0x00]), None);
    }

    #[test]
    fn test_validate_missing_file() {
        let validator = Validator::new(LimitsConfig::default());
        let err = validator.validate(Path::new("/nonexistent/photo.png")).unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_validate_text_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, "definitely not an image").unwrap();

        let err = Validator::new(LimitsConfig::default())
            .validate(&path)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_validate_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.jpg");
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.resize(2 * 1024 * 1024, 0);
        std::fs::write(&path, bytes).unwrap();

        let limits = LimitsConfig {
            max_file_size_mb: 1,
            ..Default::default()
        };
        let err = Validator::new(limits).validate(&path).unwrap_err();
        assert!(matches!(err, PipelineError::FileTooLarge { max_mb: 1, .. }));
    }

    #[test]
    fn test_validate_real_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        image::RgbImage::new(3, 3).save(&path).unwrap();

        let format = Validator::new(LimitsConfig::default()).validate(&path).unwrap();
        assert_eq!(format, "png");
    }
}
