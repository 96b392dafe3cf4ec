//! Report and overlay output.
//!
//! Analysis reports go out as JSON or JSON Lines; annotated overlays are
//! written as image files (PNG unless the path names another format).

use std::io::{self, Write};
use std::path::Path;

use image::{ImageFormat, RgbImage};

use crate::error::Result;
use crate::types::AnalysisReport;

/// File name used when the caller asks for an overlay without naming one.
pub const DEFAULT_OVERLAY_FILE: &str = "segmented_output.png";

/// Report serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// One JSON document, pretty-printed when requested
    Json,
    /// One compact JSON object per line
    JsonLines,
}

impl ReportFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Serializes analysis reports to any `Write` sink.
pub struct ReportWriter<W: Write> {
    writer: W,
    format: ReportFormat,
    pretty: bool,
}

impl<W: Write> ReportWriter<W> {
    /// `pretty` only affects [`ReportFormat::Json`].
    pub fn new(writer: W, format: ReportFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
        }
    }

    pub fn write(&mut self, report: &AnalysisReport) -> io::Result<()> {
        if self.format == ReportFormat::Json && self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, report).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, report).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Write an overlay raster to `path`.
///
/// The format follows the extension; unknown or missing extensions get PNG.
pub fn save_overlay(image: &RgbImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, format)?;
    tracing::debug!("Wrote overlay {:?} ({:?})", path, format);
    Ok(())
}
