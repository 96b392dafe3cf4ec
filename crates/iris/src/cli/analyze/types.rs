//! CLI enum types for the analyze command: report format and color policy.

use clap::ValueEnum;
use iris_core::config::ColorPolicy;
use iris_core::ReportFormat;

/// Supported report formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl OutputFormat {
    /// Resolve from the config's `output.format` string, defaulting to JSON.
    pub fn from_config(value: &str) -> Self {
        match ReportFormat::parse(value) {
            Some(ReportFormat::JsonLines) => OutputFormat::Jsonl,
            _ => OutputFormat::Json,
        }
    }
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Jsonl => ReportFormat::JsonLines,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Overlay color assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Colors {
    /// Fixed high-contrast palette, same colors every run
    Palette,
    /// Pseudorandom colors (repeatable with --seed)
    Random,
}

impl From<Colors> for ColorPolicy {
    fn from(colors: Colors) -> Self {
        match colors {
            Colors::Palette => ColorPolicy::Palette,
            Colors::Random => ColorPolicy::Random,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_config() {
        assert_eq!(OutputFormat::from_config("jsonl"), OutputFormat::Jsonl);
        assert_eq!(OutputFormat::from_config("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_config("csv"), OutputFormat::Json);
    }

    #[test]
    fn colors_map_to_policy() {
        assert_eq!(ColorPolicy::from(Colors::Random), ColorPolicy::Random);
        assert_eq!(ReportFormat::from(OutputFormat::Jsonl), ReportFormat::JsonLines);
    }
}
