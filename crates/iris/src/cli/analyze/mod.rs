//! The `iris analyze` command: caption and segment a single image.

mod setup;
pub mod types;

pub use types::{Colors, OutputFormat};

use clap::Args;
use iris_core::{save_overlay, Analysis, AnalyzeOptions, ReportWriter, DEFAULT_OVERLAY_FILE};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use setup::setup_analyzer;

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Image file to analyze
    #[arg(required = true)]
    pub image: PathBuf,

    /// Report file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Save the annotated overlay (PNG unless the extension says otherwise)
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_OVERLAY_FILE)]
    pub overlay: Option<PathBuf>,

    /// Number of caption candidates to sample
    #[arg(short = 'n', long = "candidates")]
    pub num_candidates: Option<usize>,

    /// Confidence threshold for keeping instances, in [0, 1]
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Overlay color policy
    #[arg(long, value_enum)]
    pub colors: Option<Colors>,

    /// Seed for the random color policy
    #[arg(long)]
    pub seed: Option<u64>,

    /// Report format (defaults to the config's output.format)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Skip caption generation and reranking
    #[arg(long)]
    pub no_caption: bool,

    /// Skip instance segmentation
    #[arg(long)]
    pub no_segment: bool,
}

/// Manual Default impl for constructing AnalyzeArgs outside of clap.
impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            image: PathBuf::new(),
            output: None,
            overlay: None,
            num_candidates: None,
            threshold: None,
            colors: None,
            seed: None,
            format: None,
            no_caption: false,
            no_segment: false,
        }
    }
}

impl AnalyzeArgs {
    fn options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            caption: !self.no_caption,
            segment: !self.no_segment,
            num_candidates: self.num_candidates,
            threshold: self.threshold,
        }
    }
}

/// Execute the analyze command.
pub async fn execute(args: AnalyzeArgs) -> anyhow::Result<()> {
    if args.no_caption && args.no_segment {
        anyhow::bail!("Nothing to do: both --no-caption and --no-segment were given.");
    }
    if args.overlay.is_some() && args.no_segment {
        tracing::warn!("--overlay ignored because --no-segment was given");
    }

    let analyzer = setup_analyzer(&args).await?;
    let format = args
        .format
        .unwrap_or_else(|| OutputFormat::from_config(&analyzer.config().output.format));
    let pretty = analyzer.config().output.pretty;

    let mut analysis = analyzer.analyze_path(&args.image, &args.options()).await?;
    write_overlay(&mut analysis, args.overlay.as_ref())?;
    log_summary(&analysis);

    match args.output {
        Some(ref path) => {
            let file = File::create(path)?;
            write_report(BufWriter::new(file), &analysis, format, pretty)?;
            tracing::info!("Report written to {:?}", path);
        }
        None => write_report(std::io::stdout().lock(), &analysis, format, pretty)?,
    }

    Ok(())
}

fn write_overlay(analysis: &mut Analysis, path: Option<&PathBuf>) -> anyhow::Result<()> {
    let (Some(path), Some(image)) = (path, analysis.overlay.as_ref()) else {
        return Ok(());
    };
    save_overlay(image, path)?;
    tracing::info!("Overlay saved to {:?}", path);
    analysis.report.overlay_path = Some(path.clone());
    Ok(())
}

fn write_report<W: Write>(
    sink: W,
    analysis: &Analysis,
    format: OutputFormat,
    pretty: bool,
) -> anyhow::Result<()> {
    let mut writer = ReportWriter::new(sink, format.into(), pretty);
    writer.write(&analysis.report)?;
    writer.flush()?;
    Ok(())
}

fn log_summary(analysis: &Analysis) {
    let report = &analysis.report;
    if let Some(ref caption) = report.caption {
        match caption.fallback_reason {
            Some(ref reason) => tracing::warn!("Caption: {} ({reason})", caption.best),
            None => tracing::info!("Caption: {}", caption.best),
        }
    }
    if let Some(ref segmentation) = report.segmentation {
        tracing::info!(
            "Segmentation: {} instance(s) at threshold {:.2}",
            segmentation.instances.len(),
            segmentation.threshold
        );
    }
    tracing::info!("Analyzed {} in {}ms", report.file_name, report.elapsed_ms);
}
