//! Analyzer setup: config overrides and model loading.

use iris_core::{
    ClipEmbedder, Collaborators, Config, ImageAnalyzer, MaskRcnnDetector, OllamaDecoder,
};

use super::AnalyzeArgs;

/// Validate input, load config and models, and build the analyzer.
pub async fn setup_analyzer(args: &AnalyzeArgs) -> anyhow::Result<ImageAnalyzer> {
    if !args.image.exists() {
        anyhow::bail!(
            "Input image does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            args.image
        );
    }

    let mut config = Config::load()?;
    apply_overrides(&mut config, args)?;

    let mut collaborators = Collaborators::default();
    if !args.no_caption {
        load_caption_models(&config, &mut collaborators).await;
    }
    if !args.no_segment {
        load_detector(&config, &mut collaborators);
    }

    Ok(ImageAnalyzer::new(config, collaborators)?)
}

/// Fold CLI flags into the loaded config and re-validate.
pub fn apply_overrides(config: &mut Config, args: &AnalyzeArgs) -> anyhow::Result<()> {
    if let Some(n) = args.num_candidates {
        config.caption.num_candidates = n;
    }
    if let Some(threshold) = args.threshold {
        config.segmentation.threshold = threshold;
    }
    if let Some(colors) = args.colors {
        config.overlay.colors = colors.into();
    }
    if args.seed.is_some() {
        config.overlay.seed = args.seed;
    }
    config.validate()?;
    Ok(())
}

async fn load_caption_models(config: &Config, collaborators: &mut Collaborators) {
    let model_dir = config.embedding_model_dir();
    if !ClipEmbedder::model_exists(&model_dir) {
        tracing::warn!(
            "Embedding model not found in {:?}. Captions will use the placeholder.",
            model_dir
        );
        return;
    }

    let decoder = match OllamaDecoder::new(&config.decoder, &config.pipeline) {
        Ok(decoder) => decoder,
        Err(e) => {
            tracing::warn!("Failed to create caption decoder: {e}");
            return;
        }
    };
    if !decoder.is_available().await {
        tracing::warn!(
            "Ollama not reachable at {}. Captions will use the placeholder.",
            config.decoder.endpoint
        );
        return;
    }

    match ClipEmbedder::load(&config.embedding, &model_dir) {
        Ok(embedder) => {
            tracing::info!("Caption models ready ({} + clip)", config.decoder.model);
            collaborators.decoder = Some(Box::new(decoder));
            collaborators.embedder = Some(Box::new(embedder));
        }
        Err(e) => tracing::warn!("Failed to load embedding model: {e}"),
    }
}

fn load_detector(config: &Config, collaborators: &mut Collaborators) {
    let model_dir = config.segmentation_model_dir();
    if !MaskRcnnDetector::model_exists(&model_dir) {
        tracing::warn!(
            "Segmentation model not found in {:?}. The overlay will be the original image.",
            model_dir
        );
        return;
    }

    match MaskRcnnDetector::load(&model_dir) {
        Ok(detector) => {
            tracing::info!("Segmentation model loaded");
            collaborators.detector = Some(Box::new(detector));
        }
        Err(e) => tracing::warn!("Failed to load segmentation model: {e}"),
    }
}
