//! feats-metrics: Pure coloring-page metrics pipeline (sans-IO).
//!
//! Turns a photo or scan of a colored-in page into a compact
//! [`CvMetrics`] record through:
//! decode -> downsample -> paper threshold -> region masks ->
//! aggregation -> optional template-relative boundary scoring.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices or bitmaps and returns structured data. Reading files,
//! calling a text-generation service and persisting results live with
//! the caller.

pub mod analyzer;
pub mod boundary;
pub mod color;
pub mod context;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod metrics;
pub mod paper;
pub mod pipeline;
pub mod readiness;
pub mod regions;
pub mod types;

pub use analyzer::Analyzer;
pub use boundary::BoundaryScores;
pub use color::{ClassifierThresholds, ColorBucket, Hsl};
pub use context::{GroundingContext, UserEmotion};
pub use decode::{ImageCrateDecoder, ImageDecoder};
pub use diagnostics::{Clock, SystemClock};
pub use downsample::DownsampleFilter;
pub use pipeline::{Pipeline, StagedAnalysis};
pub use readiness::{Readiness, ReadinessPolicy};
pub use types::{
    BoundaryMethod, ColorShare, CvMetrics, Dimensions, FillStrategy, GrayImage, MetricsConfig,
    MetricsError, RgbaImage,
};

/// Analyze an encoded image, optionally against its uncolored template.
///
/// Uses the built-in decoder for PNG, JPEG, BMP and WebP.
///
/// # Pipeline steps
///
/// 1. Validate config, decode image and template
/// 2. Downsample to working resolution
/// 3. Detect the paper-white threshold
/// 4. Build background, ink and colored masks
/// 5. Aggregate white space, palette, inferred boundary, fill consistency
/// 6. With a template, replace the boundary pair with measured values
///
/// # Errors
///
/// Returns [`MetricsError::InvalidConfig`] if `config` is out of range,
/// [`MetricsError::EmptyInput`] or [`MetricsError::ImageDecode`] for the
/// image, and [`MetricsError::EmptyTemplate`] or
/// [`MetricsError::TemplateDecode`] for the template.
pub fn analyze(
    image_bytes: &[u8],
    template_bytes: Option<&[u8]>,
    config: &MetricsConfig,
) -> Result<CvMetrics, MetricsError> {
    analyze_staged(image_bytes, template_bytes, config).map(|staged| staged.metrics)
}

/// Like [`analyze`] but returns every intermediate.
///
/// # Errors
///
/// See [`analyze`].
pub fn analyze_staged(
    image_bytes: &[u8],
    template_bytes: Option<&[u8]>,
    config: &MetricsConfig,
) -> Result<StagedAnalysis, MetricsError> {
    let staged = Pipeline::new(
        image_bytes.to_vec(),
        template_bytes.map(<[u8]>::to_vec),
        config.clone(),
    )
    .decode()?
    .downsample()
    .detect_paper()
    .segment()
    .measure()
    .score_boundary()
    .into_result();
    Ok(staged)
}

/// Analyze already-decoded bitmaps.
///
/// # Errors
///
/// Returns [`MetricsError::InvalidConfig`] if `config` is out of range, or
/// [`MetricsError::EmptyTemplate`] if `template` has zero area.
pub fn analyze_images(
    image: &RgbaImage,
    template: Option<&RgbaImage>,
    config: &MetricsConfig,
) -> Result<CvMetrics, MetricsError> {
    let staged = Pipeline::from_images(image.clone(), template.cloned(), config.clone())?
        .downsample()
        .detect_paper()
        .segment()
        .measure()
        .score_boundary()
        .into_result();
    Ok(staged.metrics)
}
