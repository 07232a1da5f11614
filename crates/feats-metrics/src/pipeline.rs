//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::analyze`] which runs the entire pipeline in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use feats_metrics::{Pipeline, MetricsConfig, MetricsError};
//! # fn run(png: Vec<u8>) -> Result<(), MetricsError> {
//! let config = MetricsConfig::default();
//! let pipeline = Pipeline::new(png, None, config)
//!     .decode()?
//!     .downsample()
//!     .detect_paper()
//!     .segment()
//!     .measure()
//!     .score_boundary();
//!
//! let staged = pipeline.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for the fallible decode), carrying all previously
//! computed intermediates. The caller can inspect the current stage's
//! output via accessor methods at any point.
//!
//! # Memory
//!
//! Every stage from [`Downsampled`] onward keeps both the original and
//! the working-resolution image, and [`Segmented`] adds three masks of
//! the working size. [`StagedAnalysis`] needs them all for inspection;
//! callers that only want the numbers should use [`crate::analyze`].

use crate::boundary::{BoundaryScores, score_rebellion};
use crate::decode::{ImageCrateDecoder, ImageDecoder, check_template_area, decode_template};
use crate::diagnostics::StageMetrics;
use crate::metrics::{ColorHistogram, Measurement, aggregate};
use crate::paper::{WhiteThreshold, detect_white_threshold};
use crate::regions::{RegionMasks, build_masks};
use crate::types::{BoundaryMethod, CvMetrics, Dimensions, MetricsConfig, MetricsError, RgbaImage};

/// Entry point for the staged pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline from encoded bytes.
    ///
    /// Nothing is validated or decoded until [`Pending::decode`].
    #[allow(clippy::new_ret_no_self)]
    pub fn new(source: Vec<u8>, template: Option<Vec<u8>>, config: MetricsConfig) -> Pending {
        Pending {
            config,
            source,
            template,
        }
    }

    /// Start a pipeline from already-decoded bitmaps, skipping decode.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] if `config` fails
    /// validation and [`MetricsError::EmptyTemplate`] if `template` has
    /// zero area.
    pub fn from_images(
        original: RgbaImage,
        template: Option<RgbaImage>,
        config: MetricsConfig,
    ) -> Result<Decoded, MetricsError> {
        config.validate()?;
        let template = template.map(check_template_area).transpose()?;
        Ok(Decoded {
            config,
            original,
            template,
            source_len: 0,
        })
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source bytes and config are stored but not yet touched. Call
/// [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: MetricsConfig,
    source: Vec<u8>,
    template: Option<Vec<u8>>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// The raw template bytes, if a template was supplied.
    #[must_use]
    pub fn template_source(&self) -> Option<&[u8]> {
        self.template.as_deref()
    }

    /// Decode with the built-in decoder and advance to [`Decoded`].
    ///
    /// # Errors
    ///
    /// See [`decode_with`](Self::decode_with).
    pub fn decode(self) -> Result<Decoded, MetricsError> {
        self.decode_with(&ImageCrateDecoder)
    }

    /// Validate the config, decode the source and template with
    /// `decoder`, and advance to [`Decoded`].
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] if the config fails
    /// validation, [`MetricsError::EmptyInput`] or
    /// [`MetricsError::ImageDecode`] for the source image, and
    /// [`MetricsError::EmptyTemplate`] or [`MetricsError::TemplateDecode`]
    /// for the template.
    pub fn decode_with<D: ImageDecoder + ?Sized>(
        self,
        decoder: &D,
    ) -> Result<Decoded, MetricsError> {
        self.config.validate()?;
        let source_len = self.source.len();
        let original = decoder.decode(&self.source)?;
        let template = self
            .template
            .as_deref()
            .map(|bytes| decode_template(decoder, bytes))
            .transpose()?;

        tracing::debug!(
            width = original.width(),
            height = original.height(),
            has_template = template.is_some(),
            "decoded"
        );

        Ok(Decoded {
            config: self.config,
            original,
            template,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding.
///
/// Call [`downsample`](Self::downsample) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .downsample() to continue"]
pub struct Decoded {
    config: MetricsConfig,
    original: RgbaImage,
    template: Option<RgbaImage>,
    source_len: usize,
}

impl Decoded {
    /// The original decoded RGBA image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// The decoded template, if any.
    #[must_use]
    pub const fn template(&self) -> Option<&RgbaImage> {
        self.template.as_ref()
    }

    /// Metrics describing the decode step.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        let dims = Dimensions::of(&self.original);
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: dims.width,
            height: dims.height,
            pixel_count: dims.pixel_count(),
            template: self.template.as_ref().map(Dimensions::of),
        }
    }

    /// Advance to the downsample stage.
    pub fn downsample(self) -> Downsampled {
        let (working, applied) = crate::downsample::downsample(
            &self.original,
            self.config.working_resolution,
            self.config.downsample_filter,
        );
        if applied {
            tracing::debug!(
                width = working.width(),
                height = working.height(),
                filter = %self.config.downsample_filter,
                "downsampled to working resolution"
            );
        }
        Downsampled {
            config: self.config,
            original: self.original,
            template: self.template,
            working,
            applied,
        }
    }
}

// ───────────────────────── Stage 2: Downsampled ──────────────────────

/// Pipeline state after downsampling to working resolution.
///
/// Call [`detect_paper`](Self::detect_paper) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .detect_paper() to continue"]
pub struct Downsampled {
    config: MetricsConfig,
    original: RgbaImage,
    template: Option<RgbaImage>,
    working: RgbaImage,
    applied: bool,
}

impl Downsampled {
    /// The image every later stage operates on.
    #[must_use]
    pub const fn working(&self) -> &RgbaImage {
        &self.working
    }

    /// Whether downsampling was actually applied.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Metrics describing the downsample step.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Downsample {
            original_width: self.original.width(),
            original_height: self.original.height(),
            width: self.working.width(),
            height: self.working.height(),
            max_dimension: self.config.working_resolution,
            filter: self.config.downsample_filter,
            applied: self.applied,
        }
    }

    /// Advance to the paper detection stage.
    pub fn detect_paper(self) -> PaperDetected {
        let threshold = detect_white_threshold(&self.working, &self.config);
        tracing::debug!(
            max_lightness = threshold.max_lightness,
            threshold = threshold.threshold,
            "paper threshold detected"
        );
        PaperDetected {
            config: self.config,
            original: self.original,
            template: self.template,
            working: self.working,
            threshold,
        }
    }
}

// ───────────────────────── Stage 3: PaperDetected ────────────────────

/// Pipeline state after the paper-white threshold is known.
///
/// Call [`segment`](Self::segment) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .segment() to continue"]
pub struct PaperDetected {
    config: MetricsConfig,
    original: RgbaImage,
    template: Option<RgbaImage>,
    working: RgbaImage,
    threshold: WhiteThreshold,
}

impl PaperDetected {
    /// The detected threshold.
    #[must_use]
    pub const fn threshold(&self) -> &WhiteThreshold {
        &self.threshold
    }

    /// Metrics describing the paper detection step.
    #[must_use]
    pub const fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Paper {
            max_lightness: self.threshold.max_lightness,
            threshold: self.threshold.threshold,
            fallback_applied: self.threshold.fallback_applied,
        }
    }

    /// Advance to the segmentation stage.
    pub fn segment(self) -> Segmented {
        let masks = build_masks(&self.working, &self.threshold, &self.config);
        Segmented {
            config: self.config,
            original: self.original,
            template: self.template,
            working: self.working,
            threshold: self.threshold,
            masks,
        }
    }
}

// ───────────────────────── Stage 4: Segmented ────────────────────────

/// Pipeline state after the region masks are built.
///
/// Call [`measure`](Self::measure) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .measure() to continue"]
pub struct Segmented {
    config: MetricsConfig,
    original: RgbaImage,
    template: Option<RgbaImage>,
    working: RgbaImage,
    threshold: WhiteThreshold,
    masks: RegionMasks,
}

impl Segmented {
    /// The background, ink and colored masks.
    #[must_use]
    pub const fn masks(&self) -> &RegionMasks {
        &self.masks
    }

    /// Metrics describing the segmentation step.
    #[must_use]
    pub const fn stage_metrics(&self) -> StageMetrics {
        let counts = &self.masks.counts;
        StageMetrics::Segment {
            background_pixels: counts.background,
            ink_pixels: counts.ink,
            colored_pixels: counts.colored,
            total_pixel_count: counts.total(),
        }
    }

    /// Advance to the measurement stage.
    pub fn measure(self) -> Measured {
        let measurement = aggregate(&self.working, &self.masks, &self.config);
        Measured {
            config: self.config,
            original: self.original,
            template: self.template,
            working: self.working,
            threshold: self.threshold,
            masks: self.masks,
            measurement,
        }
    }
}

// ───────────────────────── Stage 5: Measured ─────────────────────────

/// Pipeline state after the metrics are aggregated with an inferred
/// boundary pair.
///
/// Call [`score_boundary`](Self::score_boundary) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing; call .score_boundary() to continue"]
pub struct Measured {
    config: MetricsConfig,
    original: RgbaImage,
    template: Option<RgbaImage>,
    working: RgbaImage,
    threshold: WhiteThreshold,
    masks: RegionMasks,
    measurement: Measurement,
}

impl Measured {
    /// Metrics before any template-relative override.
    #[must_use]
    pub const fn metrics(&self) -> &CvMetrics {
        &self.measurement.metrics
    }

    /// The color histogram behind `dominant_colors`.
    #[must_use]
    pub const fn histogram(&self) -> &ColorHistogram {
        &self.measurement.histogram
    }

    /// Metrics describing the measurement step.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Measure {
            fill_strategy: self.config.fill_strategy,
            chromatic_pixel_count: self.measurement.histogram.chromatic_total,
            chromatic_bucket_count: self.measurement.histogram.chromatic_bucket_count(),
        }
    }

    /// Score the boundary against the template if one was supplied.
    ///
    /// With a template the measured pair replaces the inferred one;
    /// without one this step is a no-op.
    pub fn score_boundary(self) -> Scored {
        let mut metrics = self.measurement.metrics;
        let boundary = self
            .template
            .as_ref()
            .map(|template| score_rebellion(&self.working, template, &self.config));

        if let Some(scores) = &boundary {
            metrics.rebellion_score = scores.rebellion_score;
            metrics.line_visibility_score = scores.line_visibility_score;
            metrics.boundary_method = BoundaryMethod::TemplateRelative;
            tracing::debug!(
                rebellion = scores.rebellion_score,
                user_ink = scores.user_ink_pixels,
                "boundary scored against template"
            );
        }

        Scored {
            original: self.original,
            template: self.template,
            working: self.working,
            threshold: self.threshold,
            masks: self.masks,
            histogram: self.measurement.histogram,
            boundary,
            metrics,
        }
    }
}

// ───────────────────────── Stage 6: Scored ───────────────────────────

/// Final pipeline state.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedAnalysis`].
#[must_use = "call .into_result() to extract the StagedAnalysis"]
pub struct Scored {
    original: RgbaImage,
    template: Option<RgbaImage>,
    working: RgbaImage,
    threshold: WhiteThreshold,
    masks: RegionMasks,
    histogram: ColorHistogram,
    boundary: Option<BoundaryScores>,
    metrics: CvMetrics,
}

impl Scored {
    /// The final metrics.
    #[must_use]
    pub const fn metrics(&self) -> &CvMetrics {
        &self.metrics
    }

    /// Template-relative scores, if a template was supplied.
    #[must_use]
    pub const fn boundary(&self) -> Option<&BoundaryScores> {
        self.boundary.as_ref()
    }

    /// Metrics describing the boundary step, `None` when it was skipped.
    #[must_use]
    pub fn stage_metrics(&self) -> Option<StageMetrics> {
        self.boundary.map(|b| StageMetrics::Boundary {
            template_line_pixels: b.template_line_pixels,
            user_ink_pixels: b.user_ink_pixels,
            rebellion_pixels: b.rebellion_pixels,
            resampled: b.resampled,
        })
    }

    /// Consume the pipeline and return every intermediate.
    pub fn into_result(self) -> StagedAnalysis {
        let dimensions = Dimensions::of(&self.working);
        StagedAnalysis {
            original: self.original,
            template: self.template,
            working: self.working,
            threshold: self.threshold,
            masks: self.masks,
            histogram: self.histogram,
            boundary: self.boundary,
            metrics: self.metrics,
            dimensions,
        }
    }
}

/// Every intermediate of one analysis call.
#[derive(Debug, Clone)]
pub struct StagedAnalysis {
    /// Decoded source image at full resolution.
    pub original: RgbaImage,
    /// Decoded template at its own resolution, if one was supplied.
    pub template: Option<RgbaImage>,
    /// Source image at working resolution.
    pub working: RgbaImage,
    /// Paper threshold.
    pub threshold: WhiteThreshold,
    /// Region masks at working resolution.
    pub masks: RegionMasks,
    /// Color histogram.
    pub histogram: ColorHistogram,
    /// Template-relative scores, if a template was supplied.
    pub boundary: Option<BoundaryScores>,
    /// The final metrics.
    pub metrics: CvMetrics,
    /// Working resolution dimensions.
    pub dimensions: Dimensions,
}

// ───────────────────────── Dynamic stage API ─────────────────────────

/// Number of stages, [`Pending`] through [`Scored`].
pub const STAGE_COUNT: usize = 7;

/// The output produced by a single pipeline stage.
///
/// Each variant borrows the data that the corresponding stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// Source bytes, not yet decoded.
    Source {
        /// The raw image bytes.
        bytes: &'a [u8],
    },
    /// Decoded RGBA image.
    Decoded {
        /// The original image.
        original: &'a RgbaImage,
    },
    /// Working-resolution image.
    Downsampled {
        /// The working image.
        working: &'a RgbaImage,
    },
    /// Paper threshold.
    PaperDetected {
        /// The threshold.
        threshold: &'a WhiteThreshold,
    },
    /// Region masks.
    Segmented {
        /// The masks.
        masks: &'a RegionMasks,
    },
    /// Aggregated metrics with the inferred boundary pair.
    Measured {
        /// The metrics.
        metrics: &'a CvMetrics,
    },
    /// Final metrics.
    Scored {
        /// The metrics.
        metrics: &'a CvMetrics,
        /// Template-relative scores, if any.
        boundary: Option<&'a BoundaryScores>,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Both the typed API (individual stage structs) and the dynamic API
/// ([`Stage`] enum) are available. Each stage struct implements this
/// trait and [`Stage`] delegates to whichever variant it holds.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"segment"`).
    const NAME: &str;

    /// Zero-based index of this stage.
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// `None` for [`Pending`], which has done no work, and for
    /// [`Scored`] when no template was supplied.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] when validation or decoding fails.
    fn next(self) -> Result<Option<Stage>, MetricsError>;

    /// Run all remaining stages and return the [`StagedAnalysis`].
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if a remaining fallible stage fails.
    fn complete(self) -> Result<StagedAnalysis, MetricsError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bytes: &self.source,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, MetricsError> {
        Ok(Some(Stage::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<StagedAnalysis, MetricsError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Decoded {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, MetricsError> {
        Ok(Some(Stage::Downsampled(self.downsample())))
    }

    fn complete(self) -> Result<StagedAnalysis, MetricsError> {
        self.downsample().complete()
    }
}

impl PipelineStage for Downsampled {
    const NAME: &str = "downsample";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Downsampled {
            working: &self.working,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, MetricsError> {
        Ok(Some(Stage::PaperDetected(self.detect_paper())))
    }

    fn complete(self) -> Result<StagedAnalysis, MetricsError> {
        self.detect_paper().complete()
    }
}

impl PipelineStage for PaperDetected {
    const NAME: &str = "paper";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::PaperDetected {
            threshold: &self.threshold,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, MetricsError> {
        Ok(Some(Stage::Segmented(self.segment())))
    }

    fn complete(self) -> Result<StagedAnalysis, MetricsError> {
        self.segment().complete()
    }
}

impl PipelineStage for Segmented {
    const NAME: &str = "segment";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Segmented { masks: &self.masks }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, MetricsError> {
        Ok(Some(Stage::Measured(self.measure())))
    }

    fn complete(self) -> Result<StagedAnalysis, MetricsError> {
        self.measure().complete()
    }
}

impl PipelineStage for Measured {
    const NAME: &str = "measure";
    const INDEX: usize = 5;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Measured {
            metrics: &self.measurement.metrics,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, MetricsError> {
        Ok(Some(Stage::Scored(self.score_boundary())))
    }

    fn complete(self) -> Result<StagedAnalysis, MetricsError> {
        self.score_boundary().complete()
    }
}

impl PipelineStage for Scored {
    const NAME: &str = "boundary";
    const INDEX: usize = 6;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Scored {
            metrics: &self.metrics,
            boundary: self.boundary.as_ref(),
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        self.stage_metrics()
    }

    fn next(self) -> Result<Option<Stage>, MetricsError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedAnalysis, MetricsError> {
        Ok(self.into_result())
    }
}

/// A pipeline stage of any type.
///
/// ```rust
/// # use feats_metrics::{Pipeline, MetricsConfig, MetricsError};
/// # use feats_metrics::pipeline::{Stage, Advance};
/// # fn run(png: Vec<u8>) -> Result<(), MetricsError> {
/// let mut stage: Stage = Pipeline::new(png, None, MetricsConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Downsampled`].
    Downsampled(Downsampled),
    /// See [`PaperDetected`].
    PaperDetected(PaperDetected),
    /// See [`Segmented`].
    Segmented(Segmented),
    /// See [`Measured`].
    Measured(Measured),
    /// See [`Scored`].
    Scored(Scored),
}

/// Compile-time guard: adding a [`Stage`] variant breaks this match as a
/// reminder to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Decoded(_)
        | Stage::Downsampled(_)
        | Stage::PaperDetected(_)
        | Stage::Segmented(_)
        | Stage::Measured(_)
        | Stage::Scored(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the completed
/// final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a trait method call to whichever `Stage` variant is active.
///
/// Calls go through the trait path so inherent accessors with the same
/// name (`Measured::metrics`, `Scored::metrics`) are never picked.
macro_rules! delegate {
    ($self:ident, $trait:ident :: $method:ident) => {
        match $self {
            Self::Pending(s) => $trait::$method(s),
            Self::Decoded(s) => $trait::$method(s),
            Self::Downsampled(s) => $trait::$method(s),
            Self::PaperDetected(s) => $trait::$method(s),
            Self::Segmented(s) => $trait::$method(s),
            Self::Measured(s) => $trait::$method(s),
            Self::Scored(s) => $trait::$method(s),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, StageMetadata::name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, StageMetadata::index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, PipelineStage::output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, PipelineStage::metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Scored(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, MetricsError> {
        delegate!(self, PipelineStage::next)
    }

    /// Advance to the next stage, returning `self` unchanged if already
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, MetricsError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        // Non-final stages always return Some from next().
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if a remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedAnalysis, MetricsError> {
        delegate!(self, PipelineStage::complete)
    }
}

// Lets the macro call `.name()` and `.index()` on `&self`; associated
// constants are not reachable as `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

macro_rules! impl_from_stage {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Stage {
                fn from(s: $variant) -> Self {
                    Self::$variant(s)
                }
            }
        )*
    };
}

impl_from_stage!(Pending, Decoded, Downsampled, PaperDetected, Segmented, Measured, Scored);
