//! Shared types for the feats metrics pipeline.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::color::{ClassifierThresholds, ColorBucket};
use crate::downsample::DownsampleFilter;

/// Re-export `GrayImage` so downstream crates can reference region
/// masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can hand in decoded
/// bitmaps without depending on `image` directly.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an RGBA image.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// How the fill-consistency score is computed from the colored region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStrategy {
    /// Per-channel standard deviation over the whole colored mask,
    /// averaged across R, G and B.
    #[default]
    ChannelStdDev,
    /// Mean L1 color distance between each colored pixel and its
    /// right-hand neighbor.
    NeighborDifference,
}

impl fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelStdDev => f.write_str("ChannelStdDev"),
            Self::NeighborDifference => f.write_str("NeighborDifference"),
        }
    }
}

/// Which method produced the boundary pair (`rebellion_score`,
/// `line_visibility_score`) in a [`CvMetrics`] record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryMethod {
    /// Estimated from how much dark ink survives in the colored image.
    /// Rebellion is the complement of line visibility, an approximation
    /// rather than a measurement.
    #[default]
    Inferred,
    /// Measured by subtracting the uncolored template's line pixels
    /// from everything the user marked.
    TemplateRelative,
}

impl fmt::Display for BoundaryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inferred => f.write_str("Inferred"),
            Self::TemplateRelative => f.write_str("TemplateRelative"),
        }
    }
}

/// One entry of the dominant-color list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorShare {
    /// The named hue bucket.
    pub color: ColorBucket,
    /// Share of chromatic pixels in this bucket, in `[0, 100]`.
    pub percentage: f64,
}

/// The feature vector produced by one analysis call.
///
/// A plain record with no behavior, meant to be serialized into the
/// context of a downstream text-generation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvMetrics {
    /// Fraction of pixels classified as blank paper, in `[0, 1]`.
    pub white_space_ratio: f64,

    /// Up to [`MetricsConfig::dominant_color_count`] chromatic buckets,
    /// highest percentage first.
    pub dominant_colors: Vec<ColorShare>,

    /// How intact the printed line art is, in `[0, 1]`.
    pub line_visibility_score: f64,

    /// How much coloring strays outside the line art, in `[0, 1]`.
    pub rebellion_score: f64,

    /// How uniform the coloring is inside the colored region, in `[0, 1]`.
    /// Near 1 for smooth deliberate fills, near 0 for scribbles.
    pub fill_consistency_score: f64,

    /// Which method produced `rebellion_score` and `line_visibility_score`.
    pub boundary_method: BoundaryMethod,
}

/// Configuration for the metrics pipeline.
///
/// Every calibration constant lives here rather than being hard-coded.
/// Several of them differ slightly between published variants of the
/// algorithm (ink threshold, line coverage baseline, fill ceilings, the
/// blue/purple split); the defaults are one consistent choice, not an
/// authority.
///
/// Fields are public. Call [`validate`](Self::validate) (the pipeline
/// does so on entry) to reject out-of-range values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Longest side, in pixels, of the working image. Larger inputs are
    /// downsampled before any metric is computed.
    pub working_resolution: u32,

    /// Resampling filter for the working-resolution and histogram
    /// downscales and for aligning the template. `Disabled` skips the
    /// working-resolution step only; the others then reduce by area.
    pub downsample_filter: DownsampleFilter,

    /// Longest side, in pixels, of the copy used for the color histogram.
    pub histogram_resolution: u32,

    /// A pixel must be at least this fraction of the brightest pixel's
    /// lightness to count as paper.
    pub paper_coefficient: f64,

    /// If the brightest pixel is darker than this, the image is treated
    /// as underexposed and paper is assumed to be pure white.
    pub dark_image_floor: f64,

    /// Paper pixels must have HSL saturation strictly below this.
    pub paper_max_saturation: f64,

    /// Non-paper pixels with HSL lightness strictly below this are ink.
    pub ink_lightness: f64,

    /// Thresholds and hue splits for the color classifier.
    pub classifier: ClassifierThresholds,

    /// Ink coverage (fraction of all pixels) at which printed line art is
    /// considered fully visible.
    pub line_coverage_baseline: f64,

    /// Strategy for [`CvMetrics::fill_consistency_score`].
    pub fill_strategy: FillStrategy,

    /// Mean neighbor L1 distance that maps to a consistency of zero.
    pub neighbor_diff_ceiling: f64,

    /// Mean channel standard deviation that maps to a consistency of zero.
    pub std_dev_ceiling: f64,

    /// Maximum number of entries in [`CvMetrics::dominant_colors`].
    pub dominant_color_count: usize,

    /// Template pixels with luma strictly below this are line art.
    pub template_ink_luma: u8,

    /// User-image pixels with luma strictly below this count as marks.
    pub user_ink_luma: u8,
}

impl MetricsConfig {
    /// Default working resolution (longest side in pixels).
    pub const DEFAULT_WORKING_RESOLUTION: u32 = 800;

    /// Default downsample filter.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Area;

    /// Default histogram resolution (longest side in pixels).
    pub const DEFAULT_HISTOGRAM_RESOLUTION: u32 = 100;

    /// Default paper coefficient.
    pub const DEFAULT_PAPER_COEFFICIENT: f64 = 0.90;

    /// Default dark-image floor.
    pub const DEFAULT_DARK_IMAGE_FLOOR: f64 = 0.5;

    /// Default paper saturation ceiling.
    pub const DEFAULT_PAPER_MAX_SATURATION: f64 = 0.2;

    /// Default ink lightness threshold.
    pub const DEFAULT_INK_LIGHTNESS: f64 = 0.25;

    /// Default expected line-art coverage.
    pub const DEFAULT_LINE_COVERAGE_BASELINE: f64 = 0.05;

    /// Default fill-consistency strategy.
    pub const DEFAULT_FILL_STRATEGY: FillStrategy = FillStrategy::ChannelStdDev;

    /// Default neighbor-difference ceiling.
    pub const DEFAULT_NEIGHBOR_DIFF_CEILING: f64 = 50.0;

    /// Default standard-deviation ceiling.
    pub const DEFAULT_STD_DEV_CEILING: f64 = 60.0;

    /// Default number of dominant colors reported.
    pub const DEFAULT_DOMINANT_COLOR_COUNT: usize = 3;

    /// Default template line luma cutoff.
    pub const DEFAULT_TEMPLATE_INK_LUMA: u8 = 128;

    /// Default user mark luma cutoff.
    pub const DEFAULT_USER_INK_LUMA: u8 = 220;

    /// Check every field against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] naming the first field
    /// that is out of range.
    pub fn validate(&self) -> Result<(), MetricsError> {
        let unit = 0.0..=1.0;
        if self.working_resolution == 0 {
            return Err(invalid("working_resolution must be at least 1"));
        }
        if self.histogram_resolution == 0 {
            return Err(invalid("histogram_resolution must be at least 1"));
        }
        if !(self.paper_coefficient > 0.0 && self.paper_coefficient <= 1.0) {
            return Err(invalid("paper_coefficient must be in (0, 1]"));
        }
        if !unit.contains(&self.dark_image_floor) {
            return Err(invalid("dark_image_floor must be in [0, 1]"));
        }
        if !unit.contains(&self.paper_max_saturation) {
            return Err(invalid("paper_max_saturation must be in [0, 1]"));
        }
        if !unit.contains(&self.ink_lightness) {
            return Err(invalid("ink_lightness must be in [0, 1]"));
        }
        if !(self.line_coverage_baseline > 0.0 && self.line_coverage_baseline <= 1.0) {
            return Err(invalid("line_coverage_baseline must be in (0, 1]"));
        }
        if !(self.neighbor_diff_ceiling > 0.0 && self.neighbor_diff_ceiling.is_finite()) {
            return Err(invalid("neighbor_diff_ceiling must be positive"));
        }
        if !(self.std_dev_ceiling > 0.0 && self.std_dev_ceiling.is_finite()) {
            return Err(invalid("std_dev_ceiling must be positive"));
        }
        if self.dominant_color_count == 0 {
            return Err(invalid("dominant_color_count must be at least 1"));
        }
        self.classifier.validate()
    }
}

fn invalid(message: &str) -> MetricsError {
    MetricsError::InvalidConfig(message.to_owned())
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            working_resolution: Self::DEFAULT_WORKING_RESOLUTION,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
            histogram_resolution: Self::DEFAULT_HISTOGRAM_RESOLUTION,
            paper_coefficient: Self::DEFAULT_PAPER_COEFFICIENT,
            dark_image_floor: Self::DEFAULT_DARK_IMAGE_FLOOR,
            paper_max_saturation: Self::DEFAULT_PAPER_MAX_SATURATION,
            ink_lightness: Self::DEFAULT_INK_LIGHTNESS,
            classifier: ClassifierThresholds::default(),
            line_coverage_baseline: Self::DEFAULT_LINE_COVERAGE_BASELINE,
            fill_strategy: Self::DEFAULT_FILL_STRATEGY,
            neighbor_diff_ceiling: Self::DEFAULT_NEIGHBOR_DIFF_CEILING,
            std_dev_ceiling: Self::DEFAULT_STD_DEV_CEILING,
            dominant_color_count: Self::DEFAULT_DOMINANT_COLOR_COUNT,
            template_ink_luma: Self::DEFAULT_TEMPLATE_INK_LUMA,
            user_ink_luma: Self::DEFAULT_USER_INK_LUMA,
        }
    }
}

/// Errors that can occur during an analysis call.
///
/// Every variant is terminal for the call that produced it; the
/// pipeline never retries and never returns partial metrics.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. Decode errors are serialized as
/// their `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to decode the primary image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Failed to decode the template image.
    #[error("failed to decode template: {0}")]
    TemplateDecode(#[source] image::ImageError),

    /// The primary image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Template bytes were supplied but empty, or the template bitmap
    /// has zero area.
    #[error("template image data is empty")]
    EmptyTemplate,

    /// Metrics configuration is invalid.
    #[error("invalid metrics configuration: {0}")]
    InvalidConfig(String),

    /// The image decoder never reported ready.
    #[error("image decoder unavailable after waiting {waited:?}")]
    DependencyUnavailable {
        /// How long the caller waited before giving up.
        waited: Duration,
    },
}

/// Serde-compatible proxy for `MetricsError`.
///
/// Decode variants store the `Display` string of the underlying
/// `image::ImageError`; on deserialization they are rebuilt as generic
/// decoding errors carrying that message.
#[derive(Serialize, Deserialize)]
enum MetricsErrorProxy {
    ImageDecode(String),
    TemplateDecode(String),
    EmptyInput,
    EmptyTemplate,
    InvalidConfig(String),
    DependencyUnavailable { waited_secs: f64 },
}

fn decoding_error(message: String) -> image::ImageError {
    image::ImageError::Decoding(image::error::DecodingError::new(
        image::error::ImageFormatHint::Unknown,
        message,
    ))
}

impl Serialize for MetricsError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => MetricsErrorProxy::ImageDecode(e.to_string()),
            Self::TemplateDecode(e) => MetricsErrorProxy::TemplateDecode(e.to_string()),
            Self::EmptyInput => MetricsErrorProxy::EmptyInput,
            Self::EmptyTemplate => MetricsErrorProxy::EmptyTemplate,
            Self::InvalidConfig(s) => MetricsErrorProxy::InvalidConfig(s.clone()),
            Self::DependencyUnavailable { waited } => MetricsErrorProxy::DependencyUnavailable {
                waited_secs: waited.as_secs_f64(),
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MetricsError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = MetricsErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            MetricsErrorProxy::ImageDecode(msg) => Self::ImageDecode(decoding_error(msg)),
            MetricsErrorProxy::TemplateDecode(msg) => Self::TemplateDecode(decoding_error(msg)),
            MetricsErrorProxy::EmptyInput => Self::EmptyInput,
            MetricsErrorProxy::EmptyTemplate => Self::EmptyTemplate,
            MetricsErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            MetricsErrorProxy::DependencyUnavailable { waited_secs } => {
                let waited = Duration::try_from_secs_f64(waited_secs).map_err(|_| {
                    serde::de::Error::custom("waited seconds must be finite and non-negative")
                })?;
                Self::DependencyUnavailable { waited }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Dimensions tests ---

    #[test]
    fn dimensions_pixel_count() {
        let d = Dimensions {
            width: 640,
            height: 480,
        };
        assert_eq!(d.pixel_count(), 307_200);
        assert!(!d.is_empty());
    }

    #[test]
    fn dimensions_zero_axis_is_empty() {
        let d = Dimensions {
            width: 0,
            height: 10,
        };
        assert!(d.is_empty());
        assert_eq!(d.pixel_count(), 0);
    }

    #[test]
    fn dimensions_of_image() {
        let img = RgbaImage::new(7, 3);
        assert_eq!(
            Dimensions::of(&img),
            Dimensions {
                width: 7,
                height: 3
            }
        );
    }

    // --- MetricsConfig tests ---

    #[test]
    fn metrics_config_defaults() {
        let config = MetricsConfig::default();
        assert_eq!(config.working_resolution, 800);
        assert_eq!(config.downsample_filter, DownsampleFilter::Area);
        assert_eq!(config.histogram_resolution, 100);
        assert!((config.paper_coefficient - 0.90).abs() < f64::EPSILON);
        assert!((config.dark_image_floor - 0.5).abs() < f64::EPSILON);
        assert!((config.paper_max_saturation - 0.2).abs() < f64::EPSILON);
        assert!((config.ink_lightness - 0.25).abs() < f64::EPSILON);
        assert!((config.line_coverage_baseline - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.fill_strategy, FillStrategy::ChannelStdDev);
        assert!((config.neighbor_diff_ceiling - 50.0).abs() < f64::EPSILON);
        assert!((config.std_dev_ceiling - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.dominant_color_count, 3);
        assert_eq!(config.template_ink_luma, 128);
        assert_eq!(config.user_ink_luma, 220);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(MetricsConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_working_resolution_is_invalid() {
        let config = MetricsConfig {
            working_resolution: 0,
            ..MetricsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MetricsError::InvalidConfig(ref s)) if s.contains("working_resolution")
        ));
    }

    #[test]
    fn nan_coefficient_is_invalid() {
        let config = MetricsConfig {
            paper_coefficient: f64::NAN,
            ..MetricsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_baseline_is_invalid() {
        let config = MetricsConfig {
            line_coverage_baseline: 0.0,
            ..MetricsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_hue_split_is_invalid() {
        let config = MetricsConfig {
            classifier: ClassifierThresholds {
                blue_purple_hue: 300.0,
                purple_pink_hue: 280.0,
                ..ClassifierThresholds::default()
            },
            ..MetricsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_config_fills_defaults() {
        let config: MetricsConfig =
            serde_json::from_str(r#"{"working_resolution": 400, "std_dev_ceiling": 40.0}"#)
                .unwrap();
        assert_eq!(config.working_resolution, 400);
        assert!((config.std_dev_ceiling - 40.0).abs() < f64::EPSILON);
        assert_eq!(config.histogram_resolution, 100);
    }

    // --- MetricsError tests ---

    #[test]
    fn error_empty_input_display() {
        assert_eq!(
            MetricsError::EmptyInput.to_string(),
            "input image data is empty"
        );
    }

    #[test]
    fn error_invalid_config_display() {
        let err = MetricsError::InvalidConfig("ink_lightness must be in [0, 1]".to_string());
        assert_eq!(
            err.to_string(),
            "invalid metrics configuration: ink_lightness must be in [0, 1]",
        );
    }

    #[test]
    fn error_dependency_unavailable_display() {
        let err = MetricsError::DependencyUnavailable {
            waited: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "image decoder unavailable after waiting 5s");
    }

    // --- Serde tests ---

    #[test]
    fn cv_metrics_serde_round_trip() {
        let metrics = CvMetrics {
            white_space_ratio: 0.25,
            dominant_colors: vec![
                ColorShare {
                    color: ColorBucket::Red,
                    percentage: 60.0,
                },
                ColorShare {
                    color: ColorBucket::Blue,
                    percentage: 40.0,
                },
            ],
            line_visibility_score: 0.8,
            rebellion_score: 0.2,
            fill_consistency_score: 0.9,
            boundary_method: BoundaryMethod::TemplateRelative,
        };
        let json = serde_json::to_string(&metrics).unwrap();
        let deserialized: CvMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(metrics, deserialized);
    }

    #[test]
    fn metrics_config_serde_round_trip() {
        let config = MetricsConfig {
            working_resolution: 512,
            downsample_filter: DownsampleFilter::Triangle,
            fill_strategy: FillStrategy::NeighborDifference,
            template_ink_luma: 90,
            ..MetricsConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: MetricsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn metrics_error_serde_round_trip_decode() {
        let err = MetricsError::ImageDecode(decoding_error("bad header".to_string()));
        let json = serde_json::to_string(&err).unwrap();
        let deserialized: MetricsError = serde_json::from_str(&json).unwrap();
        assert!(matches!(deserialized, MetricsError::ImageDecode(ref e) if e.to_string().contains("bad header")));
    }

    #[test]
    fn metrics_error_serde_round_trip_dependency_unavailable() {
        let err = MetricsError::DependencyUnavailable {
            waited: Duration::from_millis(1500),
        };
        let json = serde_json::to_string(&err).unwrap();
        let deserialized: MetricsError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            deserialized,
            MetricsError::DependencyUnavailable { waited } if waited == Duration::from_millis(1500)
        ));
    }

    #[test]
    fn metrics_error_serde_round_trip_invalid_config() {
        let err = MetricsError::InvalidConfig("bad value".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let deserialized: MetricsError = serde_json::from_str(&json).unwrap();
        assert!(matches!(deserialized, MetricsError::InvalidConfig(ref s) if s == "bad value"));
    }
}
