//! Analysis diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! calibrating thresholds against real photos. Every call to
//! [`analyze_with_diagnostics`] collects them alongside the analysis
//! results.
//!
//! Duration measurements use [`std::time::Duration`]. Timestamps come
//! from an injected [`Clock`]; [`SystemClock`] uses the `web-time`
//! crate, which uses `performance.now()` on WASM and
//! `std::time::Instant` on native. Its `sleep` blocks the thread on
//! native and returns immediately on `wasm32`, where threads cannot
//! block; readiness polling there spins on the clock instead.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decode::{ImageCrateDecoder, ImageDecoder};
use crate::downsample::DownsampleFilter;
use crate::pipeline::{Pipeline, StagedAnalysis};
use crate::types::{BoundaryMethod, Dimensions, FillStrategy, MetricsConfig, MetricsError};

/// Serde support for `std::time::Duration` as fractional seconds.
pub(crate) mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of time for stage timing and readiness polling.
///
/// Injected so tests can run against a deterministic clock and hosts
/// can supply whatever timer their platform has.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by `web_time::Instant` and a blocking thread sleep.
///
/// On `wasm32` the sleep is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = web_time::Instant;

    fn now(&self) -> web_time::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &web_time::Instant) -> Duration {
        since.elapsed()
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    #[cfg(target_arch = "wasm32")]
    fn sleep(&self, _duration: Duration) {}
}

/// Diagnostics collected from a single analysis run.
///
/// Each field captures metrics for one stage. The boundary stage only
/// runs when a template was supplied, so it is `None` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDiagnostics {
    /// Stage 1: decoding the image and template.
    pub decode: StageDiagnostics,
    /// Stage 2: downsampling to working resolution.
    pub downsample: StageDiagnostics,
    /// Stage 3: paper-white threshold.
    pub paper: StageDiagnostics,
    /// Stage 4: region masks.
    pub segment: StageDiagnostics,
    /// Stage 5: metric aggregation.
    pub measure: StageDiagnostics,
    /// Stage 6: template-relative boundary (only with a template).
    pub boundary: Option<StageDiagnostics>,
    /// Total wall-clock duration of the entire analysis (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: AnalysisSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Decoding.
    Decode {
        /// Size of the input image bytes (0 when bitmaps were supplied).
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
        /// Template dimensions, if a template was decoded.
        template: Option<Dimensions>,
    },
    /// Downsampling.
    Downsample {
        /// Width before downsampling.
        original_width: u32,
        /// Height before downsampling.
        original_height: u32,
        /// Working width.
        width: u32,
        /// Working height.
        height: u32,
        /// Configured longest-axis limit.
        max_dimension: u32,
        /// Resampling filter.
        filter: DownsampleFilter,
        /// Whether the image was actually resized.
        applied: bool,
    },
    /// Paper-white detection.
    Paper {
        /// Brightest observed lightness.
        max_lightness: f64,
        /// Resulting paper threshold.
        threshold: f64,
        /// Whether the dark-image fallback was used.
        fallback_applied: bool,
    },
    /// Region segmentation.
    Segment {
        /// Pixels classified as paper.
        background_pixels: u64,
        /// Pixels classified as line art.
        ink_pixels: u64,
        /// Pixels classified as coloring.
        colored_pixels: u64,
        /// Pixels in the working image.
        total_pixel_count: u64,
    },
    /// Metric aggregation.
    Measure {
        /// Fill-consistency strategy used.
        fill_strategy: FillStrategy,
        /// Chromatic pixels in the color histogram.
        chromatic_pixel_count: u64,
        /// Chromatic buckets with at least one pixel.
        chromatic_bucket_count: usize,
    },
    /// Template-relative boundary scoring.
    Boundary {
        /// Line pixels in the aligned template.
        template_line_pixels: u64,
        /// Marked pixels in the user image.
        user_ink_pixels: u64,
        /// Marked pixels off the template lines.
        rebellion_pixels: u64,
        /// Whether the template was resized to the working image.
        resampled: bool,
    },
}

/// High-level summary for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Working resolution.
    pub working: Dimensions,
    /// Fraction of blank paper.
    pub white_space_ratio: f64,
    /// Final rebellion score.
    pub rebellion_score: f64,
    /// Final fill consistency.
    pub fill_consistency_score: f64,
    /// How the boundary pair was produced.
    pub boundary_method: BoundaryMethod,
}

impl AnalysisDiagnostics {
    /// Stages that ran, in order, with display names.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = vec![
            ("Decode", &self.decode),
            ("Downsample", &self.downsample),
            ("Paper", &self.paper),
            ("Segment", &self.segment),
            ("Measure", &self.measure),
        ];
        if let Some(ref b) = self.boundary {
            stages.push(("Boundary", b));
        }
        stages
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Analysis Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} (working {}x{})",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.working.width,
            self.summary.working.height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "White space: {:.3}  |  Rebellion: {:.3} ({})  |  Fill: {:.3}",
            self.summary.white_space_ratio,
            self.summary.rebellion_score,
            self.summary.boundary_method,
            self.summary.fill_consistency_score,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            template,
            ..
        } => {
            let base = format!("{input_bytes} bytes -> {width}x{height}");
            match template {
                Some(t) => format!("{base} (template {}x{})", t.width, t.height),
                None => base,
            }
        }
        StageMetrics::Downsample {
            original_width,
            original_height,
            width,
            height,
            filter,
            applied,
            ..
        } => {
            if *applied {
                format!("{original_width}x{original_height} -> {width}x{height} ({filter})")
            } else {
                format!("{width}x{height} (unchanged)")
            }
        }
        StageMetrics::Paper {
            max_lightness,
            threshold,
            fallback_applied,
        } => {
            let note = if *fallback_applied { " fallback" } else { "" };
            format!("max_l={max_lightness:.3} threshold={threshold:.3}{note}")
        }
        StageMetrics::Segment {
            background_pixels,
            ink_pixels,
            colored_pixels,
            total_pixel_count,
        } => format!(
            "paper={:.1}% ink={:.1}% colored={:.1}%",
            percent(*background_pixels, *total_pixel_count),
            percent(*ink_pixels, *total_pixel_count),
            percent(*colored_pixels, *total_pixel_count),
        ),
        StageMetrics::Measure {
            fill_strategy,
            chromatic_pixel_count,
            chromatic_bucket_count,
        } => format!(
            "fill={fill_strategy} chromatic={chromatic_pixel_count} buckets={chromatic_bucket_count}"
        ),
        StageMetrics::Boundary {
            template_line_pixels,
            user_ink_pixels,
            rebellion_pixels,
            resampled,
        } => {
            let note = if *resampled { " resampled" } else { "" };
            format!(
                "lines={template_line_pixels} ink={user_ink_pixels} outside={rebellion_pixels}{note}"
            )
        }
    }
}

/// Run the staged pipeline with the built-in decoder, timing each stage.
///
/// # Errors
///
/// Returns the same errors as [`crate::analyze`].
pub fn analyze_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    template_bytes: Option<&[u8]>,
    config: &MetricsConfig,
    clock: &C,
) -> Result<(StagedAnalysis, AnalysisDiagnostics), MetricsError> {
    analyze_with_diagnostics_using(&ImageCrateDecoder, image_bytes, template_bytes, config, clock)
}

/// Run the staged pipeline with `decoder`, timing each stage.
///
/// Readiness of `decoder` is not checked here; see
/// [`crate::analyzer::Analyzer`] for the waiting entry point.
///
/// # Errors
///
/// Returns the same errors as [`crate::analyze`].
pub fn analyze_with_diagnostics_using<D, C>(
    decoder: &D,
    image_bytes: &[u8],
    template_bytes: Option<&[u8]>,
    config: &MetricsConfig,
    clock: &C,
) -> Result<(StagedAnalysis, AnalysisDiagnostics), MetricsError>
where
    D: ImageDecoder + ?Sized,
    C: Clock,
{
    let total_start = clock.now();
    let pending = Pipeline::new(
        image_bytes.to_vec(),
        template_bytes.map(<[u8]>::to_vec),
        config.clone(),
    );

    let t = clock.now();
    let decoded = pending.decode_with(decoder)?;
    let decode = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: decoded.stage_metrics(),
    };

    let t = clock.now();
    let downsampled = decoded.downsample();
    let downsample = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: downsampled.stage_metrics(),
    };

    let t = clock.now();
    let paper_detected = downsampled.detect_paper();
    let paper = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: paper_detected.stage_metrics(),
    };

    let t = clock.now();
    let segmented = paper_detected.segment();
    let segment = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: segmented.stage_metrics(),
    };

    let t = clock.now();
    let measured = segmented.measure();
    let measure = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: measured.stage_metrics(),
    };

    let t = clock.now();
    let scored = measured.score_boundary();
    let boundary_duration = clock.elapsed(&t);
    let boundary = scored.stage_metrics().map(|metrics| StageDiagnostics {
        duration: boundary_duration,
        metrics,
    });

    let staged = scored.into_result();
    let total_duration = clock.elapsed(&total_start);

    let summary = AnalysisSummary {
        image_width: staged.original.width(),
        image_height: staged.original.height(),
        working: staged.dimensions,
        white_space_ratio: staged.metrics.white_space_ratio,
        rebellion_score: staged.metrics.rebellion_score,
        fill_consistency_score: staged.metrics.fill_consistency_score,
        boundary_method: staged.metrics.boundary_method,
    };

    tracing::info!(
        total_ms = duration_ms(total_duration),
        width = summary.working.width,
        height = summary.working.height,
        method = %summary.boundary_method,
        "analysis complete"
    );

    let diagnostics = AnalysisDiagnostics {
        decode,
        downsample,
        paper,
        segment,
        measure,
        boundary,
        total_duration,
        summary,
    };
    Ok((staged, diagnostics))
}
