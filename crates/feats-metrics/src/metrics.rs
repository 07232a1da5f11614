//! Reduction of region masks and pixels to the output metrics.
//!
//! All functions here are pure: they read the working image and the
//! masks built by [`crate::regions`] and return numbers. Degenerate
//! inputs (no pixels, no colored region, no chromatic hue) yield zeros
//! or empty lists instead of errors.

use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::color::{ClassifierThresholds, ColorBucket, Hsl, classify};
use crate::downsample::{DownsampleFilter, fit_within, resample};
use crate::regions::{MASK_ON, RegionMasks};
use crate::types::{BoundaryMethod, ColorShare, CvMetrics, FillStrategy, MetricsConfig};

/// Pixel counts per color bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorHistogram {
    /// Count per bucket, indexed by [`ColorBucket::index`].
    pub counts: [u64; ColorBucket::COUNT],
    /// Sum of the chromatic buckets only.
    pub chromatic_total: u64,
}

impl ColorHistogram {
    /// Record one pixel.
    pub const fn add(&mut self, bucket: ColorBucket) {
        self.counts[bucket.index()] += 1;
        if bucket.is_chromatic() {
            self.chromatic_total += 1;
        }
    }

    /// Count for one bucket.
    #[must_use]
    pub const fn count(&self, bucket: ColorBucket) -> u64 {
        self.counts[bucket.index()]
    }

    /// Number of chromatic buckets with at least one pixel.
    #[must_use]
    pub fn chromatic_bucket_count(&self) -> usize {
        ColorBucket::ALL
            .iter()
            .filter(|b| b.is_chromatic() && self.count(**b) > 0)
            .count()
    }

    /// The `limit` most common chromatic buckets with their share of
    /// the chromatic total, highest first.
    ///
    /// Ties keep bucket declaration order. Empty when no chromatic
    /// pixel was recorded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn dominant(&self, limit: usize) -> Vec<ColorShare> {
        if self.chromatic_total == 0 {
            return Vec::new();
        }
        let mut ranked: Vec<(ColorBucket, u64)> = ColorBucket::ALL
            .iter()
            .filter(|b| b.is_chromatic())
            .map(|&b| (b, self.count(b)))
            .filter(|&(_, n)| n > 0)
            .collect();
        // Stable sort: equal counts stay in declaration order.
        ranked.sort_by_key(|&(_, n)| std::cmp::Reverse(n));

        let total = self.chromatic_total as f64;
        ranked
            .into_iter()
            .take(limit)
            .map(|(color, n)| ColorShare {
                color,
                percentage: n as f64 / total * 100.0,
            })
            .collect()
    }
}

/// Result of the aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Metrics with the boundary pair inferred from ink coverage.
    pub metrics: CvMetrics,
    /// Color histogram the dominant colors were drawn from.
    pub histogram: ColorHistogram,
}

/// Fraction of pixels that are blank paper.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn white_space_ratio(masks: &RegionMasks) -> f64 {
    let total = masks.counts.total();
    if total == 0 {
        return 0.0;
    }
    masks.counts.background as f64 / total as f64
}

/// Line visibility estimated from how much of the image is ink.
///
/// A clean page with intact outlines has roughly `baseline` of its area
/// in dark strokes; coverage at or above that saturates to 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn line_visibility_inferred(masks: &RegionMasks, baseline: f64) -> f64 {
    let total = masks.counts.total();
    if total == 0 {
        return 0.0;
    }
    let ink_ratio = masks.counts.ink as f64 / total as f64;
    (ink_ratio / baseline).clamp(0.0, 1.0)
}

/// Classify every colored pixel into a bucket.
///
/// Runs on a copy no larger than `histogram_resolution` on its longest
/// side: the image is reduced with `filter` (`Disabled` reduces by area)
/// and the colored mask is resampled nearest-neighbor so it stays
/// binary.
#[must_use]
pub fn color_histogram(
    image: &RgbaImage,
    colored: &GrayImage,
    histogram_resolution: u32,
    filter: DownsampleFilter,
    thresholds: &ClassifierThresholds,
) -> ColorHistogram {
    let (w, h) = image.dimensions();
    let (hw, hh) = fit_within(w, h, histogram_resolution);

    let (small, small_mask) = if (hw, hh) == (w, h) {
        (image.clone(), colored.clone())
    } else {
        (
            resample(image, hw, hh, filter),
            image::imageops::resize(colored, hw, hh, image::imageops::FilterType::Nearest),
        )
    };

    let mut histogram = ColorHistogram::default();
    for (pixel, mask) in small.pixels().zip(small_mask.pixels()) {
        if mask.0[0] == MASK_ON {
            histogram.add(classify(Hsl::from_pixel(pixel), thresholds));
        }
    }
    histogram
}

/// Fill consistency over the colored region.
///
/// Returns 0 when the strategy has no pixels to measure.
#[must_use]
pub fn fill_consistency(image: &RgbaImage, colored: &GrayImage, config: &MetricsConfig) -> f64 {
    let score = match config.fill_strategy {
        FillStrategy::ChannelStdDev => {
            channel_std_dev(image, colored).map(|sd| 1.0 - sd / config.std_dev_ceiling)
        }
        FillStrategy::NeighborDifference => {
            mean_neighbor_difference(image, colored).map(|d| 1.0 - d / config.neighbor_diff_ceiling)
        }
    };
    score.map_or(0.0, |s| s.clamp(0.0, 1.0))
}

/// Population standard deviation of R, G and B over the masked pixels,
/// averaged across the three channels.
#[allow(clippy::cast_precision_loss)]
fn channel_std_dev(image: &RgbaImage, mask: &GrayImage) -> Option<f64> {
    let mut n = 0_u64;
    let mut sum = [0.0_f64; 3];
    let mut sum_sq = [0.0_f64; 3];

    for (pixel, m) in image.pixels().zip(mask.pixels()) {
        if m.0[0] != MASK_ON {
            continue;
        }
        n += 1;
        for c in 0..3 {
            let v = f64::from(pixel.0[c]);
            sum[c] += v;
            sum_sq[c] += v * v;
        }
    }
    if n == 0 {
        return None;
    }

    let n = n as f64;
    let total: f64 = (0..3)
        .map(|c| {
            let mean = sum[c] / n;
            (sum_sq[c] / n - mean * mean).max(0.0).sqrt()
        })
        .sum();
    Some(total / 3.0)
}

/// Mean L1 RGB distance from each masked pixel to its right-hand
/// neighbor. Pixels in the last column have no neighbor and are skipped.
#[allow(clippy::cast_precision_loss)]
fn mean_neighbor_difference(image: &RgbaImage, mask: &GrayImage) -> Option<f64> {
    let (w, h) = image.dimensions();
    let mut n = 0_u64;
    let mut total = 0_u64;

    for y in 0..h {
        for x in 0..w.saturating_sub(1) {
            if mask.get_pixel(x, y).0[0] != MASK_ON {
                continue;
            }
            let a = image.get_pixel(x, y).0;
            let b = image.get_pixel(x + 1, y).0;
            total += (0..3).map(|c| u64::from(a[c].abs_diff(b[c]))).sum::<u64>();
            n += 1;
        }
    }
    (n > 0).then(|| total as f64 / n as f64)
}

/// Reduce the working image and its masks to [`CvMetrics`].
///
/// The boundary pair is inferred from ink coverage:
/// `rebellion = 1 - line_visibility`. A template-relative score, when
/// available, replaces it later.
#[must_use]
pub fn aggregate(image: &RgbaImage, masks: &RegionMasks, config: &MetricsConfig) -> Measurement {
    let histogram = color_histogram(
        image,
        &masks.colored,
        config.histogram_resolution,
        config.downsample_filter,
        &config.classifier,
    );
    let line_visibility = line_visibility_inferred(masks, config.line_coverage_baseline);
    // Zero-area images score zero on both sides of the pair.
    let rebellion = if masks.counts.total() == 0 {
        0.0
    } else {
        1.0 - line_visibility
    };

    let metrics = CvMetrics {
        white_space_ratio: white_space_ratio(masks),
        dominant_colors: histogram.dominant(config.dominant_color_count),
        line_visibility_score: line_visibility,
        rebellion_score: rebellion,
        fill_consistency_score: fill_consistency(image, &masks.colored, config),
        boundary_method: BoundaryMethod::Inferred,
    };

    tracing::debug!(
        white_space = metrics.white_space_ratio,
        line_visibility = metrics.line_visibility_score,
        fill_consistency = metrics.fill_consistency_score,
        chromatic_pixels = histogram.chromatic_total,
        "metrics aggregated"
    );

    Measurement { metrics, histogram }
}
