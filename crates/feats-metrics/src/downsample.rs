//! Image downsampling to a target working resolution.
//!
//! Reduces the input image so the longest axis matches the configured
//! `working_resolution`. Every per-pixel stage after decode runs on this
//! smaller grid, which keeps cost bounded on large phone photos.
//!
//! If the image is already at or below the target resolution, it is
//! returned unchanged.

use std::fmt;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Resampling filter used when downsampling.
///
/// [`Area`](Self::Area) averages every source pixel a destination pixel
/// covers, so thin dark strokes thin out instead of vanishing. The
/// interpolating filters come from the `image` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Skip downsampling regardless of image size.
    Disabled,
    /// Box-overlap averaging.
    #[default]
    Area,
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian: smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: sharpest, slowest.
    Lanczos3,
}

impl DownsampleFilter {
    /// The `image` crate filter for the interpolating variants.
    ///
    /// `None` for [`Disabled`](Self::Disabled) and [`Area`](Self::Area),
    /// which have no counterpart there.
    const fn to_image_filter(self) -> Option<image::imageops::FilterType> {
        match self {
            Self::Disabled | Self::Area => None,
            Self::Nearest => Some(image::imageops::FilterType::Nearest),
            Self::Triangle => Some(image::imageops::FilterType::Triangle),
            Self::CatmullRom => Some(image::imageops::FilterType::CatmullRom),
            Self::Gaussian => Some(image::imageops::FilterType::Gaussian),
            Self::Lanczos3 => Some(image::imageops::FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Area => f.write_str("Area"),
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Dimensions that fit `width x height` inside a `max_dimension` square
/// while preserving aspect ratio.
///
/// Neither output axis is ever zero. Inputs already inside the square
/// are returned unchanged.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let long_axis = width.max(height);
    if long_axis <= max_dimension || long_axis == 0 {
        return (width, height);
    }
    let ratio = f64::from(max_dimension) / f64::from(long_axis);
    let scale = |v: u32| ((f64::from(v) * ratio).round() as u32).clamp(1, max_dimension.max(1));
    (scale(width), scale(height))
}

/// Downsample an image so the longest axis is at most `max_dimension`
/// pixels, using the specified resampling filter.
///
/// Returns the (possibly unchanged) image and whether downsampling was
/// actually applied.
#[must_use]
pub fn downsample(
    image: &RgbaImage,
    max_dimension: u32,
    filter: DownsampleFilter,
) -> (RgbaImage, bool) {
    if filter == DownsampleFilter::Disabled {
        return (image.clone(), false);
    }

    let (w, h) = image.dimensions();
    if w.max(h) <= max_dimension {
        return (image.clone(), false);
    }

    let (nw, nh) = fit_within(w, h, max_dimension);
    (resample(image, nw, nh, filter), true)
}

/// Resize an image to exact dimensions.
///
/// [`DownsampleFilter::Disabled`] is treated as [`DownsampleFilter::Area`]
/// here: a caller asking for an exact size always gets one.
#[must_use]
pub fn resample(image: &RgbaImage, width: u32, height: u32, filter: DownsampleFilter) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    match filter.to_image_filter() {
        Some(f) => image::imageops::resize(image, width, height, f),
        None => area_resize(image, width, height),
    }
}

/// One destination sample's contributing source indices and weights.
type Taps = Vec<(usize, f64)>;

/// Box-overlap weights along one axis.
///
/// Destination sample `d` covers the source interval
/// `[d * scale, (d + 1) * scale)`. Each source sample contributes in
/// proportion to its overlap with that interval; weights sum to one.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn axis_taps(src: u32, dst: u32) -> Vec<Taps> {
    let scale = f64::from(src) / f64::from(dst);
    (0..dst)
        .map(|d| {
            let start = f64::from(d) * scale;
            let end = start + scale;
            let first = start.floor() as u32;
            let last = (end.ceil() as u32).min(src);
            let mut taps: Taps = (first..last)
                .filter_map(|s| {
                    let overlap = end.min(f64::from(s + 1)) - start.max(f64::from(s));
                    (overlap > 0.0).then_some((s as usize, overlap))
                })
                .collect();
            if taps.is_empty() {
                taps.push(((first.min(src - 1)) as usize, 1.0));
            }
            let total: f64 = taps.iter().map(|&(_, w)| w).sum();
            for tap in &mut taps {
                tap.1 /= total;
            }
            taps
        })
        .collect()
}

/// Area-averaging resize, separable into a horizontal then a vertical
/// pass with `f64` accumulators.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn area_resize(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (src_w, src_h) = image.dimensions();
    if width == 0 || height == 0 || src_w == 0 || src_h == 0 {
        return RgbaImage::new(width, height);
    }

    let x_taps = axis_taps(src_w, width);
    let y_taps = axis_taps(src_h, height);
    let dst_w = width as usize;

    // Horizontal pass: src_h rows of dst_w samples.
    let mut rows: Vec<[f64; 4]> = Vec::with_capacity(dst_w * src_h as usize);
    for y in 0..src_h {
        for taps in &x_taps {
            let mut acc = [0.0_f64; 4];
            for &(sx, weight) in taps {
                let px = image.get_pixel(sx as u32, y).0;
                for (a, &c) in acc.iter_mut().zip(px.iter()) {
                    *a += f64::from(c) * weight;
                }
            }
            rows.push(acc);
        }
    }

    // Vertical pass.
    let mut out = RgbaImage::new(width, height);
    for (dy, taps) in y_taps.iter().enumerate() {
        for dx in 0..dst_w {
            let mut acc = [0.0_f64; 4];
            for &(sy, weight) in taps {
                let sample = rows[sy * dst_w + dx];
                for (a, c) in acc.iter_mut().zip(sample) {
                    *a += c * weight;
                }
            }
            let px = acc.map(|v| v.round().clamp(0.0, 255.0) as u8);
            out.put_pixel(dx as u32, dy as u32, Rgba(px));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([128, 128, 128, 255]))
    }

    #[test]
    fn default_filter_is_area() {
        assert_eq!(DownsampleFilter::default(), DownsampleFilter::Area);
    }

    #[test]
    fn no_downsample_when_already_small() {
        let img = test_image(100, 80);
        let (result, applied) = downsample(&img, 256, DownsampleFilter::Area);
        assert!(!applied);
        assert_eq!(result.dimensions(), (100, 80));
    }

    #[test]
    fn no_downsample_when_exact_match() {
        let img = test_image(256, 200);
        let (result, applied) = downsample(&img, 256, DownsampleFilter::Triangle);
        assert!(!applied);
        assert_eq!(result.dimensions(), (256, 200));
    }

    #[test]
    fn downsample_landscape() {
        let img = test_image(1024, 768);
        let (result, applied) = downsample(&img, 256, DownsampleFilter::Area);
        assert!(applied);
        // Aspect ratio preserved: 768 * 256 / 1024 = 192
        assert_eq!(result.dimensions(), (256, 192));
    }

    #[test]
    fn downsample_portrait() {
        let img = test_image(600, 1200);
        let (result, applied) = downsample(&img, 256, DownsampleFilter::Triangle);
        assert!(applied);
        assert_eq!(result.dimensions(), (128, 256));
    }

    #[test]
    fn disabled_filter_skips_even_large_image() {
        let img = test_image(1024, 768);
        let (result, applied) = downsample(&img, 256, DownsampleFilter::Disabled);
        assert!(!applied);
        assert_eq!(result.dimensions(), (1024, 768));
    }

    #[test]
    fn fit_within_never_returns_zero() {
        assert_eq!(fit_within(4000, 1, 800), (800, 1));
        assert_eq!(fit_within(1, 4000, 800), (1, 800));
    }

    #[test]
    fn area_preserves_uniform_color() {
        let img = RgbaImage::from_pixel(37, 23, Rgba([10, 200, 90, 255]));
        let out = resample(&img, 11, 7, DownsampleFilter::Area);
        for px in out.pixels() {
            assert_eq!(px.0, [10, 200, 90, 255]);
        }
    }

    #[test]
    fn area_averages_two_by_two_blocks() {
        // Columns alternate black/white; halving averages each pair.
        let img = RgbaImage::from_fn(4, 2, |x, _| {
            if x % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let out = resample(&img, 2, 1, DownsampleFilter::Area);
        for px in out.pixels() {
            // 127.5 rounds to 128.
            assert_eq!(px.0, [128, 128, 128, 255]);
        }
    }

    #[test]
    fn area_handles_fractional_scale() {
        // 3 -> 2: each output covers 1.5 source pixels.
        let img = RgbaImage::from_fn(3, 1, |x, _| {
            let v = [0, 90, 180][x as usize];
            Rgba([v, v, v, 255])
        });
        let out = resample(&img, 2, 1, DownsampleFilter::Area);
        // (0 * 1 + 90 * 0.5) / 1.5 = 30; (90 * 0.5 + 180 * 1) / 1.5 = 150
        assert_eq!(out.get_pixel(0, 0).0[0], 30);
        assert_eq!(out.get_pixel(1, 0).0[0], 150);
    }

    #[test]
    fn area_upscale_replicates_pixels() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([200, 200, 200, 255])
            }
        });
        let out = resample(&img, 4, 1, DownsampleFilter::Area);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 0);
        assert_eq!(out.get_pixel(2, 0).0[0], 200);
        assert_eq!(out.get_pixel(3, 0).0[0], 200);
    }

    #[test]
    fn resample_same_size_is_identity() {
        let img = RgbaImage::from_fn(5, 5, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let out = resample(&img, 5, 5, DownsampleFilter::Lanczos3);
        assert_eq!(out, img);
    }

    #[test]
    fn display_names() {
        assert_eq!(DownsampleFilter::Area.to_string(), "Area");
        assert_eq!(DownsampleFilter::Disabled.to_string(), "Disabled");
    }
}
