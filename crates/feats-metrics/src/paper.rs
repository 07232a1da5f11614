//! Adaptive paper-white detection.
//!
//! Photos of paper are rarely pure white: shadows, white balance and
//! scanner gain all pull the paper tone down. Instead of a fixed cutoff
//! the threshold is derived from the brightest pixel actually present.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::color::{Hsl, pixel_lightness};
use crate::types::MetricsConfig;

/// Lightness used in place of the observed maximum when the image is
/// too dark to contain any paper.
const FALLBACK_MAX_LIGHTNESS: f64 = 1.0;

/// Per-image paper threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhiteThreshold {
    /// Brightest HSL lightness observed in the image (0 for an empty
    /// image).
    pub max_lightness: f64,
    /// Lightness at or above which a pixel may be paper.
    pub threshold: f64,
    /// `true` if the observed maximum was below the dark-image floor
    /// and a maximum of 1.0 was used instead.
    pub fallback_applied: bool,
    /// Saturation strictly below which a pixel may be paper.
    pub max_saturation: f64,
}

impl WhiteThreshold {
    /// Returns `true` if a pixel with these HSL values is blank paper.
    #[must_use]
    pub fn is_paper(&self, hsl: Hsl) -> bool {
        hsl.lightness >= self.threshold && hsl.saturation < self.max_saturation
    }
}

/// Derive the paper threshold for an image.
///
/// The brightest lightness is scaled by `paper_coefficient`. If that
/// brightest value is under `dark_image_floor`, or the image has no
/// pixels, a maximum of 1.0 is assumed so a dark photo does not turn
/// its darkest shades into "paper".
#[must_use]
pub fn detect_white_threshold(image: &RgbaImage, config: &MetricsConfig) -> WhiteThreshold {
    let max_lightness = image.pixels().map(pixel_lightness).fold(0.0_f64, f64::max);

    let is_empty = image.width() == 0 || image.height() == 0;
    let fallback_applied = is_empty || max_lightness < config.dark_image_floor;
    let effective_max = if fallback_applied {
        FALLBACK_MAX_LIGHTNESS
    } else {
        max_lightness
    };

    if fallback_applied {
        tracing::warn!(
            max_lightness,
            floor = config.dark_image_floor,
            "image too dark for adaptive paper detection, assuming white paper"
        );
    }

    WhiteThreshold {
        max_lightness,
        threshold: effective_max * config.paper_coefficient,
        fallback_applied,
        max_saturation: config.paper_max_saturation,
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn white_page_threshold() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]));
        let t = detect_white_threshold(&img, &MetricsConfig::default());
        assert!(close(t.max_lightness, 1.0));
        assert!(close(t.threshold, 0.9));
        assert!(!t.fallback_applied);
    }

    #[test]
    fn dim_photo_scales_threshold_down() {
        // Paper photographed at lightness 200/255.
        let img = RgbaImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgba([200, 200, 200, 255])
            } else {
                Rgba([30, 30, 30, 255])
            }
        });
        let t = detect_white_threshold(&img, &MetricsConfig::default());
        let expected_max = 200.0 / 255.0;
        assert!(close(t.max_lightness, expected_max));
        assert!(close(t.threshold, expected_max * 0.9));
        assert!(t.is_paper(Hsl::from_rgb(200, 200, 200)));
        assert!(!t.is_paper(Hsl::from_rgb(30, 30, 30)));
    }

    #[test]
    fn dark_image_falls_back_to_full_white() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([60, 60, 60, 255]));
        let t = detect_white_threshold(&img, &MetricsConfig::default());
        assert!(t.fallback_applied);
        assert!(close(t.threshold, 0.9));
        assert!(!t.is_paper(Hsl::from_rgb(60, 60, 60)));
    }

    #[test]
    fn empty_image_falls_back() {
        let img = RgbaImage::new(0, 0);
        let t = detect_white_threshold(&img, &MetricsConfig::default());
        assert!(t.fallback_applied);
        assert!(close(t.max_lightness, 0.0));
        assert!(close(t.threshold, 0.9));
    }

    #[test]
    fn saturated_light_pixel_is_not_paper() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let t = detect_white_threshold(&img, &MetricsConfig::default());
        // Pale pink: light enough, but saturation is 1.0.
        assert!(!t.is_paper(Hsl::from_rgb(255, 230, 235)));
    }

    #[test]
    fn coefficient_is_configurable() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let config = MetricsConfig {
            paper_coefficient: 0.5,
            ..MetricsConfig::default()
        };
        let t = detect_white_threshold(&img, &config);
        assert!(close(t.threshold, 0.5));
    }
}
