//! Boundary scoring against the uncolored template.
//!
//! When the blank page is available, staying inside the lines can be
//! measured directly: every dark mark on the user's page that does not
//! sit on a template line is a mark outside the lines. The comparison
//! is a per-pixel set subtraction on luma masks.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::map::map_pixels2;
use serde::{Deserialize, Serialize};

use crate::downsample::resample;
use crate::regions::{MASK_ON, count_mask_pixels};
use crate::types::MetricsConfig;

/// Outcome of comparing a colored page with its template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryScores {
    /// Share of the user's marks that fall outside template lines, in
    /// `[0, 1]`. Zero when the user made no marks.
    pub rebellion_score: f64,
    /// `1 - rebellion_score`.
    pub line_visibility_score: f64,
    /// Pixels that are line art on the template.
    pub template_line_pixels: u64,
    /// Pixels the user marked (anything darker than near-white).
    pub user_ink_pixels: u64,
    /// Marked pixels not on a template line.
    pub rebellion_pixels: u64,
    /// `true` if the template had to be resized to match the user image.
    pub resampled: bool,
}

/// Masks produced while scoring, for callers that want to inspect or
/// render them.
#[derive(Debug, Clone)]
pub struct BoundaryMasks {
    /// 0/255 mask of the aligned template's line pixels.
    pub template_lines: GrayImage,
    /// 0/255 mask of the user's marked pixels.
    pub user_ink: GrayImage,
    /// `user_ink` with `template_lines` removed.
    pub rebellion: GrayImage,
}

/// 0/255 mask of pixels whose luma is strictly below `cutoff`.
#[must_use]
pub fn dark_mask(luma: &GrayImage, cutoff: u8) -> GrayImage {
    GrayImage::from_fn(luma.width(), luma.height(), |x, y| {
        let v = luma.get_pixel(x, y).0[0];
        Luma([if v < cutoff { MASK_ON } else { 0 }])
    })
}

/// Pixels set in `a` and not in `b`.
///
/// Masks must share dimensions.
#[must_use]
pub fn subtract_masks(a: &GrayImage, b: &GrayImage) -> GrayImage {
    map_pixels2(a, b, |p, q| Luma([p.0[0].saturating_sub(q.0[0])]))
}

/// Compare a user image with its template and build the masks.
///
/// The template is resampled to the user image's dimensions first if
/// they differ, with the configured downsample filter (`Disabled`
/// resamples by area). `template` must have non-zero area.
#[must_use]
pub fn score_with_masks(
    user: &RgbaImage,
    template: &RgbaImage,
    config: &MetricsConfig,
) -> (BoundaryScores, BoundaryMasks) {
    let resampled = user.dimensions() != template.dimensions();
    let aligned;
    let template = if resampled {
        aligned = resample(template, user.width(), user.height(), config.downsample_filter);
        tracing::debug!(
            from_width = template.width(),
            from_height = template.height(),
            to_width = user.width(),
            to_height = user.height(),
            "template resampled to match user image"
        );
        &aligned
    } else {
        template
    };

    let template_lines = dark_mask(&image::imageops::grayscale(template), config.template_ink_luma);
    let user_ink = dark_mask(&image::imageops::grayscale(user), config.user_ink_luma);
    let rebellion = subtract_masks(&user_ink, &template_lines);

    let template_line_pixels = count_mask_pixels(&template_lines);
    let user_ink_pixels = count_mask_pixels(&user_ink);
    let rebellion_pixels = count_mask_pixels(&rebellion);

    #[allow(clippy::cast_precision_loss)]
    let rebellion_score = if user_ink_pixels == 0 {
        0.0
    } else {
        (rebellion_pixels as f64 / user_ink_pixels as f64).clamp(0.0, 1.0)
    };

    let scores = BoundaryScores {
        rebellion_score,
        line_visibility_score: 1.0 - rebellion_score,
        template_line_pixels,
        user_ink_pixels,
        rebellion_pixels,
        resampled,
    };
    let masks = BoundaryMasks {
        template_lines,
        user_ink,
        rebellion,
    };
    (scores, masks)
}

/// Template-relative rebellion and line visibility.
#[must_use]
pub fn score_rebellion(
    user: &RgbaImage,
    template: &RgbaImage,
    config: &MetricsConfig,
) -> BoundaryScores {
    score_with_masks(user, template, config).0
}
