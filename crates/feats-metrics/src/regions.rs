//! Partition of an image into background, ink and colored regions.
//!
//! Each pixel lands in exactly one region: blank paper first, then dark
//! ink among what is left, and everything else counts as colored. The
//! three masks are built in a single pass and never overlap.

use image::{GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::color::Hsl;
use crate::paper::WhiteThreshold;
use crate::types::MetricsConfig;

/// Mask value for a pixel inside the region.
pub const MASK_ON: u8 = 255;

/// The region a single pixel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    /// Blank paper.
    Background,
    /// Dark line art or dark marks.
    Ink,
    /// Anything else: the colored-in area.
    Colored,
}

/// Assign one pixel to a region.
#[must_use]
pub fn region_of(hsl: Hsl, threshold: &WhiteThreshold, config: &MetricsConfig) -> Region {
    if threshold.is_paper(hsl) {
        Region::Background
    } else if hsl.lightness < config.ink_lightness {
        Region::Ink
    } else {
        Region::Colored
    }
}

/// Pixel counts per region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCounts {
    /// Pixels at or above the paper threshold.
    pub background: u64,
    /// Dark pixels read as line art.
    pub ink: u64,
    /// Everything else: the user's coloring.
    pub colored: u64,
}

impl RegionCounts {
    /// Sum of all three regions, equal to the image's pixel count.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.background + self.ink + self.colored
    }
}

/// Three disjoint 0/255 masks covering every pixel of the source image.
#[derive(Debug, Clone)]
pub struct RegionMasks {
    /// Blank-paper pixels.
    pub background: GrayImage,
    /// Dark ink pixels.
    pub ink: GrayImage,
    /// Colored pixels.
    pub colored: GrayImage,
    /// Per-region pixel counts.
    pub counts: RegionCounts,
}

impl RegionMasks {
    /// Mask for one region.
    #[must_use]
    pub const fn mask(&self, region: Region) -> &GrayImage {
        match region {
            Region::Background => &self.background,
            Region::Ink => &self.ink,
            Region::Colored => &self.colored,
        }
    }
}

/// Build the region masks for an image.
#[must_use]
pub fn build_masks(
    image: &RgbaImage,
    threshold: &WhiteThreshold,
    config: &MetricsConfig,
) -> RegionMasks {
    let (w, h) = image.dimensions();
    let mut background = GrayImage::new(w, h);
    let mut ink = GrayImage::new(w, h);
    let mut colored = GrayImage::new(w, h);
    let mut counts = RegionCounts::default();

    for (x, y, pixel) in image.enumerate_pixels() {
        let (mask, count) = match region_of(Hsl::from_pixel(pixel), threshold, config) {
            Region::Background => (&mut background, &mut counts.background),
            Region::Ink => (&mut ink, &mut counts.ink),
            Region::Colored => (&mut colored, &mut counts.colored),
        };
        mask.put_pixel(x, y, Luma([MASK_ON]));
        *count += 1;
    }

    tracing::debug!(
        background = counts.background,
        ink = counts.ink,
        colored = counts.colored,
        "region masks built"
    );

    RegionMasks {
        background,
        ink,
        colored,
        counts,
    }
}

/// Number of nonzero pixels in a mask.
#[must_use]
pub fn count_mask_pixels(mask: &GrayImage) -> u64 {
    let hist = imageproc::stats::histogram(mask);
    let zero = u64::from(hist.channels[0][0]);
    u64::from(mask.width()) * u64::from(mask.height()) - zero
}
