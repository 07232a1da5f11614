//! RGB to HSL conversion and named color buckets.
//!
//! Every pixel that survives the region masks is mapped to one of a
//! fixed set of named buckets. Achromatic pixels (very dark, very light,
//! or unsaturated) are caught before hue is consulted, so hue noise on
//! near-gray pixels never produces a spurious color.
//!
//! Hue ranges cover the full circle with no gaps. Red spans the 0°/360°
//! seam and is matched on both sides of it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::MetricsError;

/// Hue where Red ends and Orange begins.
const RED_ORANGE_HUE: f64 = 15.0;
/// Hue where Orange ends and Yellow begins.
const ORANGE_YELLOW_HUE: f64 = 45.0;
/// Hue where Yellow ends and Green begins.
const YELLOW_GREEN_HUE: f64 = 70.0;
/// Hue where Green ends and Teal begins.
const GREEN_TEAL_HUE: f64 = 150.0;
/// Hue where Teal ends and Blue begins.
const TEAL_BLUE_HUE: f64 = 190.0;
/// Hue where Pink ends and the wrapped Red range begins.
const PINK_RED_HUE: f64 = 340.0;

/// A pixel in HSL space.
///
/// Hue is in degrees `[0, 360)`; saturation and lightness are in
/// `[0, 1]`. Lightness is `(max(R,G,B) + min(R,G,B)) / 2` normalized to
/// `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    /// Hue in degrees.
    pub hue: f64,
    /// Saturation.
    pub saturation: f64,
    /// Lightness.
    pub lightness: f64,
}

impl Hsl {
    /// Convert 8-bit RGB to HSL.
    #[must_use]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let lightness = lightness_of(max, min);

        if max == min {
            return Self {
                hue: 0.0,
                saturation: 0.0,
                lightness,
            };
        }

        let max_f = f64::from(max) / 255.0;
        let min_f = f64::from(min) / 255.0;
        let delta = max_f - min_f;

        let saturation = if lightness > 0.5 {
            delta / (2.0 - max_f - min_f)
        } else {
            delta / (max_f + min_f)
        };

        let (rf, gf, bf) = (
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
        );
        let sector = if max == r {
            ((gf - bf) / delta).rem_euclid(6.0)
        } else if max == g {
            (bf - rf) / delta + 2.0
        } else {
            (rf - gf) / delta + 4.0
        };

        Self {
            hue: (sector * 60.0).rem_euclid(360.0),
            saturation,
            lightness,
        }
    }

    /// Convert an RGBA pixel to HSL, ignoring alpha.
    #[must_use]
    pub fn from_pixel(pixel: &image::Rgba<u8>) -> Self {
        let [r, g, b, _] = pixel.0;
        Self::from_rgb(r, g, b)
    }
}

/// HSL lightness of an RGBA pixel without computing hue or saturation.
#[must_use]
pub fn pixel_lightness(pixel: &image::Rgba<u8>) -> f64 {
    let [r, g, b, _] = pixel.0;
    lightness_of(r.max(g).max(b), r.min(g).min(b))
}

fn lightness_of(max: u8, min: u8) -> f64 {
    (f64::from(max) + f64::from(min)) / 2.0 / 255.0
}

/// A named color bucket.
///
/// The declaration order is the tie-break order when two buckets hold
/// the same share of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColorBucket {
    Red,
    Orange,
    Yellow,
    Green,
    Teal,
    Blue,
    Purple,
    Pink,
    Gray,
    Black,
    White,
}

impl ColorBucket {
    /// Number of buckets.
    pub const COUNT: usize = 11;

    /// All buckets in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Red,
        Self::Orange,
        Self::Yellow,
        Self::Green,
        Self::Teal,
        Self::Blue,
        Self::Purple,
        Self::Pink,
        Self::Gray,
        Self::Black,
        Self::White,
    ];

    /// Position of this bucket in [`ALL`](Self::ALL).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// `true` for named hues, `false` for Gray, Black and White.
    #[must_use]
    pub const fn is_chromatic(self) -> bool {
        !matches!(self, Self::Gray | Self::Black | Self::White)
    }

    /// Bucket for a chromatic hue, in degrees.
    ///
    /// Values outside `[0, 360)` are wrapped first.
    #[must_use]
    pub fn from_hue(hue: f64, thresholds: &ClassifierThresholds) -> Self {
        let hue = hue.rem_euclid(360.0);
        if hue < RED_ORANGE_HUE {
            Self::Red
        } else if hue < ORANGE_YELLOW_HUE {
            Self::Orange
        } else if hue < YELLOW_GREEN_HUE {
            Self::Yellow
        } else if hue < GREEN_TEAL_HUE {
            Self::Green
        } else if hue < TEAL_BLUE_HUE {
            Self::Teal
        } else if hue < thresholds.blue_purple_hue {
            Self::Blue
        } else if hue < thresholds.purple_pink_hue {
            Self::Purple
        } else if hue < PINK_RED_HUE {
            Self::Pink
        } else {
            Self::Red
        }
    }
}

impl fmt::Display for ColorBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Red => "Red",
            Self::Orange => "Orange",
            Self::Yellow => "Yellow",
            Self::Green => "Green",
            Self::Teal => "Teal",
            Self::Blue => "Blue",
            Self::Purple => "Purple",
            Self::Pink => "Pink",
            Self::Gray => "Gray",
            Self::Black => "Black",
            Self::White => "White",
        };
        f.write_str(name)
    }
}

/// Achromatic cutoffs and tunable hue splits for [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Lightness at or below which a pixel is Black.
    pub black_lightness: f64,
    /// Lightness at or above which a low-saturation pixel is White.
    pub white_lightness: f64,
    /// Saturation at or below which a light pixel may be White.
    pub white_max_saturation: f64,
    /// Saturation strictly below which a pixel is Gray.
    pub gray_saturation: f64,
    /// Hue where Blue ends and Purple begins.
    pub blue_purple_hue: f64,
    /// Hue where Purple ends and Pink begins.
    pub purple_pink_hue: f64,
}

impl ClassifierThresholds {
    /// Default Black lightness ceiling.
    pub const DEFAULT_BLACK_LIGHTNESS: f64 = 0.15;
    /// Default White lightness floor.
    pub const DEFAULT_WHITE_LIGHTNESS: f64 = 0.93;
    /// Default White saturation ceiling.
    pub const DEFAULT_WHITE_MAX_SATURATION: f64 = 0.2;
    /// Default Gray saturation ceiling.
    pub const DEFAULT_GRAY_SATURATION: f64 = 0.15;
    /// Default Blue/Purple split.
    pub const DEFAULT_BLUE_PURPLE_HUE: f64 = 250.0;
    /// Default Purple/Pink split.
    pub const DEFAULT_PURPLE_PINK_HUE: f64 = 290.0;

    /// Check ranges and ordering of the thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] if a lightness or
    /// saturation is outside `[0, 1]`, if Black is not darker than
    /// White, or if the hue splits are not ordered strictly inside the
    /// fixed Teal/Blue and Pink/Red boundaries.
    pub fn validate(&self) -> Result<(), MetricsError> {
        let unit = 0.0..=1.0;
        let fractions = [
            ("black_lightness", self.black_lightness),
            ("white_lightness", self.white_lightness),
            ("white_max_saturation", self.white_max_saturation),
            ("gray_saturation", self.gray_saturation),
        ];
        for (name, value) in fractions {
            if !unit.contains(&value) {
                return Err(MetricsError::InvalidConfig(format!(
                    "classifier.{name} must be in [0, 1]"
                )));
            }
        }
        if self.black_lightness >= self.white_lightness {
            return Err(MetricsError::InvalidConfig(
                "classifier.black_lightness must be below white_lightness".to_owned(),
            ));
        }
        let ordered = TEAL_BLUE_HUE < self.blue_purple_hue
            && self.blue_purple_hue < self.purple_pink_hue
            && self.purple_pink_hue < PINK_RED_HUE;
        if !ordered {
            return Err(MetricsError::InvalidConfig(format!(
                "classifier hue splits must satisfy {TEAL_BLUE_HUE} < blue_purple_hue < purple_pink_hue < {PINK_RED_HUE}"
            )));
        }
        Ok(())
    }
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            black_lightness: Self::DEFAULT_BLACK_LIGHTNESS,
            white_lightness: Self::DEFAULT_WHITE_LIGHTNESS,
            white_max_saturation: Self::DEFAULT_WHITE_MAX_SATURATION,
            gray_saturation: Self::DEFAULT_GRAY_SATURATION,
            blue_purple_hue: Self::DEFAULT_BLUE_PURPLE_HUE,
            purple_pink_hue: Self::DEFAULT_PURPLE_PINK_HUE,
        }
    }
}

/// Assign a pixel to its color bucket.
///
/// Checks run in a fixed order and the first match wins: extreme
/// darkness beats everything, then near-white, then low saturation, and
/// only then is hue consulted.
#[must_use]
pub fn classify(hsl: Hsl, thresholds: &ClassifierThresholds) -> ColorBucket {
    if hsl.lightness <= thresholds.black_lightness {
        ColorBucket::Black
    } else if hsl.lightness >= thresholds.white_lightness
        && hsl.saturation <= thresholds.white_max_saturation
    {
        ColorBucket::White
    } else if hsl.saturation < thresholds.gray_saturation {
        ColorBucket::Gray
    } else {
        ColorBucket::from_hue(hsl.hue, thresholds)
    }
}
