//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an RGBA
//! bitmap. Transparent regions are flattened onto white, since a line-art
//! PNG with a transparent background is a blank page, not a black one.
//!
//! Decoding is modelled as an injectable service ([`ImageDecoder`]) so a
//! host whose codec loads asynchronously can report readiness and the
//! analysis entry point can wait for it.

use image::{DynamicImage, Rgba, RgbaImage};

use crate::readiness::Readiness;
use crate::types::MetricsError;

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`MetricsError::EmptyInput`] if `bytes` is empty.
/// Returns [`MetricsError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, MetricsError> {
    if bytes.is_empty() {
        return Err(MetricsError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Convert a decoded image to RGBA with alpha composited onto white.
#[must_use]
pub fn to_rgba(image: &DynamicImage) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    if image.color().has_alpha() {
        flatten_onto_white(&mut rgba);
    }
    rgba
}

/// Composite every pixel over an opaque white background.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn flatten_onto_white(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == u8::MAX {
            continue;
        }
        let alpha = f64::from(a) / 255.0;
        let blend = |c: u8| (f64::from(c).mul_add(alpha, 255.0 * (1.0 - alpha))).round() as u8;
        *pixel = Rgba([blend(r), blend(g), blend(b), u8::MAX]);
    }
}

/// A service that turns encoded bytes into an RGBA bitmap.
///
/// Implementations may need time to become usable (a codec loaded in the
/// background, a worker still starting); [`Readiness::is_ready`] reports
/// when they are.
pub trait ImageDecoder: Readiness {
    /// Decode one image.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::EmptyInput`] for empty input and
    /// [`MetricsError::ImageDecode`] for undecodable data.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, MetricsError>;
}

/// Decoder backed by the `image` crate. Always ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl Readiness for ImageCrateDecoder {
    fn is_ready(&self) -> bool {
        true
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, MetricsError> {
        decode(bytes).map(|image| to_rgba(&image))
    }
}

/// Decode a template with `decoder`, reporting failures as template
/// errors rather than primary-image errors.
///
/// # Errors
///
/// Returns [`MetricsError::EmptyTemplate`] for empty input or a
/// zero-area bitmap and [`MetricsError::TemplateDecode`] for
/// undecodable data.
pub fn decode_template<D: ImageDecoder + ?Sized>(
    decoder: &D,
    bytes: &[u8],
) -> Result<RgbaImage, MetricsError> {
    if bytes.is_empty() {
        return Err(MetricsError::EmptyTemplate);
    }
    let template = decoder.decode(bytes).map_err(|e| match e {
        MetricsError::ImageDecode(inner) => MetricsError::TemplateDecode(inner),
        MetricsError::EmptyInput => MetricsError::EmptyTemplate,
        other => other,
    })?;
    check_template_area(template)
}

/// Reject a template with no pixels.
///
/// Resampling a zero-area bitmap yields transparent black, which would
/// read as line art everywhere.
///
/// # Errors
///
/// Returns [`MetricsError::EmptyTemplate`] if either dimension is zero.
pub fn check_template_area(template: RgbaImage) -> Result<RgbaImage, MetricsError> {
    if template.width() == 0 || template.height() == 0 {
        return Err(MetricsError::EmptyTemplate);
    }
    Ok(template)
}
