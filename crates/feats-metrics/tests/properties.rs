//! Integration tests: end-to-end properties of the metrics pipeline on
//! synthetic pages encoded in memory.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use feats_metrics::{
    BoundaryMethod, CvMetrics, FillStrategy, MetricsConfig, MetricsError, analyze, analyze_images,
    analyze_staged,
};
use image::{Rgba, RgbaImage};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

fn encode_png(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

/// Small linear congruential generator so noise is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

/// A page with a circle outline and a flower-ish blob of fills.
fn line_art(width: u32, height: u32) -> RgbaImage {
    let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
    let r = f64::from(width.min(height)) / 3.0;
    RgbaImage::from_fn(width, height, |x, y| {
        let d = (f64::from(x) - cx).hypot(f64::from(y) - cy);
        if (d - r).abs() < 1.0 { BLACK } else { WHITE }
    })
}

/// `line_art` colored inside the circle, spilling `spill` pixels past it.
fn colored_line_art(width: u32, height: u32, spill: f64) -> RgbaImage {
    let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
    let r = f64::from(width.min(height)) / 3.0;
    let template = line_art(width, height);
    RgbaImage::from_fn(width, height, |x, y| {
        let line = *template.get_pixel(x, y);
        if line == BLACK {
            return line;
        }
        let d = (f64::from(x) - cx).hypot(f64::from(y) - cy);
        if d < r - 1.0 || (d >= r + 1.0 && d < r + 1.0 + spill) {
            Rgba([40, 120, 220, 255])
        } else {
            WHITE
        }
    })
}

fn assert_well_formed(m: &CvMetrics) {
    for (name, v) in [
        ("white_space_ratio", m.white_space_ratio),
        ("line_visibility_score", m.line_visibility_score),
        ("rebellion_score", m.rebellion_score),
        ("fill_consistency_score", m.fill_consistency_score),
    ] {
        assert!((0.0..=1.0).contains(&v), "{name} = {v} out of range");
    }
    for share in &m.dominant_colors {
        assert!((0.0..=100.0).contains(&share.percentage));
        assert!(share.color.is_chromatic());
    }
    for pair in m.dominant_colors.windows(2) {
        assert!(pair[0].percentage >= pair[1].percentage);
    }
    assert!(m.dominant_colors.len() <= MetricsConfig::DEFAULT_DOMINANT_COLOR_COUNT);
}

#[test]
fn scores_stay_in_range_across_pages() {
    let mut rng = Lcg(7);
    let noise = RgbaImage::from_fn(64, 48, |_, _| {
        let v = [0, 80, 160, 255];
        Rgba([
            v[(rng.next_u64() % 4) as usize],
            v[(rng.next_u64() % 4) as usize],
            v[(rng.next_u64() % 4) as usize],
            255,
        ])
    });
    let pages = [
        RgbaImage::from_pixel(32, 32, WHITE),
        RgbaImage::from_pixel(32, 32, BLACK),
        line_art(80, 60),
        colored_line_art(80, 60, 0.0),
        colored_line_art(80, 60, 6.0),
        noise,
    ];
    for page in &pages {
        let m = analyze(&encode_png(page), None, &MetricsConfig::default()).unwrap();
        assert_well_formed(&m);
        let t = analyze(
            &encode_png(page),
            Some(encode_png(&line_art(80, 60)).as_slice()),
            &MetricsConfig::default(),
        )
        .unwrap();
        assert_well_formed(&t);
        assert_eq!(t.boundary_method, BoundaryMethod::TemplateRelative);
    }
}

#[test]
fn all_white_page_is_all_space() {
    let m = analyze(
        &encode_png(&RgbaImage::from_pixel(50, 50, WHITE)),
        None,
        &MetricsConfig::default(),
    )
    .unwrap();
    assert!((m.white_space_ratio - 1.0).abs() < 1e-9);
    assert!(m.dominant_colors.is_empty());
}

#[test]
fn all_black_page_has_no_space() {
    let m = analyze(
        &encode_png(&RgbaImage::from_pixel(50, 50, BLACK)),
        None,
        &MetricsConfig::default(),
    )
    .unwrap();
    assert!(m.white_space_ratio.abs() < 1e-9);
    assert!(m.dominant_colors.is_empty());
}

#[test]
fn empty_bitmap_scores_zero_everywhere() {
    let m = analyze_images(&RgbaImage::new(0, 0), None, &MetricsConfig::default()).unwrap();
    assert!(m.white_space_ratio.abs() < 1e-9);
    assert!(m.line_visibility_score.abs() < 1e-9);
    assert!(m.rebellion_score.abs() < 1e-9);
    assert!(m.fill_consistency_score.abs() < 1e-9);
    assert!(m.dominant_colors.is_empty());
}

#[test]
fn empty_template_bitmap_is_an_error() {
    let page = line_art(40, 40);
    let result = analyze_images(&page, Some(&RgbaImage::new(0, 0)), &MetricsConfig::default());
    assert!(matches!(result, Err(MetricsError::EmptyTemplate)));
}

#[test]
fn dim_photo_still_finds_paper() {
    // Gray-ish paper under poor light with a dark scribble.
    let page = RgbaImage::from_fn(40, 40, |x, y| {
        if x == y {
            Rgba([20, 20, 20, 255])
        } else {
            Rgba([170, 168, 165, 255])
        }
    });
    let m = analyze_images(&page, None, &MetricsConfig::default()).unwrap();
    assert!((m.white_space_ratio - 1560.0 / 1600.0).abs() < 1e-9);
}

#[test]
fn template_identical_to_user_ink_scores_no_rebellion() {
    let template = line_art(90, 90);
    let m = analyze(
        &encode_png(&template),
        Some(encode_png(&template).as_slice()),
        &MetricsConfig::default(),
    )
    .unwrap();
    assert!(m.rebellion_score.abs() < 1e-9);
    assert!((m.line_visibility_score - 1.0).abs() < 1e-9);
}

#[test]
fn marks_disjoint_from_template_score_full_rebellion() {
    let template = line_art(90, 90);
    // Only a corner scribble, nowhere near the circle.
    let user = RgbaImage::from_fn(90, 90, |x, y| if x < 8 && y < 8 { BLACK } else { WHITE });
    let m = analyze(
        &encode_png(&user),
        Some(encode_png(&template).as_slice()),
        &MetricsConfig::default(),
    )
    .unwrap();
    assert!((m.rebellion_score - 1.0).abs() < 1e-9);
    assert!(m.line_visibility_score.abs() < 1e-9);
}

#[test]
fn uniform_fill_is_consistent_and_noise_is_not() {
    let uniform = RgbaImage::from_pixel(60, 60, Rgba([220, 60, 60, 255]));
    let mut rng = Lcg(42);
    // Saturated primaries and secondaries, chosen per pixel.
    let palette = [
        [255, 0, 0],
        [0, 255, 0],
        [0, 0, 255],
        [255, 255, 0],
        [0, 255, 255],
        [255, 0, 255],
    ];
    let noise = RgbaImage::from_fn(60, 60, |_, _| {
        let [r, g, b] = palette[(rng.next_u64() % 6) as usize];
        Rgba([r, g, b, 255])
    });

    for strategy in [FillStrategy::ChannelStdDev, FillStrategy::NeighborDifference] {
        let config = MetricsConfig {
            fill_strategy: strategy,
            ..MetricsConfig::default()
        };
        let smooth = analyze_images(&uniform, None, &config).unwrap();
        let rough = analyze_images(&noise, None, &config).unwrap();
        assert!(
            (smooth.fill_consistency_score - 1.0).abs() < 1e-9,
            "{strategy}: uniform scored {}",
            smooth.fill_consistency_score
        );
        assert!(
            rough.fill_consistency_score < 0.05,
            "{strategy}: noise scored {}",
            rough.fill_consistency_score
        );
    }
}

#[test]
fn identical_inputs_give_identical_output() {
    let user = encode_png(&colored_line_art(120, 80, 3.0));
    let template = encode_png(&line_art(240, 160));
    let config = MetricsConfig::default();
    let a = analyze(&user, Some(&template), &config).unwrap();
    let b = analyze(&user, Some(&template), &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn more_spillover_never_decreases_rebellion() {
    // Template at a different resolution so it is resampled every time.
    let template = encode_png(&line_art(200, 200));
    let config = MetricsConfig::default();
    let mut previous = 0.0;
    for spill in [0.0, 2.0, 4.0, 8.0, 16.0] {
        let user = encode_png(&colored_line_art(100, 100, spill));
        let staged = analyze_staged(&user, Some(&template), &config).unwrap();
        assert!(staged.boundary.unwrap().resampled);
        let rebellion = staged.metrics.rebellion_score;
        assert!(
            rebellion >= previous,
            "spill {spill}: rebellion {rebellion} < {previous}"
        );
        previous = rebellion;
    }
    assert!(previous > 0.0);
}

#[test]
fn large_photo_is_measured_at_working_resolution() {
    let page = colored_line_art(1600, 1200, 0.0);
    let staged = analyze_staged(&encode_png(&page), None, &MetricsConfig::default()).unwrap();
    assert_eq!(staged.dimensions.width, 800);
    assert_eq!(staged.dimensions.height, 600);
    assert_eq!(staged.original.dimensions(), (1600, 1200));
    assert_well_formed(&staged.metrics);
}

#[test]
fn jpeg_input_is_accepted() {
    let page = colored_line_art(64, 64, 0.0);
    let rgb = image::DynamicImage::ImageRgba8(page).to_rgb8();
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 95)
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    let m = analyze(&buf, None, &MetricsConfig::default()).unwrap();
    assert_well_formed(&m);
    assert!(m.white_space_ratio > 0.3);
}
