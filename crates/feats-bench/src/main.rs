//! feats-bench: CLI tool for metric calibration and diagnostics.
//!
//! Runs the metrics pipeline on a given image file (optionally against
//! its blank template) with configurable parameters, printing the
//! resulting metrics and detailed per-stage diagnostics. Useful for:
//!
//! - Comparing fill-consistency strategies on the same page
//! - Tuning paper detection, ink cutoffs and the hue classifier
//! - Measuring per-stage durations to identify bottlenecks
//! - Previewing the grounding text handed to an interpretation step
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin feats-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use feats_metrics::diagnostics::AnalysisDiagnostics;
use feats_metrics::{
    Analyzer, ClassifierThresholds, DownsampleFilter, FillStrategy, GroundingContext, MetricsConfig,
    UserEmotion,
};
use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "feats_metrics=info";

/// Coloring-page metric calibration and diagnostics.
///
/// Analyzes a colored page with configurable parameters and prints the
/// metrics together with per-stage timing and pixel-count diagnostics.
#[derive(Parser)]
#[command(name = "feats-bench", version)]
struct Cli {
    /// Path to the colored image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Path to the uncolored template of the same page.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Working resolution (max dimension in pixels after downsampling).
    #[arg(
        long,
        default_value_t = MetricsConfig::DEFAULT_WORKING_RESOLUTION,
        value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..),
    )]
    working_resolution: u32,

    /// Downsample filter (disabled, area, nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    downsample_filter: Filter,

    /// Max dimension of the reduced image used for the color histogram.
    #[arg(
        long,
        default_value_t = MetricsConfig::DEFAULT_HISTOGRAM_RESOLUTION,
        value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..),
    )]
    histogram_resolution: u32,

    /// Fraction of the brightest lightness at which paper starts.
    #[arg(long, default_value_t = MetricsConfig::DEFAULT_PAPER_COEFFICIENT)]
    paper_coefficient: f64,

    /// Brightest lightness below which the image is treated as too dark.
    #[arg(long, default_value_t = MetricsConfig::DEFAULT_DARK_IMAGE_FLOOR)]
    dark_image_floor: f64,

    /// Saturation below which a bright pixel counts as paper.
    #[arg(long, default_value_t = MetricsConfig::DEFAULT_PAPER_MAX_SATURATION)]
    paper_max_saturation: f64,

    /// Lightness below which a pixel is ink.
    #[arg(long, default_value_t = MetricsConfig::DEFAULT_INK_LIGHTNESS)]
    ink_lightness: f64,

    /// Ink coverage treated as fully visible line art.
    #[arg(long, default_value_t = MetricsConfig::DEFAULT_LINE_COVERAGE_BASELINE)]
    line_coverage_baseline: f64,

    /// Fill consistency strategy.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILL)]
    fill_strategy: Fill,

    /// Mean neighbor difference that scores zero consistency.
    #[arg(long, default_value_t = MetricsConfig::DEFAULT_NEIGHBOR_DIFF_CEILING)]
    neighbor_diff_ceiling: f64,

    /// Channel standard deviation that scores zero consistency.
    #[arg(long, default_value_t = MetricsConfig::DEFAULT_STD_DEV_CEILING)]
    std_dev_ceiling: f64,

    /// Number of dominant colors to report.
    #[arg(
        long,
        default_value_t = MetricsConfig::DEFAULT_DOMINANT_COLOR_COUNT,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
    )]
    dominant_colors: usize,

    /// Luma below which a template pixel is line art.
    #[arg(long, default_value_t = MetricsConfig::DEFAULT_TEMPLATE_INK_LUMA)]
    template_ink_luma: u8,

    /// Luma below which a user pixel counts as a mark.
    #[arg(long, default_value_t = MetricsConfig::DEFAULT_USER_INK_LUMA)]
    user_ink_luma: u8,

    /// Classifier: lightness at or below which a pixel is Black.
    #[arg(long, default_value_t = ClassifierThresholds::DEFAULT_BLACK_LIGHTNESS)]
    black_lightness: f64,

    /// Classifier: lightness at or above which a pale pixel is White.
    #[arg(long, default_value_t = ClassifierThresholds::DEFAULT_WHITE_LIGHTNESS)]
    white_lightness: f64,

    /// Classifier: saturation at or below which a light pixel may be White.
    #[arg(long, default_value_t = ClassifierThresholds::DEFAULT_WHITE_MAX_SATURATION)]
    white_max_saturation: f64,

    /// Classifier: saturation below which a pixel is Gray.
    #[arg(long, default_value_t = ClassifierThresholds::DEFAULT_GRAY_SATURATION)]
    gray_saturation: f64,

    /// Classifier: hue (degrees) where Blue ends and Purple begins.
    #[arg(long, default_value_t = ClassifierThresholds::DEFAULT_BLUE_PURPLE_HUE)]
    blue_purple_hue: f64,

    /// Classifier: hue (degrees) where Purple ends and Pink begins.
    #[arg(long, default_value_t = ClassifierThresholds::DEFAULT_PURPLE_PINK_HUE)]
    purple_pink_hue: f64,

    /// Number of runs for averaging.
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
    )]
    runs: usize,

    /// Output metrics and diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Also print the grounding text built from the metrics.
    #[arg(long)]
    context: bool,

    /// Primary self-reported emotion for `--context`.
    #[arg(long)]
    emotion_primary: Option<String>,

    /// Secondary self-reported emotion for `--context`.
    #[arg(long)]
    emotion_secondary: Option<String>,

    /// Tertiary self-reported emotion for `--context`.
    #[arg(long)]
    emotion_tertiary: Option<String>,

    /// Full metrics config as a JSON string.
    ///
    /// When provided, all other metric parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Disabled: skip downsampling regardless of image size.
    Disabled,
    /// Box-overlap area averaging (accurate for reduction).
    Area,
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Maps a [`DownsampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_metrics(f: DownsampleFilter) -> Filter {
    match f {
        DownsampleFilter::Disabled => Filter::Disabled,
        DownsampleFilter::Area => Filter::Area,
        DownsampleFilter::Nearest => Filter::Nearest,
        DownsampleFilter::Triangle => Filter::Triangle,
        DownsampleFilter::CatmullRom => Filter::CatmullRom,
        DownsampleFilter::Gaussian => Filter::Gaussian,
        DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`MetricsConfig::DEFAULT_DOWNSAMPLE_FILTER`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_metrics(MetricsConfig::DEFAULT_DOWNSAMPLE_FILTER);

/// Fill consistency strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Fill {
    /// Per-channel standard deviation over all colored pixels.
    ChannelStdDev,
    /// Mean difference between horizontally adjacent pixels.
    NeighborDifference,
}

const fn fill_from_metrics(f: FillStrategy) -> Fill {
    match f {
        FillStrategy::ChannelStdDev => Fill::ChannelStdDev,
        FillStrategy::NeighborDifference => Fill::NeighborDifference,
    }
}

const CLI_DEFAULT_FILL: Fill = fill_from_metrics(MetricsConfig::DEFAULT_FILL_STRATEGY);

/// Build a [`MetricsConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<MetricsConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(MetricsConfig {
        working_resolution: cli.working_resolution,
        downsample_filter: match cli.downsample_filter {
            Filter::Disabled => DownsampleFilter::Disabled,
            Filter::Area => DownsampleFilter::Area,
            Filter::Nearest => DownsampleFilter::Nearest,
            Filter::Triangle => DownsampleFilter::Triangle,
            Filter::CatmullRom => DownsampleFilter::CatmullRom,
            Filter::Gaussian => DownsampleFilter::Gaussian,
            Filter::Lanczos3 => DownsampleFilter::Lanczos3,
        },
        histogram_resolution: cli.histogram_resolution,
        paper_coefficient: cli.paper_coefficient,
        dark_image_floor: cli.dark_image_floor,
        paper_max_saturation: cli.paper_max_saturation,
        ink_lightness: cli.ink_lightness,
        classifier: ClassifierThresholds {
            black_lightness: cli.black_lightness,
            white_lightness: cli.white_lightness,
            white_max_saturation: cli.white_max_saturation,
            gray_saturation: cli.gray_saturation,
            blue_purple_hue: cli.blue_purple_hue,
            purple_pink_hue: cli.purple_pink_hue,
        },
        line_coverage_baseline: cli.line_coverage_baseline,
        fill_strategy: match cli.fill_strategy {
            Fill::ChannelStdDev => FillStrategy::ChannelStdDev,
            Fill::NeighborDifference => FillStrategy::NeighborDifference,
        },
        neighbor_diff_ceiling: cli.neighbor_diff_ceiling,
        std_dev_ceiling: cli.std_dev_ceiling,
        dominant_color_count: cli.dominant_colors,
        template_ink_luma: cli.template_ink_luma,
        user_ink_luma: cli.user_ink_luma,
    })
}

fn read_input(label: &str, path: &Path) -> Result<Vec<u8>, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Error reading {label} {}: {e}", path.display()))?;
    eprintln!("{label}: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let analyzer = match Analyzer::new(config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match read_input("Image", &cli.image_path) {
        Ok(bytes) => bytes,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let template_bytes = match cli
        .template
        .as_deref()
        .map(|p| read_input("Template", p))
        .transpose()
    {
        Ok(bytes) => bytes,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Config: {:#?}", analyzer.config());
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let emotion = UserEmotion {
        primary: cli.emotion_primary.clone(),
        secondary: cli.emotion_secondary.clone(),
        tertiary: cli.emotion_tertiary.clone(),
    };

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match analyzer.analyze_with_diagnostics(&image_bytes, template_bytes.as_deref()) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    let value = serde_json::json!({
                        "metrics": staged.metrics,
                        "diagnostics": diagnostics,
                    });
                    match serde_json::to_string_pretty(&value) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                    println!("{:#?}", staged.metrics);
                }

                // Grounding text on the first run only.
                if run == 0 && cli.context {
                    println!();
                    println!("{}", GroundingContext::new(&staged.metrics, Some(&emotion)));
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Analysis error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&AnalysisDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[AnalysisDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Decode", |d| Some(d.decode.duration)),
        ("Downsample", |d| Some(d.downsample.duration)),
        ("Paper Threshold", |d| Some(d.paper.duration)),
        ("Region Masks", |d| Some(d.segment.duration)),
        ("Measure", |d| Some(d.measure.duration)),
        ("Boundary", |d| d.boundary.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_flags_build_default_config() {
        let cli = Cli::try_parse_from(["feats-bench", "page.png"]).unwrap();
        assert_eq!(config_from_cli(&cli).unwrap(), MetricsConfig::default());
    }

    #[test]
    fn classifier_flags_reach_config() {
        let cli = Cli::try_parse_from([
            "feats-bench",
            "page.png",
            "--white-max-saturation",
            "0.1",
            "--blue-purple-hue",
            "260",
            "--purple-pink-hue",
            "300",
        ])
        .unwrap();
        let classifier = config_from_cli(&cli).unwrap().classifier;
        assert!((classifier.white_max_saturation - 0.1).abs() < f64::EPSILON);
        assert!((classifier.blue_purple_hue - 260.0).abs() < f64::EPSILON);
        assert!((classifier.purple_pink_hue - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::try_parse_from([
            "feats-bench",
            "page.png",
            "--working-resolution",
            "123",
            "--config-json",
            r#"{"classifier": {"blue_purple_hue": 255.0}}"#,
        ])
        .unwrap();
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.working_resolution, MetricsConfig::DEFAULT_WORKING_RESOLUTION);
        assert!((config.classifier.blue_purple_hue - 255.0).abs() < f64::EPSILON);
    }
}
