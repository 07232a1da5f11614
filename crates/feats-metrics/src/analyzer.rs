//! Analysis entry point bound to an injected decoder and clock.
//!
//! [`Analyzer`] is what a host embeds: it owns the configuration, waits
//! (bounded) for the decoder to report ready, then runs the pipeline.
//! The free functions in the crate root use the built-in decoder, which
//! is always ready.

use crate::decode::{ImageCrateDecoder, ImageDecoder};
use crate::diagnostics::{AnalysisDiagnostics, Clock, SystemClock, analyze_with_diagnostics_using};
use crate::pipeline::{Pipeline, StagedAnalysis};
use crate::readiness::{ReadinessPolicy, wait_until_ready};
use crate::types::{CvMetrics, MetricsConfig, MetricsError};

/// Configured analysis service.
#[derive(Debug, Clone)]
pub struct Analyzer<D = ImageCrateDecoder, C = SystemClock> {
    decoder: D,
    clock: C,
    config: MetricsConfig,
    readiness: ReadinessPolicy,
}

impl Analyzer {
    /// Analyzer with the built-in decoder and system clock.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] if `config` fails
    /// validation.
    pub fn new(config: MetricsConfig) -> Result<Self, MetricsError> {
        Self::with_decoder(ImageCrateDecoder, SystemClock, config)
    }
}

impl<D: ImageDecoder, C: Clock> Analyzer<D, C> {
    /// Analyzer with a custom decoder and clock.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] if `config` fails
    /// validation.
    pub fn with_decoder(decoder: D, clock: C, config: MetricsConfig) -> Result<Self, MetricsError> {
        config.validate()?;
        Ok(Self {
            decoder,
            clock,
            config,
            readiness: ReadinessPolicy::default(),
        })
    }

    /// Replace the readiness policy.
    #[must_use]
    pub const fn with_readiness(mut self, policy: ReadinessPolicy) -> Self {
        self.readiness = policy;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// The readiness policy in use.
    #[must_use]
    pub const fn readiness(&self) -> &ReadinessPolicy {
        &self.readiness
    }

    /// Wait for the decoder, then analyze `image` (and `template`, if
    /// given), returning every intermediate.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::DependencyUnavailable`] if the decoder is
    /// not ready within the readiness timeout, and any decode error from
    /// [`Pending::decode_with`](crate::pipeline::Pending::decode_with).
    pub fn analyze_staged(
        &self,
        image: &[u8],
        template: Option<&[u8]>,
    ) -> Result<StagedAnalysis, MetricsError> {
        wait_until_ready(&self.decoder, &self.readiness, &self.clock)?;
        let decoded = Pipeline::new(
            image.to_vec(),
            template.map(<[u8]>::to_vec),
            self.config.clone(),
        )
        .decode_with(&self.decoder)?;
        Ok(decoded
            .downsample()
            .detect_paper()
            .segment()
            .measure()
            .score_boundary()
            .into_result())
    }

    /// Wait for the decoder, then analyze and return only the metrics.
    ///
    /// # Errors
    ///
    /// See [`analyze_staged`](Self::analyze_staged).
    pub fn analyze(
        &self,
        image: &[u8],
        template: Option<&[u8]>,
    ) -> Result<CvMetrics, MetricsError> {
        self.analyze_staged(image, template).map(|staged| staged.metrics)
    }

    /// Wait for the decoder, then analyze with per-stage diagnostics.
    ///
    /// # Errors
    ///
    /// See [`analyze_staged`](Self::analyze_staged).
    pub fn analyze_with_diagnostics(
        &self,
        image: &[u8],
        template: Option<&[u8]>,
    ) -> Result<(StagedAnalysis, AnalysisDiagnostics), MetricsError> {
        wait_until_ready(&self.decoder, &self.readiness, &self.clock)?;
        analyze_with_diagnostics_using(&self.decoder, image, template, &self.config, &self.clock)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::readiness::Readiness;
    use crate::readiness::tests::{FakeClock, ReadyAfter};

    /// Decoder that ignores its input and returns a fixed bitmap once
    /// ready.
    struct SlowDecoder {
        ready: ReadyAfter,
        image: RgbaImage,
    }

    impl Readiness for SlowDecoder {
        fn is_ready(&self) -> bool {
            self.ready.is_ready()
        }
    }

    impl ImageDecoder for SlowDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, MetricsError> {
            if bytes.is_empty() {
                return Err(MetricsError::EmptyInput);
            }
            Ok(self.image.clone())
        }
    }

    fn white_decoder(checks: u32) -> SlowDecoder {
        SlowDecoder {
            ready: ReadyAfter::new(checks),
            image: RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])),
        }
    }

    #[test]
    fn waits_for_decoder_then_analyzes() {
        let config = MetricsConfig::default();
        let analyzer =
            Analyzer::with_decoder(white_decoder(2), FakeClock::default(), config).unwrap();
        let metrics = analyzer.analyze(&[1], None).unwrap();
        assert!((metrics.white_space_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unavailable_decoder_times_out() {
        let config = MetricsConfig::default();
        let analyzer = Analyzer::with_decoder(white_decoder(u32::MAX), FakeClock::default(), config)
            .unwrap()
            .with_readiness(ReadinessPolicy {
                timeout: Duration::from_millis(300),
                poll_interval: Duration::from_millis(100),
            });
        let result = analyzer.analyze(&[1], None);
        assert!(matches!(
            result,
            Err(MetricsError::DependencyUnavailable { waited }) if waited == Duration::from_millis(300)
        ));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = MetricsConfig {
            dominant_color_count: 0,
            ..MetricsConfig::default()
        };
        assert!(matches!(
            Analyzer::new(config),
            Err(MetricsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn custom_decoder_feeds_template_path() {
        let config = MetricsConfig::default();
        let analyzer =
            Analyzer::with_decoder(white_decoder(0), FakeClock::default(), config).unwrap();
        let (staged, diag) = analyzer.analyze_with_diagnostics(&[1], Some(&[2][..])).unwrap();
        // Both images decode to the same blank page: nothing marked.
        let boundary = staged.boundary.unwrap();
        assert_eq!(boundary.user_ink_pixels, 0);
        assert!(staged.metrics.rebellion_score.abs() < f64::EPSILON);
        assert!(diag.boundary.is_some());
    }

    #[test]
    fn primary_decode_error_precedes_template() {
        let analyzer = Analyzer::new(MetricsConfig::default()).unwrap();
        let result = analyzer.analyze(&[1, 2, 3], Some(&[][..]));
        // Primary image fails first.
        assert!(matches!(result, Err(MetricsError::ImageDecode(_))));
    }
}
