//! Plain-text rendering of [`CvMetrics`] for a text-generation prompt.
//!
//! The downstream step that writes the narrative interpretation is
//! external; this module only produces the measured facts it should be
//! grounded in, together with the user's self-reported emotion.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{BoundaryMethod, CvMetrics};

/// Emotion the user reported for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEmotion {
    /// Broadest emotion category, e.g. "sad".
    pub primary: Option<String>,
    /// Refinement of `primary`.
    pub secondary: Option<String>,
    /// Most specific label.
    pub tertiary: Option<String>,
}

/// Measured facts plus self-report, rendered through [`fmt::Display`].
#[derive(Debug, Clone, Copy)]
pub struct GroundingContext<'a> {
    metrics: &'a CvMetrics,
    emotion: Option<&'a UserEmotion>,
}

impl<'a> GroundingContext<'a> {
    /// Pair measured metrics with the user's self-report, if any.
    #[must_use]
    pub const fn new(metrics: &'a CvMetrics, emotion: Option<&'a UserEmotion>) -> Self {
        Self { metrics, emotion }
    }

    /// Render to an owned string.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

fn or_placeholder<'a>(value: Option<&'a String>, placeholder: &'a str) -> &'a str {
    value.map_or(placeholder, |s| {
        let trimmed = s.trim();
        if trimmed.is_empty() { placeholder } else { trimmed }
    })
}

impl fmt::Display for GroundingContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.metrics;

        writeln!(f, "MEASURED IMAGE DATA")?;
        writeln!(f)?;

        writeln!(f, "1. Space utilization")?;
        writeln!(f, "   - White space: {:.1}%", m.white_space_ratio * 100.0)?;
        writeln!(
            f,
            "   - Guide: above 70% suggests avoidance or low energy; below 10% suggests horror vacui"
        )?;
        writeln!(f)?;

        writeln!(f, "2. Color palette")?;
        if m.dominant_colors.is_empty() {
            writeln!(f, "   - Dominant hues: none")?;
        } else {
            let hues = m
                .dominant_colors
                .iter()
                .map(|c| format!("{} ({:.0}%)", c.color, c.percentage))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "   - Dominant hues: {hues}")?;
        }
        writeln!(f)?;

        writeln!(f, "3. Boundary control")?;
        writeln!(f, "   - Rebellion: {:.1}%", m.rebellion_score * 100.0)?;
        let method = match m.boundary_method {
            BoundaryMethod::Inferred => "inferred from line coverage (approximate)",
            BoundaryMethod::TemplateRelative => "measured against the blank template",
        };
        writeln!(f, "   - Method: {method}")?;
        writeln!(
            f,
            "   - Fill consistency: {:.0}/100",
            m.fill_consistency_score * 100.0
        )?;
        writeln!(f)?;

        let unknown = UserEmotion::default();
        let emotion = self.emotion.unwrap_or(&unknown);
        writeln!(f, "4. Self-reported emotion")?;
        writeln!(f, "   - Primary: {}", or_placeholder(emotion.primary.as_ref(), "Unknown"))?;
        writeln!(
            f,
            "   - Secondary: {}",
            or_placeholder(emotion.secondary.as_ref(), "Unknown")
        )?;
        write!(f, "   - Tertiary: {}", or_placeholder(emotion.tertiary.as_ref(), "N/A"))
    }
}
