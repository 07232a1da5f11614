//! Bounded waiting for a dependency to become usable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Clock, duration_serde};
use crate::types::MetricsError;

/// Something that may not be usable yet.
pub trait Readiness {
    /// `true` once the dependency can serve requests.
    fn is_ready(&self) -> bool;
}

/// How long and how often to poll a [`Readiness`] dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    /// Give up after this long (seconds in serialized form).
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Pause between checks (seconds in serialized form).
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,
}

impl ReadinessPolicy {
    /// Default total wait.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default pause between checks.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Poll `dependency` until it is ready or `policy.timeout` elapses.
///
/// Returns how long the wait took. A dependency that is already ready
/// returns immediately without sleeping.
///
/// # Errors
///
/// Returns [`MetricsError::DependencyUnavailable`] carrying the time
/// spent waiting if the dependency never became ready.
pub fn wait_until_ready<R, C>(
    dependency: &R,
    policy: &ReadinessPolicy,
    clock: &C,
) -> Result<Duration, MetricsError>
where
    R: Readiness + ?Sized,
    C: Clock,
{
    let start = clock.now();
    loop {
        let waited = clock.elapsed(&start);
        if dependency.is_ready() {
            if !waited.is_zero() {
                tracing::debug!(?waited, "dependency became ready");
            }
            return Ok(waited);
        }
        if waited >= policy.timeout {
            tracing::warn!(?waited, timeout = ?policy.timeout, "dependency not ready, giving up");
            return Err(MetricsError::DependencyUnavailable { waited });
        }
        let remaining = policy.timeout.saturating_sub(waited);
        clock.sleep(policy.poll_interval.min(remaining).max(Duration::from_millis(1)));
    }
}
