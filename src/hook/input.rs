//! Hook input normalization.
//!
//! `use_viewport_sizes` takes one argument in four shapes. They are folded
//! into a single [`SubscriberOptions`] here, once per mount; nothing
//! downstream looks at the original shape.

use std::time::Duration;

use tracing::warn;

use crate::registry::{Hasher, SubscriberOptions};
use crate::types::{Dimension, SignatureValue, Viewport};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Full configuration form of the hook input.
///
/// Zero timeouts are disabled. Negative millisecond values passed to the
/// builder methods are clamped to zero.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ViewportConfig {
    /// Commit only after the viewport has been quiet this long.
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub debounce_timeout: Duration,
    /// Commit at most once per this interval.
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub throttle_timeout: Duration,
    /// Custom signature; overrides `dimension` for change detection.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub hasher: Option<Hasher>,
    /// Which dimension(s) to observe and return.
    pub dimension: Dimension,
}

impl ViewportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debounce(mut self, timeout: Duration) -> Self {
        self.debounce_timeout = timeout;
        self
    }

    pub fn throttle(mut self, timeout: Duration) -> Self {
        self.throttle_timeout = timeout;
        self
    }

    /// Debounce in milliseconds; negative disables.
    pub fn debounce_ms(self, ms: i64) -> Self {
        self.debounce(clamp_ms("debounceTimeout", ms))
    }

    /// Throttle in milliseconds; negative disables.
    pub fn throttle_ms(self, ms: i64) -> Self {
        self.throttle(clamp_ms("throttleTimeout", ms))
    }

    pub fn hasher<F, T>(mut self, f: F) -> Self
    where
        F: Fn(&Viewport) -> T + 'static,
        T: SignatureValue,
    {
        self.hasher = Some(Hasher::new(f));
        self
    }

    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = dimension;
        self
    }
}

pub(crate) fn clamp_ms(field: &str, ms: i64) -> Duration {
    if ms < 0 {
        warn!(field, ms, "negative viewport timeout clamped to 0");
        return Duration::ZERO;
    }
    Duration::from_millis(ms as u64)
}

#[cfg(feature = "serde")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = i64::deserialize(deserializer)?;
        Ok(super::clamp_ms("timeout", ms))
    }
}

// =============================================================================
// INPUT
// =============================================================================

/// Every accepted shape of the hook argument.
#[derive(Debug, Clone, Default)]
pub enum ViewportInput {
    /// Both dimensions, no hasher, no timing policy.
    #[default]
    Default,
    /// Bare number: throttle interval.
    Throttle(Duration),
    /// Bare function: custom signature.
    Hasher(Hasher),
    /// Configuration object.
    Config(ViewportConfig),
}

impl ViewportInput {
    /// Function form.
    pub fn hasher<F, T>(f: F) -> Self
    where
        F: Fn(&Viewport) -> T + 'static,
        T: SignatureValue,
    {
        ViewportInput::Hasher(Hasher::new(f))
    }

    /// Resolve into canonical subscriber options.
    pub fn resolve(self) -> SubscriberOptions {
        match self {
            ViewportInput::Default => SubscriberOptions::default(),
            ViewportInput::Throttle(throttle) => SubscriberOptions {
                throttle,
                ..Default::default()
            },
            ViewportInput::Hasher(hasher) => SubscriberOptions {
                hasher: Some(hasher),
                ..Default::default()
            },
            ViewportInput::Config(config) => SubscriberOptions {
                dimension: config.dimension,
                hasher: config.hasher,
                debounce: config.debounce_timeout,
                throttle: config.throttle_timeout,
            },
        }
    }
}

impl From<()> for ViewportInput {
    fn from(_: ()) -> Self {
        ViewportInput::Default
    }
}

impl From<Duration> for ViewportInput {
    fn from(throttle: Duration) -> Self {
        ViewportInput::Throttle(throttle)
    }
}

impl From<u64> for ViewportInput {
    fn from(ms: u64) -> Self {
        ViewportInput::Throttle(Duration::from_millis(ms))
    }
}

impl From<u32> for ViewportInput {
    fn from(ms: u32) -> Self {
        ViewportInput::Throttle(Duration::from_millis(ms as u64))
    }
}

impl From<i64> for ViewportInput {
    fn from(ms: i64) -> Self {
        ViewportInput::Throttle(clamp_ms("throttleTimeout", ms))
    }
}

impl From<i32> for ViewportInput {
    fn from(ms: i32) -> Self {
        ViewportInput::from(ms as i64)
    }
}

impl From<Hasher> for ViewportInput {
    fn from(hasher: Hasher) -> Self {
        ViewportInput::Hasher(hasher)
    }
}

impl From<ViewportConfig> for ViewportInput {
    fn from(config: ViewportConfig) -> Self {
        ViewportInput::Config(config)
    }
}

impl From<Dimension> for ViewportInput {
    fn from(dimension: Dimension) -> Self {
        ViewportInput::Config(ViewportConfig::new().dimension(dimension))
    }
}

// =============================================================================
// TESTS
// =============================================================================
