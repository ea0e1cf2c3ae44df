//! Runtime configuration.

use std::fmt;
use std::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::ConfigError;

/// Which native addresses are canonicalized to a single host handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TrackingMode {
    /// Never canonicalize; every wrap creates a fresh handle.
    Off = 0,
    /// Canonicalize only values the host took ownership of.
    #[default]
    Owned = 1,
    /// Canonicalize every surfaced address.
    All = 2,
}

impl TrackingMode {
    /// Whether a wrap with the given ownership is canonicalized.
    pub fn tracks(self, host_owned: bool) -> bool {
        match self {
            TrackingMode::Off => false,
            TrackingMode::Owned => host_owned,
            TrackingMode::All => true,
        }
    }
}

impl FromStr for TrackingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(TrackingMode::Off),
            "owned" => Ok(TrackingMode::Owned),
            "all" => Ok(TrackingMode::All),
            other => Err(ConfigError::UnknownTrackingMode(other.to_string())),
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrackingMode::Off => "off",
            TrackingMode::Owned => "owned",
            TrackingMode::All => "all",
        })
    }
}

/// Process-wide settings consulted by a runtime.
///
/// ```
/// use bindery_core::{RuntimeConfig, TrackingMode};
///
/// let config = RuntimeConfig::new()
///     .with_tracking(TrackingMode::All)
///     .with_catch_panics(false);
/// assert_eq!(config.tracking, TrackingMode::All);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Instance tracking policy.
    pub tracking: TrackingMode,
    /// Convert panics in native callables into dispatch errors.
    pub catch_panics: bool,
    /// Validate forward-declared types before the first dispatch.
    pub validate_on_dispatch: bool,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            tracking: TrackingMode::default(),
            catch_panics: true,
            validate_on_dispatch: false,
        }
    }

    pub fn with_tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    pub fn with_validate_on_dispatch(mut self, validate: bool) -> Self {
        self.validate_on_dispatch = validate;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
