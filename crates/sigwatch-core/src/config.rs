//! Engine configuration
//!
//! Timings and the monitored target. Loadable from a TOML file with an
//! `[engine]` table; every field has a default.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use sigwatch_model::ObjectPath;
use std::str::FromStr;
use std::time::Duration;

/// Service monitored when no override is given
pub const DEFAULT_SERVICE: &str = "com.redhat.lvmdbus1";

/// Root object path monitored when no override is given
pub const DEFAULT_ROOT_PATH: &str = "/com/redhat/lvmdbus1";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Service endpoint name of the producer
    pub service: String,
    /// Root object path; property updates outside it are ignored
    pub root_path: ObjectPath,
    /// Scheduler tick period in milliseconds
    pub tick_interval_ms: u64,
    /// Quiet time required before a comparison, in milliseconds
    pub quiescence_window_ms: u64,
    /// Delay between confirming divergence and terminating, in milliseconds
    pub escalation_grace_ms: u64,
}

impl WatchConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a different service and root path
    #[inline]
    #[must_use]
    pub fn with_target(mut self, service: impl Into<String>, root_path: ObjectPath) -> Self {
        self.service = service.into();
        self.root_path = root_path;
        self
    }

    /// With a different tick period
    #[inline]
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = duration_ms(interval);
        self
    }

    /// With a different quiescence window
    #[inline]
    #[must_use]
    pub fn with_quiescence_window(mut self, window: Duration) -> Self {
        self.quiescence_window_ms = duration_ms(window);
        self
    }

    /// With a different escalation grace delay
    #[inline]
    #[must_use]
    pub fn with_escalation_grace(mut self, grace: Duration) -> Self {
        self.escalation_grace_ms = duration_ms(grace);
        self
    }

    /// Scheduler tick period
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Quiescence window
    #[inline]
    #[must_use]
    pub fn quiescence_window(&self) -> Duration {
        Duration::from_millis(self.quiescence_window_ms)
    }

    /// Escalation grace delay
    #[inline]
    #[must_use]
    pub fn escalation_grace(&self) -> Duration {
        Duration::from_millis(self.escalation_grace_ms)
    }

    /// Parse the `[engine]` table of a TOML document
    ///
    /// # Errors
    /// Returns an error if the document does not parse or fails
    /// [`WatchConfig::validate`].
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct ConfigFile {
            #[serde(default)]
            engine: WatchConfig,
        }

        let file: ConfigFile = toml::from_str(document)?;
        file.engine.validate()?;
        Ok(file.engine)
    }

    /// Check values for usability
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a zero tick period, an empty
    /// service name or a malformed root path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.service.is_empty() {
            return Err(ConfigError::Invalid("service must not be empty".into()));
        }
        ObjectPath::from_str(self.root_path.as_str())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            root_path: ObjectPath::new(DEFAULT_ROOT_PATH),
            tick_interval_ms: 500,
            quiescence_window_ms: 3_000,
            escalation_grace_ms: 500,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
