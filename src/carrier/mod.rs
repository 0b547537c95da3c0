//! Carrier configuration affecting emergency suppression.

use serde::{Deserialize, Serialize};

/// Carrier settings read on every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierPolicy {
    /// Whether the carrier offers enhanced (presentation-based) blocking.
    #[serde(default)]
    pub enhanced_blocking_supported: bool,

    /// Show the "blocking disabled" notification even when no rule is on.
    #[serde(default)]
    pub always_show_disabled_notification: bool,

    /// Seconds blocking stays off after an emergency contact; negative means
    /// until explicitly ended.
    #[serde(default = "default_disabled_duration_secs")]
    pub blocking_disabled_duration_secs: i64,
}

fn default_disabled_duration_secs() -> i64 {
    7200
}

impl Default for CarrierPolicy {
    fn default() -> Self {
        Self {
            enhanced_blocking_supported: false,
            always_show_disabled_notification: false,
            blocking_disabled_duration_secs: default_disabled_duration_secs(),
        }
    }
}

/// Source of carrier configuration.
pub trait CarrierConfigSource: Send + Sync {
    /// Active carrier configuration, if the carrier provides one.
    fn config(&self) -> Option<CarrierPolicy>;

    /// Platform defaults.
    fn default_config(&self) -> CarrierPolicy;

    /// Active configuration, falling back to platform defaults.
    fn resolve(&self) -> CarrierPolicy {
        self.config().unwrap_or_else(|| {
            tracing::debug!("no carrier config, using platform defaults");
            self.default_config()
        })
    }
}

/// Fixed carrier configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCarrierConfig {
    active: Option<CarrierPolicy>,
    defaults: CarrierPolicy,
}

impl StaticCarrierConfig {
    pub fn new(active: Option<CarrierPolicy>, defaults: CarrierPolicy) -> Self {
        Self { active, defaults }
    }
}

impl CarrierConfigSource for StaticCarrierConfig {
    fn config(&self) -> Option<CarrierPolicy> {
        self.active
    }

    fn default_config(&self) -> CarrierPolicy {
        self.defaults
    }
}
