//! Suspension of all blocking after an emergency contact.
//!
//! State lives in [`SettingsStore`] so it survives restarts:
//!
//! ```text
//! NotSuppressed --emergency contact--> SuppressedUntil(now + d) | SuppressedForever
//! Suppressed*   --end / expiry-------> NotSuppressed
//! ```
//!
//! Expiry is lazy: a past timestamp reads as not suppressed and is left in
//! place until the next transition overwrites it.

mod clock;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::carrier::CarrierConfigSource;
use crate::notify::{ChangeEvent, SharedNotifier};
use crate::settings::{EnhancedSetting, SettingsStore, SuppressionState};
use crate::store::StoreError;

/// Ceiling on the carrier-configured suppression duration.
pub const MAX_BLOCKING_DISABLED_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Point-in-time view of the suppression state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionStatus {
    pub is_suppressed: bool,
    /// Stored expiry: `-1` forever, `0` never set, else epoch milliseconds.
    pub until_millis: i64,
}

/// Drives suppression transitions.
pub struct SuppressionEngine {
    settings: SettingsStore,
    carrier: Arc<dyn CarrierConfigSource>,
    clock: SharedClock,
    notifier: SharedNotifier,
    max_duration: Duration,
    transition: Mutex<()>,
}

impl SuppressionEngine {
    pub fn new(
        settings: SettingsStore,
        carrier: Arc<dyn CarrierConfigSource>,
        clock: SharedClock,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            settings,
            carrier,
            clock,
            notifier,
            max_duration: MAX_BLOCKING_DISABLED_DURATION,
            transition: Mutex::new(()),
        }
    }

    /// Override the duration ceiling.
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Carrier duration in seconds, or the platform default when it exceeds
    /// the ceiling.
    fn suppression_seconds(&self) -> i64 {
        let configured = self.carrier.resolve().blocking_disabled_duration_secs;
        let ceiling = i64::try_from(self.max_duration.as_secs()).unwrap_or(i64::MAX);
        if configured <= ceiling {
            return configured;
        }
        let fallback = self.carrier.default_config().blocking_disabled_duration_secs;
        debug!(configured, ceiling, fallback, "carrier duration over ceiling");
        fallback
    }

    /// Suspend blocking after an emergency call or text.
    pub fn on_emergency_contact(&self) -> Result<SuppressionStatus, StoreError> {
        let _guard = self.transition.lock().unwrap_or_else(|e| e.into_inner());

        let seconds = self.suppression_seconds();
        let state = if seconds < 0 {
            SuppressionState::SuppressedForever
        } else {
            SuppressionState::SuppressedUntil(
                self.clock.now_millis().saturating_add(seconds.saturating_mul(1000)),
            )
        };

        self.settings.set_suppression_state(state)?;
        self.write_notification_flag(true)?;
        self.notifier.notify(ChangeEvent::SuppressionStateChanged);

        info!(until = state.to_stored(), "blocking suppressed after emergency contact");
        Ok(self.status_of(state))
    }

    /// Resume blocking. Returns whether anything changed.
    pub fn end_suppression(&self) -> Result<bool, StoreError> {
        let _guard = self.transition.lock().unwrap_or_else(|e| e.into_inner());

        let state = self.settings.suppression_state()?;
        if !state.is_active(self.clock.now_millis()) {
            debug!("end suppression requested while not suppressed");
            return Ok(false);
        }

        self.settings
            .set_suppression_state(SuppressionState::NotSuppressed)?;
        self.write_notification_flag(false)?;
        self.notifier.notify(ChangeEvent::SuppressionStateChanged);

        info!("block suppression ended");
        Ok(true)
    }

    pub fn status(&self) -> Result<SuppressionStatus, StoreError> {
        Ok(self.status_of(self.settings.suppression_state()?))
    }

    pub fn is_suppressed(&self) -> Result<bool, StoreError> {
        Ok(self.status()?.is_suppressed)
    }

    fn status_of(&self, state: SuppressionState) -> SuppressionStatus {
        SuppressionStatus {
            is_suppressed: state.is_active(self.clock.now_millis()),
            until_millis: state.to_stored(),
        }
    }

    fn write_notification_flag(&self, show: bool) -> Result<(), StoreError> {
        if !self.carrier.resolve().enhanced_blocking_supported {
            return Ok(());
        }
        self.settings
            .set_bool(EnhancedSetting::ShowEmergencyNotification, show)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::{CarrierPolicy, StaticCarrierConfig};
    use crate::notify::ChangeNotifier;
    use crate::store::{KeyValueStore, MemoryStorage};

    #[derive(Default)]
    struct CountingNotifier(Mutex<Vec<ChangeEvent>>);

    impl ChangeNotifier for CountingNotifier {
        fn notify(&self, event: ChangeEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    struct Harness {
        engine: SuppressionEngine,
        storage: Arc<MemoryStorage>,
        clock: Arc<ManualClock>,
        events: Arc<CountingNotifier>,
    }

    fn harness(active_secs: i64, default_secs: i64, enhanced: bool) -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new(1_000_000);
        let events = Arc::new(CountingNotifier::default());
        let carrier = StaticCarrierConfig::new(
            Some(CarrierPolicy {
                enhanced_blocking_supported: enhanced,
                always_show_disabled_notification: false,
                blocking_disabled_duration_secs: active_secs,
            }),
            CarrierPolicy {
                blocking_disabled_duration_secs: default_secs,
                ..Default::default()
            },
        );
        let engine = SuppressionEngine::new(
            SettingsStore::new(storage.clone()),
            Arc::new(carrier),
            clock.clone(),
            events.clone(),
        );
        Harness {
            engine,
            storage,
            clock,
            events,
        }
    }

    #[test]
    fn test_forever() {
        let h = harness(-1, 7200, false);
        let status = h.engine.on_emergency_contact().unwrap();
        assert!(status.is_suppressed);
        assert_eq!(status.until_millis, -1);

        h.clock.advance_millis(i64::MAX / 2);
        assert!(h.engine.is_suppressed().unwrap());
    }

    #[test]
    fn test_timed_suppression_expires() {
        let h = harness(60, 7200, false);
        let status = h.engine.on_emergency_contact().unwrap();
        assert_eq!(status.until_millis, 1_000_000 + 60_000);

        h.clock.advance_millis(59_999);
        assert!(h.engine.is_suppressed().unwrap());
        h.clock.advance_millis(1);
        assert!(!h.engine.is_suppressed().unwrap());
        assert_eq!(h.engine.status().unwrap().until_millis, 1_060_000);
    }

    #[test]
    fn test_over_ceiling_uses_platform_default() {
        let h = harness(8 * 24 * 60 * 60, 120, false);
        let status = h.engine.on_emergency_contact().unwrap();
        assert_eq!(status.until_millis, 1_000_000 + 120_000);
    }

    #[test]
    fn test_notification_flag_only_when_supported() {
        let h = harness(60, 7200, true);
        h.engine.on_emergency_contact().unwrap();
        assert_eq!(
            h.storage
                .get_bool(EnhancedSetting::ShowEmergencyNotification.key())
                .unwrap(),
            Some(true)
        );

        let h = harness(60, 7200, false);
        h.engine.on_emergency_contact().unwrap();
        assert_eq!(
            h.storage
                .get_bool(EnhancedSetting::ShowEmergencyNotification.key())
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_end_when_not_suppressed_is_noop() {
        let h = harness(60, 7200, true);
        assert!(!h.engine.end_suppression().unwrap());
        assert!(h.events.0.lock().unwrap().is_empty());
        assert_eq!(h.storage.get_i64(crate::settings::SUPPRESSION_EXPIRY_KEY).unwrap(), None);
    }

    #[test]
    fn test_end_after_expiry_is_noop() {
        let h = harness(60, 7200, false);
        h.engine.on_emergency_contact().unwrap();
        h.clock.advance_millis(120_000);

        assert!(!h.engine.end_suppression().unwrap());
        assert_eq!(h.events.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_end_clears_state() {
        let h = harness(-1, 7200, true);
        h.engine.on_emergency_contact().unwrap();
        assert!(h.engine.end_suppression().unwrap());

        let status = h.engine.status().unwrap();
        assert!(!status.is_suppressed);
        assert_eq!(status.until_millis, 0);
        assert_eq!(
            h.storage
                .get_bool(EnhancedSetting::ShowEmergencyNotification.key())
                .unwrap(),
            Some(false)
        );
        assert_eq!(
            *h.events.0.lock().unwrap(),
            vec![
                ChangeEvent::SuppressionStateChanged,
                ChangeEvent::SuppressionStateChanged
            ]
        );
    }
}
