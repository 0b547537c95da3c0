//! Block decisions for incoming calls.
//!
//! [`EnhancedPolicyEngine::decide`] resolves, in order: active suppression,
//! emergency numbers, presentation rules from the enhanced settings, and
//! finally the block list.

mod types;

pub use types::{BlockReason, CallExtras, Presentation};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::carrier::CarrierConfigSource;
use crate::emergency::EmergencyNumberOracle;
use crate::number::{pii_handle, NumberNormalizer};
use crate::settings::{EnhancedSetting, SettingsStore};
use crate::store::{SharedStorage, StoreError};
use crate::suppression::SuppressionEngine;

/// Evaluates block decisions.
pub struct EnhancedPolicyEngine {
    storage: SharedStorage,
    settings: SettingsStore,
    suppression: Arc<SuppressionEngine>,
    emergency: Arc<dyn EmergencyNumberOracle>,
    carrier: Arc<dyn CarrierConfigSource>,
    normalizer: NumberNormalizer,
}

impl EnhancedPolicyEngine {
    pub fn new(
        storage: SharedStorage,
        suppression: Arc<SuppressionEngine>,
        emergency: Arc<dyn EmergencyNumberOracle>,
        carrier: Arc<dyn CarrierConfigSource>,
        normalizer: NumberNormalizer,
    ) -> Self {
        Self {
            settings: SettingsStore::new(storage.clone()),
            storage,
            suppression,
            emergency,
            carrier,
            normalizer,
        }
    }

    /// Decide whether a call from `number` should be blocked.
    pub fn decide(
        &self,
        number: &str,
        extras: Option<&CallExtras>,
    ) -> Result<BlockReason, StoreError> {
        if self.suppression.is_suppressed()? {
            debug!(number = %pii_handle(number), "blocking suppressed");
            return Ok(BlockReason::NotBlocked);
        }
        if self.is_emergency(number) {
            debug!(number = %pii_handle(number), "emergency number never blocked");
            return Ok(BlockReason::NotBlocked);
        }

        let mut reason = match extras {
            Some(extras) => self.presentation_rule(extras)?,
            None => BlockReason::NotBlocked,
        };

        if reason == BlockReason::NotBlocked && self.is_blocked(number)? {
            reason = BlockReason::BlockedInList;
        }

        debug!(number = %pii_handle(number), reason = %reason, "block decision");
        Ok(reason)
    }

    fn presentation_rule(&self, extras: &CallExtras) -> Result<BlockReason, StoreError> {
        let (setting, reason) = match extras.presentation {
            Presentation::Allowed if extras.contact_exists => return Ok(BlockReason::NotBlocked),
            Presentation::Allowed => (
                EnhancedSetting::BlockUnregistered,
                BlockReason::BlockedNotInContacts,
            ),
            Presentation::Restricted => {
                (EnhancedSetting::BlockPrivate, BlockReason::BlockedRestricted)
            }
            Presentation::Payphone => (EnhancedSetting::BlockPayphone, BlockReason::BlockedPayphone),
            Presentation::Unknown => {
                (EnhancedSetting::BlockUnknown, BlockReason::BlockedUnknownNumber)
            }
            Presentation::Unavailable => {
                (EnhancedSetting::BlockUnknown, BlockReason::BlockedUnavailable)
            }
            Presentation::Other(_) => return Ok(BlockReason::NotBlocked),
        };

        if self.settings.get_bool(setting)? {
            Ok(reason)
        } else {
            Ok(BlockReason::NotBlocked)
        }
    }

    /// Whether `number` matches the block list by original or canonical form.
    pub fn is_blocked(&self, number: &str) -> Result<bool, StoreError> {
        if number.is_empty() {
            info!("is_blocked: not blocked, empty number");
            return Ok(false);
        }

        let e164 = self.normalizer.e164_or_empty(number);
        let blocked = self.storage.exists(number, &e164)?;
        info!(
            number = %pii_handle(number),
            e164 = %pii_handle(&e164),
            blocked,
            "is_blocked"
        );
        Ok(blocked)
    }

    /// Whether either form of `number` is an emergency number.
    ///
    /// Oracle failures count as "not emergency".
    pub fn is_emergency(&self, number: &str) -> bool {
        if number.is_empty() {
            return false;
        }
        let e164 = self.normalizer.e164_or_empty(number);
        self.check_emergency(number) || (!e164.is_empty() && self.check_emergency(&e164))
    }

    fn check_emergency(&self, number: &str) -> bool {
        match self.emergency.is_emergency_number(number) {
            Ok(is_emergency) => is_emergency,
            Err(e) => {
                warn!(number = %pii_handle(number), error = %e, "emergency lookup failed");
                false
            }
        }
    }

    /// Whether the "blocking disabled" notification should be shown.
    pub fn should_show_emergency_notification(&self) -> Result<bool, StoreError> {
        let carrier = self.carrier.resolve();
        if !carrier.enhanced_blocking_supported {
            return Ok(false);
        }
        if !carrier.always_show_disabled_notification && !self.any_block_rule_enabled()? {
            return Ok(false);
        }
        if !self.suppression.is_suppressed()? {
            return Ok(false);
        }
        self.settings
            .get_bool(EnhancedSetting::ShowEmergencyNotification)
    }

    fn any_block_rule_enabled(&self) -> Result<bool, StoreError> {
        for setting in EnhancedSetting::ALL.into_iter().filter(|s| s.is_block_rule()) {
            if self.settings.get_bool(setting)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn normalizer(&self) -> &NumberNormalizer {
        &self.normalizer
    }
}
