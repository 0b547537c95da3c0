//! Assembly of a provider from its collaborators.

use std::sync::Arc;
use std::time::Duration;

use crate::access::{AccessController, CallerIdentity, IdentityOracle, StaticIdentity};
use crate::carrier::{CarrierConfigSource, StaticCarrierConfig};
use crate::config::Config;
use crate::emergency::{EmergencyNumberOracle, NoEmergencySupport, StaticEmergencyNumbers};
use crate::notify::{NoopNotifier, SharedNotifier};
use crate::number::NumberNormalizer;
use crate::policy::EnhancedPolicyEngine;
use crate::settings::SettingsStore;
use crate::store::SharedStorage;
use crate::suppression::{
    SharedClock, SuppressionEngine, SystemClock, MAX_BLOCKING_DISABLED_DURATION,
};

use super::BlockedNumberProvider;

/// Builder for [`BlockedNumberProvider`].
///
/// Everything but storage has a default: system clock, no-op notifier,
/// the service's own identity, US numbering, carrier defaults and the
/// common emergency short codes.
pub struct ProviderBuilder {
    storage: SharedStorage,
    carrier: Arc<dyn CarrierConfigSource>,
    emergency: Arc<dyn EmergencyNumberOracle>,
    identity: Arc<dyn IdentityOracle>,
    clock: SharedClock,
    notifier: SharedNotifier,
    normalizer: NumberNormalizer,
    access: AccessController,
    max_suppression: Duration,
}

impl ProviderBuilder {
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            carrier: Arc::new(StaticCarrierConfig::default()),
            emergency: Arc::new(StaticEmergencyNumbers::new(["112", "911"])),
            identity: Arc::new(StaticIdentity(CallerIdentity::self_process())),
            clock: Arc::new(SystemClock),
            notifier: Arc::new(NoopNotifier),
            normalizer: NumberNormalizer::for_region("US"),
            access: AccessController::default(),
            max_suppression: MAX_BLOCKING_DISABLED_DURATION,
        }
    }

    pub fn carrier(mut self, carrier: Arc<dyn CarrierConfigSource>) -> Self {
        self.carrier = carrier;
        self
    }

    pub fn emergency(mut self, emergency: Arc<dyn EmergencyNumberOracle>) -> Self {
        self.emergency = emergency;
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityOracle>) -> Self {
        self.identity = identity;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn normalizer(mut self, normalizer: NumberNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn access(mut self, access: AccessController) -> Self {
        self.access = access;
        self
    }

    pub fn max_suppression(mut self, max: Duration) -> Self {
        self.max_suppression = max;
        self
    }

    pub fn build(self) -> BlockedNumberProvider {
        let suppression = Arc::new(
            SuppressionEngine::new(
                SettingsStore::new(self.storage.clone()),
                self.carrier.clone(),
                self.clock,
                self.notifier.clone(),
            )
            .with_max_duration(self.max_suppression),
        );
        let policy = EnhancedPolicyEngine::new(
            self.storage.clone(),
            suppression.clone(),
            self.emergency,
            self.carrier,
            self.normalizer,
        );

        BlockedNumberProvider {
            settings: SettingsStore::new(self.storage.clone()),
            storage: self.storage,
            access: self.access,
            identity: self.identity,
            notifier: self.notifier,
            suppression,
            policy,
        }
    }
}

impl BlockedNumberProvider {
    pub fn builder(storage: SharedStorage) -> ProviderBuilder {
        ProviderBuilder::new(storage)
    }

    /// Build a provider over `storage` with collaborators from configuration.
    pub fn from_config(
        config: &Config,
        storage: SharedStorage,
        notifier: SharedNotifier,
    ) -> BlockedNumberProvider {

        let emergency: Arc<dyn EmergencyNumberOracle> = if config.emergency.supported {
            Arc::new(StaticEmergencyNumbers::new(&config.emergency.numbers))
        } else {
            Arc::new(NoEmergencySupport)
        };

        let identity = config
            .identity
            .clone()
            .unwrap_or_else(CallerIdentity::self_process);

        ProviderBuilder::new(storage)
            .carrier(Arc::new(StaticCarrierConfig::new(
                config.carrier.active,
                config.carrier.defaults,
            )))
            .emergency(emergency)
            .identity(Arc::new(StaticIdentity(identity)))
            .notifier(notifier)
            .normalizer(NumberNormalizer::for_region(&config.platform.region))
            .access(AccessController::new(
                config.platform.allow_self_call,
                config.platform.users,
            ))
            .max_suppression(config.platform.max_blocking_disabled_duration)
            .build()
    }
}
