//! Public operation surface.
//!
//! [`BlockedNumberProvider`] authorizes every entry point once, then hands
//! list operations to the store and decisions to the policy engine. Named
//! methods are reachable through [`BlockedNumberProvider::call`].

mod builder;
mod error;
mod request;

pub use builder::ProviderBuilder;
pub use error::ProviderError;
pub use request::{CallArgs, CallResponse, ContentValues, Method, Target};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::access::{AccessController, IdentityOracle, Operation, Tier};
use crate::notify::{ChangeEvent, SharedNotifier};
use crate::number::{pii_handle, MAX_NUMBER_LEN};
use crate::policy::{BlockReason, CallExtras, EnhancedPolicyEngine};
use crate::settings::{EnhancedSetting, SettingsStore};
use crate::store::{Column, EntryCursor, EntryId, Selection, SharedStorage, SortOrder};
use crate::suppression::{SuppressionEngine, SuppressionStatus};

/// The blocked-number service.
pub struct BlockedNumberProvider {
    storage: SharedStorage,
    settings: SettingsStore,
    access: AccessController,
    identity: Arc<dyn IdentityOracle>,
    notifier: SharedNotifier,
    suppression: Arc<SuppressionEngine>,
    policy: EnhancedPolicyEngine,
}

impl BlockedNumberProvider {
    fn authorize(&self, operation: Operation) -> Result<Tier, ProviderError> {
        let caller = self.identity.current_caller();
        Ok(self.access.authorize(operation, &caller)?)
    }

    fn list_changed(&self) {
        self.notifier.notify(ChangeEvent::BlockedNumbersChanged);
    }

    // ---------------------------------------------------------------------
    // Block list
    // ---------------------------------------------------------------------

    /// Add a number to the block list. Returns the new entry's id.
    ///
    /// Only `original_number` may be supplied; the id and canonical form are
    /// derived.
    pub fn insert(&self, route: &str, values: &ContentValues) -> Result<EntryId, ProviderError> {
        self.authorize(Operation::Insert)?;

        if Target::parse(route)? != Target::List {
            return Err(ProviderError::InvalidArgument(format!(
                "insert not supported on {}",
                route
            )));
        }

        for column in values.columns() {
            match Column::from_name(column) {
                Some(Column::OriginalNumber) => {}
                Some(derived) => {
                    return Err(ProviderError::InvalidArgument(format!(
                        "column {} must not be specified",
                        derived.name()
                    )))
                }
                None => {
                    return Err(ProviderError::InvalidArgument(format!(
                        "unknown column {}",
                        column
                    )))
                }
            }
        }

        let original = values
            .get(Column::OriginalNumber.name())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidArgument(format!(
                    "missing a required column {}",
                    Column::OriginalNumber.name()
                ))
            })?;
        check_number_len(original)?;

        let e164 = self.policy.normalizer().e164_or_empty(original);
        let id = self.storage.insert(original, &e164)?;

        info!(id = %id, number = %pii_handle(original), "blocked number inserted");
        self.list_changed();
        Ok(id)
    }

    /// Always fails: entries are never changed in place.
    pub fn update(&self, _route: &str, _values: &ContentValues) -> Result<usize, ProviderError> {
        self.authorize(Operation::Update)?;
        Err(ProviderError::UnsupportedOperation(
            "update is not supported, use delete + insert instead",
        ))
    }

    /// Delete entries. Returns the number removed.
    pub fn delete(
        &self,
        route: &str,
        selection: Option<&str>,
        args: &[String],
    ) -> Result<usize, ProviderError> {
        self.authorize(Operation::Delete)?;

        let selection = match Target::parse(route)? {
            Target::List => Selection::parse(selection, args)?,
            Target::Entry(id) => {
                reject_selection_with_id(selection)?;
                Selection::id(id)
            }
        };

        let removed = self.storage.delete(&selection)?;
        info!(route, removed, "blocked numbers deleted");
        self.list_changed();
        Ok(removed)
    }

    /// Query entries into a cursor.
    ///
    /// `cancel` truncates iteration once triggered; an already-cancelled
    /// token yields an empty cursor.
    pub fn query(
        &self,
        route: &str,
        selection: Option<&str>,
        args: &[String],
        sort: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<EntryCursor, ProviderError> {
        self.authorize(Operation::Query)?;

        let (selection, sort) = match Target::parse(route)? {
            Target::List => (Selection::parse(selection, args)?, SortOrder::parse(sort)?),
            Target::Entry(id) => {
                reject_selection_with_id(selection)?;
                (Selection::id(id), SortOrder::default())
            }
        };

        let token = cancel.cloned().unwrap_or_default();
        let cursor = self.storage.query(&selection, &sort, &token)?;
        debug!(route, rows = cursor.len(), "query");
        Ok(cursor)
    }

    /// Whether `number` is on the block list.
    pub fn is_blocked(&self, number: &str) -> Result<bool, ProviderError> {
        self.authorize(Operation::IsBlocked)?;
        check_number_len(number)?;
        Ok(self.policy.is_blocked(number)?)
    }

    /// Remove every entry matching `number` by original or canonical form.
    pub fn unblock(&self, number: &str) -> Result<usize, ProviderError> {
        self.authorize(Operation::Unblock)?;
        check_number_len(number)?;

        if number.is_empty() {
            return Ok(0);
        }
        let e164 = self.policy.normalizer().e164_or_empty(number);
        let removed = self.storage.delete(&Selection::number(number, &e164))?;

        info!(number = %pii_handle(number), removed, "unblock");
        if removed > 0 {
            self.list_changed();
        }
        Ok(removed)
    }

    /// Whether the calling user may manage the block list. Never fails.
    pub fn can_current_user_block_numbers(&self) -> bool {
        let caller = self.identity.current_caller();
        self.access.can_current_user_block(&caller)
    }

    // ---------------------------------------------------------------------
    // System operations
    // ---------------------------------------------------------------------

    pub fn notify_emergency_contact(&self) -> Result<SuppressionStatus, ProviderError> {
        self.authorize(Operation::NotifyEmergencyContact)?;
        Ok(self.suppression.on_emergency_contact()?)
    }

    /// Returns whether suppression was active and has been ended.
    pub fn end_block_suppression(&self) -> Result<bool, ProviderError> {
        self.authorize(Operation::EndBlockSuppression)?;
        Ok(self.suppression.end_suppression()?)
    }

    pub fn get_block_suppression_status(&self) -> Result<SuppressionStatus, ProviderError> {
        self.authorize(Operation::GetBlockSuppressionStatus)?;
        Ok(self.suppression.status()?)
    }

    pub fn should_system_block_number(
        &self,
        number: &str,
        extras: Option<&CallExtras>,
    ) -> Result<BlockReason, ProviderError> {
        self.authorize(Operation::ShouldSystemBlockNumber)?;
        check_number_len(number)?;
        Ok(self.policy.decide(number, extras)?)
    }

    pub fn should_show_emergency_call_notification(&self) -> Result<bool, ProviderError> {
        self.authorize(Operation::ShouldShowEmergencyCallNotification)?;
        Ok(self.policy.should_show_emergency_notification()?)
    }

    pub fn get_enhanced_block_setting(&self, key: &str) -> Result<bool, ProviderError> {
        self.authorize(Operation::GetEnhancedBlockSetting)?;
        Ok(self.settings.get_bool(parse_setting(key)?)?)
    }

    pub fn set_enhanced_block_setting(&self, key: &str, value: bool) -> Result<(), ProviderError> {
        self.authorize(Operation::SetEnhancedBlockSetting)?;
        Ok(self.settings.set_bool(parse_setting(key)?, value)?)
    }

    // ---------------------------------------------------------------------
    // Named method dispatch
    // ---------------------------------------------------------------------

    /// Invoke a method by name.
    ///
    /// Unknown names are checked against the read gate before being
    /// rejected, so unprivileged callers learn nothing about the method set.
    pub fn call(
        &self,
        method: &str,
        arg: Option<&str>,
        args: &CallArgs,
    ) -> Result<CallResponse, ProviderError> {
        let Some(method) = Method::from_name(method) else {
            self.authorize(Operation::Unknown)?;
            return Err(ProviderError::NotFound(format!("unsupported method {}", method)));
        };

        let number = arg.unwrap_or_default();
        let mut res = CallResponse::default();

        match method {
            Method::IsBlocked => {
                let blocked = self.is_blocked(number)?;
                res.is_blocked = Some(blocked);
                res.block_status = Some(if blocked {
                    BlockReason::BlockedInList.code()
                } else {
                    BlockReason::NotBlocked.code()
                });
            }
            Method::CanCurrentUserBlockNumbers => {
                res.can_block = Some(self.can_current_user_block_numbers());
            }
            Method::Unblock => {
                res.rows_deleted = Some(self.unblock(number)?);
            }
            Method::NotifyEmergencyContact => {
                self.notify_emergency_contact()?;
            }
            Method::EndBlockSuppression => {
                self.end_block_suppression()?;
            }
            Method::GetBlockSuppressionStatus => {
                let status = self.get_block_suppression_status()?;
                res.is_suppressed = Some(status.is_suppressed);
                res.suppressed_until = Some(status.until_millis);
            }
            Method::ShouldSystemBlockNumber => {
                let extras = args.call_extras();
                let reason = self.should_system_block_number(number, extras.as_ref())?;
                res.is_blocked = Some(reason.is_blocked());
                res.block_status = Some(reason.code());
            }
            Method::ShouldShowEmergencyCallNotification => {
                res.show_emergency_notification =
                    Some(self.should_show_emergency_call_notification()?);
            }
            Method::GetEnhancedBlockSetting => match &args.setting_key {
                Some(key) => res.setting_enabled = Some(self.get_enhanced_block_setting(key)?),
                None => {
                    self.authorize(method.operation())?;
                }
            },
            Method::SetEnhancedBlockSetting => match &args.setting_key {
                Some(key) => {
                    self.set_enhanced_block_setting(key, args.setting_value.unwrap_or(false))?
                }
                None => {
                    self.authorize(method.operation())?;
                }
            },
        }

        Ok(res)
    }
}

fn reject_selection_with_id(selection: Option<&str>) -> Result<(), ProviderError> {
    match selection {
        Some(s) if !s.trim().is_empty() => Err(ProviderError::InvalidArgument(
            "when an id is specified in the route, selection must be empty".to_string(),
        )),
        _ => Ok(()),
    }
}

fn check_number_len(number: &str) -> Result<(), ProviderError> {
    if number.len() > MAX_NUMBER_LEN {
        return Err(ProviderError::InvalidArgument(format!(
            "number of {} bytes exceeds the {} byte limit",
            number.len(),
            MAX_NUMBER_LEN
        )));
    }
    Ok(())
}

fn parse_setting(key: &str) -> Result<EnhancedSetting, ProviderError> {
    key.parse::<EnhancedSetting>()
        .map_err(|e| ProviderError::InvalidArgument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{CallerIdentity, StaticIdentity, UserKind, UserPolicy};
    use crate::notify::{BroadcastNotifier, ChangeNotifier};
    use crate::store::MemoryStorage;

    fn provider() -> BlockedNumberProvider {
        BlockedNumberProvider::builder(Arc::new(MemoryStorage::new())).build()
    }

    fn provider_as(identity: CallerIdentity) -> BlockedNumberProvider {
        BlockedNumberProvider::builder(Arc::new(MemoryStorage::new()))
            .identity(Arc::new(StaticIdentity(identity)))
            .access(AccessController::new(false, UserPolicy::default()))
            .build()
    }

    #[test]
    fn test_insert_then_is_blocked_then_delete() {
        let p = provider();
        let id = p
            .insert("blocked", &ContentValues::with_original("+1-555-0100"))
            .unwrap();

        assert!(p.is_blocked("5550100").unwrap());
        assert!(!p.is_blocked("+15559999").unwrap());

        assert_eq!(p.delete(&format!("blocked/{}", id), None, &[]).unwrap(), 1);
        assert!(!p.is_blocked("5550100").unwrap());
    }

    #[test]
    fn test_insert_rejects_derived_columns() {
        let p = provider();

        let mut values = ContentValues::with_original("5550100");
        values.put("_id", "9");
        assert!(matches!(
            p.insert("blocked", &values),
            Err(ProviderError::InvalidArgument(_))
        ));

        let mut values = ContentValues::with_original("5550100");
        values.put("e164_number", "+15550100");
        assert!(matches!(
            p.insert("blocked", &values),
            Err(ProviderError::InvalidArgument(_))
        ));

        assert!(matches!(
            p.insert("blocked", &ContentValues::with_original("")),
            Err(ProviderError::InvalidArgument(_))
        ));
        assert!(matches!(
            p.insert("blocked/1", &ContentValues::with_original("1")),
            Err(ProviderError::InvalidArgument(_))
        ));
        assert!(matches!(
            p.insert("numbers", &ContentValues::with_original("1")),
            Err(ProviderError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_unsupported() {
        let p = provider();
        assert!(matches!(
            p.update("blocked", &ContentValues::new()),
            Err(ProviderError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_id_route_rejects_selection() {
        let p = provider();
        p.insert("blocked", &ContentValues::with_original("123")).unwrap();

        let err = p.delete("blocked/1", Some("_id = 1"), &[]).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));
        let err = p.query("blocked/1", Some("_id = 1"), &[], None, None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));

        let rows: Vec<_> = p.query("blocked/1", None, &[], None, None).unwrap().collect();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_filters_validated() {
        let p = provider();
        p.insert("blocked", &ContentValues::with_original("111")).unwrap();

        let args = vec!["111".to_string(), "+1111".to_string()];
        let rows = p
            .query(
                "blocked",
                Some("original_number = ? OR e164_number = ?"),
                &args,
                Some("_id DESC"),
                None,
            )
            .unwrap();
        assert_eq!(rows.len(), 1);

        for bad in ["1=1; DROP TABLE blocked", "password = ?", "(original_number = '1'"] {
            let err = p.delete("blocked", Some(bad), &[]).unwrap_err();
            assert!(matches!(err, ProviderError::InvalidFilter(_)), "{bad}");
        }
        assert_eq!(p.query("blocked", None, &[], None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_unblock_by_canonical_form() {
        let p = provider();
        p.insert("blocked", &ContentValues::with_original("(555) 010-0000"))
            .unwrap();
        p.insert("blocked", &ContentValues::with_original("+15550100000"))
            .unwrap();

        assert_eq!(p.unblock("555-010-0000").unwrap(), 2);
        assert_eq!(p.unblock("").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_changes_are_broadcast() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        let p = BlockedNumberProvider::builder(Arc::new(MemoryStorage::new()))
            .notifier(notifier.clone())
            .build();

        p.insert("blocked", &ContentValues::with_original("123")).unwrap();
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::BlockedNumbersChanged);

        // nothing removed, nothing announced
        p.unblock("999").unwrap();
        notifier.notify(ChangeEvent::SuppressionStateChanged);
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::SuppressionStateChanged);
    }

    #[test]
    fn test_call_dispatch() {
        let p = provider();
        p.insert("blocked", &ContentValues::with_original("5550100")).unwrap();

        let res = p.call("is_blocked", Some("5550100"), &CallArgs::default()).unwrap();
        assert_eq!(res.is_blocked, Some(true));
        assert_eq!(res.block_status, Some(1));

        let res = p
            .call("should_system_block_number", Some("5550100"), &CallArgs::default())
            .unwrap();
        assert_eq!(res.is_blocked, Some(true));
        assert_eq!(res.block_status, Some(BlockReason::BlockedInList.code()));

        let payphone = CallArgs {
            presentation: Some(4),
            ..Default::default()
        };
        let res = p
            .call("should_system_block_number", Some("5550199"), &payphone)
            .unwrap();
        assert_eq!(res.block_status, Some(0));

        let res = p.call("unblock", Some("5550100"), &CallArgs::default()).unwrap();
        assert_eq!(res.rows_deleted, Some(1));

        let err = p.call("drop_everything", None, &CallArgs::default()).unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn test_unknown_method_checks_read_gate_first() {
        let p = provider_as(CallerIdentity::unprivileged());
        let err = p.call("drop_everything", None, &CallArgs::default()).unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
    }

    #[test]
    fn test_enhanced_settings_via_call() {
        let p = provider_as(CallerIdentity::unprivileged().with_permissions(true, true));
        let key = EnhancedSetting::BlockPayphone.key();

        let set = CallArgs {
            setting_value: Some(true),
            ..CallArgs::setting(key)
        };
        p.call("set_enhanced_block_setting", None, &set).unwrap();

        let res = p
            .call("get_enhanced_block_setting", None, &CallArgs::setting(key))
            .unwrap();
        assert_eq!(res.setting_enabled, Some(true));

        let err = p
            .call("get_enhanced_block_setting", None, &CallArgs::setting("nope"))
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));

        let res = p
            .call("get_enhanced_block_setting", None, &CallArgs::default())
            .unwrap();
        assert_eq!(res, CallResponse::default());
    }

    #[test]
    fn test_can_current_user_block_needs_no_permission() {
        let p = provider_as(CallerIdentity::unprivileged().with_user(UserKind::Other));
        let res = p
            .call("can_current_user_block_numbers", None, &CallArgs::default())
            .unwrap();
        assert_eq!(res.can_block, Some(false));

        let p = provider_as(CallerIdentity::unprivileged());
        assert!(p.can_current_user_block_numbers());
    }
}
