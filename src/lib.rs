//! blockd: a blocked phone number store with call-blocking decisions.
//!
//! The [`provider::BlockedNumberProvider`] facade authorizes each caller,
//! then serves block list reads and writes, emergency suppression, and
//! enhanced (presentation-based) blocking decisions. [`backup::BackupAgent`]
//! exports and restores the list.

pub mod access;
pub mod backup;
pub mod carrier;
pub mod config;
pub mod emergency;
pub mod notify;
pub mod number;
pub mod policy;
pub mod provider;
pub mod settings;
pub mod store;
pub mod suppression;
pub mod telemetry;

pub use provider::{BlockedNumberProvider, ProviderError};
