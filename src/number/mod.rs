//! Phone number normalization.
//!
//! Maps a raw dialed string to a canonical comparable form (E.164). The
//! region-aware parsing is delegated to a [`PhoneNumberFormatter`] so a full
//! numbering-plan library can be plugged in; [`RegionFormatter`] is the
//! built-in implementation backed by a small dialing-plan table.
//!
//! Numbers are personal data: log them through [`pii_handle`] only.

mod region;

pub use region::DialingPlan;

use std::sync::Arc;

/// Minimum number of significant digits in a canonical number.
const MIN_DIGITS: usize = 3;

/// Maximum number of digits allowed by E.164.
const MAX_DIGITS: usize = 15;

/// Longest raw number accepted for storage or lookup, in bytes.
///
/// Raw numbers become store keys; anything longer is not a phone number.
pub const MAX_NUMBER_LEN: usize = 256;

/// Region-aware formatter oracle.
pub trait PhoneNumberFormatter: Send + Sync {
    /// Format `raw` as E.164, or `None` when it cannot be parsed.
    fn format_e164(&self, raw: &str) -> Option<String>;
}

/// Shared formatter handle.
pub type SharedFormatter = Arc<dyn PhoneNumberFormatter>;

/// Formatter using the built-in dialing-plan table for one default region.
#[derive(Debug, Clone)]
pub struct RegionFormatter {
    plan: Option<&'static DialingPlan>,
}

impl RegionFormatter {
    /// Create a formatter for the given default region.
    ///
    /// An unknown region still formats numbers that carry a leading '+'.
    pub fn new(region: &str) -> Self {
        let plan = DialingPlan::for_region(region);
        if plan.is_none() {
            tracing::warn!(region, "unknown default region, only '+' numbers will normalize");
        }
        Self { plan }
    }
}

impl PhoneNumberFormatter for RegionFormatter {
    fn format_e164(&self, raw: &str) -> Option<String> {
        let stripped = strip_separators(raw)?;

        let national = match stripped.strip_prefix('+') {
            Some(digits) => return canonical(digits),
            None => stripped.as_str(),
        };

        let plan = self.plan?;
        if let Some(rest) = national.strip_prefix(plan.international_prefix) {
            return canonical(rest);
        }

        let subscriber = if plan.trunk_prefix.is_empty() {
            national
        } else {
            national.strip_prefix(plan.trunk_prefix).unwrap_or(national)
        };
        if subscriber.is_empty() {
            return None;
        }

        canonical(&format!("{}{}", plan.country_code, subscriber))
    }
}

/// Normalizes raw numbers through a formatter.
#[derive(Clone)]
pub struct NumberNormalizer {
    formatter: SharedFormatter,
}

impl std::fmt::Debug for NumberNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumberNormalizer").finish_non_exhaustive()
    }
}

impl NumberNormalizer {
    /// Create a normalizer over a formatter.
    pub fn new(formatter: SharedFormatter) -> Self {
        Self { formatter }
    }

    /// Create a normalizer using the built-in table for `region`.
    pub fn for_region(region: &str) -> Self {
        Self::new(Arc::new(RegionFormatter::new(region)))
    }

    /// Canonical form of `raw`, or `None` when it cannot be parsed.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        if raw.trim().is_empty() {
            return None;
        }
        self.formatter.format_e164(raw)
    }

    /// Canonical form of `raw`, or an empty string when it cannot be parsed.
    pub fn e164_or_empty(&self, raw: &str) -> String {
        self.normalize(raw).unwrap_or_default()
    }
}

/// Remove visual separators. Returns `None` on any other non-digit character.
fn strip_separators(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.trim().chars().enumerate() {
        match c {
            '0'..='9' => out.push(c),
            '+' if i == 0 => out.push(c),
            ' ' | '-' | '.' | '(' | ')' | '/' => {}
            _ => return None,
        }
    }
    Some(out)
}

fn canonical(digits: &str) -> Option<String> {
    if digits.len() < MIN_DIGITS || digits.len() > MAX_DIGITS || digits.starts_with('0') {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("+{}", digits))
}

/// Redacted handle for a phone number, safe for logs.
///
/// Keeps the length and the last two digits so log lines stay correlatable.
pub fn pii_handle(number: &str) -> String {
    if number.is_empty() {
        return "<empty>".to_string();
    }
    let count = number.chars().count();
    if count <= 2 {
        return "*".repeat(count);
    }
    let tail: String = number.chars().skip(count - 2).collect();
    format!("{}{}", "*".repeat(count - 2), tail)
}
