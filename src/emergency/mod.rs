//! Emergency number lookup.

use std::collections::HashSet;

use thiserror::Error;

/// Why an emergency lookup could not answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The platform has no emergency number support.
    #[error("emergency number lookup unsupported")]
    Unsupported,

    /// The lookup service is temporarily unavailable.
    #[error("emergency number lookup unavailable: {0}")]
    Unavailable(String),
}

/// Answers whether a dialed string is an emergency number.
pub trait EmergencyNumberOracle: Send + Sync {
    fn is_emergency_number(&self, number: &str) -> Result<bool, OracleError>;
}

/// A fixed list of emergency numbers.
///
/// Matches on digits only, so `9-1-1` and `911` are the same number.
#[derive(Debug, Clone, Default)]
pub struct StaticEmergencyNumbers {
    numbers: HashSet<String>,
}

impl StaticEmergencyNumbers {
    pub fn new<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            numbers: numbers
                .into_iter()
                .map(|n| digits(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

fn digits(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

impl EmergencyNumberOracle for StaticEmergencyNumbers {
    fn is_emergency_number(&self, number: &str) -> Result<bool, OracleError> {
        // A '+' means a full international number, never a short code
        if number.trim_start().starts_with('+') {
            return Ok(false);
        }
        Ok(self.numbers.contains(&digits(number)))
    }
}

/// Oracle for platforms without emergency number support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEmergencySupport;

impl EmergencyNumberOracle for NoEmergencySupport {
    fn is_emergency_number(&self, _number: &str) -> Result<bool, OracleError> {
        Err(OracleError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_numbers() {
        let oracle = StaticEmergencyNumbers::new(["911", "112"]);
        assert_eq!(oracle.len(), 2);
        assert_eq!(oracle.is_emergency_number("911"), Ok(true));
        assert_eq!(oracle.is_emergency_number("9-1-1"), Ok(true));
        assert_eq!(oracle.is_emergency_number("+911"), Ok(false));
        assert_eq!(oracle.is_emergency_number("5550100"), Ok(false));
    }

    #[test]
    fn test_unsupported() {
        assert_eq!(
            NoEmergencySupport.is_emergency_number("911"),
            Err(OracleError::Unsupported)
        );
    }
}
