//! Static dialing-plan table used by the built-in formatter.

/// Dialing plan for a single region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialingPlan {
    /// ISO 3166-1 alpha-2 region code
    pub region: &'static str,
    /// Country calling code without the leading '+'
    pub country_code: &'static str,
    /// National trunk prefix stripped before prepending the country code
    pub trunk_prefix: &'static str,
    /// International dialing prefix replaced by '+'
    pub international_prefix: &'static str,
}

const PLANS: &[DialingPlan] = &[
    DialingPlan { region: "US", country_code: "1", trunk_prefix: "1", international_prefix: "011" },
    DialingPlan { region: "CA", country_code: "1", trunk_prefix: "1", international_prefix: "011" },
    DialingPlan { region: "GB", country_code: "44", trunk_prefix: "0", international_prefix: "00" },
    DialingPlan { region: "DE", country_code: "49", trunk_prefix: "0", international_prefix: "00" },
    DialingPlan { region: "FR", country_code: "33", trunk_prefix: "0", international_prefix: "00" },
    DialingPlan { region: "IN", country_code: "91", trunk_prefix: "0", international_prefix: "00" },
    DialingPlan { region: "MZ", country_code: "258", trunk_prefix: "", international_prefix: "00" },
    DialingPlan { region: "ZA", country_code: "27", trunk_prefix: "0", international_prefix: "00" },
    DialingPlan { region: "AU", country_code: "61", trunk_prefix: "0", international_prefix: "0011" },
    DialingPlan { region: "BR", country_code: "55", trunk_prefix: "0", international_prefix: "00" },
];

impl DialingPlan {
    /// Look up the plan for a region code (case-insensitive).
    pub fn for_region(region: &str) -> Option<&'static DialingPlan> {
        PLANS.iter().find(|p| p.region.eq_ignore_ascii_case(region))
    }

    /// All known region codes.
    pub fn regions() -> impl Iterator<Item = &'static str> {
        PLANS.iter().map(|p| p.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(DialingPlan::for_region("us").unwrap().country_code, "1");
        assert_eq!(DialingPlan::for_region("Mz").unwrap().country_code, "258");
        assert!(DialingPlan::for_region("XX").is_none());
    }

    #[test]
    fn test_regions_unique() {
        let mut regions: Vec<_> = DialingPlan::regions().collect();
        let total = regions.len();
        regions.sort();
        regions.dedup();
        assert_eq!(regions.len(), total);
    }
}
