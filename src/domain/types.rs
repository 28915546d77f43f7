use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Time Helper Types
// ============================================================================

/// Calendar year of the planning horizon.
pub type Year = i32;

/// Contiguous, inclusive range of planning years `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    start: Year,
    end: Year,
}

impl YearRange {
    /// Create a range; returns `None` when `end < start`.
    pub fn new(start: Year, end: Year) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// First year (`t0`)
    pub fn start(&self) -> Year {
        self.start
    }

    /// Last year (`tN`)
    pub fn end(&self) -> Year {
        self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, year: Year) -> bool {
        (self.start..=self.end).contains(&year)
    }

    /// Position of `year` inside the range.
    pub fn index_of(&self, year: Year) -> Option<usize> {
        self.contains(year).then(|| (year - self.start) as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = Year> + Clone {
        self.start..=self.end
    }

    /// Present-value weight `1 / (1 + rate)^(year - t0)`.
    pub fn discount_factor(&self, year: Year, rate: f64) -> f64 {
        1.0 / (1.0 + rate).powi(year - self.start)
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ============================================================================
// Run Switches
// ============================================================================

/// Which hydrogen price trajectory feeds variable operating cost.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum HydrogenCase {
    #[default]
    Baseline,
    Optimistic,
}

impl HydrogenCase {
    /// Price-table row that carries hydrogen prices for this case.
    pub fn price_row(&self) -> String {
        format!("{HYDROGEN_COMMODITY}_{self}")
    }
}

/// Intensity commodity whose price row depends on [`HydrogenCase`].
pub const HYDROGEN_COMMODITY: &str = "hydrogen";

/// Shape of the demand side of the model.
///
/// `Aggregate` balances total production against one demand series with an
/// equality. `ProductClass` splits demand by product class, requires
/// production to cover each class, caps the restricted class by feedstock
/// availability and makes route adoption irreversible.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DemandStructure {
    #[default]
    Aggregate,
    ProductClass,
}

/// Where a demand value came from under the forward-fill-then-zero policy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DemandFill {
    Observed,
    ForwardFilled,
    ZeroFilled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_year_range_indexing() {
        let range = YearRange::new(2025, 2027).unwrap();
        assert_eq!(range.len(), 3);
        assert_eq!(range.index_of(2025), Some(0));
        assert_eq!(range.index_of(2027), Some(2));
        assert_eq!(range.index_of(2028), None);
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![2025, 2026, 2027]);
        assert!(YearRange::new(2030, 2025).is_none());
    }

    #[test]
    fn test_discount_factor() {
        let range = YearRange::new(2025, 2050).unwrap();
        assert_eq!(range.discount_factor(2025, 0.05), 1.0);
        assert!((range.discount_factor(2027, 0.05) - 1.0 / 1.1025).abs() < 1e-12);
        assert_eq!(range.discount_factor(2040, 0.0), 1.0);
    }

    #[test]
    fn test_switch_parsing() {
        assert_eq!(HydrogenCase::from_str("optimistic").unwrap(), HydrogenCase::Optimistic);
        assert_eq!(HydrogenCase::from_str("Baseline").unwrap(), HydrogenCase::Baseline);
        assert_eq!(
            DemandStructure::from_str("product_class").unwrap(),
            DemandStructure::ProductClass
        );
        assert!(DemandStructure::from_str("regional").is_err());
        assert_eq!(HydrogenCase::Optimistic.price_row(), "hydrogen_optimistic");
        assert_eq!(DemandFill::ForwardFilled.to_string(), "forward_filled");
    }
}
