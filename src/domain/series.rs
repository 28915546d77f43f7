use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DemandFill, Year, YearRange};

/// Sparse year -> value map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearSeries(BTreeMap<Year, f64>);

impl YearSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: Year, value: f64) {
        self.0.insert(year, value);
    }

    pub fn get(&self, year: Year) -> Option<f64> {
        self.0.get(&year).copied()
    }

    /// Value for `year`, zero when unlisted.
    pub fn get_or_zero(&self, year: Year) -> f64 {
        self.get(year).unwrap_or(0.0)
    }

    pub fn years(&self) -> impl Iterator<Item = Year> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Year, f64)> for YearSeries {
    fn from_iter<I: IntoIterator<Item = (Year, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Dense per-year demand over the horizon with fill provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilledSeries {
    pub values: Vec<f64>,
    pub fill: Vec<DemandFill>,
}

/// Densify `observed` over `horizon`: gaps take the last observed value inside
/// the horizon, leading gaps with nothing to carry become zero.
pub fn forward_fill_then_zero(observed: &BTreeMap<Year, Option<f64>>, horizon: YearRange) -> FilledSeries {
    let mut values = Vec::with_capacity(horizon.len());
    let mut fill = Vec::with_capacity(horizon.len());
    let mut last = None;

    for year in horizon.iter() {
        match observed.get(&year).copied().flatten() {
            Some(v) => {
                last = Some(v);
                values.push(v);
                fill.push(DemandFill::Observed);
            }
            None => match last {
                Some(v) => {
                    values.push(v);
                    fill.push(DemandFill::ForwardFilled);
                }
                None => {
                    values.push(0.0);
                    fill.push(DemandFill::ZeroFilled);
                }
            },
        }
    }

    FilledSeries { values, fill }
}
