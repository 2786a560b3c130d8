//! Risk aggregation.
//!
//! Hits are grouped by type, each type's count is capped, weighted and
//! summed, and the sum is squashed into `[0, 10]` with
//! `10 * (1 - e^(-k * sum))`.

use crate::detection::{PiiHit, PiiType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Highest possible risk score
pub const MAX_RISK: f64 = 10.0;

/// Lowest risk reported for any evidence at all
pub const MIN_NONZERO_RISK: f64 = 0.01;

/// Per-type risk weights.
///
/// Missing types, and types configured with a weight that is zero, negative
/// or not finite, weigh 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskWeights(HashMap<PiiType, f64>);

impl Default for RiskWeights {
    fn default() -> Self {
        Self(HashMap::from([
            (PiiType::NationalId, 10.0),
            (PiiType::CreditCard, 9.0),
            (PiiType::Iban, 8.0),
            (PiiType::Dob, 7.0),
            (PiiType::Address, 6.0),
            (PiiType::Phone, 5.0),
            (PiiType::Email, 4.0),
            (PiiType::Person, 3.0),
        ]))
    }
}

impl FromIterator<(PiiType, f64)> for RiskWeights {
    fn from_iter<I: IntoIterator<Item = (PiiType, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl RiskWeights {
    /// Weights with no entries: every type weighs 1
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn set(&mut self, pii_type: PiiType, weight: f64) {
        self.0.insert(pii_type, weight);
    }

    /// Effective weight of a type
    pub fn weight(&self, pii_type: &PiiType) -> f64 {
        match self.0.get(pii_type) {
            Some(&w) if w.is_finite() && w > 0.0 => w,
            _ => 1.0,
        }
    }
}

/// Result of aggregating hits
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScore {
    pub risk: f64,
    /// Uncapped hit counts per type
    pub counts: BTreeMap<PiiType, usize>,
}

/// Number of hits per type
pub fn count_by_type(hits: &[PiiHit]) -> BTreeMap<PiiType, usize> {
    let mut counts = BTreeMap::new();
    for hit in hits {
        *counts.entry(hit.pii_type.clone()).or_insert(0) += 1;
    }
    counts
}

/// Map a weighted evidence sum to a risk score rounded to two decimals.
///
/// Any positive evidence scores at least [`MIN_NONZERO_RISK`], so a zero
/// risk always means no hits.
pub fn risk_from_weighted_sum(weighted_sum: f64, k: f64) -> f64 {
    if weighted_sum <= 0.0 {
        return 0.0;
    }
    let risk = MAX_RISK * (1.0 - (-k * weighted_sum).exp());
    ((risk * 100.0).round() / 100.0).clamp(MIN_NONZERO_RISK, MAX_RISK)
}

/// Aggregate hits into a risk score and per-type counts
pub fn aggregate(
    hits: &[PiiHit],
    weights: &RiskWeights,
    max_count_per_type: usize,
    k: f64,
) -> RiskScore {
    let counts = count_by_type(hits);
    let weighted_sum: f64 = counts
        .iter()
        .map(|(pii_type, &count)| count.min(max_count_per_type) as f64 * weights.weight(pii_type))
        .sum();
    RiskScore {
        risk: risk_from_weighted_sum(weighted_sum, k),
        counts,
    }
}
