//! Analysis policy: plain data read by the engine.

use crate::detection::PiiType;
use crate::error::{Error, Result};
use crate::language::Language;
use crate::redact::RedactionPolicy;
use crate::risk::RiskWeights;
use std::collections::BTreeSet;

/// Include/exclude filter on hit types
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter {
    /// Types to keep (empty = keep all)
    pub include: BTreeSet<PiiType>,
    /// Types to drop
    pub exclude: BTreeSet<PiiType>,
}

impl TypeFilter {
    pub fn allows(&self, pii_type: &PiiType) -> bool {
        (self.include.is_empty() || self.include.contains(pii_type))
            && !self.exclude.contains(pii_type)
    }
}

/// Limits applied to the optional NER step
#[derive(Debug, Clone, PartialEq)]
pub struct NerSettings {
    /// Entities below this confidence are dropped
    pub min_confidence: f64,
    /// Only this many leading characters are given to the backend
    pub max_input_chars: usize,
}

impl Default for NerSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            max_input_chars: 4096,
        }
    }
}

/// Everything that shapes an analysis
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub weights: RiskWeights,
    /// Hits of one type counted towards the score at most this often
    pub max_count_per_type: usize,
    /// Risk sensitivity; smaller values need more evidence
    pub k: f64,
    pub filter: TypeFilter,
    /// Fixed language, or `None` to detect per text
    pub language: Option<Language>,
    pub redaction: RedactionPolicy,
    pub ner: NerSettings,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            max_count_per_type: 5,
            k: 0.15,
            filter: TypeFilter::default(),
            language: None,
            redaction: RedactionPolicy::default(),
            ner: NerSettings::default(),
        }
    }
}

impl Policy {
    /// Reject settings the aggregator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_count_per_type == 0 {
            return Err(Error::InvalidMaxCount);
        }
        if !(self.k.is_finite() && self.k > 0.0) {
            return Err(Error::InvalidSensitivity(self.k));
        }
        if !(0.0..=1.0).contains(&self.ner.min_confidence) {
            return Err(Error::InvalidConfidence(self.ner.min_confidence));
        }
        Ok(())
    }
}
