//! The analysis engine: recognizers, optional NER, merge and scoring.

use crate::detection::{default_recognizers, PiiHit, PiiType, Recognizer};
use crate::error::Result;
use crate::language::{detect_language, Language};
use crate::merge;
use crate::ner::{NerBackend, NerEntity};
use crate::policy::Policy;
use crate::redact;
use crate::risk;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of analyzing one text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Risk in `[0, 10]`, rounded to two decimals
    pub risk: f64,
    /// Uncapped hit count per type
    pub counts: BTreeMap<PiiType, usize>,
    /// Hits ordered by start, then length, then type
    pub hits: Vec<PiiHit>,
    pub language: Language,
}

impl AnalysisResult {
    fn empty(language: Language) -> Self {
        Self {
            risk: 0.0,
            counts: BTreeMap::new(),
            hits: Vec::new(),
            language,
        }
    }

    pub fn has_pii(&self) -> bool {
        !self.hits.is_empty()
    }

    /// Counts as `TYPE=n;TYPE=n`
    pub fn format_counts(&self) -> String {
        self.counts
            .iter()
            .map(|(pii_type, count)| format!("{}={}", pii_type, count))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// PII detection and risk-scoring engine.
///
/// Immutable after construction; share it behind an `Arc` to analyze texts
/// concurrently.
pub struct Engine {
    policy: Policy,
    recognizers: Vec<Box<dyn Recognizer>>,
    ner: Option<Arc<dyn NerBackend>>,
}

impl Engine {
    /// Create an engine with the default recognizers
    pub fn new(policy: Policy, ner: Option<Arc<dyn NerBackend>>) -> Result<Self> {
        Self::with_recognizers(policy, default_recognizers(), ner)
    }

    /// Create an engine with an explicit recognizer list
    pub fn with_recognizers(
        policy: Policy,
        recognizers: Vec<Box<dyn Recognizer>>,
        ner: Option<Arc<dyn NerBackend>>,
    ) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            recognizers,
            ner,
        })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn has_ner(&self) -> bool {
        self.ner.is_some()
    }

    /// Analyze `text` in the policy's language, detecting it when unset
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        let language = self
            .policy
            .language
            .unwrap_or_else(|| detect_language(text));
        self.analyze_as(text, language)
    }

    /// Analyze `text` as the given language
    pub fn analyze_as(&self, text: &str, language: Language) -> AnalysisResult {
        if text.trim().is_empty() {
            return AnalysisResult::empty(language);
        }

        let pattern_hits: Vec<PiiHit> = self
            .recognizers
            .iter()
            .flat_map(|r| r.analyze(text, language))
            .collect();

        let (entities, ner_chars) = match self.recognize_entities(text, language) {
            Some((entities, chars)) => (Some(entities), chars),
            None => (None, 0),
        };

        let mut hits = merge::merge(
            pattern_hits,
            entities,
            self.policy.ner.min_confidence,
            ner_chars,
            &self.policy.filter,
        );
        hits.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(a.length.cmp(&b.length))
                .then_with(|| a.pii_type.cmp(&b.pii_type))
        });

        let score = risk::aggregate(
            &hits,
            &self.policy.weights,
            self.policy.max_count_per_type,
            self.policy.k,
        );
        debug!(
            language = %language,
            hits = hits.len(),
            risk = score.risk,
            "Analysis complete"
        );

        AnalysisResult {
            risk: score.risk,
            counts: score.counts,
            hits,
            language,
        }
    }

    /// Run the NER backend on a bounded prefix of the text.
    ///
    /// Returns the entities and the prefix length in characters, or `None`
    /// when there is no backend or it failed.
    fn recognize_entities(
        &self,
        text: &str,
        language: Language,
    ) -> Option<(Vec<NerEntity>, usize)> {
        let ner = self.ner.as_ref()?;
        let limit = self.policy.ner.max_input_chars;
        let (bounded, chars) = match text.char_indices().nth(limit) {
            Some((byte, _)) => (&text[..byte], limit),
            None => (text, text.chars().count()),
        };
        match ner.recognize(bounded, language) {
            Ok(entities) => Some((entities, chars)),
            Err(e) => {
                warn!(error = %e, "NER backend failed, using pattern recognizers only");
                None
            }
        }
    }

    /// Redact `hits` in `text` according to the policy
    pub fn redact(&self, text: &str, hits: &[PiiHit]) -> String {
        redact::redact(text, hits, &self.policy.redaction)
    }

    /// Whether a result reaches the redaction threshold
    pub fn should_redact(&self, result: &AnalysisResult) -> bool {
        result.has_pii() && result.risk >= self.policy.redaction.threshold
    }
}
