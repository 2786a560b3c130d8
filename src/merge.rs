//! Merging of pattern hits with optional NER entities.

use crate::detection::PiiHit;
use crate::ner::NerEntity;
use crate::policy::TypeFilter;

/// Convert NER entities to hits.
///
/// Entities under `min_confidence`, with `end <= start`, or reaching past
/// `text_chars` are dropped.
pub fn entity_hits(entities: Vec<NerEntity>, min_confidence: f64, text_chars: usize) -> Vec<PiiHit> {
    entities
        .into_iter()
        .filter(|e| e.confidence >= min_confidence)
        .filter(|e| e.end > e.start && e.end <= text_chars)
        .map(|e| PiiHit::new(e.pii_type, e.start, e.end - e.start))
        .collect()
}

/// Union of pattern hits and NER hits, filtered by type
pub fn merge(
    pattern_hits: Vec<PiiHit>,
    entities: Option<Vec<NerEntity>>,
    min_confidence: f64,
    text_chars: usize,
    filter: &TypeFilter,
) -> Vec<PiiHit> {
    let mut hits = pattern_hits;
    if let Some(entities) = entities {
        hits.extend(entity_hits(entities, min_confidence, text_chars));
    }
    hits.retain(|h| filter.allows(&h.pii_type));
    hits
}
