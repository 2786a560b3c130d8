//! BIO label decoding for BERT-style token classifiers.

use super::{Encoding, NerBackend, NerEntity, NerError, TokenClassifier, Tokenizer};
use crate::detection::PiiType;
use crate::language::Language;
use std::path::Path;
use tracing::debug;

/// Label for tokens outside any entity
const OUTSIDE: &str = "O";

/// Read a labels file, one label per line, blank lines ignored
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>, NerError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| NerError::Labels {
        path: path.to_path_buf(),
        source,
    })?;
    let labels: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(NerError::EmptyLabels);
    }
    Ok(labels)
}

/// Map a BIO label (`B-PER`, `I-ADDR`, `DATE`) to a PII type
pub fn type_from_label(label: &str) -> PiiType {
    let base = label.split_once('-').map_or(label, |(_, base)| base);
    match base {
        "PER" => PiiType::Person,
        "ADDR" => PiiType::Address,
        "EMAIL" => PiiType::Email,
        "PHONE" => PiiType::Phone,
        "DATE" => PiiType::Dob,
        other => PiiType::from(other),
    }
}

/// NER backend decoding the output of a token classifier
pub struct BertNer<T, C> {
    tokenizer: T,
    classifier: C,
    labels: Vec<String>,
    max_sequence_length: usize,
}

impl<T: Tokenizer, C: TokenClassifier> BertNer<T, C> {
    pub fn new(
        tokenizer: T,
        classifier: C,
        labels: Vec<String>,
        max_sequence_length: usize,
    ) -> Result<Self, NerError> {
        if labels.is_empty() {
            return Err(NerError::EmptyLabels);
        }
        Ok(Self {
            tokenizer,
            classifier,
            labels,
            max_sequence_length,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl<T: Tokenizer, C: TokenClassifier> NerBackend for BertNer<T, C> {
    fn recognize(&self, text: &str, _language: Language) -> Result<Vec<NerEntity>, NerError> {
        let encoding = self.tokenizer.encode(text, self.max_sequence_length)?;
        if encoding.is_empty() {
            return Ok(Vec::new());
        }
        let logits = self.classifier.classify(&encoding)?;
        let entities = decode(&encoding, &logits, &self.labels)?;
        debug!(
            tokens = encoding.len(),
            entities = entities.len(),
            "NER inference complete"
        );
        Ok(entities)
    }
}

/// Entity under construction while walking tokens
struct Pending {
    entity: NerEntity,
    last_token: usize,
}

/// Pick the most likely label per token and merge runs of adjacent tokens
/// with the same type into one entity.
///
/// A `B-` label always opens a new entity. The merged confidence is the
/// maximum of its tokens' probabilities.
pub fn decode(
    encoding: &Encoding,
    logits: &[f32],
    labels: &[String],
) -> Result<Vec<NerEntity>, NerError> {
    let num_labels = labels.len();
    let expected = encoding.len() * num_labels;
    if num_labels == 0 || logits.len() != expected {
        return Err(NerError::OutputShape {
            expected,
            actual: logits.len(),
        });
    }

    let mut entities = Vec::new();
    let mut pending: Option<Pending> = None;

    for (index, row) in logits.chunks_exact(num_labels).enumerate() {
        if encoding.attention_mask.get(index).copied().unwrap_or(0) == 0 {
            continue;
        }
        let Some((start, end)) = encoding.tokens.get(index).and_then(|t| t.span) else {
            continue;
        };
        let (best, probability) = argmax_softmax(row);
        let label = labels[best].as_str();
        if label == OUTSIDE {
            continue;
        }
        let pii_type = type_from_label(label);

        if let Some(current) = pending.as_mut() {
            let continues = current.entity.pii_type == pii_type
                && current.last_token + 1 == index
                && !label.starts_with("B-");
            if continues {
                current.entity.end = current.entity.end.max(end);
                current.entity.confidence = current.entity.confidence.max(probability);
                current.last_token = index;
                continue;
            }
        }
        if let Some(done) = pending.take() {
            entities.push(done.entity);
        }
        pending = Some(Pending {
            entity: NerEntity::new(pii_type, start, end, probability),
            last_token: index,
        });
    }
    if let Some(done) = pending {
        entities.push(done.entity);
    }
    Ok(entities)
}

/// Index of the largest logit and its softmax probability
fn argmax_softmax(row: &[f32]) -> (usize, f64) {
    let (best, max) = row
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        });
    let sum: f64 = row.iter().map(|&v| f64::from(v - max).exp()).sum();
    (best, 1.0 / sum.max(1e-6))
}
