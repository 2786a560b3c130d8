//! Optional named-entity recognition.
//!
//! The engine only sees [`NerBackend`]. [`BertNer`] turns any
//! [`Tokenizer`] plus [`TokenClassifier`] pair into a backend by decoding
//! per-token label logits into entity spans; loading the model and the
//! tokenizer is left to the implementations of those traits.

pub mod bert;

pub use bert::{load_labels, BertNer};

use crate::detection::PiiType;
use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// An entity reported by a NER backend. `end` is exclusive; offsets are
/// character offsets into the text given to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerEntity {
    #[serde(rename = "type")]
    pub pii_type: PiiType,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}

impl NerEntity {
    pub fn new(pii_type: PiiType, start: usize, end: usize, confidence: f64) -> Self {
        Self {
            pii_type,
            start,
            end,
            confidence,
        }
    }
}

/// Errors raised while producing NER entities
#[derive(Debug, Error)]
pub enum NerError {
    #[error("failed to read NER labels from {}: {source}", path.display())]
    Labels {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("NER label set is empty")]
    EmptyLabels,

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("model returned {actual} logits, expected {expected}")]
    OutputShape { expected: usize, actual: usize },

    #[error("NER backend unavailable: {0}")]
    Unavailable(String),
}

/// Source of model-produced entities
pub trait NerBackend: Send + Sync {
    fn recognize(&self, text: &str, language: Language) -> Result<Vec<NerEntity>, NerError>;
}

/// A token with its character span in the source text.
///
/// Special tokens (`[CLS]`, `[SEP]`, padding) have no span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub span: Option<(usize, usize)>,
}

/// Model inputs for one sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub type_ids: Vec<i64>,
    pub tokens: Vec<Token>,
}

impl Encoding {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Turns text into model inputs, truncated to `max_len` tokens
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str, max_len: usize) -> Result<Encoding, NerError>;
}

/// Runs a token-classification model.
///
/// Returns row-major logits of shape `[encoding.len(), num_labels]`.
pub trait TokenClassifier: Send + Sync {
    fn classify(&self, encoding: &Encoding) -> Result<Vec<f32>, NerError>;
}
