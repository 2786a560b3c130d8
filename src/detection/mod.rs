//! Pattern recognizers for PII detection.
//!
//! Every recognizer owns one PII type and its own validity rule. A syntactic
//! match that fails validation never becomes a hit.

pub mod address;
pub mod credit_card;
pub mod dob;
pub mod email;
pub mod iban;
pub mod national_id;
pub mod phone;

pub use address::AddressRecognizer;
pub use credit_card::CreditCardRecognizer;
pub use dob::DobRecognizer;
pub use email::EmailRecognizer;
pub use iban::IbanRecognizer;
pub use national_id::NationalIdRecognizer;
pub use phone::{LibPhoneNumber, PhoneRecognizer, PhoneValidity, RegionHint};

use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Types of PII that can be detected
///
/// Tags produced outside the pattern recognizers (for example by an NER
/// model) are carried verbatim in [`PiiType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PiiType {
    NationalId,
    CreditCard,
    Iban,
    Dob,
    Address,
    Phone,
    Email,
    Person,
    Custom(String),
}

impl PiiType {
    /// Get the tag for this PII type
    pub fn as_str(&self) -> &str {
        match self {
            PiiType::NationalId => "NATIONAL_ID",
            PiiType::CreditCard => "CREDIT_CARD",
            PiiType::Iban => "IBAN",
            PiiType::Dob => "DOB",
            PiiType::Address => "ADDRESS",
            PiiType::Phone => "PHONE",
            PiiType::Email => "EMAIL",
            PiiType::Person => "PERSON",
            PiiType::Custom(tag) => tag,
        }
    }
}

impl From<&str> for PiiType {
    fn from(tag: &str) -> Self {
        const KNOWN: &[PiiType] = &[
            PiiType::NationalId,
            PiiType::CreditCard,
            PiiType::Iban,
            PiiType::Dob,
            PiiType::Address,
            PiiType::Phone,
            PiiType::Email,
            PiiType::Person,
        ];
        let tag = tag.trim();
        KNOWN
            .iter()
            .find(|known| known.as_str().eq_ignore_ascii_case(tag))
            .cloned()
            .unwrap_or_else(|| PiiType::Custom(tag.to_string()))
    }
}

impl From<String> for PiiType {
    fn from(tag: String) -> Self {
        PiiType::from(tag.as_str())
    }
}

impl From<PiiType> for String {
    fn from(pii_type: PiiType) -> Self {
        match pii_type {
            PiiType::Custom(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A located, validated occurrence of PII.
///
/// `start` and `length` count characters (Unicode scalar values) of the
/// analyzed text, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PiiHit {
    #[serde(rename = "type")]
    pub pii_type: PiiType,
    pub start: usize,
    pub length: usize,
}

impl PiiHit {
    pub fn new(pii_type: PiiType, start: usize, length: usize) -> Self {
        Self {
            pii_type,
            start,
            length,
        }
    }

    /// Exclusive end offset of the span
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// A recognizer for one PII type
pub trait Recognizer: Send + Sync {
    /// Type of the hits this recognizer produces
    fn pii_type(&self) -> PiiType;

    /// Find all validated occurrences in `text`
    fn analyze(&self, text: &str, language: Language) -> Vec<PiiHit>;
}

/// The fixed set of pattern recognizers, using the default phone validator
pub fn default_recognizers() -> Vec<Box<dyn Recognizer>> {
    vec![
        Box::new(EmailRecognizer::new()),
        Box::new(PhoneRecognizer::new()),
        Box::new(IbanRecognizer::new()),
        Box::new(CreditCardRecognizer::new()),
        Box::new(NationalIdRecognizer::new()),
        Box::new(DobRecognizer::new()),
        Box::new(AddressRecognizer::new()),
    ]
}

/// Converts byte offsets reported by `regex` into character offsets.
///
/// Lookups are cheapest when offsets arrive in increasing order, which is
/// how `find_iter` reports them.
pub(crate) struct CharCursor<'a> {
    text: &'a str,
    ascii: bool,
    byte: usize,
    chars: usize,
}

impl<'a> CharCursor<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            text,
            ascii: text.is_ascii(),
            byte: 0,
            chars: 0,
        }
    }

    pub(crate) fn char_index(&mut self, byte: usize) -> usize {
        if self.ascii {
            return byte;
        }
        if byte < self.byte {
            self.byte = 0;
            self.chars = 0;
        }
        self.chars += self.text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }

    /// Build a hit from a byte range of the text
    pub(crate) fn hit(&mut self, pii_type: PiiType, start: usize, end: usize) -> PiiHit {
        let start = self.char_index(start);
        let end = self.char_index(end);
        PiiHit::new(pii_type, start, end - start)
    }
}
