//! Phone number recognizer.
//!
//! Candidate runs are found with a loose pattern and handed to a phone
//! number library, which has the final say on validity.

use super::{CharCursor, PiiHit, PiiType, Recognizer};
use crate::language::Language;
use phonenumber::country;
use regex::Regex;
use std::sync::Arc;

/// How a candidate number should be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionHint {
    /// The candidate carries its own `+` country code
    International,
    /// No country code and no locale to infer one from
    Unknown,
}

/// Phone number validity oracle
pub trait PhoneValidity: Send + Sync {
    fn is_valid(&self, candidate: &str, region: RegionHint) -> bool;
}

/// [`PhoneValidity`] backed by the `phonenumber` crate (libphonenumber metadata)
#[derive(Debug, Clone, Copy, Default)]
pub struct LibPhoneNumber {
    default_region: Option<country::Id>,
}

impl LibPhoneNumber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve numbers without a country code against `region`
    pub fn with_default_region(region: country::Id) -> Self {
        Self {
            default_region: Some(region),
        }
    }
}

impl PhoneValidity for LibPhoneNumber {
    fn is_valid(&self, candidate: &str, region: RegionHint) -> bool {
        let country = match region {
            RegionHint::International => None,
            RegionHint::Unknown => self.default_region,
        };
        match phonenumber::parse(country, candidate) {
            Ok(number) => phonenumber::is_valid(&number),
            Err(_) => false,
        }
    }
}

/// Detects phone numbers
pub struct PhoneRecognizer {
    regex: Regex,
    validity: Arc<dyn PhoneValidity>,
}

impl Default for PhoneRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhoneRecognizer {
    pub fn new() -> Self {
        Self::with_validity(Arc::new(LibPhoneNumber::new()))
    }

    pub fn with_validity(validity: Arc<dyn PhoneValidity>) -> Self {
        Self {
            // At least 8 characters on one line, first and last a digit
            regex: Regex::new(r"\+?[0-9][0-9 \t\-()]{6,}[0-9]").expect("Invalid phone regex"),
            validity,
        }
    }
}

impl Recognizer for PhoneRecognizer {
    fn pii_type(&self) -> PiiType {
        PiiType::Phone
    }

    fn analyze(&self, text: &str, _language: Language) -> Vec<PiiHit> {
        let mut cursor = CharCursor::new(text);
        let mut hits = Vec::new();
        for m in self.regex.find_iter(text) {
            let candidate = m.as_str();
            let region = if candidate.starts_with('+') {
                RegionHint::International
            } else {
                RegionHint::Unknown
            };
            if self.validity.is_valid(candidate, region) {
                hits.push(cursor.hit(PiiType::Phone, m.start(), m.end()));
            }
        }
        hits
    }
}
