//! Address keyword recognizer.
//!
//! Deliberately coarse: every occurrence of a locale's street/building
//! marker is reported, without any structural check.

use super::{CharCursor, PiiHit, PiiType, Recognizer};
use crate::language::Language;

const TURKISH_KEYWORDS: &[&str] = &[
    "mah.", "mahalle", "cad.", "caddesi", "sok.", "sokak", "bulvar", "no:", "daire", "kat",
];

const ENGLISH_KEYWORDS: &[&str] = &[
    "street", "st.", "avenue", "ave", "road", "rd", "no.", "apartment", "zip", "suite",
];

/// Lowercase `text` one character at a time so character offsets are kept
fn fold_case(text: &str) -> String {
    text.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Detects address markers by case-insensitive substring search
#[derive(Debug, Default)]
pub struct AddressRecognizer;

impl AddressRecognizer {
    pub fn new() -> Self {
        Self
    }

    /// Keyword list for a language
    pub fn keywords(language: Language) -> &'static [&'static str] {
        match language {
            Language::Turkish => TURKISH_KEYWORDS,
            Language::English => ENGLISH_KEYWORDS,
        }
    }
}

impl Recognizer for AddressRecognizer {
    fn pii_type(&self) -> PiiType {
        PiiType::Address
    }

    fn analyze(&self, text: &str, language: Language) -> Vec<PiiHit> {
        let folded = fold_case(text);
        let mut cursor = CharCursor::new(&folded);
        let mut hits = Vec::new();
        for keyword in Self::keywords(language) {
            for (start, matched) in folded.match_indices(keyword) {
                hits.push(cursor.hit(PiiType::Address, start, start + matched.len()));
            }
        }
        hits
    }
}
