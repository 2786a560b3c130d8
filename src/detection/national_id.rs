//! Turkish national identity number (T.C. Kimlik No) recognizer.

use super::{CharCursor, PiiHit, PiiType, Recognizer};
use crate::language::Language;
use regex::Regex;

/// Validate the two check digits of an 11-digit identity number.
///
/// The 10th digit is `(7 * (d1 + d3 + d5 + d7 + d9) - (d2 + d4 + d6 + d8)) mod 10`
/// and the 11th is the sum of the first ten digits mod 10.
pub fn is_valid_national_id(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    if bytes.len() != 11 || !bytes.iter().all(u8::is_ascii_digit) || bytes[0] == b'0' {
        return false;
    }
    let d: Vec<i32> = bytes.iter().map(|b| i32::from(b - b'0')).collect();

    let odd = d[0] + d[2] + d[4] + d[6] + d[8];
    let even = d[1] + d[3] + d[5] + d[7];
    let tenth = (odd * 7 - even).rem_euclid(10);
    if d[9] != tenth {
        return false;
    }
    let eleventh = d[..10].iter().sum::<i32>() % 10;
    d[10] == eleventh
}

/// Detects national identity numbers; only active for Turkish text
pub struct NationalIdRecognizer {
    regex: Regex,
}

impl Default for NationalIdRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl NationalIdRecognizer {
    /// Locale the identity scheme belongs to
    pub const LANGUAGE: Language = Language::Turkish;

    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"\b[1-9][0-9]{10}\b").expect("Invalid national ID regex"),
        }
    }
}

impl Recognizer for NationalIdRecognizer {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn analyze(&self, text: &str, language: Language) -> Vec<PiiHit> {
        if language != Self::LANGUAGE {
            return Vec::new();
        }
        let mut cursor = CharCursor::new(text);
        self.regex
            .find_iter(text)
            .filter(|m| is_valid_national_id(m.as_str()))
            .map(|m| cursor.hit(PiiType::NationalId, m.start(), m.end()))
            .collect()
    }
}
