//! IBAN recognizer with registry length and MOD-97 validation.

use super::{CharCursor, PiiHit, PiiType, Recognizer};
use crate::language::Language;
use regex::Regex;

/// Total IBAN length per country
const IBAN_LENGTHS: &[(&str, usize)] = &[
    ("AL", 28), ("AD", 24), ("AT", 20), ("AZ", 28), ("BH", 22), ("BE", 16),
    ("BA", 20), ("BR", 29), ("BG", 22), ("CR", 22), ("HR", 21), ("CY", 28),
    ("CZ", 24), ("DK", 18), ("DO", 28), ("EE", 20), ("FO", 18), ("FI", 18),
    ("FR", 27), ("GE", 22), ("DE", 22), ("GI", 23), ("GR", 27), ("GL", 18),
    ("GT", 28), ("HU", 28), ("IS", 26), ("IE", 22), ("IL", 23), ("IT", 27),
    ("JO", 30), ("KZ", 20), ("KW", 30), ("LV", 21), ("LB", 28), ("LI", 21),
    ("LT", 20), ("LU", 20), ("MK", 19), ("MT", 31), ("MR", 27), ("MU", 30),
    ("MC", 27), ("MD", 24), ("ME", 22), ("NL", 18), ("NO", 15), ("PK", 24),
    ("PS", 29), ("PL", 28), ("PT", 25), ("QA", 29), ("RO", 24), ("SM", 27),
    ("SA", 24), ("RS", 22), ("SK", 24), ("SI", 19), ("ES", 24), ("SE", 24),
    ("CH", 21), ("TN", 24), ("TR", 26), ("AE", 23), ("GB", 22), ("VG", 24),
];

/// Shortest and longest IBAN any country uses
const MIN_LEN: usize = 15;
const MAX_LEN: usize = 34;

/// Expected IBAN length for a two-letter country code
pub fn expected_length(country: &str) -> Option<usize> {
    IBAN_LENGTHS
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, len)| *len)
}

/// Validate an IBAN: known country, exact length and MOD-97 remainder of 1.
///
/// Whitespace is ignored and letters may be in either case.
pub fn is_valid_iban(candidate: &str) -> bool {
    let iban: String = candidate
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !iban.is_ascii() || !(MIN_LEN..=MAX_LEN).contains(&iban.len()) {
        return false;
    }
    match expected_length(&iban[..2]) {
        Some(len) if len == iban.len() => mod97(&iban) == Some(1),
        _ => false,
    }
}

/// Move the first four characters to the end, expand letters to `10..=35`
/// and reduce the resulting decimal numeral modulo 97 digit by digit.
fn mod97(iban: &str) -> Option<u32> {
    let (head, tail) = iban.split_at(4);
    let mut remainder = 0u32;
    for c in tail.chars().chain(head.chars()) {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'A'..='Z' => c as u32 - 'A' as u32 + 10,
            _ => return None,
        };
        let shift = if value >= 10 { 100 } else { 10 };
        remainder = (remainder * shift + value) % 97;
    }
    Some(remainder)
}

/// Detects International Bank Account Numbers
pub struct IbanRecognizer {
    regex: Regex,
}

impl Default for IbanRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl IbanRecognizer {
    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"(?i)\b[A-Z]{2}[0-9]{2}[A-Z0-9]{11,30}\b")
                .expect("Invalid IBAN regex"),
        }
    }
}

impl Recognizer for IbanRecognizer {
    fn pii_type(&self) -> PiiType {
        PiiType::Iban
    }

    fn analyze(&self, text: &str, _language: Language) -> Vec<PiiHit> {
        let mut cursor = CharCursor::new(text);
        self.regex
            .find_iter(text)
            .filter(|m| is_valid_iban(m.as_str()))
            .map(|m| cursor.hit(PiiType::Iban, m.start(), m.end()))
            .collect()
    }
}
