//! Payment card recognizer with Luhn and issuer validation.

use super::{CharCursor, PiiHit, PiiType, Recognizer};
use crate::language::Language;
use regex::Regex;

/// Luhn checksum over a string of ASCII digits
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, b) in digits.bytes().rev().enumerate() {
        if !b.is_ascii_digit() {
            return false;
        }
        let mut n = u32::from(b - b'0');
        if i % 2 == 1 {
            n *= 2;
            if n > 9 {
                n -= 9;
            }
        }
        sum += n;
    }
    !digits.is_empty() && sum % 10 == 0
}

/// Card networks recognized by prefix and length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardIssuer {
    Visa,
    Mastercard,
    Amex,
}

/// Identify the issuer of a digit string, if it is a known combination
pub fn card_issuer(digits: &str) -> Option<CardIssuer> {
    let prefix = |n: usize| digits.get(..n).and_then(|p| p.parse::<u32>().ok());
    match digits.len() {
        16 if digits.starts_with('4') => Some(CardIssuer::Visa),
        16 => {
            let two = prefix(2)?;
            let four = prefix(4)?;
            ((51..=55).contains(&two) || (2221..=2720).contains(&four))
                .then_some(CardIssuer::Mastercard)
        }
        15 if digits.starts_with("34") || digits.starts_with("37") => Some(CardIssuer::Amex),
        _ => None,
    }
}

/// Detects card numbers written with optional spaces or dashes
pub struct CreditCardRecognizer {
    regex: Regex,
}

impl Default for CreditCardRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CreditCardRecognizer {
    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"\b(?:[0-9][ \-]*?){13,19}\b")
                .expect("Invalid credit card regex"),
        }
    }
}

impl Recognizer for CreditCardRecognizer {
    fn pii_type(&self) -> PiiType {
        PiiType::CreditCard
    }

    fn analyze(&self, text: &str, _language: Language) -> Vec<PiiHit> {
        let mut cursor = CharCursor::new(text);
        let mut hits = Vec::new();
        for m in self.regex.find_iter(text) {
            let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
            if !(13..=19).contains(&digits.len()) {
                continue;
            }
            if luhn_valid(&digits) && card_issuer(&digits).is_some() {
                hits.push(cursor.hit(PiiType::CreditCard, m.start(), m.end()));
            }
        }
        hits
    }
}
