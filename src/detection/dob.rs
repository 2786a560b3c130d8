//! Date-of-birth recognizer.

use super::{CharCursor, PiiHit, PiiType, Recognizer};
use crate::language::Language;
use regex::Regex;

/// Detects dates written year-first or year-last with `-`, `/` or `.`
/// separators. No calendar validation is done.
pub struct DobRecognizer {
    regex: Regex,
}

impl Default for DobRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DobRecognizer {
    pub fn new() -> Self {
        Self {
            regex: Regex::new(
                r"\b(?:[0-9]{4}[-/.][0-9]{1,2}[-/.][0-9]{1,2}|[0-9]{1,2}[-/.][0-9]{1,2}[-/.][0-9]{4})\b",
            )
            .expect("Invalid date of birth regex"),
        }
    }
}

impl Recognizer for DobRecognizer {
    fn pii_type(&self) -> PiiType {
        PiiType::Dob
    }

    fn analyze(&self, text: &str, _language: Language) -> Vec<PiiHit> {
        let mut cursor = CharCursor::new(text);
        self.regex
            .find_iter(text)
            .map(|m| cursor.hit(PiiType::Dob, m.start(), m.end()))
            .collect()
    }
}
