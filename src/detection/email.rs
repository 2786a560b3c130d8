//! Email address recognizer.

use super::{CharCursor, PiiHit, PiiType, Recognizer};
use crate::language::Language;
use regex::Regex;

/// Detects `local@domain.tld` shaped addresses. Validation is syntactic only.
pub struct EmailRecognizer {
    regex: Regex,
}

impl Default for EmailRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailRecognizer {
    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"(?i)[A-Z0-9._%+\-]+@[A-Z0-9.\-]+\.[A-Z]{2,}")
                .expect("Invalid email regex"),
        }
    }
}

impl Recognizer for EmailRecognizer {
    fn pii_type(&self) -> PiiType {
        PiiType::Email
    }

    fn analyze(&self, text: &str, _language: Language) -> Vec<PiiHit> {
        let mut cursor = CharCursor::new(text);
        self.regex
            .find_iter(text)
            .map(|m| cursor.hit(PiiType::Email, m.start(), m.end()))
            .collect()
    }
}
