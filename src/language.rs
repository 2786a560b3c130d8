//! Language detection for locale-specific recognizers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters that only occur in Turkish among the supported languages
const TURKISH_CHARS: &[char] = &['ğ', 'Ğ', 'ş', 'Ş', 'ı', 'İ', 'ç', 'Ç', 'ö', 'Ö', 'ü', 'Ü'];

/// Language of the analyzed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "tr")]
    Turkish,
}

impl Language {
    /// Get the language tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Turkish => "tr",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "tr" | "turkish" => Ok(Language::Turkish),
            _ => Err(format!("Invalid language: {}", s)),
        }
    }
}

/// Parse a language setting where `auto` (or an empty string) means detect
pub fn parse_language_setting(s: &str) -> Result<Option<Language>, String> {
    match s.trim() {
        "" => Ok(None),
        auto if auto.eq_ignore_ascii_case("auto") => Ok(None),
        other => other.parse().map(Some),
    }
}

/// Guess the language of `text`.
///
/// Any Turkish-specific letter makes the text Turkish; everything else,
/// including empty text, falls back to English.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| TURKISH_CHARS.contains(&c)) {
        Language::Turkish
    } else {
        Language::English
    }
}
