//! Redaction of detected spans.
//!
//! Replacements are computed from the original text and the output is
//! assembled in one pass, so a style that changes span length (hash) never
//! shifts the offsets of other spans.

use crate::detection::{PiiHit, PiiType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Character used by the masking styles
pub const MASK_CHAR: char = '*';

/// Number of hex characters kept from the digest in hash style
pub const HASH_TOKEN_LEN: usize = 12;

/// Characters kept at each end of a span in partial style
const PARTIAL_KEEP: usize = 2;

/// How a redacted span is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedactionStyle {
    /// Every character becomes `*`
    #[default]
    MaskAll,
    /// First and last two characters kept, the rest masked
    Partial,
    /// Span replaced by a 12-character SHA-256 token
    Hash,
}

impl std::str::FromStr for RedactionStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(&['-', '_'][..], "").as_str() {
            "maskall" | "mask" => Ok(RedactionStyle::MaskAll),
            "partial" => Ok(RedactionStyle::Partial),
            "hash" => Ok(RedactionStyle::Hash),
            _ => Err(format!("Invalid redaction style: {}", s)),
        }
    }
}

/// Which hits get redacted, and how
#[derive(Debug, Clone, PartialEq)]
pub struct RedactionPolicy {
    pub style: RedactionStyle,
    pub redactable_types: BTreeSet<PiiType>,
    /// Risk at or above which callers should redact
    pub threshold: f64,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            style: RedactionStyle::MaskAll,
            redactable_types: default_redactable_types(),
            threshold: 0.0,
        }
    }
}

/// Types redacted unless configured otherwise
pub fn default_redactable_types() -> BTreeSet<PiiType> {
    BTreeSet::from([
        PiiType::Email,
        PiiType::Phone,
        PiiType::NationalId,
        PiiType::CreditCard,
        PiiType::Iban,
        PiiType::Dob,
    ])
}

/// Redaction spans in character offsets, ordered by descending start.
///
/// Hits of other types, empty hits and hits reaching past the end of the
/// text are dropped. Ties on start go to the longer span first. Spans that
/// share at least one character are coalesced into their union; spans that
/// only touch stay separate.
pub fn plan(text_chars: usize, hits: &[PiiHit], policy: &RedactionPolicy) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = hits
        .iter()
        .filter(|h| policy.redactable_types.contains(&h.pii_type))
        .filter_map(|h| {
            let end = h.start.checked_add(h.length)?;
            (h.length > 0 && end <= text_chars).then_some((h.start, end))
        })
        .collect();
    spans.sort_by(|a, b| b.0.cmp(&a.0).then((b.1 - b.0).cmp(&(a.1 - a.0))));

    // Walk upwards so a merged span can keep absorbing later ones
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans.into_iter().rev() {
        match merged.last_mut() {
            Some(last) if start < last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged.reverse();
    merged
}

/// Rewrite `text`, redacting every hit the policy selects
pub fn redact(text: &str, hits: &[PiiHit], policy: &RedactionPolicy) -> String {
    let chars: Vec<char> = text.chars().collect();
    let spans = plan(chars.len(), hits, policy);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;
    for &(start, end) in spans.iter().rev() {
        result.extend(&chars[last_end..start]);
        result.push_str(&replacement(&chars[start..end], policy.style));
        last_end = end;
    }
    result.extend(&chars[last_end..]);
    result
}

/// Replacement text for one span
fn replacement(span: &[char], style: RedactionStyle) -> String {
    match style {
        RedactionStyle::MaskAll => std::iter::repeat(MASK_CHAR).take(span.len()).collect(),
        RedactionStyle::Partial => {
            let len = span.len();
            span.iter()
                .enumerate()
                .map(|(i, &c)| {
                    if i < PARTIAL_KEEP || i + PARTIAL_KEEP >= len {
                        c
                    } else {
                        MASK_CHAR
                    }
                })
                .collect()
        }
        RedactionStyle::Hash => {
            let segment: String = span.iter().collect();
            let digest = hex::encode_upper(Sha256::digest(segment.as_bytes()));
            digest[..HASH_TOKEN_LEN].to_string()
        }
    }
}
