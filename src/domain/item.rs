//! Payload types produced by providers.
//!
//! A payload is either a sequence of items (news articles, IPO listings,
//! earnings events) or a structured table (index levels, FX rates). Only
//! item payloads participate in merge-with-dedup resolution.

use serde::{Deserialize, Serialize};

/// One content item from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Primary text field, used for deduplication
    pub title: String,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub url: String,

    /// ISO 8601 publication time, empty if the source omits it
    #[serde(default)]
    pub published_at: String,

    /// Which provider produced this item
    #[serde(default)]
    pub source: String,
}

impl Item {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: String::new(),
            url: String::new(),
            published_at: String::new(),
            source: source.into(),
        }
    }
}

/// Resolved data for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "data")]
pub enum Payload {
    /// Deduplicable item sequence
    Items(Vec<Item>),

    /// Structured snapshot (e.g. index levels keyed by symbol)
    Table(serde_json::Value),
}

impl Payload {
    /// Empty item payload, used for a stage entry after failure.
    pub fn empty() -> Self {
        Self::Items(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Items(items) => items.is_empty(),
            Self::Table(value) => value.is_null(),
        }
    }

    /// Item view of this payload, None for tables.
    pub fn items(&self) -> Option<&[Item]> {
        match self {
            Self::Items(items) => Some(items),
            Self::Table(_) => None,
        }
    }

    /// Short human-readable size description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Items(items) => format!("{} items", items.len()),
            Self::Table(_) => "table".to_string(),
        }
    }
}

/// Normalization key for item deduplication.
///
/// Lower-cases the primary text, strips punctuation, collapses whitespace,
/// and truncates to a 60-character prefix, so that titles differing only in
/// case, punctuation, or spacing within that prefix collide.
pub fn dedup_key(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(60)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_case_and_punctuation() {
        let a = dedup_key("RBI Hikes Rates Again As Inflation Climbs");
        let b = dedup_key("rbi hikes rates again as inflation climbs!!");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dedup_key_whitespace_collapse() {
        assert_eq!(
            dedup_key("  Nifty   closes\tflat "),
            dedup_key("Nifty closes flat")
        );
    }

    #[test]
    fn test_dedup_key_prefix_length() {
        let long = "x".repeat(200);
        assert_eq!(dedup_key(&long).chars().count(), 60);
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = Payload::Items(vec![Item::new("Sensex up 1%", "rss")]);
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_empty_payload() {
        assert!(Payload::empty().is_empty());
        assert!(Payload::Table(serde_json::Value::Null).is_empty());
        assert!(!Payload::Items(vec![Item::new("t", "s")]).is_empty());
    }
}
