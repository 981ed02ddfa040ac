//! Progress cursors
//!
//! Two regimes coexist: legacy change-feed sequence tokens and wall-clock
//! timestamps. Timestamps are preferred; sequence tokens remain readable so
//! older checkpoints keep working while stores migrate.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque change-feed position assigned by the document store
///
/// Clustered stores hand out non-numeric tokens; those are never compared
/// numerically. Numeric tokens compare, and are equal, by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceToken(String);

impl SequenceToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The "nothing processed yet" token
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Zero sentinel (`"0"` or empty)
    pub fn is_zero(&self) -> bool {
        self.0.is_empty() || self.as_number() == Some(0)
    }

    /// Numeric value, if the token is numeric
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Whether this token lies beyond `max`
    ///
    /// Only numeric tokens can exceed anything.
    pub fn exceeds(&self, max: &SequenceToken) -> bool {
        match (self.as_number(), max.as_number()) {
            (Some(mine), Some(limit)) => mine > limit,
            _ => false,
        }
    }
}

impl Ord for SequenceToken {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialEq for SequenceToken {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SequenceToken {}

impl Hash for SequenceToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.as_number() {
            Some(n) => n.hash(state),
            None => self.0.hash(state),
        }
    }
}

impl PartialOrd for SequenceToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How far an export index has been processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cursor {
    /// Change-feed token (legacy)
    Sequence(SequenceToken),
    /// Snapshot time of the run that produced the checkpoint
    Timestamp(DateTime<Utc>),
}

impl Cursor {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Cursor::Timestamp(t) => Some(*t),
            Cursor::Sequence(_) => None,
        }
    }

    pub fn sequence(&self) -> Option<&SequenceToken> {
        match self {
            Cursor::Sequence(token) => Some(token),
            Cursor::Timestamp(_) => None,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Sequence(token) => write!(f, "seq:{token}"),
            Cursor::Timestamp(t) => write!(f, "ts:{}", t.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sentinel() {
        assert!(SequenceToken::zero().is_zero());
        assert!(SequenceToken::new("").is_zero());
        assert!(!SequenceToken::new("10").is_zero());
    }

    #[test]
    fn test_exceeds_only_numeric() {
        let max = SequenceToken::new("100");
        assert!(SequenceToken::new("101").exceeds(&max));
        assert!(!SequenceToken::new("100").exceeds(&max));
        assert!(!SequenceToken::new("9-g1AAAA").exceeds(&max));
        assert!(!SequenceToken::new("500").exceeds(&SequenceToken::new("12-abc")));
    }

    #[test]
    fn test_numeric_ordering() {
        let mut tokens = vec![
            SequenceToken::new("10"),
            SequenceToken::new("9"),
            SequenceToken::new("100"),
        ];
        tokens.sort();
        let ordered: Vec<&str> = tokens.iter().map(SequenceToken::as_str).collect();
        assert_eq!(ordered, ["9", "10", "100"]);
    }

    #[test]
    fn test_equality_agrees_with_ordering() {
        use std::collections::HashSet;

        let padded = SequenceToken::new("010");
        let plain = SequenceToken::new("10");
        assert_eq!(padded.cmp(&plain), Ordering::Equal);
        assert_eq!(padded, plain);
        assert_eq!(HashSet::from([padded, plain]).len(), 1);
        assert!(SequenceToken::new("00").is_zero());
        assert_ne!(SequenceToken::new("1-abc"), SequenceToken::new("1-abd"));
    }

    #[test]
    fn test_cursor_serde_shape() {
        let cursor = Cursor::Sequence(SequenceToken::new("42"));
        let value = serde_json::to_value(&cursor).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "sequence", "value": "42"}));
        let back: Cursor = serde_json::from_value(value).unwrap();
        assert_eq!(back, cursor);
    }
}
