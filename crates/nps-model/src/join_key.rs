//! Normalized identifier used to match source rows to lookup rows.
//!
//! The engine computes the same key in SQL; this type is the reference
//! behavior the SQL expression must agree with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Case-folded, whitespace-trimmed identifier.
///
/// Built from the first non-empty of `scale`, `test`, `test_name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JoinKey(String);

impl JoinKey {
    /// Normalizes a single identifier. Empty or whitespace-only input has no key.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_lowercase()))
        }
    }

    /// Applies the coalesce rule over the three identifier fields.
    pub fn from_identifiers(
        scale: Option<&str>,
        test: Option<&str>,
        test_name: Option<&str>,
    ) -> Option<Self> {
        [scale, test, test_name]
            .into_iter()
            .flatten()
            .find_map(Self::normalize)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JoinKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_share_a_key() {
        let keys: Vec<_> = ["Block Design", " block design ", "BLOCK DESIGN"]
            .into_iter()
            .map(JoinKey::normalize)
            .collect();
        assert!(keys.iter().all(|k| k.as_ref().map(JoinKey::as_str) == Some("block design")));
    }

    #[test]
    fn empty_fields_are_skipped() {
        let key = JoinKey::from_identifiers(Some("  "), None, Some("Trail Making Test"));
        assert_eq!(key.unwrap().as_str(), "trail making test");
        assert_eq!(JoinKey::from_identifiers(Some(""), Some(" "), None), None);
    }

    #[test]
    fn scale_takes_precedence() {
        let key = JoinKey::from_identifiers(Some("Digit Span"), Some("WAIS-IV"), None);
        assert_eq!(key.unwrap().as_str(), "digit span");
    }
}
