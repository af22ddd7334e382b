//! Journal title normalization.
//!
//! Correction bases and incoming citations are joined on the normalized form of a
//! journal title, so the same function must be applied on both sides.
//!
//! # Example
//!
//! ```
//! use issnl_match::{normalize, NormalizedTitle};
//!
//! assert_eq!(normalize("Rev. Saúde Pública"), "REV SAUDE PUBLICA");
//!
//! let title = NormalizedTitle::new("Cad. saúde pública / Ministério da Saúde");
//! assert_eq!(title.as_str(), "CAD SAUDE PUBLICA MINISTERIO DA SAUDE");
//! assert_eq!(title.words().count(), 6);
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Normalizes a raw journal title.
///
/// Decomposes the text (NFKD) and drops every character that is not ASCII afterwards,
/// which strips diacritics. Every remaining non-alphanumeric character becomes a space,
/// space runs are collapsed, the result is trimmed and upper-cased.
///
/// The function is total and idempotent.
pub fn normalize(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());

    for c in raw.nfkd().filter(char::is_ascii) {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_uppercase());
        } else if !result.is_empty() && !result.ends_with(' ') {
            result.push(' ');
        }
    }

    if result.ends_with(' ') {
        result.pop();
    }

    result
}

/// A journal title in normalized form, the join key of every correction base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedTitle(String);

impl NormalizedTitle {
    /// Normalizes `raw` into a title key.
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The space-separated words of the title.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.0.split(' ').filter(|w| !w.is_empty())
    }

    /// The first word of the title, if any.
    pub fn first_word(&self) -> Option<&str> {
        self.words().next()
    }
}

impl fmt::Display for NormalizedTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NormalizedTitle {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NormalizedTitle {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
