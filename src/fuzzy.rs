//! Order-preserving fuzzy title matching.
//!
//! Abbreviated citations such as `REV SAUDE PUBL` are matched against official titles
//! that contain the query words in the same order, each word possibly extended or
//! separated by other words, with the first word anchored at the start.
//!
//! # Example
//!
//! ```
//! use issnl_match::NormalizedTitle;
//! use issnl_match::fuzzy::{FuzzyConfig, FuzzyMatcher};
//! use issnl_match::index::TitleIndex;
//!
//! let titles = TitleIndex::from_entries([
//!     ("REVISTA DE SAUDE PUBLICA", vec!["0034-8910"]),
//!     ("REVISTA BRASILEIRA DE EPIDEMIOLOGIA", vec!["1415-790X"]),
//! ]);
//! let matcher = FuzzyMatcher::new(&titles, FuzzyConfig::default());
//!
//! let found = matcher.match_title(&NormalizedTitle::new("Rev. Saúde Públ."));
//! assert_eq!(found, vec!["0034-8910"]);
//! ```

use crate::index::{TitleIndex, push_unique};
use crate::{Issn, NormalizedTitle};
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Guards applied to a title before fuzzy matching is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Minimum length of the normalized title
    pub min_title_length: usize,
    /// Minimum number of words
    pub min_words: usize,
    /// Length a word needs to count as comparable
    pub min_word_length: usize,
    /// Minimum number of comparable words
    pub min_comparable_words: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            min_title_length: 6,
            min_words: 2,
            min_word_length: 2,
            min_comparable_words: 2,
        }
    }
}

impl FuzzyConfig {
    /// Whether a title carries enough signal for fuzzy matching.
    pub fn accepts(&self, title: &NormalizedTitle) -> bool {
        let words: Vec<&str> = title.words().collect();
        let comparable = words
            .iter()
            .filter(|w| w.len() >= self.min_word_length)
            .count();

        title.len() >= self.min_title_length
            && words.len() >= self.min_words
            && comparable >= self.min_comparable_words
    }
}

/// Fuzzy matcher over the official titles of a [`TitleIndex`].
#[derive(Debug)]
pub struct FuzzyMatcher<'a> {
    titles: &'a TitleIndex,
    by_first_word: BTreeMap<&'a str, Vec<&'a NormalizedTitle>>,
    config: FuzzyConfig,
}

impl<'a> FuzzyMatcher<'a> {
    /// Indexes the official titles by their first word.
    pub fn new(titles: &'a TitleIndex, config: FuzzyConfig) -> Self {
        let mut by_first_word: BTreeMap<&'a str, Vec<&'a NormalizedTitle>> = BTreeMap::new();
        for (title, _) in titles.iter() {
            if let Some(first) = title.first_word() {
                by_first_word.entry(first).or_default().push(title);
            }
        }
        for group in by_first_word.values_mut() {
            group.sort_unstable();
        }

        Self {
            titles,
            by_first_word,
            config,
        }
    }

    pub fn config(&self) -> &FuzzyConfig {
        &self.config
    }

    /// Anchored pattern requiring the words of `title` in order.
    pub fn pattern(title: &NormalizedTitle) -> String {
        let words = title.words().map(regex::escape).join(r"[\w\s]*");
        format!(r"^{words}[\w\s]*$")
    }

    /// Official titles matching `title`, sorted.
    pub fn matching_titles(&self, title: &NormalizedTitle) -> Vec<&'a NormalizedTitle> {
        if !self.config.accepts(title) {
            tracing::trace!(title = %title, "title rejected for fuzzy matching");
            return Vec::new();
        }
        let Some(first) = title.first_word() else {
            return Vec::new();
        };

        let pattern = Self::pattern(title);
        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(err) => {
                tracing::debug!(pattern = %pattern, error = %err, "invalid fuzzy pattern");
                return Vec::new();
            }
        };

        self.by_first_word
            .range::<str, _>((Bound::Included(first), Bound::Unbounded))
            .take_while(|(word, _)| word.starts_with(first))
            .flat_map(|(_, group)| group.iter().copied())
            .filter(|official| regex.is_match(official.as_str()))
            .collect()
    }

    /// Ordered union of the ISSN-Ls of every official title matching `title`.
    pub fn match_title(&self, title: &NormalizedTitle) -> Vec<Issn> {
        let mut issnls = Vec::new();
        for official in self.matching_titles(title) {
            for issnl in self.titles.get(official.as_str()).unwrap_or_default() {
                push_unique(&mut issnls, issnl.clone());
            }
        }

        tracing::trace!(title = %title, matches = issnls.len(), "fuzzy match");
        issnls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn titles() -> TitleIndex {
        TitleIndex::from_entries([
            ("REVISTA DE SAUDE PUBLICA", vec!["0034-8910"]),
            ("REVISTA SAUDE PUBLICA SANTA CATARINA", vec!["1983-3733"]),
            ("REVISTA BRASILEIRA DE SAUDE PUBLICA", vec!["2222-3333"]),
            ("CADERNOS DE SAUDE PUBLICA", vec!["0102-311X"]),
            ("REV SAUDE", vec!["4444-5555", "0034-8910"]),
        ])
    }

    #[test]
    fn test_pattern() {
        let title = NormalizedTitle::new("Rev Saude Publ");
        assert_eq!(
            FuzzyMatcher::pattern(&title),
            r"^REV[\w\s]*SAUDE[\w\s]*PUBL[\w\s]*$"
        );
    }

    #[test]
    fn test_match_title_keeps_word_order() {
        let titles = titles();
        let matcher = FuzzyMatcher::new(&titles, FuzzyConfig::default());

        let found = matcher.match_title(&NormalizedTitle::new("Rev. Saúde Públ."));
        assert_eq!(found, vec!["2222-3333", "0034-8910", "1983-3733"]);

        let found = matcher.match_title(&NormalizedTitle::new("Publ Saude Rev"));
        assert!(found.is_empty());
    }

    #[test]
    fn test_first_word_is_anchored() {
        let titles = titles();
        let matcher = FuzzyMatcher::new(&titles, FuzzyConfig::default());

        let found = matcher.match_title(&NormalizedTitle::new("Cad Saude Publ"));
        assert_eq!(found, vec!["0102-311X"]);

        // SAUDE is never the first word of an official title
        assert!(matcher.match_title(&NormalizedTitle::new("Saude Publica")).is_empty());
    }

    #[test]
    fn test_union_is_deduplicated() {
        let titles = titles();
        let matcher = FuzzyMatcher::new(&titles, FuzzyConfig::default());

        let found = matcher.match_title(&NormalizedTitle::new("Rev Sau"));
        assert_eq!(found, vec!["4444-5555", "0034-8910", "2222-3333", "1983-3733"]);
    }

    #[rstest]
    #[case("REV")]
    #[case("R S P")]
    #[case("REV S")]
    #[case("CAD")]
    #[case("")]
    fn test_weak_titles_are_rejected(#[case] raw: &str) {
        let titles = titles();
        let matcher = FuzzyMatcher::new(&titles, FuzzyConfig::default());
        assert!(matcher.match_title(&NormalizedTitle::new(raw)).is_empty());
    }

    #[test]
    fn test_accepts() {
        let config = FuzzyConfig::default();
        assert!(config.accepts(&NormalizedTitle::new("Rev Saude")));
        assert!(!config.accepts(&NormalizedTitle::new("Rev S P")));

        let relaxed = FuzzyConfig {
            min_comparable_words: 1,
            ..FuzzyConfig::default()
        };
        assert!(relaxed.accepts(&NormalizedTitle::new("Rev S P")));
    }
}
