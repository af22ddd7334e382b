//! Title → ISSN-L base.

use super::{LoaderConfig, push_unique, require_columns, table_reader};
use crate::utils::{split_values, standardize_issn};
use crate::{Issn, NormalizedTitle, Result};
use std::collections::HashMap;
use std::io::Read;

/// Maps each normalized title to the ISSN-Ls that carry it, in row order.
///
/// A title with more than one ISSN-L is a homonym and needs disambiguation.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    entries: HashMap<NormalizedTitle, Vec<Issn>>,
}

impl TitleIndex {
    /// Reads `normalizedTitle <TAB> issnl1#issnl2#...` rows.
    pub fn from_reader<R: Read>(reader: R, base_name: &str, config: &LoaderConfig) -> Result<Self> {
        let mut index = Self::default();
        let mut reader = table_reader(reader, b'\t', config);

        for result in reader.records() {
            let record = result?;
            require_columns(&record, 2, base_name)?;

            let title = NormalizedTitle::new(&record[0]);
            if title.is_empty() {
                tracing::debug!(base = base_name, "skipping row with empty title");
                continue;
            }

            let issnls = index.entries.entry(title).or_default();
            for issnl in split_values(&record[1], '#') {
                push_unique(issnls, standardize_issn(issnl));
            }
        }

        Ok(index)
    }

    /// Builds an index from `(title, issnls)` pairs.
    pub fn from_entries<'a, I, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, T)>,
        T: IntoIterator<Item = &'a str>,
    {
        let mut index = Self::default();
        for (title, issnls) in entries {
            let list = index.entries.entry(NormalizedTitle::new(title)).or_default();
            for issnl in issnls {
                push_unique(list, standardize_issn(issnl));
            }
        }
        index
    }

    /// ISSN-Ls of an already normalized title.
    pub fn get(&self, title: &str) -> Option<&[Issn]> {
        self.entries.get(title).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NormalizedTitle, &[Issn])> {
        self.entries.iter().map(|(title, issnls)| (title, issnls.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
