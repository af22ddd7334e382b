//! Title-year-volume bases.

use super::{IssnIndex, LoaderConfig, line_of, push_unique, require_columns, table_reader};
use crate::regression::synthetic::SyntheticRow;
use crate::utils::{parse_volume, parse_year};
use crate::{Issn, NormalizedTitle, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

/// Origin of a year-volume base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseKind {
    /// Observed in citation-index and Crossref metadata
    Empirical,
    /// Generated from regression predictions
    Synthetic,
}

/// Composite key of a year-volume base, used as match provenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct YearVolumeKey {
    pub title: NormalizedTitle,
    pub year: i32,
    pub volume: u32,
}

impl YearVolumeKey {
    pub fn new(title: NormalizedTitle, year: i32, volume: u32) -> Self {
        Self {
            title,
            year,
            volume,
        }
    }
}

impl fmt::Display for YearVolumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.title, self.year, self.volume)
    }
}

/// Maps (normalized title, year, volume) to the ISSN-Ls published under that title
/// with that volume in that year.
#[derive(Debug, Clone)]
pub struct YearVolumeIndex {
    kind: BaseKind,
    entries: HashMap<NormalizedTitle, HashMap<(i32, u32), Vec<Issn>>>,
    keys: usize,
    skipped: usize,
}

impl Default for YearVolumeIndex {
    fn default() -> Self {
        Self::new(BaseKind::Empirical)
    }
}

impl YearVolumeIndex {
    /// Creates an empty index.
    pub fn new(kind: BaseKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            keys: 0,
            skipped: 0,
        }
    }

    /// Reads `issn|title|year|volume[|extra]` rows.
    ///
    /// Row ISSNs are mapped to their ISSN-L through `issns`. Rows whose year or volume
    /// cannot be read are skipped.
    pub fn from_reader<R: Read>(
        reader: R,
        base_name: &str,
        kind: BaseKind,
        issns: &IssnIndex,
        config: &LoaderConfig,
    ) -> Result<Self> {
        let mut index = Self::new(kind);
        let mut reader = table_reader(reader, b'|', config);

        for result in reader.records() {
            let record = result?;
            require_columns(&record, 4, base_name)?;

            let title = NormalizedTitle::new(&record[1]);
            let year = parse_year(&record[2]);
            let volume = parse_volume(&record[3]);

            match (year, volume) {
                (Some(year), Some(volume)) if !title.is_empty() && !record[0].trim().is_empty() => {
                    index.insert(title, year, volume, issns.issnl_or_self(&record[0]));
                }
                _ => {
                    index.skipped += 1;
                    tracing::debug!(
                        base = base_name,
                        line = line_of(&record),
                        "skipping year-volume row"
                    );
                }
            }
        }

        if index.skipped > 0 {
            tracing::info!(
                base = base_name,
                skipped = index.skipped,
                "year-volume rows without usable year or volume"
            );
        }

        Ok(index)
    }

    /// Materializes generated rows into a synthetic index.
    pub fn from_synthetic_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = SyntheticRow>,
    {
        let mut index = Self::new(BaseKind::Synthetic);
        for row in rows {
            index.insert(row.title, row.year, row.volume, row.issnl);
        }
        index
    }

    fn insert(&mut self, title: NormalizedTitle, year: i32, volume: u32, issnl: Issn) {
        let issnls = self
            .entries
            .entry(title)
            .or_default()
            .entry((year, volume))
            .or_default();
        if issnls.is_empty() {
            self.keys += 1;
        }
        push_unique(issnls, issnl);
    }

    /// ISSN-Ls recorded under a key; empty when the key is unknown.
    pub fn get(&self, title: &str, year: i32, volume: u32) -> &[Issn] {
        self.entries
            .get(title)
            .and_then(|by_year_volume| by_year_volume.get(&(year, volume)))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> BaseKind {
        self.kind
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }

    /// Number of rows skipped while loading.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
