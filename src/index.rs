//! Correction bases loader.
//!
//! Builds the read-only lookup structures consumed by the matching engine from the flat
//! tables produced by the offline construction pipelines:
//!
//! | Base | Row format |
//! |---|---|
//! | Title → ISSN-L | `normalizedTitle <TAB> issnl1#issnl2#...` |
//! | ISSN-L → all | `issnl \| issn1#issn2#... \| title1#title2#...` |
//! | Year-volume (empirical and synthetic) | `issn\|title\|year\|volume[\|extra]` |
//! | Equations | `entityKey\|a\|b\|r2` |
//!
//! # Example
//!
//! ```no_run
//! use issnl_match::{BasePaths, ConflictPolicy, CorrectionBases, LoaderConfig};
//!
//! let paths = BasePaths::new("title_to_issnl.tsv", "issnl_to_all.csv", "year_volume.csv")
//!     .with_issn_base("issnl_to_all_latindex.csv")
//!     .with_equations("equations_issnl.csv");
//!
//! let mut config = LoaderConfig::default();
//! config.set_conflict_policy(ConflictPolicy::FirstSeen);
//!
//! let bases = CorrectionBases::load(&paths, &config).unwrap();
//! println!("{} titles", bases.titles().len());
//! ```
//!
//! # Conflict Resolution
//!
//! The same ISSN may be assigned to different ISSN-Ls by different source bases. ISSN
//! bases are read in the order given by [`BasePaths::issn_bases`], which therefore works
//! as a priority list, and conflicts are settled by the configured [`ConflictPolicy`].
//! Every conflict is logged as a warning.

mod equations;
mod issn;
mod title;
mod year_volume;

pub use equations::{EquationIndex, standardize_key};
pub use issn::{IssnEntry, IssnIndex};
pub use title::TitleIndex;
pub use year_volume::{BaseKind, YearVolumeIndex, YearVolumeKey};

use crate::regression::{RegressionConfig, RegressionEquation};
use crate::{Issn, MatchError, Result};
use csv_crate::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Policy applied when two source rows assign the same ISSN to different ISSN-Ls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the mapping seen first; earlier bases take precedence.
    #[default]
    FirstSeen,
    /// Replace the mapping with the one seen last; later bases take precedence.
    LastSeen,
}

/// Options controlling how the correction bases are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Whether every table starts with a header row
    pub has_headers: bool,
    /// Resolution of ISSN → ISSN-L conflicts
    pub conflict_policy: ConflictPolicy,
    /// Reliability threshold applied to loaded equations
    pub regression: RegressionConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            has_headers: false,
            conflict_policy: ConflictPolicy::FirstSeen,
            regression: RegressionConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Sets whether tables start with a header row
    pub fn set_has_headers(&mut self, has_headers: bool) -> &mut Self {
        self.has_headers = has_headers;
        self
    }

    /// Sets the ISSN conflict policy
    pub fn set_conflict_policy(&mut self, policy: ConflictPolicy) -> &mut Self {
        self.conflict_policy = policy;
        self
    }

    /// Sets the regression settings
    pub fn set_regression(&mut self, regression: RegressionConfig) -> &mut Self {
        self.regression = regression;
        self
    }
}

/// Locations of the correction bases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasePaths {
    /// Title → ISSN-L base
    pub title_to_issnl: PathBuf,
    /// ISSN-L → all bases, in priority order
    pub issn_bases: Vec<PathBuf>,
    /// Empirical title-year-volume base
    pub year_volume: PathBuf,
    /// Synthetic title-year-volume base
    pub synthetic_year_volume: Option<PathBuf>,
    /// Regression equations
    pub equations: Option<PathBuf>,
}

impl BasePaths {
    /// Creates the set of required bases
    #[must_use]
    pub fn new(
        title_to_issnl: impl Into<PathBuf>,
        issnl_to_all: impl Into<PathBuf>,
        year_volume: impl Into<PathBuf>,
    ) -> Self {
        Self {
            title_to_issnl: title_to_issnl.into(),
            issn_bases: vec![issnl_to_all.into()],
            year_volume: year_volume.into(),
            synthetic_year_volume: None,
            equations: None,
        }
    }

    /// Appends a lower-priority ISSN base
    #[must_use]
    pub fn with_issn_base(mut self, path: impl Into<PathBuf>) -> Self {
        self.issn_bases.push(path.into());
        self
    }

    #[must_use]
    pub fn with_synthetic(mut self, path: impl Into<PathBuf>) -> Self {
        self.synthetic_year_volume = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_equations(mut self, path: impl Into<PathBuf>) -> Self {
        self.equations = Some(path.into());
        self
    }
}

/// All correction bases, loaded once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct CorrectionBases {
    titles: TitleIndex,
    issns: IssnIndex,
    empirical: YearVolumeIndex,
    synthetic: YearVolumeIndex,
    equations: EquationIndex,
}

impl CorrectionBases {
    /// Assembles the bases from already built indices.
    #[must_use]
    pub fn new(
        titles: TitleIndex,
        issns: IssnIndex,
        empirical: YearVolumeIndex,
        synthetic: YearVolumeIndex,
        equations: EquationIndex,
    ) -> Self {
        Self {
            titles,
            issns,
            empirical,
            synthetic,
            equations,
        }
    }

    /// Loads every configured base from disk.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::MissingInput`] when a configured file does not exist, and
    /// [`MatchError::MalformedRow`] or [`MatchError::InvalidFieldValue`] when a row
    /// cannot be parsed.
    pub fn load(paths: &BasePaths, config: &LoaderConfig) -> Result<Self> {
        if paths.issn_bases.is_empty() {
            return Err(MatchError::Config(
                "at least one ISSN-L base is required".to_string(),
            ));
        }

        let titles = TitleIndex::from_reader(
            open_base(&paths.title_to_issnl)?,
            &base_name(&paths.title_to_issnl),
            config,
        )?;

        let mut issns = IssnIndex::default();
        for path in &paths.issn_bases {
            issns.extend_from_reader(open_base(path)?, &base_name(path), config)?;
        }

        let empirical = YearVolumeIndex::from_reader(
            open_base(&paths.year_volume)?,
            &base_name(&paths.year_volume),
            BaseKind::Empirical,
            &issns,
            config,
        )?;

        let synthetic = match &paths.synthetic_year_volume {
            Some(path) => YearVolumeIndex::from_reader(
                open_base(path)?,
                &base_name(path),
                BaseKind::Synthetic,
                &issns,
                config,
            )?,
            None => YearVolumeIndex::new(BaseKind::Synthetic),
        };

        let equations = match &paths.equations {
            Some(path) => EquationIndex::from_reader(open_base(path)?, &base_name(path), config)?,
            None => EquationIndex::default(),
        };

        tracing::info!(
            titles = titles.len(),
            issns = issns.len(),
            issn_conflicts = issns.conflicts(),
            empirical = empirical.len(),
            synthetic = synthetic.len(),
            equations = equations.len(),
            "correction bases loaded"
        );

        Ok(Self::new(titles, issns, empirical, synthetic, equations))
    }

    pub fn titles(&self) -> &TitleIndex {
        &self.titles
    }

    pub fn issns(&self) -> &IssnIndex {
        &self.issns
    }

    /// The year-volume base of the requested kind.
    pub fn year_volume(&self, kind: BaseKind) -> &YearVolumeIndex {
        match kind {
            BaseKind::Empirical => &self.empirical,
            BaseKind::Synthetic => &self.synthetic,
        }
    }

    pub fn equations(&self) -> &EquationIndex {
        &self.equations
    }

    /// Equation used to infer volumes of an ISSN-L: the one keyed by the ISSN-L itself,
    /// else the first one keyed by any of its ISSNs.
    pub fn equation_for(&self, issnl: &str) -> Option<&RegressionEquation> {
        self.equations.get(issnl).or_else(|| {
            self.issns
                .issns_of(issnl)
                .iter()
                .find_map(|issn| self.equations.get(issn))
        })
    }
}

fn open_base(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(MatchError::MissingInput(path.to_path_buf()));
    }
    Ok(BufReader::new(File::open(path)?))
}

fn base_name(path: &Path) -> String {
    path.display().to_string()
}

/// Reader shared by every base: unquoted, variable column count.
pub(crate) fn table_reader<R: Read>(
    reader: R,
    delimiter: u8,
    config: &LoaderConfig,
) -> csv_crate::Reader<R> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(config.has_headers)
        .quoting(false)
        .flexible(true)
        .from_reader(reader)
}

/// Position of a record in its file, for error reporting.
pub(crate) fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// Fails with [`MatchError::MalformedRow`] when the record has fewer than `expected` columns.
pub(crate) fn require_columns(record: &StringRecord, expected: usize, base: &str) -> Result<()> {
    if record.len() < expected {
        return Err(MatchError::MalformedRow {
            base: base.to_string(),
            line: line_of(record),
            expected,
            found: record.len(),
        });
    }
    Ok(())
}

/// Appends `issn` unless already present, keeping first-seen order.
pub(crate) fn push_unique(list: &mut Vec<Issn>, issn: Issn) {
    if !list.contains(&issn) {
        list.push(issn);
    }
}
