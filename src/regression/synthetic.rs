//! Generation of the synthetic (artificial) year-volume base.
//!
//! For every journal with a reliable equation, each year of its publication coverage is
//! paired with the predicted volume window and written under every title variant of the
//! journal. The resulting table has the same layout as the empirical base.

use crate::index::{IssnIndex, LoaderConfig, line_of, require_columns, table_reader};
use crate::regression::{RegressionConfig, RegressionEquation};
use crate::utils::{parse_year, standardize_issn};
use crate::{Issn, MatchError, NormalizedTitle, Result};
use csv_crate::WriterBuilder;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

/// Years in which a journal (identified by one of its ISSNs) was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSpan {
    pub issn: Issn,
    pub start_year: i32,
    /// `None` for journals still being published
    pub end_year: Option<i32>,
}

impl CoverageSpan {
    /// Reads `issn|start_year|end_year` rows; a blank end year means open coverage.
    pub fn from_reader<R: Read>(
        reader: R,
        base_name: &str,
        config: &LoaderConfig,
    ) -> Result<Vec<CoverageSpan>> {
        let mut reader = table_reader(reader, b'|', config);
        let mut spans = Vec::new();

        for result in reader.records() {
            let record = result?;
            require_columns(&record, 2, base_name)?;

            let start_year =
                parse_year(&record[1]).ok_or_else(|| MatchError::InvalidFieldValue {
                    base: base_name.to_string(),
                    line: line_of(&record),
                    field: "start_year".to_string(),
                    message: format!("{:?} is not a year", &record[1]),
                })?;
            let end_year = record.get(2).and_then(parse_year);

            spans.push(CoverageSpan {
                issn: standardize_issn(&record[0]),
                start_year,
                end_year,
            });
        }

        Ok(spans)
    }
}

/// One generated year-volume row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyntheticRow {
    pub issnl: Issn,
    pub title: NormalizedTitle,
    pub year: i32,
    pub volume: u32,
}

/// Generates synthetic rows from ISSN-L equations and coverage spans.
///
/// Open-ended spans run up to `open_end_year`. Unreliable equations and journals
/// without coverage or title variants produce nothing.
pub fn synthesize(
    equations: &[RegressionEquation],
    coverage: &[CoverageSpan],
    issns: &IssnIndex,
    config: &RegressionConfig,
    open_end_year: i32,
) -> Vec<SyntheticRow> {
    let spans_by_issnl: HashMap<Issn, Vec<&CoverageSpan>> = coverage
        .iter()
        .map(|span| (issns.issnl_or_self(&span.issn), span))
        .into_group_map();

    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for equation in equations.iter().filter(|e| e.is_reliable(config.min_r2)) {
        let issnl = issns.issnl_or_self(&equation.key);
        let Some(spans) = spans_by_issnl.get(&issnl) else {
            tracing::debug!(issnl = %issnl, "no coverage for equation");
            continue;
        };
        let titles = issns.variant_titles(&issnl);
        if titles.is_empty() {
            tracing::debug!(issnl = %issnl, "no title variants for equation");
            continue;
        }

        for span in spans {
            let end_year = span.end_year.unwrap_or(open_end_year);
            for year in span.start_year..=end_year {
                for volume in equation.predict(year).window {
                    for title in titles {
                        let row = SyntheticRow {
                            issnl: issnl.clone(),
                            title: title.clone(),
                            year,
                            volume,
                        };
                        if seen.insert(row.clone()) {
                            rows.push(row);
                        }
                    }
                }
            }
        }
    }

    tracing::info!(
        equations = equations.len(),
        rows = rows.len(),
        "synthetic year-volume rows generated"
    );

    rows
}

/// Writes rows as `issnl|title|year|volume`, the empirical base layout.
pub fn write_synthetic_rows<W: Write>(writer: W, rows: &[SyntheticRow]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .from_writer(writer);

    for row in rows {
        writer.write_record([
            row.issnl.as_str(),
            row.title.as_str(),
            row.year.to_string().as_str(),
            row.volume.to_string().as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
