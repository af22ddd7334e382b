//! Volume regression model.
//!
//! Journals usually publish one volume per year, so the volume of a citation can be
//! predicted from its year with a per-journal linear model `volume ≈ a + b·year`. The
//! model is fitted offline on the empirical year-volume base and used at match time to
//! probe year-volume bases around the predicted volume.
//!
//! # Example
//!
//! ```
//! use issnl_match::regression::{RegressionConfig, fit};
//!
//! let observations: Vec<(i32, u32)> = (2000..2010)
//!     .flat_map(|year| std::iter::repeat((year, (year - 1966) as u32)).take(3))
//!     .collect();
//!
//! let equation = fit("0034-8910", &observations, &RegressionConfig::default()).unwrap();
//! let prediction = equation.predict(2005);
//! assert_eq!(prediction.volume, 39);
//! assert_eq!(prediction.window, vec![38, 39, 40]);
//! ```

pub mod synthetic;

use crate::index::{IssnIndex, LoaderConfig, standardize_key, table_reader};
use crate::utils::{parse_volume, parse_year};
use crate::{NormalizedTitle, Result};
use csv_crate::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Settings of the equation fitting and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Minimum number of times a (year, volume) pair must be observed to be fitted
    pub min_observation_frequency: usize,
    /// Minimum R² for an equation to be used
    pub min_r2: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            min_observation_frequency: 3,
            min_r2: 0.70,
        }
    }
}

/// A fitted `volume ≈ a + b·year` model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionEquation {
    /// ISSN, ISSN-L or normalized title the equation was fitted for
    pub key: String,
    pub a: f64,
    pub b: f64,
    pub r2: f64,
}

/// Predicted volume for a year and the window of volumes to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePrediction {
    pub year: i32,
    pub volume: i64,
    /// `volume - 1`, `volume`, `volume + 1`, without values below 1
    pub window: Vec<u32>,
}

impl RegressionEquation {
    /// The rounded predicted volume.
    pub fn predict_volume(&self, year: i32) -> i64 {
        (self.a + self.b * f64::from(year)).round() as i64
    }

    pub fn predict(&self, year: i32) -> VolumePrediction {
        let volume = self.predict_volume(year);
        let window = (volume.saturating_sub(1)..=volume.saturating_add(1))
            .filter_map(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .collect();

        VolumePrediction {
            year,
            volume,
            window,
        }
    }

    pub fn is_reliable(&self, min_r2: f64) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.r2.is_finite() && self.r2 >= min_r2
    }
}

/// Keeps each distinct (year, volume) pair observed at least `min_frequency` times.
///
/// Rare pairs are usually typos in the citations. The result is sorted.
pub fn filter_infrequent(observations: &[(i32, u32)], min_frequency: usize) -> Vec<(i32, u32)> {
    let mut counts: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for pair in observations {
        *counts.entry(*pair).or_default() += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count >= min_frequency)
        .map(|(pair, _)| pair)
        .collect()
}

/// Ordinary least squares fit of `y ≈ a + b·x`, returning `(a, b, r2)`.
///
/// Returns `None` for fewer than two distinct `x` values or a constant `y`.
pub fn least_squares(points: &[(f64, f64)]) -> Option<(f64, f64, f64)> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxx, sxy, syy) = points.iter().fold((0.0, 0.0, 0.0), |(sxx, sxy, syy), (x, y)| {
        let dx = x - mean_x;
        let dy = y - mean_y;
        (sxx + dx * dx, sxy + dx * dy, syy + dy * dy)
    });

    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }

    let b = sxy / sxx;
    let a = mean_y - b * mean_x;
    let sse: f64 = points
        .iter()
        .map(|(x, y)| {
            let residual = y - (a + b * x);
            residual * residual
        })
        .sum();

    Some((a, b, 1.0 - sse / syy))
}

/// Fits an equation on raw observations, after dropping infrequent pairs.
pub fn fit(
    key: &str,
    observations: &[(i32, u32)],
    config: &RegressionConfig,
) -> Option<RegressionEquation> {
    let points: Vec<(f64, f64)> = filter_infrequent(observations, config.min_observation_frequency)
        .into_iter()
        .map(|(year, volume)| (f64::from(year), f64::from(volume)))
        .collect();

    let (a, b, r2) = least_squares(&points)?;
    Some(RegressionEquation {
        key: key.to_string(),
        a,
        b,
        r2,
    })
}

/// Entity an equation is fitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Issn,
    Title,
    Issnl,
}

/// Year-volume observations grouped by ISSN, by title and by ISSN-L.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    by_issn: BTreeMap<String, Vec<(i32, u32)>>,
    by_title: BTreeMap<String, Vec<(i32, u32)>>,
    by_issnl: BTreeMap<String, Vec<(i32, u32)>>,
}

impl ObservationTable {
    /// Reads an `issn|title|year|volume[|extra]` table.
    ///
    /// Rows with fewer columns or without a usable year or volume are ignored.
    pub fn from_reader<R: Read>(reader: R, issns: &IssnIndex, config: &LoaderConfig) -> Result<Self> {
        let mut table = Self::default();
        let mut reader = table_reader(reader, b'|', config);

        for result in reader.records() {
            let record = result?;
            if record.len() < 4 {
                continue;
            }

            let (Some(year), Some(volume)) = (parse_year(&record[2]), parse_volume(&record[3]))
            else {
                continue;
            };

            let issn = standardize_key(&record[0]);
            let title = NormalizedTitle::new(&record[1]);
            if !issn.is_empty() {
                table.push(EntityKind::Issnl, issns.issnl_or_self(&issn).into(), year, volume);
                table.push(EntityKind::Issn, issn, year, volume);
            }
            if !title.is_empty() {
                table.push(EntityKind::Title, title.as_str().to_string(), year, volume);
            }
        }

        tracing::info!(
            issns = table.by_issn.len(),
            titles = table.by_title.len(),
            issnls = table.by_issnl.len(),
            "observation table loaded"
        );

        Ok(table)
    }

    pub fn push(&mut self, kind: EntityKind, key: String, year: i32, volume: u32) {
        self.group_mut(kind).entry(key).or_default().push((year, volume));
    }

    fn group(&self, kind: EntityKind) -> &BTreeMap<String, Vec<(i32, u32)>> {
        match kind {
            EntityKind::Issn => &self.by_issn,
            EntityKind::Title => &self.by_title,
            EntityKind::Issnl => &self.by_issnl,
        }
    }

    fn group_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, Vec<(i32, u32)>> {
        match kind {
            EntityKind::Issn => &mut self.by_issn,
            EntityKind::Title => &mut self.by_title,
            EntityKind::Issnl => &mut self.by_issnl,
        }
    }

    /// Observations recorded for an entity.
    pub fn observations(&self, kind: EntityKind, key: &str) -> &[(i32, u32)] {
        self.group(kind).get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Fits every entity of a kind, sorted by key.
    ///
    /// Entities without a defined fit are left out; reliability is not checked here.
    pub fn fit_all(
        &self,
        kind: EntityKind,
        config: &RegressionConfig,
        run_in_parallel: bool,
    ) -> Vec<RegressionEquation> {
        let groups: Vec<(&String, &Vec<(i32, u32)>)> = self.group(kind).iter().collect();

        #[cfg(feature = "parallel")]
        if run_in_parallel {
            use rayon::prelude::*;

            return groups
                .par_iter()
                .filter_map(|(key, observations)| fit(key, observations, config))
                .collect();
        }

        #[cfg(not(feature = "parallel"))]
        let _ = run_in_parallel;

        groups
            .iter()
            .filter_map(|(key, observations)| fit(key, observations, config))
            .collect()
    }
}

/// Writes equations as `KEY|a|b|r2` rows with six decimals.
pub fn write_equations<W: Write>(writer: W, equations: &[RegressionEquation]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .from_writer(writer);

    for equation in equations {
        writer.write_record([
            equation.key.clone(),
            format!("{:.6}", equation.a),
            format!("{:.6}", equation.b),
            format!("{:.6}", equation.r2),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
