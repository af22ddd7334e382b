//! Regression equations base.

use super::{LoaderConfig, line_of, require_columns, table_reader};
use crate::regression::RegressionEquation;
use crate::utils::format_issn;
use crate::{MatchError, Result, normalize};
use csv_crate::StringRecord;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::Read;

/// Reliable regression equations keyed by ISSN, ISSN-L or normalized title.
#[derive(Debug, Clone, Default)]
pub struct EquationIndex {
    by_key: HashMap<String, RegressionEquation>,
}

impl EquationIndex {
    /// Reads `entityKey|a|b|r2` rows.
    ///
    /// A first row whose coefficients are not numeric is taken as a header. Equations
    /// below the configured R² threshold are dropped, and the first equation of a
    /// repeated key wins.
    pub fn from_reader<R: Read>(reader: R, base_name: &str, config: &LoaderConfig) -> Result<Self> {
        let mut reader = table_reader(reader, b'|', config);
        let mut equations = Vec::new();

        for (i, result) in reader.records().enumerate() {
            let record = result?;
            require_columns(&record, 4, base_name)?;

            match parse_equation(&record, base_name) {
                Ok(equation) => equations.push(equation),
                Err(_) if i == 0 && !config.has_headers => {
                    tracing::debug!(base = base_name, "treating first row as header");
                }
                Err(err) => return Err(err),
            }
        }

        let total = equations.len();
        let index = Self::from_equations(equations, config.regression.min_r2);
        if index.len() < total {
            tracing::warn!(
                base = base_name,
                dropped = total - index.len(),
                min_r2 = config.regression.min_r2,
                "discarded unreliable or repeated equations"
            );
        }

        Ok(index)
    }

    /// Collects reliable equations; the first one of each key wins.
    pub fn from_equations<I>(equations: I, min_r2: f64) -> Self
    where
        I: IntoIterator<Item = RegressionEquation>,
    {
        let mut by_key = HashMap::new();
        for equation in equations {
            if !equation.is_reliable(min_r2) {
                continue;
            }
            if let Entry::Vacant(slot) = by_key.entry(equation.key.clone()) {
                slot.insert(equation);
            }
        }
        Self { by_key }
    }

    pub fn get(&self, key: &str) -> Option<&RegressionEquation> {
        self.by_key.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Standardizes an equation key: ISSNs to `NNNN-NNNC`, anything else as a title.
pub fn standardize_key(raw: &str) -> String {
    format_issn(raw).map_or_else(|| normalize(raw), String::from)
}

fn parse_equation(record: &StringRecord, base_name: &str) -> Result<RegressionEquation> {
    let coefficient = |i: usize, field: &str| -> Result<f64> {
        record[i]
            .trim()
            .parse::<f64>()
            .map_err(|err| MatchError::InvalidFieldValue {
                base: base_name.to_string(),
                line: line_of(record),
                field: field.to_string(),
                message: format!("{:?}: {err}", &record[i]),
            })
    };

    Ok(RegressionEquation {
        key: standardize_key(&record[0]),
        a: coefficient(1, "a")?,
        b: coefficient(2, "b")?,
        r2: coefficient(3, "r2")?,
    })
}
