//! Match engine.
//!
//! Resolves one citation at a time through the matching cascade:
//!
//! ```text
//! title ─┬─ empty ──────────────── DOI exists / title is empty
//!        └─ exact lookup ─┬─ 1 hit ───── exact match
//!                         ├─ n hits ──── disambiguation (exact family)
//!                         └─ 0 hits ─┬── fuzzy disabled
//!                                    └── fuzzy lookup ─┬─ 0 hits ─ title not found
//!                                                      └─ n hits ─ disambiguation (fuzzy family)
//! ```
//!
//! # Example
//!
//! ```
//! use issnl_match::{CitationRecord, CorrectionBases, ResultCode};
//! use issnl_match::engine::{MatchEngine, MatchOptions};
//! use issnl_match::index::{EquationIndex, IssnIndex, TitleIndex, YearVolumeIndex, BaseKind};
//!
//! let bases = CorrectionBases::new(
//!     TitleIndex::from_entries([("REV SAUDE PUBLICA", vec!["0034-8910"])]),
//!     IssnIndex::default(),
//!     YearVolumeIndex::new(BaseKind::Empirical),
//!     YearVolumeIndex::new(BaseKind::Synthetic),
//!     EquationIndex::default(),
//! );
//! let engine = MatchEngine::new(&bases, MatchOptions::default());
//!
//! let record = engine.resolve(CitationRecord {
//!     title: Some("Rev. Saúde Pública".to_string()),
//!     ..Default::default()
//! });
//! assert_eq!(record.result_code, Some(ResultCode::SuccessExactMatch));
//! assert_eq!(record.cited_issnl.as_deref(), Some("0034-8910"));
//! ```

use crate::disambiguate::{Disambiguator, MatchKind};
use crate::fuzzy::{FuzzyConfig, FuzzyMatcher};
use crate::regression::RegressionConfig;
use crate::utils::{parse_volume, parse_year};
use crate::{CitationRecord, CorrectionBases, Issn, NormalizedTitle, ResultCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options of the matching cascade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Try fuzzy matching when the exact lookup fails
    pub use_fuzzy: bool,
    /// Recompute records that already carry an ISSN-L
    pub ignore_existing: bool,
    /// Guards of the fuzzy matcher
    pub fuzzy: FuzzyConfig,
    /// Resolve batches on the rayon thread pool
    pub run_in_parallel: bool,
    /// Minimum R² of the equations used for volume inference
    pub min_r2: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            use_fuzzy: false,
            ignore_existing: false,
            fuzzy: FuzzyConfig::default(),
            run_in_parallel: true,
            min_r2: RegressionConfig::default().min_r2,
        }
    }
}

impl MatchOptions {
    pub fn set_use_fuzzy(&mut self, use_fuzzy: bool) -> &mut Self {
        self.use_fuzzy = use_fuzzy;
        self
    }

    pub fn set_ignore_existing(&mut self, ignore_existing: bool) -> &mut Self {
        self.ignore_existing = ignore_existing;
        self
    }

    pub fn set_fuzzy(&mut self, fuzzy: FuzzyConfig) -> &mut Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn set_run_in_parallel(&mut self, run_in_parallel: bool) -> &mut Self {
        self.run_in_parallel = run_in_parallel;
        self
    }

    pub fn set_min_r2(&mut self, min_r2: f64) -> &mut Self {
        self.min_r2 = min_r2;
        self
    }
}

/// Counts of a processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Records that went through the cascade
    pub processed: usize,
    /// Malformed records that could not be read
    pub skipped: usize,
    /// Records that already carried an ISSN-L and were left untouched
    pub passed_through: usize,
    pub by_code: BTreeMap<ResultCode, usize>,
}

impl BatchSummary {
    pub fn add(&mut self, code: ResultCode) {
        self.processed += 1;
        *self.by_code.entry(code).or_default() += 1;
    }

    pub fn add_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn add_passed_through(&mut self) {
        self.passed_through += 1;
    }

    pub fn count(&self, code: ResultCode) -> usize {
        self.by_code.get(&code).copied().unwrap_or_default()
    }

    /// Processed records that were resolved to an ISSN-L.
    pub fn resolved(&self) -> usize {
        self.by_code
            .iter()
            .filter(|(code, _)| code.is_success())
            .map(|(_, count)| count)
            .sum()
    }
}

/// Outcome of the cascade for one record.
struct Outcome {
    code: ResultCode,
    issnl: Option<Issn>,
    provenance: Option<String>,
    candidates: Vec<Issn>,
}

impl Outcome {
    fn code(code: ResultCode) -> Self {
        Self {
            code,
            issnl: None,
            provenance: None,
            candidates: Vec::new(),
        }
    }
}

/// Resolves citations against a set of correction bases.
#[derive(Debug)]
pub struct MatchEngine<'a> {
    bases: &'a CorrectionBases,
    options: MatchOptions,
    fuzzy: Option<FuzzyMatcher<'a>>,
    disambiguator: Disambiguator<'a>,
}

impl<'a> MatchEngine<'a> {
    /// Creates an engine; the fuzzy index is built only when fuzzy matching is enabled.
    pub fn new(bases: &'a CorrectionBases, options: MatchOptions) -> Self {
        let fuzzy = options
            .use_fuzzy
            .then(|| FuzzyMatcher::new(bases.titles(), options.fuzzy));

        Self {
            bases,
            options,
            fuzzy,
            disambiguator: Disambiguator::new(bases).with_min_r2(options.min_r2),
        }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Whether `record` is returned untouched by [`MatchEngine::resolve`].
    pub fn passes_through(&self, record: &CitationRecord) -> bool {
        record.is_resolved() && !self.options.ignore_existing
    }

    /// Resolves one record, writing the outcome into its result fields.
    pub fn resolve(&self, mut record: CitationRecord) -> CitationRecord {
        if self.passes_through(&record) {
            tracing::trace!(id = ?record.id, "record already resolved");
            return record;
        }

        record.clear_results();
        let outcome = self.run(&record);

        tracing::debug!(id = ?record.id, code = %outcome.code, issnl = ?outcome.issnl, "record resolved");

        record.cited_issnl = outcome.issnl.map(String::from);
        record.result_code = Some(outcome.code);
        record.title_year_volume_key = outcome.provenance;
        record.candidate_issnls = outcome.candidates.into_iter().map(String::from).collect();
        record
    }

    /// Resolves a batch, keeping the input order.
    pub fn resolve_all(&self, records: Vec<CitationRecord>) -> Vec<CitationRecord> {
        #[cfg(feature = "parallel")]
        if self.options.run_in_parallel {
            use rayon::prelude::*;

            return records
                .into_par_iter()
                .map(|record| self.resolve(record))
                .collect();
        }

        records.into_iter().map(|record| self.resolve(record)).collect()
    }

    /// Counts result codes over resolved records.
    pub fn summarize(records: &[CitationRecord]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for record in records {
            match record.result_code {
                Some(code) => summary.add(code),
                None if record.is_resolved() => summary.add_passed_through(),
                None => {}
            }
        }
        summary
    }

    fn run(&self, record: &CitationRecord) -> Outcome {
        let title = cited_title(record);
        if title.is_empty() {
            return if record.has_doi() {
                Outcome::code(ResultCode::NotConductedMatchDoiExists)
            } else {
                Outcome::code(ResultCode::ErrorJournalTitleIsEmpty)
            };
        }

        let exact = self.bases.titles().get(title.as_str()).unwrap_or_default();
        match exact {
            [issnl] => Outcome {
                code: ResultCode::SuccessExactMatch,
                issnl: Some(issnl.clone()),
                provenance: None,
                candidates: Vec::new(),
            },
            [] => match &self.fuzzy {
                None => Outcome::code(ResultCode::NotConductedMatchFuzzyDisabled),
                Some(matcher) => {
                    let candidates = matcher.match_title(&title);
                    if candidates.is_empty() {
                        Outcome::code(ResultCode::ErrorJournalTitleNotFound)
                    } else {
                        self.disambiguate(record, &title, candidates, MatchKind::Fuzzy)
                    }
                }
            },
            candidates => self.disambiguate(record, &title, candidates.to_vec(), MatchKind::Exact),
        }
    }

    fn disambiguate(
        &self,
        record: &CitationRecord,
        title: &NormalizedTitle,
        candidates: Vec<Issn>,
        kind: MatchKind,
    ) -> Outcome {
        let year = record.year.as_deref().and_then(parse_year);
        let volume = record.volume.as_deref().and_then(parse_volume);

        let decision = self
            .disambiguator
            .disambiguate(&candidates, title, year, volume, kind);

        Outcome {
            code: decision.code,
            issnl: decision.issnl,
            provenance: decision.provenance.map(|p| p.to_string()),
            candidates,
        }
    }
}

/// Normalized cited title, falling back to the source title.
fn cited_title(record: &CitationRecord) -> NormalizedTitle {
    let title = record
        .title
        .as_deref()
        .map(NormalizedTitle::new)
        .unwrap_or_default();
    if !title.is_empty() {
        return title;
    }

    record
        .source
        .as_deref()
        .map(NormalizedTitle::new)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoaderConfig;
    use crate::index::{BaseKind, EquationIndex, IssnIndex, TitleIndex, YearVolumeIndex};
    use crate::regression::RegressionEquation;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const A: &str = "0034-8910";
    const B: &str = "1234-5678";

    fn bases(empirical: &str, equations: Vec<RegressionEquation>) -> CorrectionBases {
        let config = LoaderConfig::default();
        let issns = IssnIndex::from_reader(
            "0034-8910|0034-8910#1518-8787|REV SAUDE PUBLICA#REVISTA DE SAUDE PUBLICA\n\
             1234-5678|1234-5678|REV SAUDE PUBLICA\n\
             0102-311X|0102-311X|CADERNOS DE SAUDE PUBLICA\n"
                .as_bytes(),
            "issns",
            &config,
        )
        .unwrap();
        let titles = TitleIndex::from_entries([
            ("REV SAUDE PUBLICA", vec![A, B]),
            ("CADERNOS DE SAUDE PUBLICA", vec!["0102-311X"]),
            ("REVISTA DE SAUDE PUBLICA", vec![A]),
        ]);
        let empirical = YearVolumeIndex::from_reader(
            empirical.as_bytes(),
            "yv",
            BaseKind::Empirical,
            &issns,
            &config,
        )
        .unwrap();

        CorrectionBases::new(
            titles,
            issns,
            empirical,
            YearVolumeIndex::new(BaseKind::Synthetic),
            EquationIndex::from_equations(equations, 0.7),
        )
    }

    fn citation(title: &str, year: Option<&str>, volume: Option<&str>) -> CitationRecord {
        CitationRecord {
            title: Some(title.to_string()),
            year: year.map(str::to_string),
            volume: volume.map(str::to_string),
            ..Default::default()
        }
    }

    fn options(use_fuzzy: bool) -> MatchOptions {
        let mut options = MatchOptions::default();
        options.set_use_fuzzy(use_fuzzy);
        options
    }

    #[test]
    fn test_homonym_resolved_by_year_volume() {
        let bases = bases("1518-8787|REV SAUDE PUBLICA|2005|39\n", vec![]);
        let engine = MatchEngine::new(&bases, MatchOptions::default());

        let record = engine.resolve(citation("Rev Saude Publica", Some("2005"), Some("39")));
        assert_eq!(record.result_code, Some(ResultCode::SuccessExactMatchYearVol));
        assert_eq!(record.cited_issnl.as_deref(), Some(A));
        assert_eq!(
            record.title_year_volume_key.as_deref(),
            Some("REV SAUDE PUBLICA-2005-39")
        );
        assert_eq!(record.candidate_issnls, vec![A, B]);
    }

    #[test]
    fn test_homonym_resolved_by_inferred_volume() {
        let equation = RegressionEquation {
            key: A.to_string(),
            a: -1966.0,
            b: 1.0,
            r2: 0.98,
        };
        let bases = bases("0034-8910|REV SAUDE PUBLICA|2005|39\n", vec![equation]);
        let engine = MatchEngine::new(&bases, MatchOptions::default());

        let record = engine.resolve(citation("Rev Saude Publica", Some("2005"), None));
        assert_eq!(
            record.result_code,
            Some(ResultCode::SuccessExactMatchYearVolInferred)
        );
        assert_eq!(record.cited_issnl.as_deref(), Some(A));
    }

    #[test]
    fn test_inferred_ambiguity_is_reported() {
        let equations = vec![
            RegressionEquation {
                key: A.to_string(),
                a: -1966.0,
                b: 1.0,
                r2: 0.98,
            },
            RegressionEquation {
                key: B.to_string(),
                a: -1966.0,
                b: 1.0,
                r2: 0.98,
            },
        ];
        let bases = bases(
            "0034-8910|REV SAUDE PUBLICA|2005|38\n1234-5678|REV SAUDE PUBLICA|2005|40\n",
            equations,
        );
        let engine = MatchEngine::new(&bases, MatchOptions::default());

        let record = engine.resolve(citation("Rev Saude Publica", Some("2005"), None));
        assert_eq!(
            record.result_code,
            Some(ResultCode::ErrorExactMatchYearVolInferred)
        );
        assert_eq!(record.cited_issnl, None);
    }

    #[test]
    fn test_exact_round_trip() {
        let bases = bases("", vec![]);
        let engine = MatchEngine::new(&bases, MatchOptions::default());

        for (title, issnls) in bases.titles().iter().filter(|(_, issnls)| issnls.len() == 1) {
            let record = engine.resolve(citation(title.as_str(), None, None));
            assert_eq!(record.result_code, Some(ResultCode::SuccessExactMatch));
            assert_eq!(record.cited_issnl.as_deref(), Some(issnls[0].as_str()));
        }
    }

    #[rstest]
    #[case(Some("10.1590/S0034-89102005000100001"), ResultCode::NotConductedMatchDoiExists)]
    #[case(None, ResultCode::ErrorJournalTitleIsEmpty)]
    #[case(Some(" "), ResultCode::ErrorJournalTitleIsEmpty)]
    fn test_empty_title(#[case] doi: Option<&str>, #[case] expected: ResultCode) {
        let bases = bases("", vec![]);
        let engine = MatchEngine::new(&bases, MatchOptions::default());

        let record = engine.resolve(CitationRecord {
            title: Some("...".to_string()),
            doi: doi.map(str::to_string),
            ..Default::default()
        });
        assert_eq!(record.result_code, Some(expected));
        assert_eq!(record.cited_issnl, None);
    }

    #[test]
    fn test_source_is_used_when_title_is_empty() {
        let bases = bases("", vec![]);
        let engine = MatchEngine::new(&bases, MatchOptions::default());

        let record = engine.resolve(CitationRecord {
            source: Some("Cadernos de Saúde Pública".to_string()),
            ..Default::default()
        });
        assert_eq!(record.result_code, Some(ResultCode::SuccessExactMatch));
        assert_eq!(record.cited_issnl.as_deref(), Some("0102-311X"));
    }

    #[test]
    fn test_unknown_title_without_fuzzy() {
        let bases = bases("", vec![]);
        let engine = MatchEngine::new(&bases, options(false));

        let record = engine.resolve(citation("Cad Saude Publ", Some("2005"), None));
        assert_eq!(
            record.result_code,
            Some(ResultCode::NotConductedMatchFuzzyDisabled)
        );
    }

    #[test]
    fn test_fuzzy_path() {
        let bases = bases("0102-311X|CADERNOS DE SAUDE PUBLICA|2005|21\n", vec![]);
        let engine = MatchEngine::new(&bases, options(true));

        let record = engine.resolve(citation("Cad. Saúde Públ.", Some("2005"), Some("21")));
        assert_eq!(record.result_code, Some(ResultCode::SuccessFuzzyMatchYearVol));
        assert_eq!(record.cited_issnl.as_deref(), Some("0102-311X"));

        let record = engine.resolve(citation("Cad. Saúde Públ.", Some("s.d."), Some("21")));
        assert_eq!(record.result_code, Some(ResultCode::ErrorFuzzyMatchInvalidYear));

        let record = engine.resolve(citation("Jornal Inexistente", Some("2005"), None));
        assert_eq!(record.result_code, Some(ResultCode::ErrorJournalTitleNotFound));
    }

    #[test]
    fn test_homonym_without_year() {
        let bases = bases("", vec![]);
        let engine = MatchEngine::new(&bases, MatchOptions::default());

        let record = engine.resolve(citation("Rev Saude Publica", None, Some("39")));
        assert_eq!(record.result_code, Some(ResultCode::ErrorExactMatchInvalidYear));
        assert_eq!(record.candidate_issnls, vec![A, B]);
    }

    #[test]
    fn test_resolved_record_passes_through() {
        let bases = bases("", vec![]);
        let engine = MatchEngine::new(&bases, MatchOptions::default());

        let record = CitationRecord {
            cited_issnl: Some("9999-9999".to_string()),
            ..citation("Cadernos de Saude Publica", None, None)
        };
        assert_eq!(engine.resolve(record.clone()), record);

        let mut options = MatchOptions::default();
        options.set_ignore_existing(true);
        let engine = MatchEngine::new(&bases, options);
        let recomputed = engine.resolve(record);
        assert_eq!(recomputed.cited_issnl.as_deref(), Some("0102-311X"));
        assert_eq!(recomputed.result_code, Some(ResultCode::SuccessExactMatch));
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_resolve_all_keeps_order(#[case] run_in_parallel: bool) {
        let bases = bases("1518-8787|REV SAUDE PUBLICA|2005|39\n", vec![]);
        let mut options = MatchOptions::default();
        options.set_run_in_parallel(run_in_parallel);
        let engine = MatchEngine::new(&bases, options);

        let records: Vec<CitationRecord> = (0..50)
            .map(|i| CitationRecord {
                id: Some(i.to_string()),
                ..citation("Rev Saude Publica", Some("2005"), Some("39"))
            })
            .chain([citation("", None, None)])
            .collect();

        let resolved = engine.resolve_all(records);
        let ids: Vec<Option<String>> = resolved.iter().take(50).map(|r| r.id.clone()).collect();
        let expected: Vec<Option<String>> = (0..50).map(|i| Some(i.to_string())).collect();
        assert_eq!(ids, expected);

        let summary = MatchEngine::summarize(&resolved);
        assert_eq!(summary.processed, 51);
        assert_eq!(summary.count(ResultCode::SuccessExactMatchYearVol), 50);
        assert_eq!(summary.count(ResultCode::ErrorJournalTitleIsEmpty), 1);
        assert_eq!(summary.resolved(), 50);
    }
}
