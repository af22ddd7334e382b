//! Homonym disambiguation through year-volume bases.
//!
//! When a title maps to several ISSN-Ls, the year and volume of the citation are used to
//! pick the journal. The cascade tries, in order:
//!
//! 1. the cited volume against the empirical base;
//! 2. regression-predicted volume windows against the empirical base;
//! 3. the cited volume against the synthetic base;
//! 4. regression-predicted volume windows against the synthetic base.
//!
//! The first step that isolates a single candidate decides. An inferred window that
//! matches more than one ISSN-L stops the cascade with an ambiguity error.

use crate::index::{BaseKind, CorrectionBases, YearVolumeKey, push_unique};
use crate::regression::RegressionConfig;
use crate::{Issn, NormalizedTitle, ResultCode};
use std::collections::HashMap;
use std::fmt;

pub use crate::result_code::MatchKind;

/// How the volume used for a lookup was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Volume written in the citation
    Direct,
    /// Volume predicted by a regression equation
    Inferred,
}

/// The year-volume entry that decided a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub base: BaseKind,
    pub strategy: Strategy,
    pub key: YearVolumeKey,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

/// Outcome of the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub issnl: Option<Issn>,
    pub code: ResultCode,
    pub provenance: Option<Provenance>,
}

impl Decision {
    fn resolved(issnl: Issn, kind: MatchKind, provenance: Provenance) -> Self {
        Self {
            issnl: Some(issnl),
            code: ResultCode::resolved(kind, provenance.base, provenance.strategy),
            provenance: Some(provenance),
        }
    }

    fn failed(code: ResultCode) -> Self {
        Self {
            issnl: None,
            code,
            provenance: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.issnl.is_some()
    }
}

/// Result of probing one base with one strategy.
enum Probe {
    Resolved(Issn, YearVolumeKey),
    Ambiguous,
    Inconclusive,
}

/// Runs the year-volume cascade against a set of correction bases.
#[derive(Debug, Clone, Copy)]
pub struct Disambiguator<'a> {
    bases: &'a CorrectionBases,
    min_r2: f64,
}

impl<'a> Disambiguator<'a> {
    pub fn new(bases: &'a CorrectionBases) -> Self {
        Self {
            bases,
            min_r2: RegressionConfig::default().min_r2,
        }
    }

    /// Sets the minimum R² of the equations used for inference.
    pub fn with_min_r2(mut self, min_r2: f64) -> Self {
        self.min_r2 = min_r2;
        self
    }

    /// Picks one of `candidates` for a citation of `title` in `year`, volume `volume`.
    pub fn disambiguate(
        &self,
        candidates: &[Issn],
        title: &NormalizedTitle,
        year: Option<i32>,
        volume: Option<u32>,
        kind: MatchKind,
    ) -> Decision {
        let Some(year) = year else {
            tracing::trace!(title = %title, "no usable year");
            return Decision::failed(ResultCode::invalid_year(kind));
        };

        let probes = self.probe_titles(candidates, title, kind);

        for base in [BaseKind::Empirical, BaseKind::Synthetic] {
            if let Some(volume) = volume {
                if let Probe::Resolved(issnl, key) =
                    self.probe_direct(base, candidates, &probes, year, volume)
                {
                    let provenance = Provenance {
                        base,
                        strategy: Strategy::Direct,
                        key,
                    };
                    return Decision::resolved(issnl, kind, provenance);
                }
            }

            match self.probe_inferred(base, candidates, &probes, year) {
                Probe::Resolved(issnl, key) => {
                    let provenance = Provenance {
                        base,
                        strategy: Strategy::Inferred,
                        key,
                    };
                    return Decision::resolved(issnl, kind, provenance);
                }
                Probe::Ambiguous => return Decision::failed(ResultCode::ambiguous(kind, base)),
                Probe::Inconclusive => {}
            }
        }

        tracing::trace!(title = %title, year, "undecidable");
        Decision::failed(ResultCode::undecidable(kind))
    }

    /// The cited title, plus the title variants of every candidate in fuzzy mode.
    fn probe_titles(
        &self,
        candidates: &[Issn],
        title: &NormalizedTitle,
        kind: MatchKind,
    ) -> Vec<NormalizedTitle> {
        let mut probes = vec![title.clone()];
        if kind == MatchKind::Fuzzy {
            for candidate in candidates {
                for variant in self.bases.issns().variant_titles(candidate) {
                    if !probes.contains(variant) {
                        probes.push(variant.clone());
                    }
                }
            }
        }
        probes
    }

    fn probe_direct(
        &self,
        base: BaseKind,
        candidates: &[Issn],
        probes: &[NormalizedTitle],
        year: i32,
        volume: u32,
    ) -> Probe {
        let index = self.bases.year_volume(base);
        let mut matched = Vec::new();
        let mut keys = HashMap::new();

        for title in probes {
            for issnl in index.get(title.as_str(), year, volume) {
                keys.entry(issnl.clone())
                    .or_insert_with(|| YearVolumeKey::new(title.clone(), year, volume));
                push_unique(&mut matched, issnl.clone());
            }
        }

        tracing::trace!(?base, year, volume, matched = matched.len(), "direct lookup");
        decide(candidates, matched, keys)
    }

    fn probe_inferred(
        &self,
        base: BaseKind,
        candidates: &[Issn],
        probes: &[NormalizedTitle],
        year: i32,
    ) -> Probe {
        let index = self.bases.year_volume(base);
        let mut matched = Vec::new();
        let mut keys = HashMap::new();

        for candidate in candidates {
            let Some(equation) = self
                .bases
                .equation_for(candidate)
                .filter(|e| e.is_reliable(self.min_r2))
            else {
                continue;
            };

            let prediction = equation.predict(year);
            tracing::trace!(
                ?base,
                candidate = %candidate,
                year,
                volume = prediction.volume,
                "inferred volume"
            );

            for volume in &prediction.window {
                for title in probes {
                    for issnl in index.get(title.as_str(), year, *volume) {
                        keys.entry(issnl.clone())
                            .or_insert_with(|| YearVolumeKey::new(title.clone(), year, *volume));
                        push_unique(&mut matched, issnl.clone());
                    }
                }

                if matched.len() > 1 {
                    tracing::trace!(?base, ?matched, "inferred volumes are ambiguous");
                    return Probe::Ambiguous;
                }
            }
        }

        decide(candidates, matched, keys)
    }
}

fn decide(candidates: &[Issn], matched: Vec<Issn>, mut keys: HashMap<Issn, YearVolumeKey>) -> Probe {
    match matched.as_slice() {
        [] => Probe::Inconclusive,
        [issnl] if candidates.contains(issnl) => match keys.remove(issnl) {
            Some(key) => Probe::Resolved(issnl.clone(), key),
            None => Probe::Inconclusive,
        },
        _ => Probe::Inconclusive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoaderConfig;
    use crate::index::{EquationIndex, IssnIndex, TitleIndex, YearVolumeIndex};
    use crate::regression::RegressionEquation;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const SAUDE: &str = "REV SAUDE PUBLICA";

    fn equation(key: &str, offset: f64) -> RegressionEquation {
        RegressionEquation {
            key: key.to_string(),
            a: -offset,
            b: 1.0,
            r2: 0.95,
        }
    }

    fn year_volume(kind: BaseKind, rows: &str, issns: &IssnIndex) -> YearVolumeIndex {
        YearVolumeIndex::from_reader(rows.as_bytes(), "yv", kind, issns, &LoaderConfig::default())
            .unwrap()
    }

    /// Two homonym journals A (0034-8910) and B (1234-5678).
    fn bases(empirical: &str, synthetic: &str, equations: Vec<RegressionEquation>) -> CorrectionBases {
        let issns = IssnIndex::from_reader(
            "0034-8910|0034-8910|REV SAUDE PUBLICA#REVISTA DE SAUDE PUBLICA\n\
             1234-5678|1234-5678|REV SAUDE PUBLICA\n"
                .as_bytes(),
            "issns",
            &LoaderConfig::default(),
        )
        .unwrap();
        let titles = TitleIndex::from_entries([(SAUDE, vec!["0034-8910", "1234-5678"])]);
        let empirical = year_volume(BaseKind::Empirical, empirical, &issns);
        let synthetic = year_volume(BaseKind::Synthetic, synthetic, &issns);

        CorrectionBases::new(
            titles,
            issns,
            empirical,
            synthetic,
            EquationIndex::from_equations(equations, 0.7),
        )
    }

    fn candidates() -> Vec<Issn> {
        vec![Issn::from("0034-8910"), Issn::from("1234-5678")]
    }

    fn run(bases: &CorrectionBases, year: Option<i32>, volume: Option<u32>) -> Decision {
        Disambiguator::new(bases).disambiguate(
            &candidates(),
            &NormalizedTitle::new(SAUDE),
            year,
            volume,
            MatchKind::Exact,
        )
    }

    #[test]
    fn test_direct_empirical() {
        let bases = bases("0034-8910|REV SAUDE PUBLICA|2005|39\n", "", vec![]);
        let decision = run(&bases, Some(2005), Some(39));

        assert_eq!(decision.code, ResultCode::SuccessExactMatchYearVol);
        assert_eq!(decision.issnl.as_deref(), Some("0034-8910"));
        assert_eq!(
            decision.provenance.unwrap().to_string(),
            "REV SAUDE PUBLICA-2005-39"
        );
    }

    #[test]
    fn test_invalid_year() {
        let bases = bases("0034-8910|REV SAUDE PUBLICA|2005|39\n", "", vec![]);
        let decision = run(&bases, None, Some(39));
        assert_eq!(decision.code, ResultCode::ErrorExactMatchInvalidYear);
        assert!(!decision.is_resolved());
    }

    #[test]
    fn test_inferred_empirical() {
        // A publishes volume year-1966; the citation has no volume
        let bases = bases(
            "0034-8910|REV SAUDE PUBLICA|2005|40\n",
            "",
            vec![equation("0034-8910", 1966.0)],
        );
        let decision = run(&bases, Some(2005), None);

        assert_eq!(decision.code, ResultCode::SuccessExactMatchYearVolInferred);
        assert_eq!(decision.issnl.as_deref(), Some("0034-8910"));
        assert_eq!(
            decision.provenance.unwrap().key.to_string(),
            "REV SAUDE PUBLICA-2005-40"
        );
    }

    #[test]
    fn test_direct_ambiguity_falls_through_to_inference() {
        let bases = bases(
            "0034-8910|REV SAUDE PUBLICA|2005|39\n\
             1234-5678|REV SAUDE PUBLICA|2005|39\n\
             1234-5678|REV SAUDE PUBLICA|2005|12\n",
            "",
            vec![equation("1234-5678", 1993.0)],
        );
        let decision = run(&bases, Some(2005), Some(39));

        assert_eq!(decision.code, ResultCode::SuccessExactMatchYearVolInferred);
        assert_eq!(decision.issnl.as_deref(), Some("1234-5678"));
    }

    #[test]
    fn test_inferred_ambiguity_short_circuits() {
        // Both windows hit, the synthetic base would have resolved the citation
        let bases = bases(
            "0034-8910|REV SAUDE PUBLICA|2005|39\n1234-5678|REV SAUDE PUBLICA|2005|40\n",
            "0034-8910|REV SAUDE PUBLICA|2005|39\n",
            vec![equation("0034-8910", 1966.0)],
        );
        let decision = run(&bases, Some(2005), None);

        assert_eq!(decision.code, ResultCode::ErrorExactMatchYearVolInferred);
        assert_eq!(decision.issnl, None);
    }

    #[test]
    fn test_synthetic_direct_and_inferred() {
        let without_equations = bases("", "1234-5678|REV SAUDE PUBLICA|2005|12\n", vec![]);
        let decision = run(&without_equations, Some(2005), Some(12));
        assert_eq!(decision.code, ResultCode::SuccessExactMatchYearVolArtificial);
        assert_eq!(decision.provenance.unwrap().base, BaseKind::Synthetic);

        let with_equations = bases(
            "",
            "1234-5678|REV SAUDE PUBLICA|2005|12\n",
            vec![equation("1234-5678", 1993.0)],
        );
        let decision = run(&with_equations, Some(2005), Some(30));
        assert_eq!(
            decision.code,
            ResultCode::SuccessExactMatchYearVolInferredArtificial
        );
        assert_eq!(decision.issnl.as_deref(), Some("1234-5678"));
    }

    #[rstest]
    #[case(MatchKind::Exact, ResultCode::ErrorExactMatchYearVolInferredArtificial, 549)]
    #[case(MatchKind::Fuzzy, ResultCode::ErrorFuzzyMatchYearVolInferredArtificial, 649)]
    fn test_synthetic_inferred_ambiguity(
        #[case] kind: MatchKind,
        #[case] expected: ResultCode,
        #[case] numeric: u16,
    ) {
        // Nothing in the empirical base, each window hits its own journal in the synthetic one
        let bases = bases(
            "",
            "0034-8910|REV SAUDE PUBLICA|2005|39\n1234-5678|REV SAUDE PUBLICA|2005|12\n",
            vec![equation("0034-8910", 1966.0), equation("1234-5678", 1993.0)],
        );
        let decision = Disambiguator::new(&bases).disambiguate(
            &candidates(),
            &NormalizedTitle::new(SAUDE),
            Some(2005),
            None,
            kind,
        );

        assert_eq!(decision.code, expected);
        assert_eq!(decision.code.code(), numeric);
        assert_eq!(decision.issnl, None);
        assert_eq!(decision.provenance, None);
    }

    #[test]
    fn test_non_candidate_match_is_undecidable() {
        let bases = bases("9999-9999|REV SAUDE PUBLICA|2005|39\n", "", vec![]);
        let decision = run(&bases, Some(2005), Some(39));
        assert_eq!(decision.code, ResultCode::ErrorExactMatchUndecidable);
    }

    #[test]
    fn test_unreliable_equation_is_ignored() {
        let mut weak = equation("0034-8910", 1966.0);
        weak.r2 = 0.75;
        let bases = bases("0034-8910|REV SAUDE PUBLICA|2005|39\n", "", vec![weak]);

        let decision = Disambiguator::new(&bases).with_min_r2(0.9).disambiguate(
            &candidates(),
            &NormalizedTitle::new(SAUDE),
            Some(2005),
            None,
            MatchKind::Exact,
        );
        assert_eq!(decision.code, ResultCode::ErrorExactMatchUndecidable);
    }

    #[test]
    fn test_fuzzy_probes_variant_titles() {
        let bases = bases("0034-8910|REVISTA DE SAUDE PUBLICA|2005|39\n", "", vec![]);
        let decision = Disambiguator::new(&bases).disambiguate(
            &candidates(),
            &NormalizedTitle::new("REV SAUDE PUBL"),
            Some(2005),
            Some(39),
            MatchKind::Fuzzy,
        );

        assert_eq!(decision.code, ResultCode::SuccessFuzzyMatchYearVol);
        assert_eq!(
            decision.provenance.unwrap().key.title.as_str(),
            "REVISTA DE SAUDE PUBLICA"
        );
    }
}
