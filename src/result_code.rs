//! Closed taxonomy of matching outcomes.
//!
//! Every processed citation carries exactly one [`ResultCode`]. Codes serialize as the
//! numeric values used by the downstream tooling, so enriched records stay comparable
//! across runs.

use crate::MatchError;
use crate::disambiguate::Strategy;
use crate::index::BaseKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether candidates came from the exact title lookup or from fuzzy matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

/// Outcome of matching a single citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum ResultCode {
    SuccessExactMatch,
    SuccessExactMatchYearVol,
    SuccessExactMatchYearVolInferred,
    SuccessExactMatchYearVolArtificial,
    SuccessExactMatchYearVolInferredArtificial,
    SuccessFuzzyMatchYearVol,
    SuccessFuzzyMatchYearVolInferred,
    SuccessFuzzyMatchYearVolArtificial,
    SuccessFuzzyMatchYearVolInferredArtificial,
    ErrorJournalTitleNotFound,
    ErrorExactMatchInvalidYear,
    ErrorFuzzyMatchInvalidYear,
    ErrorJournalTitleIsEmpty,
    NotConductedMatchDoiExists,
    NotConductedMatchFuzzyDisabled,
    ErrorExactMatchUndecidable,
    ErrorExactMatchYearVolInferred,
    ErrorExactMatchYearVolInferredArtificial,
    ErrorFuzzyMatchUndecidable,
    ErrorFuzzyMatchYearVolInferred,
    ErrorFuzzyMatchYearVolInferredArtificial,
}

impl ResultCode {
    /// Every code, in ascending numeric order.
    pub const ALL: [ResultCode; 21] = [
        ResultCode::SuccessExactMatch,
        ResultCode::SuccessExactMatchYearVol,
        ResultCode::SuccessExactMatchYearVolInferred,
        ResultCode::SuccessExactMatchYearVolArtificial,
        ResultCode::SuccessExactMatchYearVolInferredArtificial,
        ResultCode::SuccessFuzzyMatchYearVol,
        ResultCode::SuccessFuzzyMatchYearVolInferred,
        ResultCode::SuccessFuzzyMatchYearVolArtificial,
        ResultCode::SuccessFuzzyMatchYearVolInferredArtificial,
        ResultCode::ErrorJournalTitleNotFound,
        ResultCode::ErrorExactMatchInvalidYear,
        ResultCode::ErrorFuzzyMatchInvalidYear,
        ResultCode::ErrorJournalTitleIsEmpty,
        ResultCode::NotConductedMatchDoiExists,
        ResultCode::NotConductedMatchFuzzyDisabled,
        ResultCode::ErrorExactMatchUndecidable,
        ResultCode::ErrorExactMatchYearVolInferred,
        ResultCode::ErrorExactMatchYearVolInferredArtificial,
        ResultCode::ErrorFuzzyMatchUndecidable,
        ResultCode::ErrorFuzzyMatchYearVolInferred,
        ResultCode::ErrorFuzzyMatchYearVolInferredArtificial,
    ];

    /// Numeric code written to enriched records.
    pub fn code(self) -> u16 {
        match self {
            ResultCode::SuccessExactMatch => 0,
            ResultCode::SuccessExactMatchYearVol => 1,
            ResultCode::SuccessExactMatchYearVolInferred => 2,
            ResultCode::SuccessExactMatchYearVolArtificial => 3,
            ResultCode::SuccessExactMatchYearVolInferredArtificial => 4,
            ResultCode::SuccessFuzzyMatchYearVol => 11,
            ResultCode::SuccessFuzzyMatchYearVolInferred => 12,
            ResultCode::SuccessFuzzyMatchYearVolArtificial => 13,
            ResultCode::SuccessFuzzyMatchYearVolInferredArtificial => 14,
            ResultCode::ErrorJournalTitleNotFound => 70,
            ResultCode::ErrorExactMatchInvalidYear => 80,
            ResultCode::ErrorFuzzyMatchInvalidYear => 81,
            ResultCode::ErrorJournalTitleIsEmpty => 82,
            ResultCode::NotConductedMatchDoiExists => 90,
            ResultCode::NotConductedMatchFuzzyDisabled => 91,
            ResultCode::ErrorExactMatchUndecidable => 500,
            ResultCode::ErrorExactMatchYearVolInferred => 529,
            ResultCode::ErrorExactMatchYearVolInferredArtificial => 549,
            ResultCode::ErrorFuzzyMatchUndecidable => 600,
            ResultCode::ErrorFuzzyMatchYearVolInferred => 629,
            ResultCode::ErrorFuzzyMatchYearVolInferredArtificial => 649,
        }
    }

    /// Looks a code up by its numeric value.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultCode::SuccessExactMatch => "SUCCESS_EXACT_MATCH",
            ResultCode::SuccessExactMatchYearVol => "SUCCESS_EXACT_MATCH_YEAR_VOL",
            ResultCode::SuccessExactMatchYearVolInferred => "SUCCESS_EXACT_MATCH_YEAR_VOL_INFERRED",
            ResultCode::SuccessExactMatchYearVolArtificial => {
                "SUCCESS_EXACT_MATCH_YEAR_VOL_ARTIFICIAL"
            }
            ResultCode::SuccessExactMatchYearVolInferredArtificial => {
                "SUCCESS_EXACT_MATCH_YEAR_VOL_INFERRED_ARTIFICIAL"
            }
            ResultCode::SuccessFuzzyMatchYearVol => "SUCCESS_FUZZY_MATCH_YEAR_VOL",
            ResultCode::SuccessFuzzyMatchYearVolInferred => "SUCCESS_FUZZY_MATCH_YEAR_VOL_INFERRED",
            ResultCode::SuccessFuzzyMatchYearVolArtificial => {
                "SUCCESS_FUZZY_MATCH_YEAR_VOL_ARTIFICIAL"
            }
            ResultCode::SuccessFuzzyMatchYearVolInferredArtificial => {
                "SUCCESS_FUZZY_MATCH_YEAR_VOL_INFERRED_ARTIFICIAL"
            }
            ResultCode::ErrorJournalTitleNotFound => "ERROR_JOURNAL_TITLE_NOT_FOUND",
            ResultCode::ErrorExactMatchInvalidYear => "ERROR_EXACT_MATCH_INVALID_YEAR",
            ResultCode::ErrorFuzzyMatchInvalidYear => "ERROR_FUZZY_MATCH_INVALID_YEAR",
            ResultCode::ErrorJournalTitleIsEmpty => "ERROR_JOURNAL_TITLE_IS_EMPTY",
            ResultCode::NotConductedMatchDoiExists => "NOT_CONDUCTED_MATCH_DOI_EXISTS",
            ResultCode::NotConductedMatchFuzzyDisabled => "NOT_CONDUCTED_MATCH_FUZZY_DISABLED",
            ResultCode::ErrorExactMatchUndecidable => "ERROR_EXACT_MATCH_UNDECIDABLE",
            ResultCode::ErrorExactMatchYearVolInferred => "ERROR_EXACT_MATCH_YEAR_VOL_INFERRED",
            ResultCode::ErrorExactMatchYearVolInferredArtificial => {
                "ERROR_EXACT_MATCH_YEAR_VOL_INFERRED_ARTIFICIAL"
            }
            ResultCode::ErrorFuzzyMatchUndecidable => "ERROR_FUZZY_MATCH_UNDECIDABLE",
            ResultCode::ErrorFuzzyMatchYearVolInferred => "ERROR_FUZZY_MATCH_YEAR_VOL_INFERRED",
            ResultCode::ErrorFuzzyMatchYearVolInferredArtificial => {
                "ERROR_FUZZY_MATCH_YEAR_VOL_INFERRED_ARTIFICIAL"
            }
        }
    }

    /// Lower-case name, used as the output shard file stem.
    pub fn file_stem(self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    pub fn is_success(self) -> bool {
        self.as_str().starts_with("SUCCESS")
    }

    pub fn is_error(self) -> bool {
        self.as_str().starts_with("ERROR")
    }

    pub fn is_not_conducted(self) -> bool {
        self.as_str().starts_with("NOT_CONDUCTED")
    }

    /// Whether the code belongs to the fuzzy family.
    pub fn is_fuzzy(self) -> bool {
        self.as_str().contains("_FUZZY_")
    }

    /// Success code for a year-volume decision.
    pub fn resolved(kind: MatchKind, base: BaseKind, strategy: Strategy) -> Self {
        use BaseKind::{Empirical, Synthetic};
        use MatchKind::{Exact, Fuzzy};
        use Strategy::{Direct, Inferred};

        match (kind, base, strategy) {
            (Exact, Empirical, Direct) => ResultCode::SuccessExactMatchYearVol,
            (Exact, Empirical, Inferred) => ResultCode::SuccessExactMatchYearVolInferred,
            (Exact, Synthetic, Direct) => ResultCode::SuccessExactMatchYearVolArtificial,
            (Exact, Synthetic, Inferred) => ResultCode::SuccessExactMatchYearVolInferredArtificial,
            (Fuzzy, Empirical, Direct) => ResultCode::SuccessFuzzyMatchYearVol,
            (Fuzzy, Empirical, Inferred) => ResultCode::SuccessFuzzyMatchYearVolInferred,
            (Fuzzy, Synthetic, Direct) => ResultCode::SuccessFuzzyMatchYearVolArtificial,
            (Fuzzy, Synthetic, Inferred) => ResultCode::SuccessFuzzyMatchYearVolInferredArtificial,
        }
    }

    /// Error code for an inferred window that matched several ISSN-Ls.
    pub fn ambiguous(kind: MatchKind, base: BaseKind) -> Self {
        match (kind, base) {
            (MatchKind::Exact, BaseKind::Empirical) => ResultCode::ErrorExactMatchYearVolInferred,
            (MatchKind::Exact, BaseKind::Synthetic) => {
                ResultCode::ErrorExactMatchYearVolInferredArtificial
            }
            (MatchKind::Fuzzy, BaseKind::Empirical) => ResultCode::ErrorFuzzyMatchYearVolInferred,
            (MatchKind::Fuzzy, BaseKind::Synthetic) => {
                ResultCode::ErrorFuzzyMatchYearVolInferredArtificial
            }
        }
    }

    pub fn invalid_year(kind: MatchKind) -> Self {
        match kind {
            MatchKind::Exact => ResultCode::ErrorExactMatchInvalidYear,
            MatchKind::Fuzzy => ResultCode::ErrorFuzzyMatchInvalidYear,
        }
    }

    pub fn undecidable(kind: MatchKind) -> Self {
        match kind {
            MatchKind::Exact => ResultCode::ErrorExactMatchUndecidable,
            MatchKind::Fuzzy => ResultCode::ErrorFuzzyMatchUndecidable,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResultCode> for u16 {
    fn from(code: ResultCode) -> Self {
        code.code()
    }
}

impl TryFrom<u16> for ResultCode {
    type Error = MatchError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        ResultCode::from_code(code)
            .ok_or_else(|| MatchError::InvalidFormat(format!("unknown result code {code}")))
    }
}
